//! Occurrence resolver state
//!
//! Tracks the committed pattern and the occurrence set answering it. Requests
//! are tagged with the pattern and session epoch; a reply is stored only while
//! that pattern is still the committed one and only after its offsets have been
//! checked against the loaded text. This race is independent of the suggestion
//! race in `query`.

use crate::highlight::validate_offsets;
use crate::interface::{OccurrenceError, OccurrenceReply, OccurrenceSet, Update};

/// Tag carried by an in-flight occurrence request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OccurrenceTicket {
    pub(crate) epoch: u64,
    pub(crate) pattern: String,
}

#[derive(Debug, Default)]
pub(crate) struct OccurrenceTracker {
    pattern: Option<String>,
    occurrences: Option<OccurrenceSet>,
}

impl OccurrenceTracker {
    pub(crate) fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub(crate) fn occurrences(&self) -> Option<&OccurrenceSet> {
        self.occurrences.as_ref()
    }

    /// Commit a pattern. Previous highlights are dropped right away.
    ///
    /// An empty pattern, or no loaded document (`epoch` is `None`), yields no
    /// ticket: empty-pattern search is undefined and never leaves the client.
    pub(crate) fn commit(&mut self, pattern: &str, epoch: Option<u64>) -> Option<OccurrenceTicket> {
        self.occurrences = None;
        match epoch {
            Some(epoch) if !pattern.is_empty() => {
                self.pattern = Some(pattern.to_string());
                Some(OccurrenceTicket { epoch, pattern: pattern.to_string() })
            }
            _ => {
                self.pattern = None;
                None
            }
        }
    }

    pub(crate) fn is_live(&self, ticket: &OccurrenceTicket, epoch: Option<u64>) -> bool {
        epoch == Some(ticket.epoch) && self.pattern.as_deref() == Some(ticket.pattern.as_str())
    }

    /// Apply a finished lookup against a document of `text_len` characters.
    ///
    /// A live failure, including a reply whose offsets don't fit the text,
    /// leaves an empty occurrence set behind so stale highlights disappear.
    pub(crate) fn complete(
        &mut self,
        ticket: OccurrenceTicket,
        epoch: Option<u64>,
        text_len: usize,
        result: Result<OccurrenceReply, OccurrenceError>,
    ) -> Result<Update, OccurrenceError> {
        if !self.is_live(&ticket, epoch) {
            return Ok(Update::Discarded);
        }
        match result.and_then(|reply| Self::checked(&ticket.pattern, text_len, reply)) {
            Ok(set) => {
                self.occurrences = Some(set);
                Ok(Update::Applied)
            }
            Err(e) => {
                self.occurrences = Some(OccurrenceSet::empty(&ticket.pattern));
                Err(e)
            }
        }
    }

    fn checked(pattern: &str, text_len: usize, reply: OccurrenceReply) -> Result<OccurrenceSet, OccurrenceError> {
        if reply.count != reply.offsets.len() {
            return Err(OccurrenceError::CountMismatch {
                count: reply.count,
                offsets: reply.offsets.len(),
            });
        }
        validate_offsets(text_len, &reply.offsets, pattern.chars().count())?;
        Ok(OccurrenceSet {
            for_pattern: pattern.to_string(),
            offsets: reply.offsets,
            count: reply.count,
            elapsed_seconds: reply.elapsed_seconds,
        })
    }

    /// Drop the current occurrence set after it failed to render
    pub(crate) fn discard(&mut self) {
        self.occurrences = None;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Store a set without checking it against any text
    #[cfg(test)]
    pub(crate) fn force(&mut self, set: OccurrenceSet) {
        self.pattern = Some(set.for_pattern.clone());
        self.occurrences = Some(set);
    }
}
