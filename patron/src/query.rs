//! Query controller state
//!
//! Every keystroke replaces the live query and, when a document is loaded,
//! yields a ticket tagged with the text and session epoch at issue time. A reply
//! is applied only while its ticket still matches the live query, so under
//! network reordering the newest input wins rather than the newest reply.

use crate::interface::{Query, SuggestionError, SuggestionReply, SuggestionSet, Update};

/// Tag carried by an in-flight suggestion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SuggestionTicket {
    pub(crate) epoch: u64,
    pub(crate) text: String,
}

#[derive(Debug, Default)]
pub(crate) struct SuggestionTracker {
    query: Query,
    suggestions: Option<SuggestionSet>,
}

impl SuggestionTracker {
    pub(crate) fn query(&self) -> &Query {
        &self.query
    }

    pub(crate) fn suggestions(&self) -> Option<&SuggestionSet> {
        self.suggestions.as_ref()
    }

    /// Record new input text. `epoch` is `None` when no document is loaded.
    ///
    /// Returns a ticket when a lookup should be sent. Empty input, or input with
    /// no document, clears the suggestions on the spot.
    pub(crate) fn input(&mut self, text: &str, epoch: Option<u64>) -> Option<SuggestionTicket> {
        self.query = Query { text: text.to_string(), committed: false };
        match epoch {
            Some(epoch) if !text.is_empty() => Some(SuggestionTicket { epoch, text: text.to_string() }),
            _ => {
                self.suggestions = None;
                None
            }
        }
    }

    /// A reply still matters only for the same document and the same uncommitted text.
    pub(crate) fn is_live(&self, ticket: &SuggestionTicket, epoch: Option<u64>) -> bool {
        epoch == Some(ticket.epoch) && !self.query.committed && self.query.text == ticket.text
    }

    /// Apply a finished lookup. Stale results, successful or not, are dropped.
    pub(crate) fn complete(
        &mut self,
        ticket: SuggestionTicket,
        epoch: Option<u64>,
        result: Result<SuggestionReply, SuggestionError>,
    ) -> Result<Update, SuggestionError> {
        if !self.is_live(&ticket, epoch) {
            return Ok(Update::Discarded);
        }
        match result {
            Ok(reply) => {
                self.suggestions = Some(SuggestionSet {
                    for_query: ticket.text,
                    items: reply.suggestions,
                    elapsed_seconds: reply.elapsed_seconds,
                });
                Ok(Update::Applied)
            }
            Err(e) => {
                self.suggestions = None;
                Err(e)
            }
        }
    }

    /// Take a suggestion as the query text. Suggestions are hidden once the user picks one.
    pub(crate) fn accept(&mut self, suggestion: &str) {
        self.query = Query { text: suggestion.to_string(), committed: true };
        self.suggestions = None;
    }

    /// The user submitted the input as typed. Pending replies can no longer
    /// apply, so any shown suggestions belong to an earlier prefix and go too.
    pub(crate) fn mark_committed(&mut self) {
        self.query.committed = true;
        self.suggestions = None;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
