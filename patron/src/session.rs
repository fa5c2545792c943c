//! Loaded document state
//!
//! A `DocumentSession` is created once per successful upload and never mutated;
//! a new upload replaces it wholesale.

use crate::interface::{SessionId, UploadError};

/// The document currently bound to a remote session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSession {
    session_id: SessionId,
    file_name: String,
    raw_text: String,
    char_len: usize,
}

impl DocumentSession {
    pub fn new(session_id: SessionId, file_name: impl Into<String>, raw_text: String) -> Self {
        let char_len = raw_text.chars().count();
        Self {
            session_id,
            file_name: file_name.into(),
            raw_text,
            char_len,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Length in characters, the unit occurrence offsets are expressed in
    pub fn char_len(&self) -> usize {
        self.char_len
    }
}

/// Decode file bytes as UTF-8 text.
///
/// A leading byte order mark is kept as U+FEFF: the service counts it as
/// character 0, and offsets only line up if both sides hold the same text.
pub fn decode_text(bytes: &[u8]) -> Result<String, UploadError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| UploadError::NotText)
}

/// Tracks which load is the most recent one, so an older upload finishing late
/// can't install its document over a newer one.
#[derive(Debug, Default)]
pub(crate) struct LoadTracker {
    issued: u64,
}

impl LoadTracker {
    pub(crate) fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub(crate) fn is_latest(&self, ticket: u64) -> bool {
        ticket == self.issued
    }
}
