//! Patron Client Interface Definition
//!
//! Shared types for the search client: the document/query/result records the
//! presentation layer reads, the error taxonomy, and the `MatchingService`
//! contract every remote backend implements.

use std::fmt;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque identifier the matching service issues for an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// The live input text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    pub text: String,
    /// Set when the user accepts a suggestion or submits; reset by the next keystroke
    pub committed: bool,
}

/// Ranked suggestions answering one query text
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionSet {
    pub for_query: String,
    pub items: Vec<String>,
    pub elapsed_seconds: f64,
}

/// All occurrences of one committed pattern in the loaded document.
///
/// Offsets are character (Unicode scalar) positions into the document text,
/// ascending and non-overlapping for the pattern length.
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceSet {
    pub for_pattern: String,
    pub offsets: Vec<usize>,
    pub count: usize,
    pub elapsed_seconds: f64,
}

impl OccurrenceSet {
    /// The reset value used after a failed lookup
    pub fn empty(pattern: &str) -> Self {
        Self {
            for_pattern: pattern.to_string(),
            offsets: Vec::new(),
            count: 0,
            elapsed_seconds: 0.0,
        }
    }

    pub fn pattern_len(&self) -> usize {
        self.for_pattern.chars().count()
    }
}

/// Derived view of the latest applied suggestion and occurrence sets.
/// Always computed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Statistics {
    pub match_count: usize,
    pub search_seconds: f64,
    pub autocomplete_seconds: f64,
}

impl Statistics {
    pub fn project(suggestions: Option<&SuggestionSet>, occurrences: Option<&OccurrenceSet>) -> Self {
        Self {
            match_count: occurrences.map_or(0, |o| o.count),
            search_seconds: occurrences.map_or(0.0, |o| o.elapsed_seconds),
            autocomplete_seconds: suggestions.map_or(0.0, |s| s.elapsed_seconds),
        }
    }
}

/// A contiguous run of document text, matched or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub highlighted: bool,
}

impl Fragment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), highlighted: false }
    }

    pub fn highlighted(text: impl Into<String>) -> Self {
        Self { text: text.into(), highlighted: true }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE REPLIES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionReply {
    pub suggestions: Vec<String>,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceReply {
    pub offsets: Vec<usize>,
    pub count: usize,
    pub elapsed_seconds: f64,
}

/// Every distinct word the service extracted from a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    pub words: Vec<String>,
    pub unique_words: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Any non-success outcome of a remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Service returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("Malformed response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("File is not UTF-8 text")]
    NotText,
    #[error("A newer file load replaced this one")]
    Superseded,
    #[error("Upload failed: {0}")]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SuggestionError {
    #[error("Suggestion lookup failed: {0}")]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OccurrenceError {
    #[error("Occurrence lookup failed: {0}")]
    Remote(#[from] RemoteError),
    #[error("Occurrences do not fit the document: {0}")]
    Inconsistent(#[from] RenderInconsistency),
    #[error("Service reported {count} occurrences but sent {offsets} offsets")]
    CountMismatch { count: usize, offsets: usize },
}

/// Offsets that cannot be laid over the document text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderInconsistency {
    #[error("Offsets given for an empty pattern")]
    EmptyPattern,
    #[error("Offset {offset} with pattern length {pattern_len} exceeds text length {text_len}")]
    OutOfBounds { offset: usize, pattern_len: usize, text_len: usize },
    #[error("Offset {offset} follows {previous}; offsets must ascend")]
    Unordered { previous: usize, offset: usize },
    #[error("Offset {offset} starts before the previous match ends at {previous_end}")]
    Overlapping { previous_end: usize, offset: usize },
}

/// The most recent recoverable failure, shown inline by the UI
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Notice {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Suggestion(#[from] SuggestionError),
    #[error(transparent)]
    Occurrence(#[from] OccurrenceError),
    #[error("Highlights were discarded: {0}")]
    Render(#[from] RenderInconsistency),
}

/// What an async client operation did to the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// A response was stored
    Applied,
    /// State was emptied without a remote call
    Cleared,
    /// The response arrived for an input, pattern or document that is no longer live
    Discarded,
    /// The request failed; state was reset and a notice recorded
    Failed,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Contract with the remote matching service.
/// Every call resolves with a full result or fails; there is no streaming.
#[async_trait::async_trait]
pub trait MatchingService: Send + Sync {
    /// Upload a text file; the returned id binds later queries to it
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadReceipt, RemoteError>;

    /// Ranked completions for a non-empty prefix
    async fn suggest(&self, session_id: &SessionId, query: &str) -> Result<SuggestionReply, RemoteError>;

    /// Start offsets of every exact occurrence of a non-empty pattern
    async fn occurrences(&self, session_id: &SessionId, pattern: &str) -> Result<OccurrenceReply, RemoteError>;

    async fn vocabulary(&self, session_id: &SessionId) -> Result<Vocabulary, RemoteError>;

    /// Drop a document the client no longer needs
    async fn release(&self, session_id: &SessionId) -> Result<(), RemoteError>;
}
