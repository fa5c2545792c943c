//! SearchClient - coordinates document loading, suggestions, occurrences and highlighting
//!
//! Concurrency Model:
//! - All state sits behind one `parking_lot::Mutex`, held only for synchronous
//!   bookkeeping and never across an `.await`, so replies are applied one at a
//!   time in whatever order the network delivers them.
//! - Suggestion and occurrence requests are tagged when issued and checked when
//!   they complete; a reply for input that is no longer live is dropped.
//! - Each loaded document gets a new epoch and a fresh `CancellationToken`. A new
//!   load cancels the old token, which drops every in-flight request future tied
//!   to the previous document. Nothing is sent to the service to cancel.

use crate::config::ClientConfig;
use crate::highlight::render;
use crate::interface::{
    Fragment, MatchingService, Notice, OccurrenceError, OccurrenceSet, Query, RemoteError, SessionId,
    SuggestionError, SuggestionSet, Statistics, Update, UploadError, Vocabulary,
};
use crate::occurrence::OccurrenceTracker;
use crate::query::SuggestionTracker;
use crate::remote::HttpMatchingService;
use crate::session::{decode_text, DocumentSession, LoadTracker};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Read-only copy of everything the view draws from
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSnapshot {
    pub document: Option<DocumentSession>,
    pub query: Query,
    pub suggestions: Option<SuggestionSet>,
    pub occurrences: Option<OccurrenceSet>,
    pub statistics: Statistics,
    pub notice: Option<Notice>,
}

enum LoadOutcome {
    Loaded { session: DocumentSession, replaced: Option<SessionId> },
    Superseded,
    Failed(UploadError),
}

#[derive(Debug)]
struct ClientState {
    document: Option<DocumentSession>,
    epoch: u64,
    cancel: CancellationToken,
    loads: LoadTracker,
    query: SuggestionTracker,
    resolver: OccurrenceTracker,
    notice: Option<Notice>,
}

impl ClientState {
    fn new() -> Self {
        Self {
            document: None,
            epoch: 0,
            cancel: CancellationToken::new(),
            loads: LoadTracker::default(),
            query: SuggestionTracker::default(),
            resolver: OccurrenceTracker::default(),
            notice: None,
        }
    }

    /// Epoch of the loaded document, `None` when nothing is loaded
    fn live_epoch(&self) -> Option<u64> {
        self.document.as_ref().map(|_| self.epoch)
    }

    /// Swap in a new document and invalidate everything derived from the old one.
    fn install(&mut self, document: DocumentSession) -> Option<DocumentSession> {
        self.epoch += 1;
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.query.reset();
        self.resolver.reset();
        self.notice = None;
        self.document.replace(document)
    }

    fn clear_notice_if(&mut self, pred: impl Fn(&Notice) -> bool) {
        if self.notice.as_ref().is_some_and(pred) {
            self.notice = None;
        }
    }
}

/// Client-side coordinator for one document at a time.
///
/// Methods take `&self`; share the client through an `Arc` to drive several
/// requests concurrently from the UI.
pub struct SearchClient<S: MatchingService> {
    service: S,
    release_replaced: bool,
    state: Mutex<ClientState>,
}

impl SearchClient<HttpMatchingService> {
    /// Create a client talking to the HTTP service described by `config`
    pub fn from_config(config: &ClientConfig) -> Result<Self, RemoteError> {
        let service = HttpMatchingService::new(config)?;
        Ok(Self::new(service).release_replaced_sessions(config.release_replaced_sessions))
    }
}

impl<S: MatchingService> SearchClient<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            release_replaced: false,
            state: Mutex::new(ClientState::new()),
        }
    }

    /// Release the previous document on the service whenever a new one is loaded
    pub fn release_replaced_sessions(mut self, enabled: bool) -> Self {
        self.release_replaced = enabled;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Document Session
    // ─────────────────────────────────────────────────────────────────────────────

    /// Upload a text file and make it the current document.
    ///
    /// On success every suggestion, occurrence and notice tied to the previous
    /// document is cleared and its in-flight requests are abandoned. On failure
    /// the previous document stays loaded.
    pub async fn load_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<DocumentSession, UploadError> {
        let text = match decode_text(&bytes) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(file = file_name, "rejected non-text file");
                self.state.lock().notice = Some(e.clone().into());
                return Err(e);
            }
        };

        let ticket = self.state.lock().loads.begin();
        let result = self.service.upload(file_name, bytes).await;

        let outcome = {
            let mut state = self.state.lock();
            if !state.loads.is_latest(ticket) {
                tracing::debug!(file = file_name, "discarded superseded upload");
                LoadOutcome::Superseded
            } else {
                match result {
                    Ok(receipt) => {
                        let session = DocumentSession::new(receipt.session_id, file_name, text);
                        let previous = state.install(session.clone());
                        tracing::debug!(session = %session.session_id(), chars = session.char_len(), "document loaded");
                        let replaced = previous
                            .map(|p| p.session_id().clone())
                            .filter(|id| id != session.session_id());
                        LoadOutcome::Loaded { session, replaced }
                    }
                    Err(e) => {
                        let err = UploadError::from(e);
                        tracing::warn!(file = file_name, error = %err, "upload failed");
                        state.notice = Some(err.clone().into());
                        LoadOutcome::Failed(err)
                    }
                }
            }
        };

        match outcome {
            LoadOutcome::Loaded { session, replaced } => {
                self.release_quietly(replaced).await;
                Ok(session)
            }
            LoadOutcome::Superseded => Err(UploadError::Superseded),
            LoadOutcome::Failed(err) => Err(err),
        }
    }

    async fn release_quietly(&self, session_id: Option<SessionId>) {
        let Some(session_id) = session_id.filter(|_| self.release_replaced) else {
            return;
        };
        if let Err(e) = self.service.release(&session_id).await {
            tracing::warn!(session = %session_id, error = %e, "failed to release replaced document");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Query Controller
    // ─────────────────────────────────────────────────────────────────────────────

    /// Handle a change of the input text.
    ///
    /// Empty input, or input with no document loaded, clears suggestions without
    /// contacting the service. Otherwise the reply is applied only if `text` is
    /// still the live input when it arrives.
    pub async fn on_input_change(&self, text: &str) -> Update {
        let (ticket, session_id, token) = {
            let mut state = self.state.lock();
            let epoch = state.live_epoch();
            let ticket = state.query.input(text, epoch);
            match (ticket, state.document.as_ref()) {
                (Some(ticket), Some(doc)) => (ticket, doc.session_id().clone(), state.cancel.clone()),
                _ => return Update::Cleared,
            }
        };

        let result = tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!(query = %ticket.text, "suggestion lookup abandoned by document reload");
                return Update::Discarded;
            }
            r = self.service.suggest(&session_id, &ticket.text) => r.map_err(SuggestionError::from),
        };

        let mut state = self.state.lock();
        let epoch = state.live_epoch();
        let query = ticket.text.clone();
        match state.query.complete(ticket, epoch, result) {
            Ok(Update::Discarded) => {
                tracing::debug!(query = %query, "discarded stale suggestions");
                Update::Discarded
            }
            Ok(update) => {
                state.clear_notice_if(|n| matches!(n, Notice::Suggestion(_)));
                update
            }
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "suggestion lookup failed");
                state.notice = Some(e.into());
                Update::Failed
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Occurrence Resolver
    // ─────────────────────────────────────────────────────────────────────────────

    /// The user picked a suggestion: it becomes the input and is searched for.
    pub async fn select_suggestion(&self, suggestion: &str) -> Update {
        self.state.lock().query.accept(suggestion);
        self.commit_pattern(suggestion).await
    }

    /// The user pressed Enter: search for the current input.
    pub async fn submit(&self) -> Update {
        let pattern = {
            let mut state = self.state.lock();
            if state.document.is_some() && !state.query.query().text.is_empty() {
                state.query.mark_committed();
            }
            state.query.query().text.clone()
        };
        self.commit_pattern(&pattern).await
    }

    /// Look up every occurrence of `pattern` in the loaded document.
    ///
    /// Current highlights are dropped immediately. An empty pattern, or no
    /// document, stops there without a request.
    pub async fn commit_pattern(&self, pattern: &str) -> Update {
        let (ticket, session_id, token) = {
            let mut state = self.state.lock();
            let epoch = state.live_epoch();
            let ticket = state.resolver.commit(pattern, epoch);
            match (ticket, state.document.as_ref()) {
                (Some(ticket), Some(doc)) => (ticket, doc.session_id().clone(), state.cancel.clone()),
                _ => return Update::Cleared,
            }
        };

        let result = tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!(pattern = %ticket.pattern, "occurrence lookup abandoned by document reload");
                return Update::Discarded;
            }
            r = self.service.occurrences(&session_id, &ticket.pattern) => r.map_err(OccurrenceError::from),
        };

        let mut state = self.state.lock();
        let epoch = state.live_epoch();
        let text_len = state.document.as_ref().map_or(0, DocumentSession::char_len);
        let pattern = ticket.pattern.clone();
        match state.resolver.complete(ticket, epoch, text_len, result) {
            Ok(Update::Discarded) => {
                tracing::debug!(pattern = %pattern, "discarded stale occurrences");
                Update::Discarded
            }
            Ok(update) => {
                state.clear_notice_if(|n| matches!(n, Notice::Occurrence(_) | Notice::Render(_)));
                update
            }
            Err(e) => {
                match &e {
                    OccurrenceError::Remote(_) => {
                        tracing::warn!(pattern = %pattern, error = %e, "occurrence lookup failed")
                    }
                    _ => tracing::error!(pattern = %pattern, error = %e, "service sent unusable occurrences"),
                }
                state.notice = Some(e.into());
                Update::Failed
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Highlight Renderer
    // ─────────────────────────────────────────────────────────────────────────────

    /// The loaded document split into plain and highlighted fragments.
    ///
    /// Empty when nothing is loaded. If the stored occurrences can't be laid over
    /// the text they are discarded, a notice is recorded, and the document comes
    /// back unhighlighted.
    pub fn fragments(&self) -> Vec<Fragment> {
        let mut state = self.state.lock();
        let rendered = match (state.document.as_ref(), state.resolver.occurrences()) {
            (None, _) => return Vec::new(),
            (Some(doc), None) => return vec![Fragment::plain(doc.raw_text())],
            (Some(doc), Some(set)) => render(doc.raw_text(), &set.offsets, set.pattern_len())
                .map_err(|e| (e, doc.raw_text().to_string())),
        };

        match rendered {
            Ok(fragments) => fragments,
            Err((e, text)) => {
                tracing::error!(error = %e, "occurrences do not fit the document; highlights cleared");
                state.resolver.discard();
                state.notice = Some(e.into());
                vec![Fragment::plain(text)]
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Read access
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> ClientSnapshot {
        let state = self.state.lock();
        let suggestions = state.query.suggestions().cloned();
        let occurrences = state.resolver.occurrences().cloned();
        ClientSnapshot {
            document: state.document.clone(),
            query: state.query.query().clone(),
            statistics: Statistics::project(suggestions.as_ref(), occurrences.as_ref()),
            suggestions,
            occurrences,
            notice: state.notice.clone(),
        }
    }

    pub fn document(&self) -> Option<DocumentSession> {
        self.state.lock().document.clone()
    }

    pub fn query(&self) -> Query {
        self.state.lock().query.query().clone()
    }

    pub fn suggestions(&self) -> Option<SuggestionSet> {
        self.state.lock().query.suggestions().cloned()
    }

    pub fn occurrences(&self) -> Option<OccurrenceSet> {
        self.state.lock().resolver.occurrences().cloned()
    }

    /// The pattern the current (or pending) occurrence set belongs to
    pub fn committed_pattern(&self) -> Option<String> {
        self.state.lock().resolver.pattern().map(str::to_owned)
    }

    pub fn statistics(&self) -> Statistics {
        let state = self.state.lock();
        Statistics::project(state.query.suggestions(), state.resolver.occurrences())
    }

    pub fn notice(&self) -> Option<Notice> {
        self.state.lock().notice.clone()
    }

    pub fn dismiss_notice(&self) {
        self.state.lock().notice = None;
    }

    /// Every distinct word of the loaded document, `None` when nothing is loaded
    pub async fn vocabulary(&self) -> Result<Option<Vocabulary>, RemoteError> {
        let session_id = self.state.lock().document.as_ref().map(|d| d.session_id().clone());
        match session_id {
            Some(id) => self.service.vocabulary(&id).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{OccurrenceReply, RenderInconsistency, SuggestionReply, UploadReceipt};

    /// Answers every upload with the file name and refuses everything else
    struct EchoService;

    #[async_trait::async_trait]
    impl MatchingService for EchoService {
        async fn upload(&self, file_name: &str, _bytes: Vec<u8>) -> Result<UploadReceipt, RemoteError> {
            Ok(UploadReceipt { session_id: SessionId::new(file_name) })
        }

        async fn suggest(&self, _: &SessionId, _: &str) -> Result<SuggestionReply, RemoteError> {
            Err(RemoteError::Timeout)
        }

        async fn occurrences(&self, _: &SessionId, _: &str) -> Result<OccurrenceReply, RemoteError> {
            Err(RemoteError::Timeout)
        }

        async fn vocabulary(&self, _: &SessionId) -> Result<Vocabulary, RemoteError> {
            Err(RemoteError::Timeout)
        }

        async fn release(&self, _: &SessionId) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unrenderable_occurrences_fall_back_to_plain_text() {
        let client = SearchClient::new(EchoService);
        client.load_file("a.txt", b"hola mundo".to_vec()).await.unwrap();

        client.state.lock().resolver.force(OccurrenceSet {
            for_pattern: "mundo".into(),
            offsets: vec![8],
            count: 1,
            elapsed_seconds: 0.0,
        });

        assert_eq!(client.fragments(), vec![Fragment::plain("hola mundo")]);
        assert!(client.occurrences().is_none());
        assert_eq!(
            client.notice(),
            Some(Notice::Render(RenderInconsistency::OutOfBounds { offset: 8, pattern_len: 5, text_len: 10 }))
        );
        // Committed pattern survives so the input still shows what was searched
        assert_eq!(client.committed_pattern().as_deref(), Some("mundo"));
    }

    #[tokio::test]
    async fn test_remote_failure_sets_notice_and_keeps_document() {
        let client = SearchClient::new(EchoService);
        client.load_file("a.txt", b"hola".to_vec()).await.unwrap();

        assert_eq!(client.on_input_change("ho").await, Update::Failed);
        assert_eq!(
            client.notice(),
            Some(Notice::Suggestion(SuggestionError::Remote(RemoteError::Timeout)))
        );
        client.dismiss_notice();
        assert_eq!(client.notice(), None);
        assert!(client.document().is_some());
    }
}
