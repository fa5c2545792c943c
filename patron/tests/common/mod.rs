//! Scripted matching service for driving `SearchClient` through races.
//!
//! Each remote call is handed to the test as a `Call` carrying a oneshot sender;
//! the call stays pending until the test replies, so tests choose the order in
//! which responses arrive.

#![allow(dead_code)]

use patron::{
    MatchingService, OccurrenceReply, RemoteError, SearchClient, SessionId, SuggestionReply, UploadReceipt, Vocabulary,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

pub type Reply<T> = oneshot::Sender<Result<T, RemoteError>>;

#[derive(Debug)]
pub enum Call {
    Upload { file_name: String, reply: Reply<UploadReceipt> },
    Suggest { session: SessionId, query: String, reply: Reply<SuggestionReply> },
    Occurrences { session: SessionId, pattern: String, reply: Reply<OccurrenceReply> },
    Vocabulary { session: SessionId, reply: Reply<Vocabulary> },
    Release { session: SessionId, reply: Reply<()> },
}

pub struct ScriptedService {
    calls: mpsc::UnboundedSender<Call>,
}

pub struct Script {
    calls: mpsc::UnboundedReceiver<Call>,
}

impl ScriptedService {
    pub fn new() -> (Self, Script) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { calls: tx }, Script { calls: rx })
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Call) -> Result<T, RemoteError> {
        let (tx, rx) = oneshot::channel();
        self.calls
            .send(make(tx))
            .map_err(|_| RemoteError::Transport("script closed".into()))?;
        rx.await
            .unwrap_or_else(|_| Err(RemoteError::Transport("reply dropped".into())))
    }
}

#[async_trait::async_trait]
impl MatchingService for ScriptedService {
    async fn upload(&self, file_name: &str, _bytes: Vec<u8>) -> Result<UploadReceipt, RemoteError> {
        let file_name = file_name.to_string();
        self.call(|reply| Call::Upload { file_name, reply }).await
    }

    async fn suggest(&self, session_id: &SessionId, query: &str) -> Result<SuggestionReply, RemoteError> {
        let (session, query) = (session_id.clone(), query.to_string());
        self.call(|reply| Call::Suggest { session, query, reply }).await
    }

    async fn occurrences(&self, session_id: &SessionId, pattern: &str) -> Result<OccurrenceReply, RemoteError> {
        let (session, pattern) = (session_id.clone(), pattern.to_string());
        self.call(|reply| Call::Occurrences { session, pattern, reply }).await
    }

    async fn vocabulary(&self, session_id: &SessionId) -> Result<Vocabulary, RemoteError> {
        let session = session_id.clone();
        self.call(|reply| Call::Vocabulary { session, reply }).await
    }

    async fn release(&self, session_id: &SessionId) -> Result<(), RemoteError> {
        let session = session_id.clone();
        self.call(|reply| Call::Release { session, reply }).await
    }
}

impl Script {
    pub async fn next(&mut self) -> Call {
        tokio::time::timeout(Duration::from_secs(2), self.calls.recv())
            .await
            .expect("no remote call arrived")
            .expect("service dropped")
    }

    pub async fn expect_upload(&mut self) -> (String, Reply<UploadReceipt>) {
        match self.next().await {
            Call::Upload { file_name, reply } => (file_name, reply),
            other => panic!("expected upload, got {:?}", other),
        }
    }

    pub async fn expect_suggest(&mut self) -> (String, Reply<SuggestionReply>) {
        match self.next().await {
            Call::Suggest { query, reply, .. } => (query, reply),
            other => panic!("expected suggest, got {:?}", other),
        }
    }

    pub async fn expect_occurrences(&mut self) -> (String, Reply<OccurrenceReply>) {
        match self.next().await {
            Call::Occurrences { pattern, reply, .. } => (pattern, reply),
            other => panic!("expected occurrences, got {:?}", other),
        }
    }

    /// Let spawned tasks run, then check nothing reached the service
    pub async fn assert_idle(&mut self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        if let Ok(call) = self.calls.try_recv() {
            panic!("unexpected remote call {:?}", call);
        }
    }
}

pub type Client = Arc<SearchClient<ScriptedService>>;

pub fn client() -> (Client, Script) {
    let (service, script) = ScriptedService::new();
    (Arc::new(SearchClient::new(service)), script)
}

/// Run a load to completion, answering the upload with `file_name` as session id
pub async fn load(client: &Client, script: &mut Script, file_name: &str, text: &str) {
    let c = Arc::clone(client);
    let (name, bytes) = (file_name.to_string(), text.as_bytes().to_vec());
    let task = tokio::spawn(async move { c.load_file(&name, bytes).await });
    let (_, reply) = script.expect_upload().await;
    let _ = reply.send(Ok(UploadReceipt { session_id: SessionId::new(file_name) }));
    task.await.unwrap().unwrap();
}

pub async fn loaded_client(file_name: &str, text: &str) -> (Client, Script) {
    let (client, mut script) = client();
    load(&client, &mut script, file_name, text).await;
    (client, script)
}

pub fn suggestions(words: &[&str], elapsed: f64) -> Result<SuggestionReply, RemoteError> {
    Ok(SuggestionReply {
        suggestions: words.iter().map(|w| w.to_string()).collect(),
        elapsed_seconds: elapsed,
    })
}

pub fn occurrences(offsets: &[usize], elapsed: f64) -> Result<OccurrenceReply, RemoteError> {
    Ok(OccurrenceReply { offsets: offsets.to_vec(), count: offsets.len(), elapsed_seconds: elapsed })
}
