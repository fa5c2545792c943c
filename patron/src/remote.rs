//! HTTP backend for the matching service
//!
//! Speaks the service's JSON API: multipart upload, then JSON POSTs keyed by the
//! file name the upload returned. Every non-success outcome is folded into a
//! `RemoteError`; callers never see `reqwest` types.

use crate::config::{ClientConfig, OccurrenceAlgorithm};
use crate::interface::{
    MatchingService, OccurrenceReply, RemoteError, SessionId, SuggestionReply, UploadReceipt, Vocabulary,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

/// Multipart field the upload endpoint reads the file from
const UPLOAD_FIELD: &str = "archivo";

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file_name: String,
}

#[derive(Debug, Serialize)]
struct SuggestRequest<'a> {
    file_name: &'a str,
    #[serde(rename = "palabra")]
    prefix: &'a str,
}

#[derive(Debug, Deserialize)]
struct SuggestResponse {
    #[serde(rename = "sugerencias")]
    suggestions: Vec<String>,
    #[serde(rename = "tiempo_busqueda")]
    elapsed_seconds: f64,
}

#[derive(Debug, Serialize)]
struct PatternRequest<'a> {
    file_name: &'a str,
    #[serde(rename = "patron")]
    pattern: &'a str,
}

#[derive(Debug, Deserialize)]
struct PatternResponse {
    #[serde(rename = "ocurrencias")]
    offsets: Vec<usize>,
    #[serde(rename = "total_ocurrencias")]
    count: usize,
    #[serde(rename = "tiempo_busqueda")]
    elapsed_seconds: f64,
}

#[derive(Debug, Deserialize)]
struct VocabularyResponse {
    #[serde(rename = "vocabulario")]
    words: Vec<String>,
    #[serde(rename = "total_palabras_unicas")]
    unique_words: usize,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    #[serde(rename = "archivos_restantes")]
    remaining: usize,
}

/// Error body shape. `detail` is a string for handled errors and a list of
/// objects for request validation failures.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl From<SuggestResponse> for SuggestionReply {
    fn from(r: SuggestResponse) -> Self {
        SuggestionReply { suggestions: r.suggestions, elapsed_seconds: r.elapsed_seconds }
    }
}

impl From<PatternResponse> for OccurrenceReply {
    fn from(r: PatternResponse) -> Self {
        OccurrenceReply { offsets: r.offsets, count: r.count, elapsed_seconds: r.elapsed_seconds }
    }
}

impl From<VocabularyResponse> for Vocabulary {
    fn from(r: VocabularyResponse) -> Self {
        Vocabulary { words: r.words, unique_words: r.unique_words }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// `MatchingService` over HTTP
pub struct HttpMatchingService {
    client: reqwest::Client,
    base_url: Url,
    algorithm: OccurrenceAlgorithm,
}

impl HttpMatchingService {
    pub fn new(config: &ClientConfig) -> Result<Self, RemoteError> {
        if config.base_url.cannot_be_a_base() {
            return Err(RemoteError::Transport(format!("{} cannot be used as a base URL", config.base_url)));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            algorithm: config.occurrence_algorithm,
        })
    }

    /// Append path segments to the base URL, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Transport(format!("{} cannot be used as a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, RemoteError> {
        let url = self.endpoint(&[path])?;
        let response = self.client.post(url).json(body).send().await.map_err(transport_error)?;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl MatchingService for HttpMatchingService {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadReceipt, RemoteError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("text/plain")
            .map_err(transport_error)?;
        let form = reqwest::multipart::Form::new().part(UPLOAD_FIELD, part);

        let url = self.endpoint(&["upload"])?;
        let response = self.client.post(url).multipart(form).send().await.map_err(transport_error)?;
        let body: UploadResponse = read_json(response).await?;

        Ok(UploadReceipt { session_id: SessionId::new(body.file_name) })
    }

    async fn suggest(&self, session_id: &SessionId, query: &str) -> Result<SuggestionReply, RemoteError> {
        let request = SuggestRequest { file_name: session_id.as_str(), prefix: query };
        let body: SuggestResponse = self.post_json("autocompletado", &request).await?;
        Ok(body.into())
    }

    async fn occurrences(&self, session_id: &SessionId, pattern: &str) -> Result<OccurrenceReply, RemoteError> {
        let request = PatternRequest { file_name: session_id.as_str(), pattern };
        let body: PatternResponse = self.post_json(self.algorithm.endpoint(), &request).await?;
        Ok(body.into())
    }

    async fn vocabulary(&self, session_id: &SessionId) -> Result<Vocabulary, RemoteError> {
        let url = self.endpoint(&["vocabulario", session_id.as_str()])?;
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let body: VocabularyResponse = read_json(response).await?;
        Ok(body.into())
    }

    async fn release(&self, session_id: &SessionId) -> Result<(), RemoteError> {
        let url = self.endpoint(&["archivo", session_id.as_str()])?;
        let response = self.client.delete(url).send().await.map_err(transport_error)?;
        let body: ReleaseResponse = read_json(response).await?;
        tracing::debug!(session = %session_id, remaining = body.remaining, "released document");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response handling
// ─────────────────────────────────────────────────────────────────────────────

fn transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_timeout() {
        RemoteError::Timeout
    } else if error.is_decode() {
        RemoteError::Decode(error.to_string())
    } else {
        RemoteError::Transport(error.to_string())
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RemoteError> {
    let status = response.status();
    let body = response.bytes().await.map_err(transport_error)?;
    decode_body(status, &body)
}

fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, RemoteError> {
    if !status.is_success() {
        return Err(status_error(status, body));
    }
    serde_json::from_slice(body).map_err(|e| RemoteError::Decode(e.to_string()))
}

fn status_error(status: StatusCode, body: &[u8]) -> RemoteError {
    let detail = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody { detail: serde_json::Value::String(s) }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };
    RemoteError::Status { status: status.as_u16(), detail }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(base: &str) -> HttpMatchingService {
        let config = ClientConfig { base_url: Url::parse(base).unwrap(), ..ClientConfig::default() };
        HttpMatchingService::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_on_root_base() {
        let s = service("http://localhost:8000");
        assert_eq!(s.endpoint(&["upload"]).unwrap().as_str(), "http://localhost:8000/upload");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let s = service("http://search.internal/api/");
        assert_eq!(s.endpoint(&["kmp"]).unwrap().as_str(), "http://search.internal/api/kmp");
    }

    #[test]
    fn test_endpoint_encodes_file_name() {
        let s = service("http://localhost:8000/");
        let url = s.endpoint(&["vocabulario", "mi archivo.txt"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/vocabulario/mi%20archivo.txt");
    }

    #[test]
    fn test_suggest_request_shape() {
        let body = serde_json::to_value(SuggestRequest { file_name: "a.txt", prefix: "ca" }).unwrap();
        assert_eq!(body, serde_json::json!({ "file_name": "a.txt", "palabra": "ca" }));
    }

    #[test]
    fn test_pattern_request_shape() {
        let body = serde_json::to_value(PatternRequest { file_name: "a.txt", pattern: "casa" }).unwrap();
        assert_eq!(body, serde_json::json!({ "file_name": "a.txt", "patron": "casa" }));
    }

    #[test]
    fn test_decode_pattern_response() {
        let body = br#"{"file_name":"a.txt","patron":"la","ocurrencias":[0,12,40],"total_ocurrencias":3,"tiempo_busqueda":0.00012}"#;
        let reply: OccurrenceReply = decode_body::<PatternResponse>(StatusCode::OK, body).unwrap().into();
        assert_eq!(reply.offsets, vec![0, 12, 40]);
        assert_eq!(reply.count, 3);
        assert_eq!(reply.elapsed_seconds, 0.00012);
    }

    #[test]
    fn test_decode_suggest_response() {
        let body = br#"{"sugerencias":["casa","casita"],"tiempo_busqueda":0.5}"#;
        let reply: SuggestionReply = decode_body::<SuggestResponse>(StatusCode::OK, body).unwrap().into();
        assert_eq!(reply.suggestions, vec!["casa", "casita"]);
    }

    #[test]
    fn test_negative_offset_is_decode_error() {
        let body = br#"{"ocurrencias":[-1],"total_ocurrencias":1,"tiempo_busqueda":0.1}"#;
        let result = decode_body::<PatternResponse>(StatusCode::OK, body);
        assert!(matches!(result, Err(RemoteError::Decode(_))));
    }

    #[test]
    fn test_error_detail_string() {
        let body = br#"{"detail":"Solo se aceptan archivos .txt"}"#;
        let result = decode_body::<UploadResponse>(StatusCode::BAD_REQUEST, body);
        assert_eq!(
            result.unwrap_err(),
            RemoteError::Status { status: 400, detail: "Solo se aceptan archivos .txt".into() }
        );
    }

    #[test]
    fn test_error_detail_structured() {
        let body = br#"{"detail":[{"loc":["body","patron"],"msg":"field required"}]}"#;
        match decode_body::<PatternResponse>(StatusCode::UNPROCESSABLE_ENTITY, body) {
            Err(RemoteError::Status { status, detail }) => {
                assert_eq!(status, 422);
                assert!(detail.contains("field required"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_without_body_uses_reason() {
        let result = decode_body::<SuggestResponse>(StatusCode::NOT_FOUND, b"");
        assert_eq!(result.unwrap_err(), RemoteError::Status { status: 404, detail: "Not Found".into() });
    }
}
