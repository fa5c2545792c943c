//! Client configuration

use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Which exact-match endpoint answers occurrence lookups.
/// Both return the same offsets; they differ only in the server-side algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceAlgorithm {
    #[default]
    Kmp,
    Z,
}

impl OccurrenceAlgorithm {
    pub(crate) fn endpoint(self) -> &'static str {
        match self {
            OccurrenceAlgorithm::Kmp => "kmp",
            OccurrenceAlgorithm::Z => "z",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "kmp" => Some(OccurrenceAlgorithm::Kmp),
            "z" => Some(OccurrenceAlgorithm::Z),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub occurrence_algorithm: OccurrenceAlgorithm,
    /// Release the previous document on the service after a new one loads.
    /// The service only keeps a handful of documents in memory.
    #[serde(default)]
    pub release_replaced_sessions: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("DEFAULT_API_URL is a valid URL")
}

fn default_timeout_ms() -> u64 { 10_000 }

fn default_user_agent() -> String {
    format!("patron/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_timeout_ms(),
            occurrence_algorithm: OccurrenceAlgorithm::default(),
            release_replaced_sessions: false,
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Read settings from `PATRON_*` environment variables, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup("PATRON_API_URL")
            .and_then(|s| Url::parse(&s).ok())
            .unwrap_or_else(default_base_url);
        let request_timeout_ms = lookup("PATRON_TIMEOUT_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(default_timeout_ms());
        let occurrence_algorithm = lookup("PATRON_ALGORITHM")
            .and_then(|s| OccurrenceAlgorithm::parse(&s))
            .unwrap_or_default();
        let release_replaced_sessions = lookup("PATRON_RELEASE_REPLACED")
            .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let user_agent = lookup("PATRON_USER_AGENT").unwrap_or_else(default_user_agent);

        Self { base_url, request_timeout_ms, occurrence_algorithm, release_replaced_sessions, user_agent }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
