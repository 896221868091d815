//! Model invocation layer: one structured-output request in, JSON text out.
//!
//! Two production clients share the `ModelClient` seam: a local Ollama
//! instance (default) and the hosted Gemini `generateContent` endpoint.
//! `MockModelClient` records every request for trajectory tests.

pub mod gemini;
pub mod mock;
pub mod ollama;

pub use gemini::GeminiClient;
pub use mock::MockModelClient;
pub use ollama::OllamaClient;

use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{AppConfig, ModelProvider};
use crate::models::report::BinaryPart;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model endpoint is not reachable at {0}")]
    Connection(String),

    #[error("Model request timed out after {0}s")]
    Timeout(u64),

    #[error("Model API returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("No API key configured for the model provider")]
    MissingCredentials,

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Model cannot read parts of type {0}")]
    UnsupportedMedia(String),
}

/// One structured-output generation request.
#[derive(Debug, Clone, Serialize)]
pub struct ModelRequest {
    pub instruction: String,
    /// Binary inputs in document order.
    pub parts: Vec<BinaryPart>,
    /// JSON schema the response must follow.
    pub schema: serde_json::Value,
}

impl ModelRequest {
    pub fn text(instruction: String, schema: serde_json::Value) -> Self {
        Self {
            instruction,
            parts: Vec::new(),
            schema,
        }
    }

    pub fn with_parts(instruction: String, parts: Vec<BinaryPart>, schema: serde_json::Value) -> Self {
        Self {
            instruction,
            parts,
            schema,
        }
    }
}

/// Caller-supplied credentials for the model provider.
#[derive(Clone, Default)]
pub struct Credentials {
    api_key: Option<Zeroizing<String>>,
}

impl Credentials {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_api_key(key: &str) -> Self {
        let trimmed = key.trim();
        Self {
            api_key: (!trimmed.is_empty()).then(|| Zeroizing::new(trimmed.to_string())),
        }
    }

    /// Read `GOOGLE_API_KEY` from the environment.
    pub fn from_env() -> Self {
        std::env::var("GOOGLE_API_KEY")
            .map(|k| Self::with_api_key(&k))
            .unwrap_or_default()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(String::as_str)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Generative model abstraction (allows mocking).
pub trait ModelClient: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Run one generation and return the raw response text.
    fn generate(&self, request: &ModelRequest, credentials: &Credentials) -> Result<String, ModelError>;
}

/// The configured provider's client.
pub fn build_client(config: &AppConfig) -> Result<std::sync::Arc<dyn ModelClient>, ModelError> {
    Ok(match config.provider {
        ModelProvider::Ollama => std::sync::Arc::new(OllamaClient::new(
            &config.model_url,
            &config.model,
            config.timeout_secs,
        )?),
        ModelProvider::Gemini => std::sync::Arc::new(GeminiClient::new(
            &config.model_url,
            &config.model,
            config.timeout_secs,
        )?),
    })
}

/// Map a reqwest error to the model error taxonomy.
pub(crate) fn map_transport_error(e: reqwest::Error, base_url: &str, timeout_secs: u64) -> ModelError {
    if e.is_connect() {
        ModelError::Connection(base_url.to_string())
    } else if e.is_timeout() {
        ModelError::Timeout(timeout_secs)
    } else {
        ModelError::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::with_api_key("AIza-secret");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("AIza-secret"));
        assert!(debug.contains("redacted"));
        assert_eq!(creds.api_key(), Some("AIza-secret"));
    }

    #[test]
    fn blank_api_key_counts_as_none() {
        assert!(Credentials::with_api_key("   ").api_key().is_none());
        assert!(Credentials::none().api_key().is_none());
    }

    #[test]
    fn build_client_follows_provider() {
        let config = AppConfig {
            provider: ModelProvider::Gemini,
            model: "gemini-2.0-flash-exp".into(),
            ..AppConfig::default()
        };
        assert_eq!(build_client(&config).unwrap().model_name(), "gemini-2.0-flash-exp");
        let local = build_client(&AppConfig::default()).unwrap();
        assert_eq!(local.model_name(), AppConfig::default().model);
    }

    #[test]
    fn client_trait_is_object_safe() {
        fn _assert_client(_: &dyn ModelClient) {}
    }
}
