use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{map_transport_error, Credentials, ModelClient, ModelError, ModelRequest};

/// Default local Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default model: MedGemma is multimodal, so one model serves every agent.
pub const DEFAULT_OLLAMA_MODEL: &str = "medgemma:4b";

/// Ollama HTTP client using `/api/chat` with structured outputs.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, ModelError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ModelError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    /// Local instance at localhost:11434 with a 5-minute timeout.
    pub fn default_local() -> Result<Self, ModelError> {
        Self::new(DEFAULT_OLLAMA_URL, DEFAULT_OLLAMA_MODEL, 300)
    }
}

/// Request body for Ollama `/api/chat`.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    /// JSON schema: Ollama constrains decoding to it.
    format: &'a serde_json::Value,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    /// Base64-encoded images, user messages only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Serialize)]
struct ChatOptions {
    /// 0.0 for deterministic extraction.
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Ollama only decodes raster images in `images`.
fn ensure_image_parts(request: &ModelRequest) -> Result<(), ModelError> {
    match request.parts.iter().find(|p| !p.mime_type.starts_with("image/")) {
        Some(part) => Err(ModelError::UnsupportedMedia(part.mime_type.clone())),
        None => Ok(()),
    }
}

fn build_chat_request<'a>(model: &'a str, request: &'a ModelRequest) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: &request.instruction,
            images: request.parts.iter().map(|p| p.to_base64()).collect(),
        }],
        stream: false,
        format: &request.schema,
        options: ChatOptions { temperature: 0.0 },
    }
}

impl ModelClient for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &ModelRequest, credentials: &Credentials) -> Result<String, ModelError> {
        ensure_image_parts(request)?;

        let url = format!("{}/api/chat", self.base_url);
        let body = build_chat_request(&self.model, request);

        let mut builder = self.client.post(&url).json(&body);
        // Remote Ollama deployments often sit behind a bearer-token proxy.
        if let Some(key) = credentials.api_key() {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .map_err(|e| map_transport_error(e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ModelError::ResponseParsing(e.to_string()))?;

        if parsed.message.content.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(parsed.message.content)
    }
}
