use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{map_transport_error, Credentials, ModelClient, ModelError, ModelRequest};

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";

/// Hosted Gemini client using `generateContent` with a response schema.
pub struct GeminiClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
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

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

/// Convert a JSON schema into Gemini's OpenAPI subset.
///
/// Type names are upper-cased and keywords Gemini rejects are dropped.
pub fn to_gemini_schema(schema: &Value) -> Value {
    let Some(obj) = schema.as_object() else {
        return schema.clone();
    };

    let mut out = Map::new();
    for (key, value) in obj {
        match key.as_str() {
            "type" => {
                if let Some(t) = value.as_str() {
                    out.insert(key.clone(), Value::String(t.to_ascii_uppercase()));
                }
            }
            "properties" => {
                let props = value
                    .as_object()
                    .map(|p| {
                        p.iter()
                            .map(|(name, sub)| (name.clone(), to_gemini_schema(sub)))
                            .collect::<Map<_, _>>()
                    })
                    .unwrap_or_default();
                out.insert(key.clone(), Value::Object(props));
            }
            "items" => {
                out.insert(key.clone(), to_gemini_schema(value));
            }
            "enum" | "required" | "description" | "nullable" | "format" => {
                out.insert(key.clone(), value.clone());
            }
            _ => {}
        }
    }
    Value::Object(out)
}

fn build_generate_body(request: &ModelRequest) -> Value {
    let mut parts: Vec<Value> = request
        .parts
        .iter()
        .map(|p| {
            json!({
                "inlineData": {
                    "mimeType": p.mime_type,
                    "data": p.to_base64(),
                }
            })
        })
        .collect();
    parts.push(json!({ "text": request.instruction }));

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": to_gemini_schema(&request.schema),
            "temperature": 0.0,
        }
    })
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn response_text(response: GenerateResponse) -> Result<String, ModelError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ModelError::EmptyResponse);
    }
    Ok(text)
}

impl ModelClient for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &ModelRequest, credentials: &Credentials) -> Result<String, ModelError> {
        let key = credentials.api_key().ok_or(ModelError::MissingCredentials)?;

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(&build_generate_body(request))
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

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| ModelError::ResponseParsing(e.to_string()))?;
        response_text(parsed)
    }
}
