use std::sync::Mutex;

use super::{Credentials, ModelClient, ModelError, ModelRequest};

enum MockReply {
    Text(String),
    /// Error factory: `ModelError` is not `Clone`.
    Error(fn() -> ModelError),
}

/// Mock model client for testing. Returns a canned reply and records requests.
pub struct MockModelClient {
    reply: MockReply,
    requests: Mutex<Vec<ModelRequest>>,
}

impl MockModelClient {
    pub fn new(response: &str) -> Self {
        Self {
            reply: MockReply::Text(response.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A client whose every call fails with the error built by `make_error`.
    pub fn failing(make_error: fn() -> ModelError) -> Self {
        Self {
            reply: MockReply::Error(make_error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Copies of every request received, in call order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ModelClient for MockModelClient {
    fn model_name(&self) -> &str {
        "mock"
    }

    fn generate(&self, request: &ModelRequest, _credentials: &Credentials) -> Result<String, ModelError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        match &self.reply {
            MockReply::Text(text) => Ok(text.clone()),
            MockReply::Error(make_error) => Err(make_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_each_request() {
        let client = MockModelClient::new("{}");
        let request = ModelRequest::text("first".into(), serde_json::json!({}));
        client.generate(&request, &Credentials::none()).unwrap();
        client.generate(&request, &Credentials::none()).unwrap();

        assert_eq!(client.call_count(), 2);
        assert_eq!(client.requests()[0].instruction, "first");
    }

    #[test]
    fn failing_client_returns_error() {
        let client = MockModelClient::failing(|| ModelError::Timeout(5));
        let request = ModelRequest::text("x".into(), serde_json::json!({}));
        assert!(matches!(
            client.generate(&request, &Credentials::none()),
            Err(ModelError::Timeout(5))
        ));
        assert_eq!(client.call_count(), 1);
    }
}
