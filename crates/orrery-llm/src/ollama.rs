//! # Ollama Backend
//!
//! Talks to a local Ollama instance over its `/api/generate` endpoint,
//! non-streaming. One attempt per call with a fixed request timeout;
//! retry policy belongs to the caller.

use crate::GeneratorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Ollama API endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default model when the configuration names none.
pub const DEFAULT_MODEL: &str = "llama3.1";

/// Request timeout. Generation is slow; connection failures are not.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for a local Ollama instance.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaGenerator {
    /// Create a client for the given endpoint and model.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GeneratorError::Connection(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            model: model.into(),
            client,
        })
    }

    /// Create a client against [`DEFAULT_ENDPOINT`].
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, GeneratorError> {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// The configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Generate text for a prompt.
    ///
    /// A 404 means the model is not installed on the endpoint; any other
    /// non-success status carries the body back in the error.
    pub async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        let url = format!("{}/api/generate", self.endpoint);
        let body = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeneratorError::Connection(format!("{url}: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GeneratorError::ModelMissing(self.model.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::InvalidResponse(e.to_string()))?;
        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_keeps_endpoint_and_model() {
        let generator = OllamaGenerator::new("http://localhost:11434", "mistral").expect("client");
        assert_eq!(generator.endpoint(), "http://localhost:11434");
        assert_eq!(generator.model(), "mistral");
    }

    #[test]
    fn default_endpoint_is_local() {
        let generator = OllamaGenerator::default_endpoint("mistral").expect("client");
        assert_eq!(generator.endpoint(), DEFAULT_ENDPOINT);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_connection_error() {
        // Port 9 (discard) has no listener; the connection fails fast.
        let generator = OllamaGenerator::new("http://127.0.0.1:9", "mistral").expect("client");
        let err = generator.generate("hello").await.expect_err("must fail");
        assert!(matches!(err, GeneratorError::Connection(_)));
    }
}
