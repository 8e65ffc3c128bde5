//! # Orrery Generator Layer
//!
//! The narrow interface to the external text generator:
//! `generate(prompt) -> text | failure`.
//!
//! ## Backends
//!
//! - [`OllamaGenerator`]: local Ollama API over HTTP
//! - [`MockGenerator`]: queued canned replies, no network
//! - [`Generator::Disabled`]: every call fails fast
//!
//! The engine crate never appears here. Everything non-deterministic
//! about opportunity and outreach text lives behind this boundary, and
//! the caller decides how to degrade when a call fails.

pub mod ollama;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

pub use ollama::OllamaGenerator;

/// Errors from the generator layer.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Generation is switched off in the server configuration.
    #[error("generator is disabled")]
    Disabled,

    /// Cannot reach the generator endpoint.
    #[error("cannot reach generator: {0}")]
    Connection(String),

    /// The configured model is not installed on the endpoint.
    #[error("model not available: {0}")]
    ModelMissing(String),

    /// The endpoint answered with a non-success status.
    #[error("generator returned HTTP {status}: {body}")]
    Http {
        /// Status code from the endpoint.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The endpoint answered 200 with an unparseable body.
    #[error("unparseable generator response: {0}")]
    InvalidResponse(String),
}

/// The configured generator backend.
///
/// Constructed once at startup from server configuration and shared
/// across requests; all variants are cheap to clone.
#[derive(Debug, Clone)]
pub enum Generator {
    /// Local Ollama HTTP API.
    Ollama(OllamaGenerator),
    /// Queued canned replies for tests.
    Mock(MockGenerator),
    /// No generator configured.
    Disabled,
}

impl Generator {
    /// Short backend name for startup logs.
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Ollama(_) => "ollama",
            Self::Mock(_) => "mock",
            Self::Disabled => "disabled",
        }
    }

    /// Whether calls can succeed at all.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Generate text for a prompt.
    ///
    /// One attempt per call; the caller owns any degradation strategy.
    pub async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        match self {
            Self::Ollama(generator) => generator.generate(prompt).await,
            Self::Mock(generator) => generator.generate(prompt),
            Self::Disabled => Err(GeneratorError::Disabled),
        }
    }
}

// =============================================================================
// MOCK
// =============================================================================

#[derive(Debug)]
enum MockReply {
    Text(String),
    Failure(String),
}

/// Deterministic generator for tests.
///
/// Replies are handed out in the order they were queued; an empty queue
/// fails like an unreachable endpoint. Clones share the same queue and
/// the same prompt recording.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockGenerator {
    /// Create a mock with an empty reply queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn enqueue(&self, text: impl Into<String>) {
        self.lock_replies().push_back(MockReply::Text(text.into()));
    }

    /// Queue a failed call.
    pub fn enqueue_failure(&self, message: impl Into<String>) {
        self.lock_replies()
            .push_back(MockReply::Failure(message.into()));
    }

    /// Prompts seen so far, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record the prompt and pop the next queued reply.
    pub fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        match self.lock_replies().pop_front() {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Failure(message)) => Err(GeneratorError::Connection(message)),
            None => Err(GeneratorError::Connection(
                "mock reply queue is empty".to_string(),
            )),
        }
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<MockReply>> {
        self.replies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_replies_in_queue_order() {
        let mock = MockGenerator::new();
        mock.enqueue("first");
        mock.enqueue("second");
        let generator = Generator::Mock(mock);

        assert_eq!(generator.generate("a").await.expect("reply"), "first");
        assert_eq!(generator.generate("b").await.expect("reply"), "second");
        assert!(matches!(
            generator.generate("c").await,
            Err(GeneratorError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn mock_records_prompts_across_clones() {
        let mock = MockGenerator::new();
        mock.enqueue("reply");
        let shared = mock.clone();

        let generator = Generator::Mock(shared);
        generator.generate("the prompt").await.expect("reply");

        assert_eq!(mock.prompts(), vec!["the prompt".to_string()]);
    }

    #[tokio::test]
    async fn queued_failures_surface_as_errors() {
        let mock = MockGenerator::new();
        mock.enqueue_failure("connection reset");

        let err = mock.generate("p").expect_err("failure");
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn disabled_generator_fails_fast() {
        let generator = Generator::Disabled;
        assert!(!generator.is_enabled());
        assert_eq!(generator.backend_name(), "disabled");
        assert!(matches!(
            generator.generate("anything").await,
            Err(GeneratorError::Disabled)
        ));
    }
}
