//! Injected capability traits: the embedding and text-generation backends.
//!
//! The engine never couples to a concrete provider. Anything implementing
//! these traits can be plugged in — production HTTP clients or the
//! deterministic mocks used by the test suite and demo binary.

use crate::error::ServiceError;
use async_trait::async_trait;

pub type Embedding = Vec<f32>;

/// Text → vector service.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding, ServiceError>;
}

/// Incremental output from a streaming generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of generated text
    TextDelta(String),
    /// Generation finished normally
    Done,
}

/// Prompt → text service.
///
/// `stream` is the cancellable form: dropping the receiver cancels the
/// in-flight generation, discarding output past the last delivered delta.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ServiceError>;

    async fn stream(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>, ServiceError>;
}
