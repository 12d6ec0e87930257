//! Error types for the simulation engine.

use thiserror::Error;

/// Errors raised while constructing agents or conversations.
///
/// Fatal to the creation call that produced them, never to the process.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A threshold or probability outside [0, 1]
    #[error("config field '{field}' must be in [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f32 },

    /// Persona text was empty or whitespace-only
    #[error("persona must be a non-empty string")]
    EmptyPersona,

    /// Conversation topic was empty
    #[error("topic cannot be empty")]
    EmptyTopic,

    /// Conversation created without participants
    #[error("at least one participant is required")]
    NoParticipants,

    /// Two participants share an id
    #[error("duplicate participant id: {0}")]
    DuplicateParticipant(String),
}

/// Errors from the injected Embedder / LanguageModel capabilities.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    /// Embedding backend failed
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Text generation backend failed
    #[error("generation failed: {0}")]
    Generation(String),

    /// Backend did not respond in time
    #[error("service timed out: {0}")]
    Timeout(String),
}

impl ServiceError {
    /// Whether the call site should retry with backoff.
    ///
    /// Timeouts and generation hiccups are transient; a failing embedder is
    /// also retried since the common cause is rate limiting upstream.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::Timeout(_) | ServiceError::Embedding(_) | ServiceError::Generation(_)
        )
    }
}
