//! Deterministic mock providers — no API keys, identical output for
//! identical input, suitable for seeded reproducibility tests.

use async_trait::async_trait;
use colloquy_core::{Embedder, Embedding, LanguageModel, ServiceError, StreamEvent};
use std::sync::atomic::{AtomicUsize, Ordering};

const MOCK_DIM: usize = 32;

/// Hashes tokens into a fixed-dimension bag-of-words vector. Texts sharing
/// vocabulary land near each other, which is enough signal for retrieval
/// ordering in tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MockEmbedder;

impl MockEmbedder {
    pub fn new() -> Self {
        Self
    }
}

/// FNV-1a; std's DefaultHasher is randomly keyed per process, which would
/// break cross-run determinism.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, ServiceError> {
        let mut v = vec![0.0f32; MOCK_DIM];
        for token in text.to_lowercase().split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() {
                continue;
            }
            let slot = (fnv1a(token.as_bytes()) % MOCK_DIM as u64) as usize;
            v[slot] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        Ok(v)
    }
}

/// Cycles through a fixed response list; the cycle position is the only
/// state, so two fresh instances given the same call sequence produce the
/// same outputs.
pub struct MockLanguageModel {
    responses: Vec<String>,
    calls: AtomicUsize,
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::with_responses(vec![
            "That is a fascinating point, and it connects to something I have been mulling over."
                .to_string(),
            "I see it differently; the evidence pulls the other way in my experience.".to_string(),
            "Let me add a detail from my own background that might sharpen this.".to_string(),
            "I keep coming back to the same question about what we are assuming here.".to_string(),
        ])
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses,
            calls: AtomicUsize::new(0),
        }
    }

    fn next_response(&self) -> String {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses[n % self.responses.len()].clone()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn generate(&self, _system: &str, _prompt: &str) -> Result<String, ServiceError> {
        Ok(self.next_response())
    }

    async fn stream(
        &self,
        _system: &str,
        _prompt: &str,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>, ServiceError> {
        let response = self.next_response();
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tokio::spawn(async move {
            for word in response.split_whitespace() {
                if tx
                    .send(StreamEvent::TextDelta(format!("{} ", word)))
                    .await
                    .is_err()
                {
                    // Receiver dropped: generation cancelled by an interrupt.
                    return;
                }
            }
            let _ = tx.send(StreamEvent::Done).await;
        });
        Ok(rx)
    }
}
