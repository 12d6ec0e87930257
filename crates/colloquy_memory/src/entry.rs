use colloquy_core::Embedding;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which layer of the store an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Persona chunk embedded at agent creation; stored long-term
    Persona,
    /// Transcript-derived, short-lived, pending consolidation
    Working,
    /// Consolidated or persona-derived; retained indefinitely
    LongTerm,
    /// Explicit reflection produced by the deliberate reasoning route
    Thought,
}

/// A single memory item owned by one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: Uuid,
    pub content: String,
    #[serde(skip)]
    pub embedding: Embedding,
    pub kind: MemoryKind,
    /// Turn index when the entry was created (0 = before the conversation)
    pub created_at_turn: u64,
    /// Caller-assigned importance, folded into salience
    pub weight: f32,
    pub last_accessed_turn: u64,
    pub retrieval_count: u32,
}

impl MemoryEntry {
    pub fn new(content: String, embedding: Embedding, kind: MemoryKind, turn: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            embedding,
            kind,
            created_at_turn: turn,
            weight: 1.0,
            last_accessed_turn: turn,
            retrieval_count: 0,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }
}
