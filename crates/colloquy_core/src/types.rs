use crate::capability::Embedding;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier for a conversation participant.
///
/// Derived as UUIDv5 of the display name so that re-creating the same agent
/// set yields the same ids — seeded runs stay reproducible, including the
/// lowest-id tie-breaks in speaker selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(Uuid);

impl AgentId {
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    /// Stable per-agent component mixed into the master RNG seed.
    pub fn seed_component(&self) -> u64 {
        let (hi, lo) = self.0.as_u64_pair();
        hi ^ lo
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// A one-sentence reading of an utterance in context: what the speaker said
/// and might be thinking. Generated at commit time by the speaker's model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interpretation {
    pub text: String,
    #[serde(skip)]
    pub embedding: Embedding,
}

/// One entry in a conversation transcript.
///
/// The content embedding is computed once at commit time and reused as the
/// retrieval query for the next bidding round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub turn_index: u64,
    pub speaker_id: AgentId,
    pub speaker_name: String,
    pub text: String,
    /// True when another agent seized the floor mid-generation
    pub interrupted: bool,
    #[serde(skip)]
    pub embedding: Embedding,
    pub interpretation: Option<Interpretation>,
}

/// Scheduler phase, advanced serially — exactly one agent occupies Speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CollectingBids,
    SpeakerSelected,
    Speaking,
    PostTurnUpdate,
    Terminated,
}
