//! A conversation: topic, participant handles and the transcript.
//!
//! Holds non-owning handles (id + name) rather than the agents themselves;
//! the caller passes the agent slice into every scheduler call.

use crate::agent::Agent;
use anyhow::Result;
use colloquy_core::{AgentId, ConfigError, Embedder, Embedding, Phase, Utterance};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ParticipantHandle {
    pub id: AgentId,
    pub name: String,
}

#[derive(Debug)]
pub struct Conversation {
    pub topic: String,
    pub(crate) topic_embedding: Embedding,
    pub participants: Vec<ParticipantHandle>,
    pub current_turn: u64,
    pub transcript: Vec<Utterance>,
    pub phase: Phase,
    pub(crate) silent_streak: u32,
    /// Speaker of the immediately preceding turn; cleared by a silent cycle
    pub(crate) last_speaker: Option<AgentId>,
}

impl Conversation {
    /// Validate the participant set and embed the topic, which anchors both
    /// first-turn bidding and consolidation salience.
    pub async fn create(
        agents: &[Agent],
        topic: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        if agents.is_empty() {
            return Err(ConfigError::NoParticipants.into());
        }
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ConfigError::EmptyTopic.into());
        }
        for (i, a) in agents.iter().enumerate() {
            if agents[..i].iter().any(|b| b.id() == a.id()) {
                return Err(ConfigError::DuplicateParticipant(a.id().to_string()).into());
            }
        }

        let topic_embedding = embedder.embed(topic).await?;
        Ok(Self {
            topic: topic.to_string(),
            topic_embedding,
            participants: agents
                .iter()
                .map(|a| ParticipantHandle {
                    id: a.id(),
                    name: a.name().to_string(),
                })
                .collect(),
            current_turn: 0,
            transcript: Vec::new(),
            phase: Phase::Idle,
            silent_streak: 0,
            last_speaker: None,
        })
    }

    /// Last `n` utterances, oldest first.
    pub fn tail(&self, n: usize) -> &[Utterance] {
        let start = self.transcript.len().saturating_sub(n);
        &self.transcript[start..]
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == Phase::Terminated
    }
}
