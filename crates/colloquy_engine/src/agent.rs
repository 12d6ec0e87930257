//! An autonomous conversation participant: persona, immutable config,
//! turn-tracking state, and exclusively owned memory and decision engine.

use anyhow::Result;
use colloquy_core::{
    AgentConfig, AgentId, ConfigError, Embedder, LanguageModel, SimulationConfig,
};
use colloquy_memory::{MemoryCounts, MemoryKind, MemoryStore, SentenceSplitter};
use colloquy_reasoning::{DecisionEngine, ScoringModel};
use std::sync::Arc;

/// Turn-tracking state, mutated only by the scheduler's commit phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct AgentState {
    pub turns_since_last_speak: u64,
    pub last_turn_spoken: u64,
}

/// Read-only snapshot returned by [`Agent::inspect`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentReport {
    pub id: String,
    pub name: String,
    pub state: AgentState,
    pub memory_counts: MemoryCounts,
    pub config: AgentConfig,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("persona", &self.persona)
            .field("config", &self.config)
            .field("seed", &self.seed)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

pub struct Agent {
    id: AgentId,
    name: String,
    persona: String,
    config: AgentConfig,
    seed: u64,
    pub state: AgentState,
    pub memory: MemoryStore,
    pub engine: DecisionEngine,
    pub(crate) llm: Arc<dyn LanguageModel>,
}

impl Agent {
    /// Async factory: validates the config, chunks the persona into sentences
    /// and embeds each chunk as an initial long-term memory.
    ///
    /// Fails with `ConfigError` on invalid config or empty persona, and with
    /// `ServiceError` if persona embedding fails.
    pub async fn create(
        name: &str,
        persona: &str,
        config: AgentConfig,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
        sim: &SimulationConfig,
    ) -> Result<Self> {
        config.validate()?;
        let persona = persona.trim().to_string();
        if persona.is_empty() {
            return Err(ConfigError::EmptyPersona.into());
        }

        let id = AgentId::from_name(name);
        let seed = sim
            .scheduler
            .seed
            .unwrap_or_else(rand::random)
            .wrapping_add(id.seed_component());

        let mut agent = Self {
            id,
            name: name.to_string(),
            persona: persona.clone(),
            config,
            seed,
            state: AgentState::default(),
            memory: MemoryStore::new(embedder, sim.memory.clone()),
            engine: DecisionEngine::new(config, seed),
            llm,
        };

        let chunks = SentenceSplitter::split(&persona);
        let cap = sim.memory.persona_chunk_cap.max(1);
        for chunk in chunks.iter().take(cap) {
            agent.memory.add(chunk, MemoryKind::Persona, 0).await?;
        }
        tracing::info!(
            agent = %agent.id,
            name = %agent.name,
            persona_chunks = chunks.len().min(cap),
            "agent created"
        );
        Ok(agent)
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Swap the scoring formula, keeping the seeded RNG sequence fresh.
    /// Primarily for tests and experiments with alternative models.
    pub fn override_scoring(&mut self, scoring: Box<dyn ScoringModel>) {
        self.engine = DecisionEngine::with_scoring(self.config, self.seed, scoring);
    }

    /// State, memory counters and config in one debuggable snapshot.
    pub fn inspect(&self) -> AgentReport {
        AgentReport {
            id: self.id.to_string(),
            name: self.name.clone(),
            state: self.state,
            memory_counts: self.memory.counts(),
            config: self.config,
        }
    }
}
