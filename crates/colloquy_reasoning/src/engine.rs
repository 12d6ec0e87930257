//! Per-agent decision engine: intrinsic-motivation and interrupt scoring,
//! plus the probabilistic fast/deliberate route draw.
//!
//! Scoring reads an immutable query embedding and the agent's own memory
//! only, so bidding across agents is free of cross-agent state.

use crate::scoring::{ScoreInputs, ScoringModel, WeightedScoring};
use colloquy_core::AgentConfig;
use colloquy_memory::{cosine_similarity, MemoryKind, MemoryStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Reasoning route for a speaking turn. Affects output quality and cost,
/// never scheduling correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Heuristic: persona plus the single top memory
    Fast,
    /// Full retrieval plus a reflective generation step that records an
    /// explicit thought memory
    Deliberate,
}

pub struct DecisionEngine {
    config: AgentConfig,
    scoring: Box<dyn ScoringModel>,
    rng: StdRng,
}

impl DecisionEngine {
    pub fn new(config: AgentConfig, seed: u64) -> Self {
        Self::with_scoring(config, seed, Box::new(WeightedScoring::default()))
    }

    pub fn with_scoring(config: AgentConfig, seed: u64, scoring: Box<dyn ScoringModel>) -> Self {
        Self {
            config,
            scoring,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Weighted random draw biased by `system1_prob`.
    pub fn choose_route(&mut self) -> Route {
        if self.rng.gen_bool(self.config.system1_prob) {
            Route::Fast
        } else {
            Route::Deliberate
        }
    }

    /// Semantic relevance of the query to the agent's persona and long-term
    /// memories: similarity of the best retrieved entry, floored at zero.
    ///
    /// Read-only against the store — bid evaluations must be free of side
    /// effects so an aborted turn leaves no trace.
    pub fn semantic_relevance(&self, store: &MemoryStore, query: &[f32]) -> f32 {
        let hits = store.peek_by_embedding(
            query,
            &[MemoryKind::Persona, MemoryKind::LongTerm],
            store.config().retrieval_k,
        );
        hits.first()
            .map(|e| cosine_similarity(query, &e.embedding).max(0.0))
            .unwrap_or(0.0)
    }

    /// Intrinsic motivation in [0, 1] for the current bidding round.
    pub fn compute_intrinsic_motivation(&mut self, store: &MemoryStore, query: &[f32]) -> f32 {
        let inputs = ScoreInputs {
            relevance: self.semantic_relevance(store, query),
            proactive_tone: self.config.proactive_tone,
            noise: self.rng.gen::<f32>(),
        };
        let score = self.scoring.motivation(&inputs);
        tracing::trace!(
            model = self.scoring.name(),
            relevance = inputs.relevance,
            score,
            "motivation computed"
        );
        score
    }

    /// True iff the motivation score clears the agent's threshold.
    pub fn decide_to_speak(&self, score: f32) -> bool {
        score >= self.config.im_threshold
    }

    /// Interrupt urgency in [0, 1], conditioned on the in-progress utterance.
    pub fn compute_interrupt_score(&mut self, store: &MemoryStore, partial: &[f32]) -> f32 {
        let inputs = ScoreInputs {
            relevance: self.semantic_relevance(store, partial),
            proactive_tone: self.config.proactive_tone,
            noise: self.rng.gen::<f32>(),
        };
        self.scoring.interrupt(&inputs)
    }

    /// True iff the urgency clears the interrupt threshold AND strictly
    /// exceeds the current speaker's recorded motivation.
    pub fn should_interrupt(&self, score: f32, speaker_motivation: f32) -> bool {
        score >= self.config.interrupt_threshold && score > speaker_motivation
    }
}
