//! Layered memory store: one instance per agent, exclusively owned.
//!
//! Three append-only layers (working, long-term, thoughts) indexed by
//! embedding. Working memory is bounded; consolidation promotes its most
//! salient entries into the long-term layer, which never shrinks.

use crate::entry::{MemoryEntry, MemoryKind};
use crate::similarity::cosine_similarity;
use colloquy_core::{Embedder, MemoryConfig, ServiceError};
use std::sync::Arc;
use uuid::Uuid;

/// Snapshot of layer sizes, surfaced by `Agent::inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MemoryCounts {
    pub working: usize,
    pub long_term: usize,
    pub thoughts: usize,
}

/// What a consolidation pass did.
#[derive(Debug, Default)]
pub struct ConsolidationOutcome {
    pub promoted: usize,
    pub evicted: usize,
}

pub struct MemoryStore {
    embedder: Arc<dyn Embedder>,
    config: MemoryConfig,
    working: Vec<MemoryEntry>,
    long_term: Vec<MemoryEntry>,
    thoughts: Vec<MemoryEntry>,
    /// Embedding dimensionality, fixed by the first entry
    dim: Option<usize>,
}

impl MemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>, config: MemoryConfig) -> Self {
        Self {
            embedder,
            config,
            working: Vec::new(),
            long_term: Vec::new(),
            thoughts: Vec::new(),
            dim: None,
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn counts(&self) -> MemoryCounts {
        MemoryCounts {
            working: self.working.len(),
            long_term: self.long_term.len(),
            thoughts: self.thoughts.len(),
        }
    }

    /// Embed `content` and append it to the layer for `kind`.
    pub async fn add(
        &mut self,
        content: &str,
        kind: MemoryKind,
        turn: u64,
    ) -> Result<&MemoryEntry, ServiceError> {
        let embedding = self.embedder.embed(content).await?;
        let entry = MemoryEntry::new(content.to_string(), embedding, kind, turn);
        Ok(self.insert(entry))
    }

    /// Append an already-embedded entry. Infallible — this is the commit path
    /// for buffered turn writes, which must not fail after embeddings were
    /// fetched.
    pub fn insert(&mut self, entry: MemoryEntry) -> &MemoryEntry {
        debug_assert!(
            self.dim.map_or(true, |d| d == entry.embedding.len()),
            "embedding dimensionality must be consistent per agent"
        );
        self.dim.get_or_insert(entry.embedding.len());

        let layer = match entry.kind {
            MemoryKind::Working => &mut self.working,
            MemoryKind::Thought => &mut self.thoughts,
            MemoryKind::Persona | MemoryKind::LongTerm => &mut self.long_term,
        };
        layer.push(entry);
        layer.last().unwrap()
    }

    /// Retrieve up to `k` entries ranked by cosine similarity to `query_text`.
    pub async fn retrieve(
        &mut self,
        query_text: &str,
        kinds: &[MemoryKind],
        k: usize,
        current_turn: u64,
    ) -> Result<Vec<MemoryEntry>, ServiceError> {
        let query = self.embedder.embed(query_text).await?;
        Ok(self.retrieve_by_embedding(&query, kinds, k, current_turn))
    }

    /// Synchronous retrieval against a precomputed query embedding, without
    /// access bookkeeping.
    ///
    /// Ranked by similarity, ties broken by most-recent first. An empty
    /// `kinds` slice matches every layer. Bidding reads go through this path
    /// so that a bid evaluation stays side-effect-free.
    pub fn peek_by_embedding(
        &self,
        query: &[f32],
        kinds: &[MemoryKind],
        k: usize,
    ) -> Vec<MemoryEntry> {
        let mut scored: Vec<(f32, &MemoryEntry)> = Vec::new();

        for layer in [&self.working, &self.long_term, &self.thoughts] {
            for entry in layer {
                if !kinds.is_empty() && !kinds.contains(&entry.kind) {
                    continue;
                }
                scored.push((cosine_similarity(query, &entry.embedding), entry));
            }
        }

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.1.created_at_turn.cmp(&a.1.created_at_turn))
        });

        scored.into_iter().take(k).map(|(_, e)| e.clone()).collect()
    }

    /// Record that the given entries were used at `current_turn`. Called from
    /// the scheduler's commit phase, after the turn is known to succeed.
    pub fn note_access(&mut self, ids: &[Uuid], current_turn: u64) {
        for layer in [&mut self.working, &mut self.long_term, &mut self.thoughts] {
            for entry in layer.iter_mut() {
                if ids.contains(&entry.id) {
                    entry.last_accessed_turn = current_turn;
                    entry.retrieval_count += 1;
                }
            }
        }
    }

    /// Retrieval with bookkeeping applied immediately: peek, then note access.
    pub fn retrieve_by_embedding(
        &mut self,
        query: &[f32],
        kinds: &[MemoryKind],
        k: usize,
        current_turn: u64,
    ) -> Vec<MemoryEntry> {
        let hits = self.peek_by_embedding(query, kinds, k);
        let ids: Vec<Uuid> = hits.iter().map(|e| e.id).collect();
        self.note_access(&ids, current_turn);
        hits.into_iter()
            .map(|mut e| {
                e.last_accessed_turn = current_turn;
                e.retrieval_count += 1;
                e
            })
            .collect()
    }

    /// Salience of a working entry: topic similarity weighted by recency
    /// decay and the entry's own weight.
    fn salience(&self, entry: &MemoryEntry, topic: &[f32], current_turn: u64) -> f32 {
        let age = current_turn.saturating_sub(entry.created_at_turn);
        let decay = self.config.recency_decay.powi(age.min(i32::MAX as u64) as i32);
        cosine_similarity(topic, &entry.embedding).max(0.0) * decay * entry.weight
    }

    /// Whether the periodic/cap consolidation trigger has fired.
    pub fn needs_consolidation(&self, current_turn: u64, consolidate_every: u64) -> bool {
        self.working.len() > self.config.working_cap
            || (consolidate_every > 0 && current_turn > 0 && current_turn % consolidate_every == 0)
    }

    /// Promote the most salient working entries into long-term memory, then
    /// evict least-salient working entries down to the cap.
    ///
    /// Long-term entries are never evicted: the long-term count is
    /// non-decreasing across any call sequence.
    pub fn consolidate(&mut self, topic: &[f32], current_turn: u64) -> ConsolidationOutcome {
        let mut outcome = ConsolidationOutcome::default();
        if self.working.is_empty() {
            return outcome;
        }

        let mut order: Vec<(f32, usize)> = self
            .working
            .iter()
            .enumerate()
            .map(|(i, e)| (self.salience(e, topic, current_turn), i))
            .collect();
        order.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        // Promote the top slice (highest salience first).
        let mut promoted_idx: Vec<usize> = order
            .iter()
            .take(self.config.promote_top_n)
            .map(|&(_, i)| i)
            .collect();
        promoted_idx.sort_unstable_by(|a, b| b.cmp(a)); // remove back-to-front
        for i in promoted_idx {
            let mut entry = self.working.swap_remove(i);
            entry.kind = MemoryKind::LongTerm;
            self.long_term.push(entry);
            outcome.promoted += 1;
        }

        // Evict least-salient leftovers past the cap.
        while self.working.len() > self.config.working_cap {
            let worst = self
                .working
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    let sa = self.salience(a, topic, current_turn);
                    let sb = self.salience(b, topic, current_turn);
                    sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i);
            match worst {
                Some(i) => {
                    self.working.remove(i);
                    outcome.evicted += 1;
                }
                None => break,
            }
        }

        if outcome.promoted > 0 || outcome.evicted > 0 {
            tracing::debug!(
                promoted = outcome.promoted,
                evicted = outcome.evicted,
                working = self.working.len(),
                long_term = self.long_term.len(),
                "consolidation pass complete"
            );
        }
        outcome
    }
}
