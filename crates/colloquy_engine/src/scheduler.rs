//! Turn scheduler: bidding, speaker selection, interruption arbitration and
//! the atomic post-turn commit.
//!
//! One `advance` call runs a full phase cycle:
//! Idle → CollectingBids → SpeakerSelected → Speaking → PostTurnUpdate →
//! {Idle | Terminated}. All turn-level writes (transcript, working memories,
//! thoughts, agent state) are buffered and applied only after every fallible
//! capability call has succeeded, so an aborted turn leaves the pre-turn
//! state intact.

use crate::agent::Agent;
use crate::conversation::Conversation;
use anyhow::Result;
use colloquy_core::{
    Embedder, Embedding, Interpretation, Phase, SimulationConfig, StreamEvent, Utterance,
};
use colloquy_memory::{MemoryEntry, MemoryKind};
use colloquy_reasoning::{prompts, retry::with_retry, Route};
use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

/// Draft of a speaking turn: prompts, the memories they cite, and the
/// deliberate route's reflection (already embedded, ready to commit).
struct Draft {
    system: String,
    user: String,
    used_ids: Vec<Uuid>,
    thought: Option<(String, Embedding)>,
}

struct PendingUtterance {
    idx: usize,
    text: String,
    interrupted: bool,
    embedding: Embedding,
    interpretation: Option<Interpretation>,
}

pub struct TurnScheduler {
    config: SimulationConfig,
    embedder: Arc<dyn Embedder>,
}

impl TurnScheduler {
    /// `embedder` must be the same backend the agents' stores were built
    /// with, so embedding dimensionality stays consistent.
    pub fn new(config: SimulationConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self { config, embedder }
    }

    /// Run one full turn cycle. Returns the turn's final utterance, or None
    /// for a silent cycle or an already-terminated conversation.
    ///
    /// On error the turn is aborted with zero writes: transcript, memories
    /// and agent state are exactly as they were, and the phase returns to
    /// Idle so the caller may retry the whole turn.
    pub async fn advance(
        &self,
        conv: &mut Conversation,
        agents: &mut [Agent],
    ) -> Result<Option<Utterance>> {
        match self.advance_inner(conv, agents).await {
            Ok(utterance) => Ok(utterance),
            Err(e) => {
                tracing::warn!(turn = conv.current_turn + 1, error = %e, "turn aborted");
                conv.phase = Phase::Idle;
                Err(e)
            }
        }
    }

    async fn advance_inner(
        &self,
        conv: &mut Conversation,
        agents: &mut [Agent],
    ) -> Result<Option<Utterance>> {
        if conv.is_terminated() {
            return Ok(None);
        }
        self.check_roster(conv, agents)?;
        let turn = conv.current_turn + 1;

        // --- CollectingBids: side-effect-free reads of a frozen snapshot ---
        conv.phase = Phase::CollectingBids;
        let query = conv
            .transcript
            .last()
            .map(|u| u.embedding.clone())
            .unwrap_or_else(|| conv.topic_embedding.clone());

        let mut scores = vec![0.0f32; agents.len()];
        let mut qualifying: Vec<(usize, f32)> = Vec::new();
        for (idx, agent) in agents.iter_mut().enumerate() {
            let score = agent.engine.compute_intrinsic_motivation(&agent.memory, &query);
            scores[idx] = score;
            let eligible = conv.last_speaker != Some(agent.id());
            if eligible && agent.engine.decide_to_speak(score) {
                qualifying.push((idx, score));
            }
            tracing::trace!(turn, agent = %agent.id(), score, eligible, "bid collected");
        }

        // --- SpeakerSelected ---
        conv.phase = Phase::SpeakerSelected;
        let mut speaker = pick_best(qualifying, agents);
        if speaker.is_none() && self.config.scheduler.fallback_speaker {
            let proactive: Vec<(usize, f32)> = agents
                .iter()
                .enumerate()
                .filter(|(_, a)| a.config().proactive_tone && conv.last_speaker != Some(a.id()))
                .map(|(i, _)| (i, scores[i]))
                .collect();
            speaker = pick_best(proactive, agents);
            if speaker.is_some() {
                tracing::debug!(turn, "no qualifying bid, using proactive fallback speaker");
            }
        }

        let Some(speaker_idx) = speaker else {
            return Ok(self.silent_cycle(conv, agents, turn));
        };
        let speaker_motivation = scores[speaker_idx];
        tracing::debug!(
            turn,
            speaker = %agents[speaker_idx].id(),
            score = speaker_motivation,
            "speaker selected"
        );

        // --- Speaking: the suspension point. Generation streams in while
        // the other agents poll interrupt bids against the partial text. ---
        conv.phase = Phase::Speaking;
        let draft = self.draft_for(conv, &mut agents[speaker_idx], None).await?;
        let mut rx = with_retry(&self.config.retry, "utterance stream", || {
            agents[speaker_idx].llm.stream(&draft.system, &draft.user)
        })
        .await?;

        let mut text = String::new();
        let mut partial_embedding = Embedding::new();
        let mut interrupter: Option<usize> = None;
        while let Some(ev) = rx.recv().await {
            match ev {
                StreamEvent::TextDelta(delta) => {
                    text.push_str(&delta);
                    let partial = with_retry(&self.config.retry, "partial embed", || {
                        self.embedder.embed(text.trim_end())
                    })
                    .await?;
                    partial_embedding = partial.clone();

                    let mut challengers: Vec<(usize, f32)> = Vec::new();
                    for (idx, agent) in agents.iter_mut().enumerate() {
                        if idx == speaker_idx {
                            continue;
                        }
                        let score = agent.engine.compute_interrupt_score(&agent.memory, &partial);
                        if agent.engine.should_interrupt(score, speaker_motivation) {
                            challengers.push((idx, score));
                        }
                    }
                    // Simultaneous qualifying interrupts resolve by the same
                    // deterministic order as speaker selection.
                    if let Some(winner) = pick_best(challengers, agents) {
                        tracing::info!(
                            turn,
                            interrupter = %agents[winner].id(),
                            at_chars = text.len(),
                            "utterance interrupted"
                        );
                        interrupter = Some(winner);
                        break;
                    }
                }
                StreamEvent::Done => break,
            }
        }
        // Dropping the receiver cancels any in-flight generation.
        drop(rx);

        let mut pending = Vec::new();
        let mut used = vec![(speaker_idx, draft.used_ids)];
        let mut thoughts = Vec::new();
        if let Some((t, e)) = draft.thought {
            thoughts.push((speaker_idx, t, e));
        }

        pending.push(PendingUtterance {
            idx: speaker_idx,
            text: text.trim_end().to_string(),
            interrupted: interrupter.is_some(),
            embedding: Vec::new(),
            interpretation: None,
        });

        // The interrupter takes the floor immediately, bypassing bidding;
        // its own utterance is not interruptible (no interrupt chains). Its
        // prompt must include the truncated utterance it is replying to,
        // which is not yet part of the transcript.
        if let Some(int_idx) = interrupter {
            let cut = Utterance {
                turn_index: turn,
                speaker_id: agents[speaker_idx].id(),
                speaker_name: agents[speaker_idx].name().to_string(),
                text: text.trim_end().to_string(),
                interrupted: true,
                embedding: partial_embedding,
                interpretation: None,
            };
            let draft2 = self.draft_for(conv, &mut agents[int_idx], Some(&cut)).await?;
            let reply = with_retry(&self.config.retry, "interrupter generate", || {
                agents[int_idx].llm.generate(&draft2.system, &draft2.user)
            })
            .await?;
            used.push((int_idx, draft2.used_ids));
            if let Some((t, e)) = draft2.thought {
                thoughts.push((int_idx, t, e));
            }
            pending.push(PendingUtterance {
                idx: int_idx,
                text: reply.trim_end().to_string(),
                interrupted: false,
                embedding: Vec::new(),
                interpretation: None,
            });
        }

        // --- PostTurnUpdate: finish every fallible call, then commit. ---
        conv.phase = Phase::PostTurnUpdate;
        for p in &mut pending {
            p.embedding = with_retry(&self.config.retry, "utterance embed", || {
                self.embedder.embed(&p.text)
            })
            .await?;
            p.interpretation = Some(
                self.interpret(conv, &agents[p.idx], &p.text)
                    .await?,
            );
        }

        self.commit(conv, agents, turn, pending, used, thoughts);
        Ok(conv.transcript.last().cloned())
    }

    /// Run turns until `max_turns` or termination; returns the transcript.
    pub async fn run(
        &self,
        conv: &mut Conversation,
        agents: &mut [Agent],
        max_turns: u64,
    ) -> Result<Vec<Utterance>> {
        while conv.current_turn < max_turns && !conv.is_terminated() {
            self.advance(conv, agents).await?;
        }
        conv.phase = Phase::Terminated;
        Ok(conv.transcript.clone())
    }

    /// Run turns until the predicate says stop (checked before each turn) or
    /// the conversation terminates on its own.
    pub async fn run_until<F>(
        &self,
        conv: &mut Conversation,
        agents: &mut [Agent],
        stop: F,
    ) -> Result<Vec<Utterance>>
    where
        F: Fn(&Conversation) -> bool,
    {
        while !conv.is_terminated() && !stop(conv) {
            self.advance(conv, agents).await?;
        }
        conv.phase = Phase::Terminated;
        Ok(conv.transcript.clone())
    }

    /// No speaker this cycle: bump counters, track the silence streak.
    fn silent_cycle(
        &self,
        conv: &mut Conversation,
        agents: &mut [Agent],
        turn: u64,
    ) -> Option<Utterance> {
        for agent in agents.iter_mut() {
            agent.state.turns_since_last_speak += 1;
        }
        conv.current_turn = turn;
        conv.silent_streak += 1;
        conv.last_speaker = None;
        if conv.silent_streak >= self.config.scheduler.silence_limit {
            conv.phase = Phase::Terminated;
            tracing::info!(turn, streak = conv.silent_streak, "silence timeout");
        } else {
            conv.phase = Phase::Idle;
            tracing::debug!(turn, streak = conv.silent_streak, "silent cycle");
        }
        None
    }

    /// Build the prompts for one speaking agent. The fast route grounds in
    /// persona plus the single top memory; the deliberate route does full
    /// retrieval and records an explicit thought, embedded here so the
    /// commit phase stays infallible.
    ///
    /// `heard` is an utterance not yet in the transcript that the agent is
    /// replying to: the truncated partial when drafting an interrupter.
    async fn draft_for(
        &self,
        conv: &Conversation,
        agent: &mut Agent,
        heard: Option<&Utterance>,
    ) -> Result<Draft> {
        let route = agent.engine.choose_route();
        let query = heard
            .map(|u| u.embedding.clone())
            .or_else(|| conv.transcript.last().map(|u| u.embedding.clone()))
            .unwrap_or_else(|| conv.topic_embedding.clone());
        let k = match route {
            Route::Fast => 1,
            Route::Deliberate => agent.memory.config().retrieval_k,
        };
        let memories = agent.memory.peek_by_embedding(&query, &[], k);
        let used_ids = memories.iter().map(|m| m.id).collect();

        let mut tail: Vec<Utterance> =
            conv.tail(self.config.scheduler.context_window).to_vec();
        if let Some(u) = heard {
            tail.push(u.clone());
        }

        let thought = if route == Route::Deliberate {
            let system = prompts::reflect_system(agent.name(), agent.persona());
            let user = prompts::reflect_user(&tail);
            let text = with_retry(&self.config.retry, "reflection", || {
                agent.llm.generate(&system, &user)
            })
            .await?;
            let embedding = with_retry(&self.config.retry, "thought embed", || {
                self.embedder.embed(&text)
            })
            .await?;
            Some((text, embedding))
        } else {
            None
        };

        tracing::trace!(agent = %agent.id(), ?route, memories = memories.len(), "draft ready");
        Ok(Draft {
            system: prompts::speak_system(agent.name(), agent.persona(), &conv.topic, &memories),
            user: prompts::speak_user(&tail, agent.name()),
            used_ids,
            thought,
        })
    }

    /// One-sentence reading of a committed-to-be utterance against the
    /// transcript as it stood before the turn, generated by the speaker's
    /// own model and embedded for later retrieval.
    async fn interpret(
        &self,
        conv: &Conversation,
        speaker: &Agent,
        text: &str,
    ) -> Result<Interpretation> {
        let tail = conv.tail(self.config.scheduler.context_window);
        let system = prompts::interpret_system(speaker.name(), tail);
        let user = prompts::interpret_user(speaker.name(), text);
        let reading = with_retry(&self.config.retry, "interpretation", || {
            speaker.llm.generate(&system, &user)
        })
        .await?;
        let embedding = with_retry(&self.config.retry, "interpretation embed", || {
            self.embedder.embed(&reading)
        })
        .await?;
        Ok(Interpretation {
            text: reading,
            embedding,
        })
    }

    /// Apply all buffered writes for a completed turn. Infallible by
    /// construction: every embedding was fetched before this point.
    fn commit(
        &self,
        conv: &mut Conversation,
        agents: &mut [Agent],
        turn: u64,
        pending: Vec<PendingUtterance>,
        used: Vec<(usize, Vec<Uuid>)>,
        thoughts: Vec<(usize, String, Embedding)>,
    ) {
        let spoke: Vec<usize> = pending.iter().map(|p| p.idx).collect();

        for p in &pending {
            let utterance = Utterance {
                turn_index: turn,
                speaker_id: agents[p.idx].id(),
                speaker_name: agents[p.idx].name().to_string(),
                text: p.text.clone(),
                interrupted: p.interrupted,
                embedding: p.embedding.clone(),
                interpretation: p.interpretation.clone(),
            };
            let line = format!("{}: {}", utterance.speaker_name, utterance.text);
            for agent in agents.iter_mut() {
                agent.memory.insert(MemoryEntry::new(
                    line.clone(),
                    p.embedding.clone(),
                    MemoryKind::Working,
                    turn,
                ));
            }
            conv.transcript.push(utterance);
        }

        for (idx, text, embedding) in thoughts {
            agents[idx]
                .memory
                .insert(MemoryEntry::new(text, embedding, MemoryKind::Thought, turn));
        }
        for (idx, ids) in used {
            agents[idx].memory.note_access(&ids, turn);
        }

        for agent in agents.iter_mut() {
            if agent
                .memory
                .needs_consolidation(turn, self.config.scheduler.consolidate_every)
            {
                agent.memory.consolidate(&conv.topic_embedding, turn);
            }
        }

        for (idx, agent) in agents.iter_mut().enumerate() {
            if spoke.contains(&idx) {
                agent.state.turns_since_last_speak = 0;
                agent.state.last_turn_spoken = turn;
            } else {
                agent.state.turns_since_last_speak += 1;
            }
        }

        conv.current_turn = turn;
        conv.silent_streak = 0;
        conv.last_speaker = pending.last().map(|p| agents[p.idx].id());
        conv.phase = Phase::Idle;
        tracing::debug!(turn, transcript = conv.transcript.len(), "turn committed");
    }

    fn check_roster(&self, conv: &Conversation, agents: &[Agent]) -> Result<()> {
        let matches = conv.participants.len() == agents.len()
            && conv
                .participants
                .iter()
                .zip(agents.iter())
                .all(|(h, a)| h.id == a.id());
        if !matches {
            anyhow::bail!("agent slice does not match conversation participants");
        }
        Ok(())
    }
}

/// Deterministic total order over candidates: highest score, then smaller
/// turns_since_last_speak, then lowest agent id.
fn pick_best(candidates: Vec<(usize, f32)>, agents: &[Agent]) -> Option<usize> {
    candidates
        .into_iter()
        .reduce(|best, cand| {
            let better = match cand.1.partial_cmp(&best.1) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Less) | None => false,
                Some(Ordering::Equal) => {
                    let (tc, tb) = (
                        agents[cand.0].state.turns_since_last_speak,
                        agents[best.0].state.turns_since_last_speak,
                    );
                    if tc != tb {
                        tc < tb
                    } else {
                        agents[cand.0].id() < agents[best.0].id()
                    }
                }
            };
            if better {
                cand
            } else {
                best
            }
        })
        .map(|(idx, _)| idx)
}
