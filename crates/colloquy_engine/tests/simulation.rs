//! End-to-end simulation tests over the mock providers: seeded
//! reproducibility, scheduling, interruption and failure atomicity.

use async_trait::async_trait;
use colloquy_core::{
    AgentConfig, Embedder, Embedding, LanguageModel, RetrySettings, ServiceError,
    SimulationConfig, StreamEvent,
};
use colloquy_engine::{Agent, Conversation, TurnScheduler};
use colloquy_reasoning::{FixedScoring, MockEmbedder, MockLanguageModel, ScoreInputs, ScoringModel};
use std::sync::{Arc, Mutex};

const TOPIC: &str = "what the deep ocean can teach us about music";

fn sim_config(seed: u64) -> SimulationConfig {
    let mut cfg = SimulationConfig::default();
    cfg.scheduler.seed = Some(seed);
    // Keep failure tests fast.
    cfg.retry = RetrySettings {
        max_attempts: 2,
        initial_delay_ms: 1,
        max_delay_ms: 2,
        backoff_factor: 2.0,
    };
    cfg
}

async fn make_agent(
    name: &str,
    persona: &str,
    config: AgentConfig,
    responses: &[&str],
    sim: &SimulationConfig,
) -> Agent {
    let llm = MockLanguageModel::with_responses(
        responses.iter().map(|s| s.to_string()).collect(),
    );
    Agent::create(
        name,
        persona,
        config,
        Arc::new(MockEmbedder::new()),
        Arc::new(llm),
        sim,
    )
    .await
    .unwrap()
}

async fn make_world(
    seed: u64,
    config_a: AgentConfig,
    config_b: AgentConfig,
) -> (SimulationConfig, Conversation, Vec<Agent>) {
    let sim = sim_config(seed);
    let ada = make_agent(
        "Ada",
        "Ada is a deep sea biologist. She maps hydrothermal vents and the ocean floor.",
        config_a,
        &[
            "The ocean floor hums at frequencies we barely measure.",
            "Vent ecosystems rewrite what we assume about energy and life.",
        ],
        &sim,
    )
    .await;
    let brook = make_agent(
        "Brook",
        "Brook is a jazz composer. He hears structure in noise and improvisation.",
        config_b,
        &[
            "Improvisation is just structure discovered too late to plan.",
            "A melody works the way a current works, by insisting gently.",
        ],
        &sim,
    )
    .await;
    let agents = vec![ada, brook];
    let conv = Conversation::create(&agents, TOPIC, Arc::new(MockEmbedder::new()))
        .await
        .unwrap();
    (sim, conv, agents)
}

fn talkative() -> AgentConfig {
    AgentConfig {
        im_threshold: 0.2,
        interrupt_threshold: 1.0,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Scheduling basics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_first_turn_produces_one_utterance() {
    let config = AgentConfig {
        im_threshold: 0.0,
        interrupt_threshold: 1.0,
        ..Default::default()
    };
    let (sim, mut conv, mut agents) = make_world(11, config, config).await;
    let scheduler = TurnScheduler::new(sim, Arc::new(MockEmbedder::new()));

    let utterance = scheduler
        .advance(&mut conv, &mut agents)
        .await
        .unwrap()
        .expect("someone must speak with a zero threshold");

    assert_eq!(utterance.turn_index, 1);
    assert!(!utterance.interrupted);
    assert_eq!(conv.current_turn, 1);
    assert_eq!(conv.transcript.len(), 1);
    // The utterance fans out into every participant's working memory.
    for agent in &agents {
        assert_eq!(agent.memory.counts().working, 1);
    }
}

#[tokio::test]
async fn test_run_stops_at_max_turns() {
    let (sim, mut conv, mut agents) = make_world(23, talkative(), talkative()).await;
    let scheduler = TurnScheduler::new(sim, Arc::new(MockEmbedder::new()));

    let transcript = scheduler.run(&mut conv, &mut agents, 5).await.unwrap();

    assert_eq!(conv.current_turn, 5);
    assert!(conv.is_terminated());
    assert_eq!(transcript.len(), 5);
    assert!(transcript.iter().all(|u| u.turn_index >= 1 && u.turn_index <= 5));
}

#[tokio::test]
async fn test_speakers_alternate_and_state_tracks_turns() {
    let (sim, mut conv, mut agents) = make_world(31, talkative(), talkative()).await;
    for agent in agents.iter_mut() {
        agent.override_scoring(Box::new(FixedScoring(0.9)));
    }
    let scheduler = TurnScheduler::new(sim, Arc::new(MockEmbedder::new()));

    let transcript = scheduler.run(&mut conv, &mut agents, 4).await.unwrap();

    assert_eq!(transcript.len(), 4);
    // The previous speaker may not bid, so with both always willing the
    // floor strictly alternates.
    for pair in transcript.windows(2) {
        assert_ne!(pair[0].speaker_id, pair[1].speaker_id);
    }
    let last = transcript.last().unwrap();
    for agent in &agents {
        if agent.id() == last.speaker_id {
            assert_eq!(agent.state.turns_since_last_speak, 0);
            assert_eq!(agent.state.last_turn_spoken, 4);
        } else {
            assert_eq!(agent.state.turns_since_last_speak, 1);
            assert_eq!(agent.state.last_turn_spoken, 3);
        }
    }
}

#[tokio::test]
async fn test_silence_timeout_terminates() {
    // Motivation under the default model tops out well below 1.0.
    let quiet = AgentConfig {
        im_threshold: 1.0,
        interrupt_threshold: 1.0,
        ..Default::default()
    };
    let (sim, mut conv, mut agents) = make_world(47, quiet, quiet).await;
    let scheduler = TurnScheduler::new(sim, Arc::new(MockEmbedder::new()));

    for _ in 0..3 {
        assert!(!conv.is_terminated());
        let spoke = scheduler.advance(&mut conv, &mut agents).await.unwrap();
        assert!(spoke.is_none());
    }

    assert!(conv.is_terminated());
    assert_eq!(conv.current_turn, 3);
    assert!(conv.transcript.is_empty());
    for agent in &agents {
        assert_eq!(agent.state.turns_since_last_speak, 3);
    }
    // Advancing a terminated conversation is a no-op.
    let after = scheduler.advance(&mut conv, &mut agents).await.unwrap();
    assert!(after.is_none());
    assert_eq!(conv.current_turn, 3);
}

#[tokio::test]
async fn test_fallback_speaker_breaks_silence() {
    let quiet = AgentConfig {
        im_threshold: 1.0,
        interrupt_threshold: 1.0,
        ..Default::default()
    };
    let proactive = AgentConfig {
        proactive_tone: true,
        ..quiet
    };
    let mut sim = sim_config(53);
    sim.scheduler.fallback_speaker = true;

    let ada = make_agent("Ada", "A quiet observer.", quiet, &["Hm."], &sim).await;
    let brook = make_agent(
        "Brook",
        "A talker who fills silences.",
        proactive,
        &["Well, someone has to start us off."],
        &sim,
    )
    .await;
    let mut agents = vec![ada, brook];
    let mut conv = Conversation::create(&agents, TOPIC, Arc::new(MockEmbedder::new()))
        .await
        .unwrap();
    let scheduler = TurnScheduler::new(sim, Arc::new(MockEmbedder::new()));

    let utterance = scheduler
        .advance(&mut conv, &mut agents)
        .await
        .unwrap()
        .expect("the proactive agent should be drafted in");
    assert_eq!(utterance.speaker_name, "Brook");
}

// ---------------------------------------------------------------------------
// Interruption
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_forced_interruption_splits_the_turn() {
    let eager = AgentConfig {
        im_threshold: 0.0,
        interrupt_threshold: 0.0,
        ..Default::default()
    };
    let mild = AgentConfig {
        im_threshold: 0.0,
        interrupt_threshold: 1.0,
        ..Default::default()
    };
    let (sim, mut conv, mut agents) = make_world(61, eager, mild).await;
    agents[0].override_scoring(Box::new(FixedScoring(1.0))); // Ada
    agents[1].override_scoring(Box::new(FixedScoring(0.5))); // Brook
    let scheduler = TurnScheduler::new(sim, Arc::new(MockEmbedder::new()));

    // Turn 1: Ada outbids Brook; Brook's fixed 0.5 never clears his
    // interrupt threshold of 1.0, so Ada finishes.
    let first = scheduler
        .advance(&mut conv, &mut agents)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.speaker_name, "Ada");
    assert!(!first.interrupted);

    // Turn 2: Ada cannot bid as the previous speaker, Brook takes the floor
    // with motivation 0.5, and Ada's fixed 1.0 seizes it mid-stream.
    let second = scheduler
        .advance(&mut conv, &mut agents)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.speaker_name, "Ada");

    assert_eq!(conv.transcript.len(), 3);
    let cut_off = &conv.transcript[1];
    let reply = &conv.transcript[2];
    assert_eq!(cut_off.speaker_name, "Brook");
    assert!(cut_off.interrupted);
    assert_eq!(reply.speaker_name, "Ada");
    assert!(!reply.interrupted);
    // Both halves belong to the same turn; the interrupt landed on the
    // first streamed word, so Brook got exactly one out.
    assert_eq!(cut_off.turn_index, 2);
    assert_eq!(reply.turn_index, 2);
    assert_eq!(cut_off.text.split_whitespace().count(), 1);

    // Both spoke this turn, so both counters reset.
    for agent in &agents {
        assert_eq!(agent.state.turns_since_last_speak, 0);
        assert_eq!(agent.state.last_turn_spoken, 2);
    }
    assert_eq!(conv.current_turn, 2);
}

/// Separates willingness-to-bid from interrupt urgency, which `FixedScoring`
/// cannot do.
struct SplitScoring {
    motivation: f32,
    interrupt: f32,
}

impl ScoringModel for SplitScoring {
    fn motivation(&self, _inputs: &ScoreInputs) -> f32 {
        self.motivation
    }

    fn interrupt(&self, _inputs: &ScoreInputs) -> f32 {
        self.interrupt
    }

    fn name(&self) -> &str {
        "split"
    }
}

async fn interrupt_race_world() -> (SimulationConfig, Conversation, Vec<Agent>) {
    let sim = sim_config(67);
    let speaker_cfg = AgentConfig {
        im_threshold: 0.0,
        interrupt_threshold: 1.0,
        ..Default::default()
    };
    // High enough that their 0.1 motivation never bids.
    let watcher_cfg = AgentConfig {
        im_threshold: 0.5,
        interrupt_threshold: 0.0,
        ..Default::default()
    };

    let ada = make_agent("Ada", "A speaker.", speaker_cfg, &["The floor is mine for now."], &sim).await;
    let brook = make_agent("Brook", "A watcher.", watcher_cfg, &["Hold on."], &sim).await;
    let caro = make_agent("Caro", "Another watcher.", watcher_cfg, &["Wait."], &sim).await;

    let mut agents = vec![ada, brook, caro];
    agents[0].override_scoring(Box::new(FixedScoring(0.8)));
    for agent in agents.iter_mut().skip(1) {
        agent.override_scoring(Box::new(SplitScoring {
            motivation: 0.1,
            interrupt: 1.0,
        }));
    }
    let conv = Conversation::create(&agents, TOPIC, Arc::new(MockEmbedder::new()))
        .await
        .unwrap();
    (sim, conv, agents)
}

#[tokio::test]
async fn test_interrupt_race_resolved_by_lowest_id() {
    let (sim, mut conv, mut agents) = interrupt_race_world().await;
    let expected = agents[1].id().min(agents[2].id());
    let scheduler = TurnScheduler::new(sim, Arc::new(MockEmbedder::new()));

    // Both watchers clear the bar on the same delta with the same urgency;
    // equal turns_since_last_speak leaves the id as the deciding key.
    let reply = scheduler
        .advance(&mut conv, &mut agents)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(conv.transcript.len(), 2);
    assert!(conv.transcript[0].interrupted);
    assert_eq!(reply.speaker_id, expected);
}

#[tokio::test]
async fn test_interrupt_race_prefers_fewer_turns_since_last_speak() {
    let (sim, mut conv, mut agents) = interrupt_race_world().await;
    let lower = if agents[1].id() < agents[2].id() { 1 } else { 2 };
    let higher = 3 - lower;
    // Handicap the id-favored watcher; the tie now breaks on the counter.
    agents[lower].state.turns_since_last_speak = 2;
    let expected = agents[higher].id();
    let scheduler = TurnScheduler::new(sim, Arc::new(MockEmbedder::new()));

    let reply = scheduler
        .advance(&mut conv, &mut agents)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.speaker_id, expected);
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_committed_utterances_carry_interpretations() {
    let (sim, mut conv, mut agents) = make_world(83, talkative(), talkative()).await;
    let scheduler = TurnScheduler::new(sim, Arc::new(MockEmbedder::new()));

    scheduler.run(&mut conv, &mut agents, 2).await.unwrap();

    assert_eq!(conv.transcript.len(), 2);
    for utterance in &conv.transcript {
        let reading = utterance
            .interpretation
            .as_ref()
            .expect("every committed utterance is interpreted");
        assert!(!reading.text.is_empty());
        assert!(!reading.embedding.is_empty());
    }
}

/// Wraps the mock model and keeps every prompt it was asked to complete.
struct RecordingModel {
    inner: MockLanguageModel,
    prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    fn new() -> Self {
        Self {
            inner: MockLanguageModel::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ServiceError> {
        self.prompts
            .lock()
            .unwrap()
            .push(format!("{}\n{}", system, prompt));
        self.inner.generate(system, prompt).await
    }

    async fn stream(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>, ServiceError> {
        self.inner.stream(system, prompt).await
    }
}

#[tokio::test]
async fn test_interrupter_prompt_contains_cut_off_text() {
    let sim = sim_config(71);
    let recorder = Arc::new(RecordingModel::new());
    let ada = Agent::create(
        "Ada",
        "Quick to jump in when she disagrees.",
        AgentConfig {
            im_threshold: 0.0,
            interrupt_threshold: 0.0,
            ..Default::default()
        },
        Arc::new(MockEmbedder::new()),
        recorder.clone(),
        &sim,
    )
    .await
    .unwrap();
    let brook = make_agent(
        "Brook",
        "Speaks in long deliberate arcs.",
        AgentConfig {
            im_threshold: 0.0,
            interrupt_threshold: 1.0,
            ..Default::default()
        },
        &["Let me lay out the whole argument from the beginning."],
        &sim,
    )
    .await;
    let mut agents = vec![ada, brook];
    agents[0].override_scoring(Box::new(FixedScoring(1.0)));
    agents[1].override_scoring(Box::new(FixedScoring(0.5)));
    let mut conv = Conversation::create(&agents, TOPIC, Arc::new(MockEmbedder::new()))
        .await
        .unwrap();
    let scheduler = TurnScheduler::new(sim, Arc::new(MockEmbedder::new()));

    // Turn 1: Ada speaks. Turn 2: Brook speaks and Ada cuts him off.
    scheduler.advance(&mut conv, &mut agents).await.unwrap();
    scheduler.advance(&mut conv, &mut agents).await.unwrap();

    let cut = &conv.transcript[1];
    assert!(cut.interrupted);
    let heard_line = format!("Brook: {}", cut.text);
    let prompts = recorder.prompts.lock().unwrap();
    assert!(
        prompts.iter().any(|p| p.contains(&heard_line)),
        "the interrupter's reply must be prompted with the text it cut off"
    );
}

// ---------------------------------------------------------------------------
// Reproducibility
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_seeded_runs_are_identical() {
    let mut transcripts = Vec::new();
    for _ in 0..2 {
        let (sim, mut conv, mut agents) = make_world(42, talkative(), talkative()).await;
        let scheduler = TurnScheduler::new(sim, Arc::new(MockEmbedder::new()));
        let transcript = scheduler.run(&mut conv, &mut agents, 6).await.unwrap();
        transcripts.push(
            transcript
                .iter()
                .map(|u| (u.turn_index, u.speaker_name.clone(), u.text.clone(), u.interrupted))
                .collect::<Vec<_>>(),
        );
    }
    assert!(!transcripts[0].is_empty());
    assert_eq!(transcripts[0], transcripts[1]);
}

#[tokio::test]
async fn test_different_seeds_may_diverge_without_breaking_invariants() {
    for seed in [1u64, 2, 3] {
        let (sim, mut conv, mut agents) = make_world(seed, talkative(), talkative()).await;
        let scheduler = TurnScheduler::new(sim, Arc::new(MockEmbedder::new()));
        let transcript = scheduler.run(&mut conv, &mut agents, 4).await.unwrap();
        // Turn indices never decrease and never exceed the cap.
        let mut prev = 0;
        for u in &transcript {
            assert!(u.turn_index >= prev);
            assert!(u.turn_index <= 4);
            prev = u.turn_index;
        }
    }
}

// ---------------------------------------------------------------------------
// Consolidation over a run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_periodic_consolidation_promotes_working_memories() {
    let (sim, mut conv, mut agents) = make_world(77, talkative(), talkative()).await;
    let scheduler = TurnScheduler::new(sim, Arc::new(MockEmbedder::new()));

    scheduler.run(&mut conv, &mut agents, 5).await.unwrap();

    // Five spoken turns, one working entry fanned out per turn. The pass at
    // turn 5 promotes the top two into long-term.
    for agent in &agents {
        let counts = agent.memory.counts();
        assert_eq!(counts.working, 3);
        assert_eq!(counts.long_term, 2 + 2); // two persona chunks + promotions
    }
}

// ---------------------------------------------------------------------------
// Failure atomicity
// ---------------------------------------------------------------------------

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Embedding, ServiceError> {
        Err(ServiceError::Embedding("backend down".into()))
    }
}

#[tokio::test]
async fn test_failed_turn_leaves_no_trace() {
    let (sim, mut conv, mut agents) = make_world(91, talkative(), talkative()).await;
    let before: Vec<_> = agents
        .iter()
        .map(|a| (a.state, a.memory.counts()))
        .collect();

    // The scheduler's embedder fails every call; bidding still works off the
    // cached topic embedding, so the failure lands mid-turn.
    let scheduler = TurnScheduler::new(sim, Arc::new(FailingEmbedder));
    let err = scheduler.advance(&mut conv, &mut agents).await;
    assert!(err.is_err());

    assert_eq!(conv.current_turn, 0);
    assert!(conv.transcript.is_empty());
    assert!(!conv.is_terminated());
    for (agent, (state, counts)) in agents.iter().zip(before) {
        assert_eq!(agent.state, state);
        assert_eq!(agent.memory.counts(), counts);
    }

    // The same conversation recovers once the backend does.
    let scheduler = TurnScheduler::new(sim_config(91), Arc::new(MockEmbedder::new()));
    let utterance = scheduler.advance(&mut conv, &mut agents).await.unwrap();
    assert!(utterance.is_some());
    assert_eq!(conv.current_turn, 1);
}
