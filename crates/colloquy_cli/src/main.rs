use clap::Parser;
use colloquy_core::{AgentConfig, SimulationConfig};
use colloquy_engine::{Agent, Conversation, TurnScheduler};
use colloquy_reasoning::{MockEmbedder, MockLanguageModel};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the simulation config file
    #[arg(short, long, default_value = "colloquy.toml")]
    config: String,

    /// Conversation topic
    #[arg(short, long, default_value = "what cities owe to the people who leave them")]
    topic: String,

    /// Maximum number of turns to simulate
    #[arg(short = 'n', long, default_value_t = 12)]
    turns: u64,

    /// Master seed (overrides the config file)
    #[arg(short, long, env = "COLLOQUY_SEED")]
    seed: Option<u64>,

    /// Print per-agent state and memory reports after the run
    #[arg(long)]
    report: bool,
}

/// Built-in demo cast. The mock providers are deterministic, so the same
/// seed replays the same conversation.
const CAST: &[(&str, &str, AgentConfig)] = &[
    (
        "Maya",
        "Maya is an urban planner who grew up in a shrinking steel town. \
         She believes a city's character is set by its departures, not its arrivals. \
         She argues with numbers first and stories second.",
        AgentConfig {
            im_threshold: 0.35,
            system1_prob: 0.4,
            interrupt_threshold: 0.75,
            proactive_tone: true,
        },
    ),
    (
        "Elias",
        "Elias is a jazz pianist who has moved eleven times. \
         He treats every city as a band he briefly sat in with. \
         He interrupts when he hears a wrong note in an argument.",
        AgentConfig {
            im_threshold: 0.45,
            system1_prob: 0.7,
            interrupt_threshold: 0.6,
            proactive_tone: false,
        },
    ),
    (
        "Ren",
        "Ren is an archivist who never left their hometown. \
         They collect letters from people who did. \
         They speak rarely and only when the record is being distorted.",
        AgentConfig {
            im_threshold: 0.6,
            system1_prob: 0.3,
            interrupt_threshold: 0.9,
            proactive_tone: false,
        },
    ),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    let args = Args::parse();

    let mut sim = SimulationConfig::load_or_default(&args.config);
    if let Some(seed) = args.seed {
        sim.scheduler.seed = Some(seed);
    }
    if sim.scheduler.seed.is_none() {
        // A run without a seed is not replayable; pick one and say so.
        let seed = rand::random::<u64>();
        info!(seed, "no seed configured, generated one for this run");
        sim.scheduler.seed = Some(seed);
    }

    let embedder = Arc::new(MockEmbedder::new());
    let mut agents = Vec::with_capacity(CAST.len());
    for (name, persona, config) in CAST {
        let agent = Agent::create(
            name,
            persona,
            *config,
            embedder.clone(),
            Arc::new(MockLanguageModel::new()),
            &sim,
        )
        .await?;
        agents.push(agent);
    }

    let mut conv = Conversation::create(&agents, &args.topic, embedder.clone()).await?;
    info!(
        topic = %conv.topic,
        participants = agents.len(),
        seed = ?sim.scheduler.seed,
        "simulation starting"
    );

    let scheduler = TurnScheduler::new(sim, embedder);
    let transcript = scheduler.run(&mut conv, &mut agents, args.turns).await?;

    println!("--- {} ---", conv.topic);
    for utterance in &transcript {
        let marker = if utterance.interrupted { " [cut off]" } else { "" };
        println!(
            "[{:>3}] {}: {}{}",
            utterance.turn_index, utterance.speaker_name, utterance.text, marker
        );
    }
    println!(
        "--- {} turns, {} utterances ---",
        conv.current_turn,
        transcript.len()
    );

    if args.report {
        for agent in &agents {
            println!("{}", serde_json::to_string_pretty(&agent.inspect())?);
        }
    }

    Ok(())
}
