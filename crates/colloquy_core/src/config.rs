use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// Per-agent behavior config
// ============================================================================

/// Behavior thresholds for a single agent. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Minimum willingness score to voluntarily take a turn
    pub im_threshold: f32,
    /// Probability of choosing the fast (System 1) reasoning route
    pub system1_prob: f64,
    /// Minimum urgency score to seize the floor from the current speaker
    pub interrupt_threshold: f32,
    /// Raises the motivation baseline; also marks fallback-speaker candidates
    pub proactive_tone: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            im_threshold: 0.5,
            system1_prob: 0.5,
            interrupt_threshold: 0.8,
            proactive_tone: false,
        }
    }
}

impl AgentConfig {
    /// Reject thresholds and probabilities outside [0, 1].
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(field: &'static str, value: f32) -> Result<(), ConfigError> {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(ConfigError::OutOfRange { field, value });
            }
            Ok(())
        }
        check("im_threshold", self.im_threshold)?;
        check("system1_prob", self.system1_prob as f32)?;
        check("interrupt_threshold", self.interrupt_threshold)?;
        Ok(())
    }
}

// ============================================================================
// Simulation-wide config (TOML file + env overrides)
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub scheduler: SchedulerConfig,
    pub memory: MemoryConfig,
    pub retry: RetrySettings,
}

impl SimulationConfig {
    /// Load config from a TOML file, falling back to defaults for missing
    /// fields. Env var overrides are applied after loading.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: SimulationConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file is missing or invalid, return
    /// defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("COLLOQUY_SEED") {
            if let Ok(n) = v.parse() {
                self.scheduler.seed = Some(n);
            }
        }
        if let Ok(v) = std::env::var("COLLOQUY_SILENCE_LIMIT") {
            if let Ok(n) = v.parse() {
                self.scheduler.silence_limit = n;
            }
        }
        if let Ok(v) = std::env::var("COLLOQUY_WORKING_CAP") {
            if let Ok(n) = v.parse() {
                self.memory.working_cap = n;
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Consecutive silent cycles before the conversation terminates
    pub silence_limit: u32,
    /// When no bid clears threshold, pick a proactive-tone default speaker
    /// instead of a silent cycle
    pub fallback_speaker: bool,
    /// Run consolidation every N turns (in addition to the cap trigger)
    pub consolidate_every: u64,
    /// How many recent utterances go into generation prompts
    pub context_window: usize,
    /// Master seed for the per-agent RNGs (None = entropy)
    pub seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            silence_limit: 3,
            fallback_speaker: false,
            consolidate_every: 5,
            context_window: 10,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Working-memory size bound; exceeding it evicts least-salient entries
    pub working_cap: usize,
    /// Top-k for similarity retrieval
    pub retrieval_k: usize,
    /// Per-turn multiplicative recency decay used in salience
    pub recency_decay: f32,
    /// How many working entries a consolidation pass promotes
    pub promote_top_n: usize,
    /// Maximum persona chunks embedded at agent creation
    pub persona_chunk_cap: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            working_cap: 12,
            retrieval_k: 5,
            recency_decay: 0.9,
            promote_top_n: 2,
            persona_chunk_cap: 8,
        }
    }
}

/// Bounded exponential backoff for Embedder/LanguageModel calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
