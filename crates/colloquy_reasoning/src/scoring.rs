//! Pluggable scoring formulas for motivation and interrupt urgency.
//!
//! The engine fixes the inputs (memory relevance, persona tone, a stochastic
//! term) and the output range [0, 1]; the exact combination is behind a trait
//! so alternative formulas can be swapped in without touching the scheduler.

/// Inputs to a scoring call. `relevance` is the semantic similarity of the
/// latest transcript content to the agent's retrieved memories; `noise` is a
/// seeded draw in [0, 1).
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    pub relevance: f32,
    pub proactive_tone: bool,
    pub noise: f32,
}

pub trait ScoringModel: Send + Sync {
    /// Willingness to take a turn voluntarily, in [0, 1].
    fn motivation(&self, inputs: &ScoreInputs) -> f32;

    /// Urgency of seizing the floor mid-utterance, in [0, 1].
    fn interrupt(&self, inputs: &ScoreInputs) -> f32;

    /// Name for logging.
    fn name(&self) -> &str;
}

/// Default weighted-sum model. Monotone in relevance; proactive personas get
/// a raised baseline; interrupting carries a lower baseline than speaking.
#[derive(Debug, Clone)]
pub struct WeightedScoring {
    pub relevance_weight: f32,
    pub baseline: f32,
    pub proactive_bonus: f32,
    pub noise_weight: f32,
}

impl Default for WeightedScoring {
    fn default() -> Self {
        Self {
            relevance_weight: 0.5,
            baseline: 0.2,
            proactive_bonus: 0.15,
            noise_weight: 0.15,
        }
    }
}

impl ScoringModel for WeightedScoring {
    fn motivation(&self, inputs: &ScoreInputs) -> f32 {
        let baseline = if inputs.proactive_tone {
            self.baseline + self.proactive_bonus
        } else {
            self.baseline
        };
        (self.relevance_weight * inputs.relevance.max(0.0)
            + baseline
            + self.noise_weight * inputs.noise)
            .clamp(0.0, 1.0)
    }

    fn interrupt(&self, inputs: &ScoreInputs) -> f32 {
        let baseline = if inputs.proactive_tone {
            self.baseline * 0.5 + self.proactive_bonus * 0.5
        } else {
            self.baseline * 0.5
        };
        (0.6 * inputs.relevance.max(0.0) + baseline + 0.1 * inputs.noise).clamp(0.0, 1.0)
    }

    fn name(&self) -> &str {
        "weighted"
    }
}

/// Pins both scores to a constant. Used by tests to force or suppress
/// speaking and interruption.
#[derive(Debug, Clone)]
pub struct FixedScoring(pub f32);

impl ScoringModel for FixedScoring {
    fn motivation(&self, _inputs: &ScoreInputs) -> f32 {
        self.0
    }

    fn interrupt(&self, _inputs: &ScoreInputs) -> f32 {
        self.0
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
