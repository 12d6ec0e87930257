pub mod engine;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod scoring;

pub use engine::{DecisionEngine, Route};
pub use providers::{MockEmbedder, MockLanguageModel};
pub use retry::with_retry;
pub use scoring::{FixedScoring, ScoreInputs, ScoringModel, WeightedScoring};
