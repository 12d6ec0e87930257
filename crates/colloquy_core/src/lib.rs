pub mod capability;
pub mod config;
pub mod error;
pub mod types;

pub use capability::{Embedder, Embedding, LanguageModel, StreamEvent};
pub use config::{AgentConfig, MemoryConfig, RetrySettings, SchedulerConfig, SimulationConfig};
pub use error::{ConfigError, ServiceError};
pub use types::{AgentId, Interpretation, Phase, Utterance};
