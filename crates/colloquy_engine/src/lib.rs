//! Simulation engine: agents, conversations and the turn scheduler.

pub mod agent;
pub mod conversation;
pub mod scheduler;

pub use agent::{Agent, AgentReport, AgentState};
pub use conversation::{Conversation, ParticipantHandle};
pub use scheduler::TurnScheduler;
