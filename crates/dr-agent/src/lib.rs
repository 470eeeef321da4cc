//! `dr-agent` - Reply selection for dialogue-runtime.
//!
//! - `ResponseOrchestrator`: topic trigger, batched generation, retrieval
//!   merge and reranking for one reply
//! - `Agent`: a conversation bound to one run mode, keeping the history
//! - `Retriever`, `Reranker`, `TopicScorer`: the external services the
//!   orchestrator consults
//! - `Topic`, `TriggerPool`: topic labels and their trigger utterances

pub mod agent;
pub mod candidate;
pub mod collab;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod topic;

pub use agent::Agent;
pub use candidate::{Candidate, Response, Source};
pub use collab::{Reranker, Retrieved, Retriever, TopicScorer};
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use orchestrator::ResponseOrchestrator;
pub use topic::{Topic, TriggerPool};
