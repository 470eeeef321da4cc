use std::fs;
use std::path::Path;

use dr_model::{GenerationConfig, RunMode};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::orchestrator::DEFAULT_MAX_RETRIEVAL_ATTEMPTS;

/// Settings for a chat agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub generation: GenerationConfig,
    pub run_mode: RunMode,
    /// Generated candidates per reply in the reranking modes.
    pub batch_size: usize,
    pub max_retrieval_attempts: usize,
    /// Seed for sampling and trigger selection.
    pub seed: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            run_mode: RunMode::Rerank,
            batch_size: 16,
            max_retrieval_attempts: DEFAULT_MAX_RETRIEVAL_ATTEMPTS,
            seed: 0,
        }
    }
}

impl AgentConfig {
    /// Load from JSON. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<AgentConfig> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
