use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Decoding configuration shared by both decode variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Top-k filtering (0 = disabled).
    pub top_k: usize,
    /// Nucleus threshold (1.0 disables the batched nucleus step).
    pub top_p: f32,
    /// Divisor applied to logits of already generated tokens (1.0 = off).
    pub repetition_penalty: f32,
    /// Minimum number of tokens the batched filter always keeps.
    pub min_keep: usize,
    /// Maximum number of tokens to generate per response.
    pub max_len: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            top_k: 20,
            top_p: 1.0,
            repetition_penalty: 1.0,
            min_keep: 1,
            max_len: 50,
        }
    }
}

/// What a session is constructed to do. Parsed once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    #[serde(rename = "train")]
    Train,
    /// Single-sequence generation, no reranking.
    #[serde(rename = "test")]
    Test,
    /// Batched generation scored by the reranker.
    #[serde(rename = "rerank")]
    Rerank,
    /// Batched generation plus retrieval candidates, scored by the reranker.
    #[serde(rename = "rerank_ir")]
    RerankRetrieval,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Train => "train",
            RunMode::Test => "test",
            RunMode::Rerank => "rerank",
            RunMode::RerankRetrieval => "rerank_ir",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(RunMode::Train),
            "test" => Ok(RunMode::Test),
            "rerank" => Ok(RunMode::Rerank),
            "rerank_ir" => Ok(RunMode::RerankRetrieval),
            other => Err(ModelError::Config(format!(
                "run mode must be one of train, test, rerank, rerank_ir; got {:?}",
                other
            ))),
        }
    }
}
