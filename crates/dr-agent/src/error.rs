use dr_model::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error("reranker error: {0}")]
    Reranker(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
