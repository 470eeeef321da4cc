use dr_model::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    /// Device memory ran out during a step. The step did not update the
    /// model and the caller may move on to the next batch.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("invalid batch: {0}")]
    InvalidBatch(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("model error: {0}")]
    Model(ModelError),
    #[error("tensor error: {0}")]
    Tensor(#[from] dr_tensor::TensorError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ModelError> for TrainError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::OutOfMemory(msg) => TrainError::ResourceExhausted(msg),
            other => TrainError::Model(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_memory_becomes_resource_exhausted() {
        let e: TrainError = ModelError::OutOfMemory("cuda:1".to_string()).into();
        assert!(matches!(e, TrainError::ResourceExhausted(ref m) if m == "cuda:1"));

        let e: TrainError = ModelError::Other("boom".to_string()).into();
        assert!(matches!(e, TrainError::Model(_)));
    }
}
