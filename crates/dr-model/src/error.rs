use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("out of device memory: {0}")]
    OutOfMemory(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("model returned {got} logit rows, expected {expected}")]
    BatchMismatch { expected: usize, got: usize },
    #[error("tokenizer error: {0}")]
    TokenizerError(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("tensor error: {0}")]
    TensorError(#[from] dr_tensor::TensorError),
    #[error("sampler error: {0}")]
    SamplerError(#[from] dr_sampler::SamplerError),
    #[error("{0}")]
    Other(String),
}

impl ModelError {
    /// Whether this error reports device memory exhaustion.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, ModelError::OutOfMemory(_))
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
