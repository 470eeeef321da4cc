use thiserror::Error;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("cannot sample from distribution: {0}")]
    InvalidDistribution(String),
    #[error("tensor error: {0}")]
    Tensor(#[from] dr_tensor::TensorError),
}

pub type Result<T> = std::result::Result<T, SamplerError>;
