use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("row {index} out of range for tensor with {rows} rows")]
    RowOutOfRange { index: usize, rows: usize },
    #[error("ragged rows: row {index} has length {got}, expected {expected}")]
    RaggedRows {
        index: usize,
        expected: usize,
        got: usize,
    },
    #[error("cannot concatenate an empty list of tensors")]
    EmptyConcat,
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
