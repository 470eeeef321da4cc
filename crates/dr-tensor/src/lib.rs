//! `dr-tensor` - Logit tensors for dialogue-runtime.
//!
//! This crate provides:
//! - A `Tensor` type holding contiguous row-major f32 data
//! - Row views, row slicing and concatenation (scatter/gather along dim 0)
//! - Shape utilities
//! - Numerically stable softmax and argmax over rows

pub mod error;
pub mod ops;
pub mod shape;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use error::{Result, TensorError};
pub use ops::{argmax, softmax};
pub use shape::Shape;
pub use tensor::Tensor;
