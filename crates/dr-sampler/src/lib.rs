pub mod categorical;
pub mod error;
pub mod repetition;
pub mod sampler;
pub mod top_k;
pub mod top_p;

pub use categorical::{sample, sample_rows};
pub use error::{Result, SamplerError};
pub use repetition::RepetitionPenalty;
pub use sampler::{filter_batch, filter_single, FilterChain, LogitFilter};
pub use top_k::TopKFilter;
pub use top_p::TopPFilter;
