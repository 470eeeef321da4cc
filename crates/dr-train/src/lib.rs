//! `dr-train` - Training support for dialogue-runtime.
//!
//! - `ReplayBuffer`: bounded FIFO of scored (context, response) pairs that
//!   doubles as a restartable batch iterator
//! - `DevicePlan`: uneven batch split that keeps device 0 lightly loaded
//! - `DataParallel`: scatter / parallel forward / gather over replicas
//! - `Session`: owns model, optimizer and schedule; runs epochs and skips
//!   batches that exhaust device memory
//! - `evaluate`: writes generated responses next to references for offline
//!   metric computation

pub mod config;
pub mod error;
pub mod evaluate;
pub mod loss;
pub mod parallel;
pub mod partition;
pub mod replay;
pub mod schedule;
pub mod session;

pub use config::TrainConfig;
pub use error::{Result, TrainError};
pub use evaluate::{write_predictions, write_sampled_predictions};
pub use loss::{shifted_cross_entropy, LossOutput, LossStats};
pub use parallel::{DataParallel, TrainableModel};
pub use partition::{plan, DevicePlan};
pub use replay::{pad_sequences, ReplayBuffer, ReplayRecord};
pub use schedule::LinearWarmup;
pub use session::{EpochSummary, Optimizer, Phase, Session, StepOutput};
