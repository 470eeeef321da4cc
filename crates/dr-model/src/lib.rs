pub mod architecture;
pub mod config;
pub mod error;
pub mod generate;
pub mod state;
pub mod tokenizer;

pub use architecture::SequenceModel;
pub use config::{GenerationConfig, RunMode};
pub use error::{ModelError, Result};
pub use generate::{truncate_at_stop, Decoder};
pub use state::DecodeState;
pub use tokenizer::{SpecialTokens, Tokenizer, Vocab, VocabTokenizer};
