pub mod basic;
pub mod vocab;

pub use basic::VocabTokenizer;
pub use vocab::Vocab;

/// Ids of the special tokens the decoder and trainers rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    /// Padding, ignored by the loss.
    pub pad: u32,
    /// Unknown token, never sampled.
    pub unk: u32,
    /// Start-of-context marker.
    pub cls: u32,
    /// Utterance separator, also the stop token for responses.
    pub sep: u32,
}

/// Text <-> token id conversion.
pub trait Tokenizer: Send + Sync {
    /// Encode text into ids, including start and end markers.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode ids back to text, dropping padding and start markers.
    fn decode(&self, ids: &[u32]) -> String;

    /// The special token ids of this vocabulary.
    fn special(&self) -> SpecialTokens;
}
