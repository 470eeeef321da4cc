use dr_tensor::Tensor;

/// Trait for sequence models that can drive autoregressive decoding.
///
/// The model itself is a black box; decoding only needs next-token logits
/// and an opaque cache that lets it skip recomputing earlier positions.
pub trait SequenceModel {
    /// Opaque "past" state returned by one forward call and handed back to
    /// the next. Owned by the decoder for the duration of one decode call.
    type Cache;

    /// Run the forward pass over a batch of token rows.
    ///
    /// Returns logits over the vocabulary for the last position of every
    /// row, shaped `[batch, vocab]`, together with the updated cache.
    ///
    /// - `tokens`: one row per batch element. Without a cache each row is the
    ///   full sequence; with a cache it holds only the new tokens.
    /// - `cache`: state from the previous call of the same decode, if any.
    fn forward(
        &mut self,
        tokens: &[Vec<u32>],
        cache: Option<Self::Cache>,
    ) -> crate::Result<(Tensor, Self::Cache)>;

    /// Returns the vocabulary size (number of output logits).
    fn vocab_size(&self) -> usize;

    /// Maximum number of positions the model can attend to.
    fn context_window(&self) -> usize;
}
