use dr_tensor::{softmax, Tensor};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::{Result, SamplerError};

/// Draw one token id from the softmax of `logits`.
///
/// Entries at `-inf` have zero weight and are never drawn. The generator is
/// owned by the caller so a seeded `StdRng` gives reproducible decoding.
pub fn sample<R: Rng + ?Sized>(logits: &[f32], rng: &mut R) -> Result<u32> {
    let probs = softmax(logits);
    let dist = WeightedIndex::new(&probs)
        .map_err(|e| SamplerError::InvalidDistribution(e.to_string()))?;
    Ok(dist.sample(rng) as u32)
}

/// Draw one token per row of a `[batch, vocab]` tensor.
pub fn sample_rows<R: Rng + ?Sized>(logits: &Tensor, rng: &mut R) -> Result<Vec<u32>> {
    logits.rows().map(|row| sample(row, rng)).collect()
}
