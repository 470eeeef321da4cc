use dr_tensor::Tensor;

use crate::top_k::TopKFilter;
use crate::top_p::TopPFilter;

/// Trait for filters that constrain one row of logits in place.
///
/// Filters never remove entries from the row. Rejected vocabulary positions
/// are overwritten with a fill value (normally `-inf`) so the row keeps its
/// length and token ids stay equal to indices.
pub trait LogitFilter: Send + Sync {
    /// Returns the name of this filter.
    fn name(&self) -> &str;

    /// Constrain `logits` in place.
    fn apply(&self, logits: &mut [f32]);
}

/// Composes multiple filters into a pipeline, applied in insertion order.
pub struct FilterChain {
    filters: Vec<Box<dyn LogitFilter>>,
}

impl FilterChain {
    /// Create a new empty filter chain.
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Add a filter to the end of the chain. Returns self for builder-style usage.
    pub fn with(mut self, filter: Box<dyn LogitFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// The chain used for single-sequence decoding: top-k when `top_k > 0`,
    /// then top-p when `top_p > 0`.
    pub fn single(top_k: usize, top_p: f32, fill: f32) -> Self {
        let mut chain = Self::new();
        if top_k > 0 {
            chain = chain.with(Box::new(TopKFilter::new(top_k).with_fill(fill)));
        }
        if top_p > 0.0 {
            chain = chain.with(Box::new(TopPFilter::new(top_p).with_fill(fill)));
        }
        chain
    }

    /// The chain used for batched decoding. Top-p only runs for
    /// `0 < top_p < 1`, and both steps honour `min_keep`.
    pub fn batch(top_k: usize, top_p: f32, fill: f32, min_keep: usize) -> Self {
        let mut chain = Self::new();
        if top_k > 0 {
            chain = chain.with(Box::new(
                TopKFilter::new(top_k).with_fill(fill).with_min_keep(min_keep),
            ));
        }
        if top_p > 0.0 && top_p < 1.0 {
            chain = chain.with(Box::new(
                TopPFilter::new(top_p).with_fill(fill).with_min_keep(min_keep),
            ));
        }
        chain
    }

    /// Names of the filters in application order.
    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run every filter over one row.
    pub fn apply(&self, logits: &mut [f32]) {
        for filter in &self.filters {
            filter.apply(logits);
        }
    }

    /// Run every filter over each row of a `[batch, vocab]` tensor.
    pub fn apply_rows(&self, logits: &mut Tensor) {
        for row in logits.rows_mut() {
            self.apply(row);
        }
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-k then nucleus filtering of a single logit vector.
///
/// `top_k == 0` disables the top-k step and `top_p <= 0` disables the
/// nucleus step. At least one finite entry survives whenever the input
/// had one.
pub fn filter_single(logits: &mut [f32], top_k: usize, top_p: f32, fill: f32) {
    FilterChain::single(top_k, top_p, fill).apply(logits);
}

/// Row-wise top-k then nucleus filtering of a `[batch, vocab]` tensor.
///
/// Nucleus filtering is skipped unless `0 < top_p < 1`. The first
/// `min_keep` entries of every row (by descending logit) are never removed.
pub fn filter_batch(logits: &mut Tensor, top_k: usize, top_p: f32, fill: f32, min_keep: usize) {
    FilterChain::batch(top_k, top_p, fill, min_keep).apply_rows(logits);
}
