use crate::sampler::LogitFilter;

/// Keeps the `k` highest logits and overwrites everything strictly below
/// the k-th largest value with the fill value.
///
/// Entries tied with the k-th largest value survive, so more than `k`
/// entries can remain when the boundary value is duplicated.
pub struct TopKFilter {
    k: usize,
    min_keep: usize,
    fill: f32,
}

impl TopKFilter {
    /// Create a new top-K filter that retains the `k` highest-logit tokens.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            min_keep: 1,
            fill: f32::NEG_INFINITY,
        }
    }

    /// Value written over removed entries.
    pub fn with_fill(mut self, fill: f32) -> Self {
        self.fill = fill;
        self
    }

    /// Never keep fewer than `min_keep` entries.
    pub fn with_min_keep(mut self, min_keep: usize) -> Self {
        self.min_keep = min_keep;
        self
    }
}

impl LogitFilter for TopKFilter {
    fn name(&self) -> &str {
        "top_k"
    }

    fn apply(&self, logits: &mut [f32]) {
        if self.k == 0 || logits.is_empty() {
            return;
        }
        let k = self.k.max(self.min_keep).min(logits.len());

        // k-th largest value, found without a full sort.
        let mut scratch = logits.to_vec();
        let (_, kth, _) = scratch.select_nth_unstable_by(k - 1, |a, b| b.total_cmp(a));
        let threshold = *kth;

        for logit in logits.iter_mut() {
            if *logit < threshold {
                *logit = self.fill;
            }
        }
    }
}
