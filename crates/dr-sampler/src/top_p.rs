use dr_tensor::softmax;

use crate::sampler::LogitFilter;

/// Nucleus filtering: keeps the smallest prefix of tokens (by descending
/// logit) whose cumulative probability reaches `p`.
///
/// The token that first pushes the cumulative mass over `p` is kept, and
/// the most likely token is never removed.
pub struct TopPFilter {
    p: f32,
    min_keep: usize,
    fill: f32,
}

impl TopPFilter {
    /// Create a new top-p (nucleus) filter with the given probability threshold.
    pub fn new(p: f32) -> Self {
        Self {
            p,
            min_keep: 1,
            fill: f32::NEG_INFINITY,
        }
    }

    /// Value written over removed entries.
    pub fn with_fill(mut self, fill: f32) -> Self {
        self.fill = fill;
        self
    }

    /// Protect the `min_keep` most likely tokens regardless of mass.
    pub fn with_min_keep(mut self, min_keep: usize) -> Self {
        self.min_keep = min_keep;
        self
    }
}

impl LogitFilter for TopPFilter {
    fn name(&self) -> &str {
        "top_p"
    }

    fn apply(&self, logits: &mut [f32]) {
        if self.p <= 0.0 || logits.is_empty() {
            return;
        }

        // Vocabulary positions in descending logit order. Entries already at
        // the fill value sort to the tail and carry no probability.
        let mut order: Vec<usize> = (0..logits.len()).collect();
        order.sort_by(|&a, &b| logits[b].total_cmp(&logits[a]));
        let sorted: Vec<f32> = order.iter().map(|&i| logits[i]).collect();
        let probs = softmax(&sorted);

        let mut cumulative = 0.0f32;
        let mut remove: Vec<bool> = probs
            .iter()
            .map(|&prob| {
                cumulative += prob;
                cumulative > self.p
            })
            .collect();

        if self.min_keep > 1 {
            for r in remove.iter_mut().take(self.min_keep) {
                *r = false;
            }
        }

        // Shift right by one so the first token crossing the threshold stays.
        remove.rotate_right(1);
        remove[0] = false;

        for (rank, &vocab_idx) in order.iter().enumerate() {
            if remove[rank] {
                logits[vocab_idx] = self.fill;
            }
        }
    }
}
