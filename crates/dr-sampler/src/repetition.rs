use std::collections::HashSet;

/// Penalizes tokens that already appear in a sequence's generated history.
///
/// The logit of every distinct history token is divided by `penalty`, once,
/// however many times the token occurs. A penalty of 1.0 is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct RepetitionPenalty {
    penalty: f32,
}

impl RepetitionPenalty {
    /// Create a new repetition penalty with the given factor.
    pub fn new(penalty: f32) -> Self {
        Self { penalty }
    }

    /// The configured factor.
    pub fn penalty(&self) -> f32 {
        self.penalty
    }

    /// Apply the penalty to `logits` for every id in `history`.
    ///
    /// Ids outside the vocabulary are ignored.
    pub fn apply(&self, logits: &mut [f32], history: &[u32]) {
        if self.penalty == 1.0 || history.is_empty() {
            return;
        }
        let seen: HashSet<u32> = history.iter().copied().collect();
        for id in seen {
            if let Some(logit) = logits.get_mut(id as usize) {
                *logit /= self.penalty;
            }
        }
    }
}

impl Default for RepetitionPenalty {
    fn default() -> Self {
        Self::new(1.0)
    }
}
