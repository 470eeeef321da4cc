//! Autoregressive decoding on top of a [`SequenceModel`].
//!
//! Two loops are provided:
//!
//! - [`Decoder::generate`]: one sequence, no cache. The whole growing input
//!   is fed every step and kept within the model's context window. Stops as
//!   soon as the stop token is sampled; the stop token is not returned.
//! - [`Decoder::generate_batch`]: many sequences of equal prompt length
//!   sharing one model cache, so each step only feeds the newest token of
//!   every row. Rows that sample the stop token keep decoding until all rows
//!   have stopped or `max_len` is reached; use [`truncate_at_stop`] on the
//!   results.
//!
//! Every step masks the unknown token, applies the repetition penalty over
//! the row's own history, filters with top-k / top-p and draws from the
//! softmax of what is left.

use dr_sampler::{sample, sample_rows, FilterChain, RepetitionPenalty};
use rand::Rng;
use tracing::debug;

use crate::architecture::SequenceModel;
use crate::config::GenerationConfig;
use crate::error::{ModelError, Result};
use crate::state::DecodeState;
use crate::tokenizer::SpecialTokens;

/// Decoding policy: filter settings plus the ids it treats specially.
#[derive(Debug, Clone)]
pub struct Decoder {
    top_k: usize,
    top_p: f32,
    min_keep: usize,
    penalty: RepetitionPenalty,
    unk_id: u32,
    stop_id: u32,
}

impl Decoder {
    /// Build a decoder that never samples `special.unk` and stops on
    /// `special.sep`.
    pub fn new(config: &GenerationConfig, special: SpecialTokens) -> Self {
        Self {
            top_k: config.top_k,
            top_p: config.top_p,
            min_keep: config.min_keep.max(1),
            penalty: RepetitionPenalty::new(config.repetition_penalty),
            unk_id: special.unk,
            stop_id: special.sep,
        }
    }

    pub fn stop_id(&self) -> u32 {
        self.stop_id
    }

    /// Decode a single sequence without a cache.
    ///
    /// Returns at most `max_len` generated ids, excluding the stop token.
    pub fn generate<M, R>(
        &self,
        model: &mut M,
        prompt: &[u32],
        max_len: usize,
        rng: &mut R,
    ) -> Result<Vec<u32>>
    where
        M: SequenceModel,
        R: Rng + ?Sized,
    {
        if prompt.is_empty() {
            return Err(ModelError::InvalidInput("empty prompt".to_string()));
        }
        let n_ctx = model.context_window();
        let chain = FilterChain::single(self.top_k, self.top_p, f32::NEG_INFINITY);

        let mut input = vec![keep_last(prompt, n_ctx).to_vec()];
        let mut state = DecodeState::new();

        for step in 0..max_len {
            let (logits, _) = model.forward(&input, None)?;
            if logits.n_rows() != 1 {
                return Err(ModelError::BatchMismatch {
                    expected: 1,
                    got: logits.n_rows(),
                });
            }
            let mut row = logits.row(0)?.to_vec();
            self.prepare(&mut row, state.generated());
            chain.apply(&mut row);

            let token = sample(&row, rng)?;
            if token == self.stop_id {
                debug!(step, "stop token sampled");
                break;
            }
            state.push(token, self.stop_id);

            let seq = &mut input[0];
            seq.push(token);
            if seq.len() > n_ctx {
                seq.drain(..seq.len() - n_ctx);
            }
        }

        Ok(state.into_generated())
    }

    /// Decode a batch of equal-length prompts, carrying the model cache.
    ///
    /// Every returned row has the same length: `max_len`, or fewer if all
    /// rows sampled the stop token earlier. Stop tokens are kept.
    ///
    /// The cache is never trimmed, so prompt length plus `max_len` must fit
    /// in the model's context window; callers trim prompts to
    /// `context_window() - max_len`.
    pub fn generate_batch<M, R>(
        &self,
        model: &mut M,
        prompts: &[Vec<u32>],
        max_len: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<u32>>>
    where
        M: SequenceModel,
        R: Rng + ?Sized,
    {
        let batch = prompts.len();
        let Some(first) = prompts.first() else {
            return Ok(Vec::new());
        };
        if first.is_empty() {
            return Err(ModelError::InvalidInput("empty prompt".to_string()));
        }
        if let Some((i, p)) = prompts.iter().enumerate().find(|(_, p)| p.len() != first.len()) {
            return Err(ModelError::InvalidInput(format!(
                "prompt {} has length {}, expected {}",
                i,
                p.len(),
                first.len()
            )));
        }
        let n_ctx = model.context_window();
        if first.len() + max_len > n_ctx {
            return Err(ModelError::InvalidInput(format!(
                "prompt of {} tokens plus {} new tokens exceeds context window {}",
                first.len(),
                max_len,
                n_ctx
            )));
        }

        let chain = FilterChain::batch(self.top_k, self.top_p, f32::NEG_INFINITY, self.min_keep);
        let mut states = vec![DecodeState::new(); batch];
        let mut cache: Option<M::Cache> = None;
        let mut prev: Vec<Vec<u32>> = prompts.to_vec();

        for step in 0..max_len {
            let (mut logits, next_cache) = model.forward(&prev, cache.take())?;
            cache = Some(next_cache);
            if logits.n_rows() != batch {
                return Err(ModelError::BatchMismatch {
                    expected: batch,
                    got: logits.n_rows(),
                });
            }

            for (row, state) in logits.rows_mut().zip(&states) {
                self.prepare(row, state.generated());
            }
            chain.apply_rows(&mut logits);

            let tokens = sample_rows(&logits, rng)?;
            for (state, &token) in states.iter_mut().zip(&tokens) {
                state.push(token, self.stop_id);
            }
            prev = tokens.iter().map(|&t| vec![t]).collect();

            if states.iter().all(DecodeState::is_stopped) {
                debug!(step, batch, "all sequences stopped");
                break;
            }
        }

        Ok(states.into_iter().map(DecodeState::into_generated).collect())
    }

    /// Mask the unknown token and penalize repeats, in that order.
    fn prepare(&self, row: &mut [f32], history: &[u32]) {
        if let Some(logit) = row.get_mut(self.unk_id as usize) {
            *logit = f32::NEG_INFINITY;
        }
        self.penalty.apply(row, history);
    }
}

/// The prefix of `seq` before its first `stop` token.
pub fn truncate_at_stop(seq: &[u32], stop: u32) -> &[u32] {
    match seq.iter().position(|&t| t == stop) {
        Some(i) => &seq[..i],
        None => seq,
    }
}

/// The last `n` ids of `seq`.
pub fn keep_last(seq: &[u32], n: usize) -> &[u32] {
    &seq[seq.len().saturating_sub(n)..]
}
