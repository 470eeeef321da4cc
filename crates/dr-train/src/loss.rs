use dr_tensor::{argmax, ops::log_softmax, softmax, Shape, Tensor};

use crate::error::{Result, TrainError};

/// Mean loss and token accuracy over the non-pad targets of a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossStats {
    pub loss: f32,
    pub accuracy: f32,
    pub n_targets: usize,
}

#[derive(Debug, Clone)]
pub struct LossOutput {
    pub stats: LossStats,
    /// Gradient of the mean loss w.r.t. the logits, same shape as the logits.
    pub grad: Tensor,
}

/// Next-token cross entropy for a `[batch, seq, vocab]` logit tensor.
///
/// Position `t` of row `b` is scored against `batch[b][t + 1]`. Targets
/// equal to `pad_id` contribute neither loss, accuracy nor gradient, and
/// the final position of each row has no target.
pub fn shifted_cross_entropy(logits: &Tensor, batch: &[Vec<u32>], pad_id: u32) -> Result<LossOutput> {
    let dims = logits.shape().dims();
    if dims.len() != 3 || dims[0] != batch.len() {
        return Err(TrainError::InvalidBatch(format!(
            "logits shaped {} for a batch of {}",
            logits.shape(),
            batch.len()
        )));
    }
    let (seq, vocab) = (dims[1], dims[2]);

    let mut grad = Tensor::zeros(Shape::from_slice(dims));
    let mut targets: Vec<(usize, usize)> = Vec::new();
    let mut total_loss = 0.0f32;
    let mut correct = 0usize;

    for (b, row) in batch.iter().enumerate() {
        if row.len() != seq {
            return Err(TrainError::InvalidBatch(format!(
                "row {} has {} tokens, logits cover {}",
                b,
                row.len(),
                seq
            )));
        }
        for t in 0..seq.saturating_sub(1) {
            let label = row[t + 1];
            if label == pad_id {
                continue;
            }
            let label = label as usize;
            if label >= vocab {
                return Err(TrainError::InvalidBatch(format!(
                    "label {} outside vocabulary of {}",
                    label, vocab
                )));
            }
            let pos = b * seq + t;
            let scores = &logits.data()[pos * vocab..(pos + 1) * vocab];
            total_loss -= log_softmax(scores)[label];
            if argmax(scores) == Some(label) {
                correct += 1;
            }
            targets.push((pos, label));
        }
    }

    let n_targets = targets.len();
    if n_targets == 0 {
        return Err(TrainError::InvalidBatch(
            "batch has no non-pad targets".to_string(),
        ));
    }

    let scale = 1.0 / n_targets as f32;
    for &(pos, label) in &targets {
        let scores = &logits.data()[pos * vocab..(pos + 1) * vocab];
        let probs = softmax(scores);
        let out = &mut grad.data_mut()[pos * vocab..(pos + 1) * vocab];
        for (g, p) in out.iter_mut().zip(probs) {
            *g = p * scale;
        }
        out[label] -= scale;
    }

    Ok(LossOutput {
        stats: LossStats {
            loss: total_loss * scale,
            accuracy: correct as f32 * scale,
            n_targets,
        },
        grad,
    })
}
