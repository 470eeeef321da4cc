//! Row reductions shared by sampling and loss bookkeeping.

/// Softmax over one row: `exp(x[i] - max(x)) / sum(exp(x[j] - max(x)))`.
///
/// Entries at `-inf` get probability zero. A row with no finite entry
/// yields all zeros instead of NaN.
pub fn softmax(x: &[f32]) -> Vec<f32> {
    let max = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return vec![0.0; x.len()];
    }

    let mut out: Vec<f32> = x.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = out.iter().sum();
    for p in &mut out {
        *p /= sum;
    }
    out
}

/// Log-softmax over one row, computed with the log-sum-exp trick.
pub fn log_softmax(x: &[f32]) -> Vec<f32> {
    let max = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return vec![f32::NEG_INFINITY; x.len()];
    }
    let log_sum = x.iter().map(|&v| (v - max).exp()).sum::<f32>().ln() + max;
    x.iter().map(|&v| v - log_sum).collect()
}

/// Index of the largest value; the earliest index wins ties and NaN is
/// never selected. Returns `None` for an empty row or an all-NaN row.
pub fn argmax(x: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in x.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
