//! Test-set artifacts: generated responses written next to their contexts
//! and references, for offline metric computation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use dr_model::generate::keep_last;
use dr_model::{truncate_at_stop, Decoder, SequenceModel, Tokenizer};
use rand::Rng;
use tracing::info;

use crate::error::Result;

/// Decode one response per `(context, reference)` pair and write
///
/// ```text
/// CTX: <context>
/// REF: <reference>
/// TGT: <generated>
///
/// ```
///
/// blocks to `path`. Each response may run as long as its reference or
/// `max_len`, whichever is longer. Returns the number of pairs written.
pub fn write_predictions<M, R>(
    model: &mut M,
    tokenizer: &dyn Tokenizer,
    decoder: &Decoder,
    pairs: &[(Vec<u32>, Vec<u32>)],
    path: impl AsRef<Path>,
    max_len: usize,
    rng: &mut R,
) -> Result<usize>
where
    M: SequenceModel,
    R: Rng + ?Sized,
{
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);
    for (context, reference) in pairs {
        let len = reference.len().max(max_len);
        let generated = decoder.generate(model, context, len, rng)?;
        writeln!(out, "CTX: {}", tokenizer.decode(context))?;
        writeln!(out, "REF: {}", tokenizer.decode(reference))?;
        writeln!(out, "TGT: {}", tokenizer.decode(&generated))?;
        writeln!(out)?;
    }
    out.flush()?;
    info!(path = %path.display(), pairs = pairs.len(), "wrote predictions");
    Ok(pairs.len())
}

/// Like [`write_predictions`], but draws `samples` responses per context
/// in one batched decode and writes them as `TGT0:` ... `TGT{n-1}:` lines.
/// Each sample is cut at its first stop token.
#[allow(clippy::too_many_arguments)]
pub fn write_sampled_predictions<M, R>(
    model: &mut M,
    tokenizer: &dyn Tokenizer,
    decoder: &Decoder,
    pairs: &[(Vec<u32>, Vec<u32>)],
    path: impl AsRef<Path>,
    max_len: usize,
    samples: usize,
    rng: &mut R,
) -> Result<usize>
where
    M: SequenceModel,
    R: Rng + ?Sized,
{
    let path = path.as_ref();
    let budget = model.context_window().saturating_sub(max_len).max(1);
    let mut out = BufWriter::new(File::create(path)?);
    for (context, reference) in pairs {
        let prompt = keep_last(context, budget).to_vec();
        let rows = decoder.generate_batch(model, &vec![prompt; samples], max_len, rng)?;
        writeln!(out, "CTX: {}", tokenizer.decode(context))?;
        writeln!(out, "REF: {}", tokenizer.decode(reference))?;
        for (i, row) in rows.iter().enumerate() {
            let response = truncate_at_stop(row, decoder.stop_id());
            writeln!(out, "TGT{}: {}", i, tokenizer.decode(response))?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    info!(
        path = %path.display(),
        pairs = pairs.len(),
        samples,
        "wrote sampled predictions"
    );
    Ok(pairs.len())
}
