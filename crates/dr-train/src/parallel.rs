use dr_model::ModelError;
use dr_tensor::Tensor;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Result, TrainError};
use crate::partition::DevicePlan;

/// A model that can be trained and copied onto other devices.
///
/// Parameters and gradients are owned by the implementation; the training
/// loop only sees token batches in and logits out.
pub trait TrainableModel: Send + Sync {
    /// Copy the model onto `device` for one data-parallel forward pass.
    fn replicate(&self, device: usize) -> std::result::Result<Self, ModelError>
    where
        Self: Sized;

    /// Logits for every position of every row, shaped `[batch, seq, vocab]`.
    fn forward(&self, batch: &[Vec<u32>]) -> std::result::Result<Tensor, ModelError>;

    /// Accumulate gradients given the loss gradient w.r.t. the logits.
    fn backward(
        &mut self,
        batch: &[Vec<u32>],
        grad_logits: &Tensor,
    ) -> std::result::Result<(), ModelError>;

    fn zero_grad(&mut self);

    /// Rescale gradients so their global norm is at most `max_norm`.
    /// Returns the norm measured before clipping.
    fn clip_grad_norm(&mut self, max_norm: f32) -> f32;

    /// Drop any cached device allocations after a failed step.
    fn release_cached_memory(&self) {}
}

/// Splits each batch across devices, runs the chunks concurrently and joins
/// the outputs back in batch order.
pub struct DataParallel<M> {
    module: M,
    devices: Vec<usize>,
    gpu0_share: usize,
}

impl<M: TrainableModel> DataParallel<M> {
    pub fn new(module: M, devices: Vec<usize>, gpu0_share: usize) -> Result<Self> {
        if devices.is_empty() {
            return Err(TrainError::Config(
                "data parallel needs at least one device".to_string(),
            ));
        }
        Ok(Self {
            module,
            devices,
            gpu0_share,
        })
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    pub fn devices(&self) -> &[usize] {
        &self.devices
    }

    pub fn into_inner(self) -> M {
        self.module
    }

    /// Forward pass over `batch`, scattered by a fresh [`DevicePlan`].
    ///
    /// With a single device the wrapped module runs the whole batch
    /// directly. Otherwise each non-empty chunk runs on its own replica and
    /// the per-chunk logits are concatenated along the batch dimension.
    pub fn forward(&self, batch: &[Vec<u32>]) -> Result<Tensor> {
        if batch.is_empty() {
            return Err(TrainError::InvalidBatch("empty batch".to_string()));
        }
        if self.devices.len() == 1 {
            return Ok(self.module.forward(batch)?);
        }

        let plan = DevicePlan::new(batch.len(), self.devices.len(), self.gpu0_share)?;
        let chunks = plan.split(batch)?;
        debug!(
            batch = batch.len(),
            chunks = ?plan.chunk_sizes(),
            "scattering batch"
        );

        let replicas = chunks
            .iter()
            .map(|(index, _)| self.module.replicate(self.devices[*index]))
            .collect::<std::result::Result<Vec<M>, ModelError>>()?;

        let outputs = replicas
            .par_iter()
            .zip(chunks.par_iter())
            .map(|(replica, (_, chunk))| replica.forward(chunk))
            .collect::<std::result::Result<Vec<Tensor>, ModelError>>()?;

        Ok(Tensor::cat(&outputs)?)
    }
}
