//! Training and evaluation loops.
//!
//! A [`Session`] owns the data-parallel model, the optimizer and the
//! learning-rate schedule for one run. Each step is scatter, parallel
//! forward, gather, then loss, backward, clipping, optimizer step and
//! schedule step on the primary module. A step that exhausts device memory
//! is dropped as a whole: the schedule does not advance, cached device
//! memory is released and the epoch moves on to the next batch.

use dr_model::ModelError;
use tracing::{debug, info, warn};

use crate::config::TrainConfig;
use crate::error::{Result, TrainError};
use crate::loss::shifted_cross_entropy;
use crate::parallel::{DataParallel, TrainableModel};
use crate::schedule::LinearWarmup;

/// Applies accumulated gradients to a model's parameters.
pub trait Optimizer<M> {
    fn step(&mut self, model: &mut M, lr: f32) -> std::result::Result<(), ModelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Eval,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutput {
    pub loss: f32,
    pub accuracy: f32,
    /// Gradient norm before clipping. Zero in the eval phase.
    pub grad_norm: f32,
    pub lr: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EpochSummary {
    pub mean_loss: f32,
    pub mean_accuracy: f32,
    pub batches: usize,
    pub skipped_oom: usize,
}

pub struct Session<M, O> {
    model: DataParallel<M>,
    optimizer: O,
    schedule: LinearWarmup,
    config: TrainConfig,
    oom_count: usize,
}

impl<M, O> Session<M, O>
where
    M: TrainableModel,
    O: Optimizer<M>,
{
    pub fn new(model: M, optimizer: O, config: TrainConfig) -> Result<Self> {
        let devices = config.device_ids()?;
        let model = DataParallel::new(model, devices, config.gpu0_share)?;
        let schedule = LinearWarmup::new(config.lr, config.warmup_steps, config.total_steps);
        info!(
            devices = ?model.devices(),
            lr = config.lr,
            warmup = config.warmup_steps,
            "training session ready"
        );
        Ok(Self {
            model,
            optimizer,
            schedule,
            config,
            oom_count: 0,
        })
    }

    /// Run one batch. In the train phase the model is updated.
    pub fn step(&mut self, batch: &[Vec<u32>], phase: Phase) -> Result<StepOutput> {
        if phase == Phase::Train {
            self.model.module_mut().zero_grad();
        }
        let logits = self.model.forward(batch)?;
        let out = shifted_cross_entropy(&logits, batch, self.config.pad_id)?;

        let mut grad_norm = 0.0;
        let lr = self.schedule.lr();
        if phase == Phase::Train {
            let module = self.model.module_mut();
            module.backward(batch, &out.grad)?;
            grad_norm = module.clip_grad_norm(self.config.grad_clip);
            self.optimizer.step(module, lr)?;
            // Only a completed update moves the schedule.
            self.schedule.step();
        }

        Ok(StepOutput {
            loss: out.stats.loss,
            accuracy: out.stats.accuracy,
            grad_norm,
            lr,
        })
    }

    /// Run every batch once. Batches that exhaust device memory are
    /// counted and skipped; any other error ends the epoch.
    pub fn run_epoch<I>(&mut self, batches: I, phase: Phase) -> Result<EpochSummary>
    where
        I: IntoIterator<Item = Vec<Vec<u32>>>,
    {
        let mut summary = EpochSummary::default();
        let (mut loss_sum, mut acc_sum) = (0.0f32, 0.0f32);

        for (index, batch) in batches.into_iter().enumerate() {
            match self.step(&batch, phase) {
                Ok(out) => {
                    loss_sum += out.loss;
                    acc_sum += out.accuracy;
                    summary.batches += 1;
                    debug!(
                        batch = index,
                        loss = out.loss,
                        accuracy = out.accuracy,
                        lr = out.lr,
                        "step done"
                    );
                }
                Err(TrainError::ResourceExhausted(msg)) => {
                    self.oom_count += 1;
                    summary.skipped_oom += 1;
                    self.model.module().release_cached_memory();
                    warn!(batch = index, oom_count = self.oom_count, %msg, "ran out of memory, skipping batch");
                }
                Err(e) => return Err(e),
            }
        }

        if summary.batches > 0 {
            summary.mean_loss = loss_sum / summary.batches as f32;
            summary.mean_accuracy = acc_sum / summary.batches as f32;
        }
        info!(
            phase = ?phase,
            batches = summary.batches,
            skipped = summary.skipped_oom,
            loss = summary.mean_loss,
            accuracy = summary.mean_accuracy,
            "epoch finished"
        );
        Ok(summary)
    }

    pub fn train_epoch<I>(&mut self, batches: I) -> Result<EpochSummary>
    where
        I: IntoIterator<Item = Vec<Vec<u32>>>,
    {
        self.run_epoch(batches, Phase::Train)
    }

    pub fn evaluate<I>(&mut self, batches: I) -> Result<EpochSummary>
    where
        I: IntoIterator<Item = Vec<Vec<u32>>>,
    {
        self.run_epoch(batches, Phase::Eval)
    }

    /// Out-of-memory skips over the whole session.
    pub fn oom_count(&self) -> usize {
        self.oom_count
    }

    pub fn schedule(&self) -> &LinearWarmup {
        &self.schedule
    }

    pub fn model(&self) -> &M {
        self.model.module()
    }

    /// End the session, handing back the model and optimizer.
    pub fn into_parts(self) -> (M, O) {
        (self.model.into_inner(), self.optimizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::tests::EchoModel;
    use crate::replay::ReplayBuffer;
    use dr_model::{SpecialTokens, Tokenizer};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingOptimizer {
        steps: Vec<f32>,
    }

    impl Optimizer<EchoModel> for CountingOptimizer {
        fn step(&mut self, _model: &mut EchoModel, lr: f32) -> std::result::Result<(), ModelError> {
            self.steps.push(lr);
            Ok(())
        }
    }

    fn config(devices: &str) -> TrainConfig {
        TrainConfig {
            lr: 1.0,
            warmup_steps: 2,
            total_steps: 10,
            devices: devices.to_string(),
            gpu0_share: 1,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_train_step_updates_model() {
        let mut session = Session::new(EchoModel::new(8), CountingOptimizer::default(), config("0")).unwrap();
        let out = session.step(&[vec![2, 5, 6]], Phase::Train).unwrap();
        assert!(out.loss > 0.0);
        // The first update runs at the start of warmup.
        assert_eq!(out.lr, 0.0);
        assert_eq!(session.schedule().current_step(), 1);
        assert_eq!(session.model().backward_calls, 1);
        assert_eq!(session.model().clipped_to, Some(1.0));

        let (_, opt) = session.into_parts();
        assert_eq!(opt.steps, vec![0.0]);
    }

    #[test]
    fn test_updates_follow_the_schedule() {
        let mut session = Session::new(EchoModel::new(8), CountingOptimizer::default(), config("0")).unwrap();
        session.train_epoch(vec![vec![vec![2, 5, 6]]; 3]).unwrap();
        let (_, opt) = session.into_parts();
        assert_eq!(opt.steps, vec![0.0, 0.5, 1.0]);
    }

    /// Fails every update with an out-of-memory error.
    struct ExhaustedOptimizer;

    impl Optimizer<EchoModel> for ExhaustedOptimizer {
        fn step(&mut self, _model: &mut EchoModel, _lr: f32) -> std::result::Result<(), ModelError> {
            Err(ModelError::OutOfMemory("optimizer state".to_string()))
        }
    }

    #[test]
    fn test_failed_update_leaves_schedule_alone() {
        let mut session = Session::new(EchoModel::new(8), ExhaustedOptimizer, config("0")).unwrap();
        let summary = session.train_epoch(vec![vec![vec![2, 5, 6]]]).unwrap();
        assert_eq!(summary.skipped_oom, 1);
        assert_eq!(summary.batches, 0);
        assert_eq!(session.schedule().current_step(), 0);
        assert_eq!(session.schedule().lr(), 0.0);
    }

    #[test]
    fn test_eval_does_not_update() {
        let mut session = Session::new(EchoModel::new(8), CountingOptimizer::default(), config("0,1")).unwrap();
        let summary = session.evaluate(vec![vec![vec![2, 5], vec![2, 6]]]).unwrap();
        assert_eq!(summary.batches, 1);
        assert_eq!(session.model().backward_calls, 0);
        assert_eq!(session.schedule().current_step(), 0);
    }

    #[test]
    fn test_out_of_memory_batches_are_skipped() {
        let mut model = EchoModel::new(8);
        model.fail_on_device = Some(1);
        let mut session = Session::new(model, CountingOptimizer::default(), config("0,1")).unwrap();

        // A single-sample batch lands on device 0 only and succeeds; the
        // larger batch reaches device 1 and fails.
        let batches = vec![vec![vec![2, 5]], vec![vec![2, 5]; 6], vec![vec![2, 6]]];
        let summary = session.train_epoch(batches).unwrap();
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.skipped_oom, 1);
        assert_eq!(session.oom_count(), 1);

        let (model, opt) = session.into_parts();
        assert_eq!(model.backward_calls, 2);
        assert_eq!(opt.steps.len(), 2);
    }

    #[test]
    fn test_other_errors_end_the_epoch() {
        let mut session = Session::new(EchoModel::new(8), CountingOptimizer::default(), config("0")).unwrap();
        // All targets are padding.
        let err = session.train_epoch(vec![vec![vec![2, 0]]]).unwrap_err();
        assert!(matches!(err, TrainError::InvalidBatch(_)));
    }

    #[test]
    fn test_epoch_over_replay_buffer() {
        struct Ids;
        impl Tokenizer for Ids {
            fn encode(&self, _text: &str) -> Vec<u32> {
                Vec::new()
            }
            fn decode(&self, ids: &[u32]) -> String {
                format!("{:?}", ids)
            }
            fn special(&self) -> SpecialTokens {
                SpecialTokens {
                    pad: 0,
                    unk: 1,
                    cls: 2,
                    sep: 3,
                }
            }
        }

        let mut replay = ReplayBuffer::new(Arc::new(Ids), 8, 2);
        replay.push_many((4..7).map(|i| (vec![2, i], vec![2, i, 3], 0.5)));

        let mut session = Session::new(EchoModel::new(8), CountingOptimizer::default(), config("0")).unwrap();
        let summary = session.train_epoch(&mut replay).unwrap();
        assert_eq!(summary.batches, 2);
        assert_eq!(replay.len(), 3);
    }

    #[test]
    fn test_bad_device_list_is_rejected() {
        let result = Session::new(EchoModel::new(8), CountingOptimizer::default(), config("0,x"));
        assert!(matches!(result, Err(TrainError::Config(_))));
    }
}
