/// Linear warmup to `base_lr`, then linear decay to zero at `total_steps`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearWarmup {
    base_lr: f32,
    warmup_steps: usize,
    total_steps: usize,
    step: usize,
}

impl LinearWarmup {
    pub fn new(base_lr: f32, warmup_steps: usize, total_steps: usize) -> Self {
        Self {
            base_lr,
            warmup_steps,
            total_steps,
            step: 0,
        }
    }

    /// Learning rate for the current step.
    pub fn lr(&self) -> f32 {
        self.lr_at(self.step)
    }

    pub fn lr_at(&self, step: usize) -> f32 {
        if step < self.warmup_steps {
            return self.base_lr * step as f32 / self.warmup_steps.max(1) as f32;
        }
        let remaining = self.total_steps.saturating_sub(step) as f32;
        let span = self.total_steps.saturating_sub(self.warmup_steps).max(1) as f32;
        self.base_lr * (remaining / span).max(0.0)
    }

    /// Advance one step and return the rate to use for it.
    pub fn step(&mut self) -> f32 {
        self.step += 1;
        self.lr()
    }

    pub fn current_step(&self) -> usize {
        self.step
    }
}
