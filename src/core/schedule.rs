//! Learning-rate reduction when the monitored loss stops improving

/// Reduce-on-plateau learning-rate schedule
///
/// Tracks the best loss seen so far. After `patience` consecutive epochs
/// without an improvement larger than `min_delta`, the rate is multiplied by
/// `factor`, never going below `min_lr`.
#[derive(Clone, Debug)]
pub struct PlateauScheduler {
    patience: usize,
    factor: f64,
    min_lr: f64,
    min_delta: f64,
    best_loss: f64,
    epochs_without_improvement: usize,
}

impl PlateauScheduler {
    pub fn new(patience: usize, factor: f64, min_lr: f64, min_delta: f64) -> Self {
        Self {
            patience: patience.max(1),
            factor,
            min_lr,
            min_delta,
            best_loss: f64::INFINITY,
            epochs_without_improvement: 0,
        }
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    /// Record an epoch's loss; returns the new rate when it was reduced
    pub fn observe(&mut self, loss: f64, current_lr: f64) -> Option<f64> {
        if loss < self.best_loss - self.min_delta {
            self.best_loss = loss;
            self.epochs_without_improvement = 0;
            return None;
        }

        self.epochs_without_improvement += 1;
        if self.epochs_without_improvement < self.patience {
            return None;
        }

        let next = (current_lr * self.factor).max(self.min_lr);
        if next < current_lr {
            self.epochs_without_improvement = 0;
            Some(next)
        } else {
            None
        }
    }
}
