// ============================================================
// Layer 3: Step Learning-Rate Schedule
// ============================================================
// Piecewise-constant decay, evaluated once per epoch:
//
//   lr(epoch) = base_lr * gamma ^ (number of milestones <= epoch)
//
// The default recipe trains at 0.1, drops to 0.01 at epoch 80 and
// to 0.001 at epoch 150. Epochs are 0-indexed.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSchedule {
    base_lr:    f64,
    milestones: Vec<usize>,
    gamma:      f64,
}

impl StepSchedule {
    pub fn new(base_lr: f64, milestones: Vec<usize>, gamma: f64) -> Result<Self> {
        ensure!(base_lr > 0.0, "base learning rate must be positive, got {base_lr}");
        ensure!(
            gamma > 0.0 && gamma <= 1.0,
            "decay factor must be in (0, 1], got {gamma}"
        );
        ensure!(
            milestones.windows(2).all(|w| w[0] < w[1]),
            "milestones must be strictly increasing, got {:?}",
            milestones
        );
        Ok(Self { base_lr, milestones, gamma })
    }

    /// Learning rate to use for the given 0-indexed epoch.
    pub fn lr_at(&self, epoch: usize) -> f64 {
        let drops = self.milestones.iter().filter(|&&m| epoch >= m).count();
        self.base_lr * self.gamma.powi(drops as i32)
    }

    pub fn base_lr(&self) -> f64 {
        self.base_lr
    }

    pub fn milestones(&self) -> &[usize] {
        &self.milestones
    }
}

impl Default for StepSchedule {
    fn default() -> Self {
        Self { base_lr: 0.1, milestones: vec![80, 150], gamma: 0.1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_default_recipe() {
        let s = StepSchedule::default();
        assert!(close(s.lr_at(0), 1e-1));
        assert!(close(s.lr_at(79), 1e-1));
        assert!(close(s.lr_at(80), 1e-2));
        assert!(close(s.lr_at(149), 1e-2));
        assert!(close(s.lr_at(150), 1e-3));
        assert!(close(s.lr_at(199), 1e-3));
    }

    #[test]
    fn test_no_milestones_is_constant() {
        let s = StepSchedule::new(0.05, vec![], 0.5).unwrap();
        assert!(close(s.lr_at(0), 0.05));
        assert!(close(s.lr_at(1_000), 0.05));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(StepSchedule::new(0.0, vec![10], 0.1).is_err());
        assert!(StepSchedule::new(0.1, vec![10], 0.0).is_err());
        assert!(StepSchedule::new(0.1, vec![10], 1.5).is_err());
        assert!(StepSchedule::new(0.1, vec![20, 10], 0.1).is_err());
        assert!(StepSchedule::new(0.1, vec![10, 10], 0.1).is_err());
    }
}
