// ============================================================
// Layer 2: EvaluateUseCase
// ============================================================
// Rebuilds the network from a checkpoint directory and scores it
// on the CIFAR-10 test split.

use anyhow::Result;

use crate::data::{dataset::ImageDataset, loader::Cifar10Loader};
use crate::domain::{image::Split, traits::ImageSource};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{backend::DeviceKind, evaluator::{evaluate_checkpoint, EvalStats}};

pub struct EvaluateUseCase {
    checkpoint_dir: String,
    data_dir:       Option<String>,
    device:         Option<DeviceKind>,
    batch_size:     usize,
    limit:          Option<usize>,
}

impl EvaluateUseCase {
    pub fn new(checkpoint_dir: String) -> Self {
        Self { checkpoint_dir, data_dir: None, device: None, batch_size: 256, limit: None }
    }

    /// Override the dataset directory recorded at training time.
    pub fn with_data_dir(mut self, data_dir: Option<String>) -> Self {
        self.data_dir = data_dir;
        self
    }

    /// Override the device recorded at training time.
    pub fn with_device(mut self, device: Option<DeviceKind>) -> Self {
        self.device = device;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn execute(&self) -> Result<EvalStats> {
        let ckpt_manager = CheckpointManager::new(&self.checkpoint_dir)?;
        let cfg          = ckpt_manager.load_config()?;

        let data_dir = self.data_dir.clone().unwrap_or_else(|| cfg.data_dir.clone());
        let device   = self.device.unwrap_or(cfg.device);

        let loader = Cifar10Loader::new(data_dir).with_limit(self.limit);
        let images = loader.load(Split::Test)?;
        anyhow::ensure!(!images.is_empty(), "test split is empty");

        evaluate_checkpoint(
            &ckpt_manager,
            device,
            ImageDataset::new(images),
            self.batch_size.max(1),
            cfg.num_workers,
        )
    }
}
