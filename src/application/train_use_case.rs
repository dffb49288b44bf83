// ============================================================
// Layer 2: TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate config and plan the network (Layer 3 - domain)
//   Step 2: Load the train / test splits         (Layer 4 - data)
//   Step 3: Resolve colour normalisation         (Layer 4 - data)
//   Step 4: Build datasets                       (Layer 4 - data)
//   Step 5: Save config                          (Layer 6 - infra)
//   Step 6: Run training loop + final evaluation (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    augment::Augmenter,
    dataset::ImageDataset,
    loader::{Cifar10Loader, CIFAR10_CLASSES},
    preprocessor::ColorNormalizer,
};
use crate::domain::{
    architecture::{ArchitecturePlan, BlockStyle},
    image::{ImageShape, Split},
    schedule::StepSchedule,
    traits::ImageSource,
};
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::{backend::DeviceKind, model::ResNetV2Config, trainer::{run_training, TrainReport}};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Saved next to the
// checkpoints so `evaluate` can rebuild the same network and
// apply the same preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:          String,
    pub checkpoint_dir:    String,
    pub epochs:            usize,
    pub batch_size:        usize,
    pub eval_batch_size:   usize,
    pub lr:                f64,
    pub lr_milestones:     Vec<usize>,
    pub lr_gamma:          f64,
    pub momentum:          f64,
    pub nesterov:          bool,
    /// L2 coefficient on convolution and dense kernels
    pub weight_decay:      f64,
    pub filters:           [usize; 3],
    pub stacks:            usize,
    pub block_style:       BlockStyle,
    pub num_classes:       usize,
    pub augment:           bool,
    pub fit_normalization: bool,
    pub normalizer:        ColorNormalizer,
    pub limit:             Option<usize>,
    pub seed:              u64,
    pub num_workers:       usize,
    pub device:            DeviceKind,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:          "data/cifar-10-batches-bin".to_string(),
            checkpoint_dir:    "checkpoints".to_string(),
            epochs:            200,
            batch_size:        128,
            eval_batch_size:   256,
            lr:                0.1,
            lr_milestones:     vec![80, 150],
            lr_gamma:          0.1,
            momentum:          0.9,
            nesterov:          true,
            weight_decay:      1e-4,
            filters:           [16, 32, 64],
            stacks:            9,
            block_style:       BlockStyle::Basic,
            num_classes:       CIFAR10_CLASSES,
            augment:           true,
            fit_normalization: false,
            normalizer:        ColorNormalizer::cifar10(),
            limit:             None,
            seed:              42,
            num_workers:       4,
            device:            DeviceKind::Wgpu,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.epochs > 0, "epochs must be at least 1");
        ensure!(self.batch_size > 0, "batch size must be at least 1");
        ensure!(self.eval_batch_size > 0, "evaluation batch size must be at least 1");
        ensure!(self.num_workers > 0, "need at least one data loader worker");
        ensure!(
            (0.0..1.0).contains(&self.momentum),
            "momentum must be in [0, 1), got {}",
            self.momentum
        );
        ensure!(self.weight_decay >= 0.0, "weight decay must not be negative");
        self.schedule()?;
        self.plan()?;
        Ok(())
    }

    pub fn model_config(&self) -> ResNetV2Config {
        ResNetV2Config::new(self.num_classes)
            .with_filters(self.filters)
            .with_stacks(self.stacks)
            .with_block_style(self.block_style)
            .with_input(ImageShape::CIFAR10)
    }

    pub fn plan(&self) -> Result<ArchitecturePlan> {
        self.model_config().plan()
    }

    pub fn schedule(&self) -> Result<StepSchedule> {
        StepSchedule::new(self.lr, self.lr_milestones.clone(), self.lr_gamma)
    }

    pub fn augmenter(&self) -> Option<Augmenter> {
        self.augment.then(Augmenter::default)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(mut self) -> Result<TrainReport> {
        // ── Step 1: Validate ──────────────────────────────────────────────────
        self.config.validate()?;
        let plan = self.config.plan()?;
        tracing::info!(
            "Training ResNet-v2 ({:?}) depth {} with {} trainable params",
            plan.style, plan.depth(), plan.trainable_params()
        );

        // ── Step 2: Load data ─────────────────────────────────────────────────
        let loader = Cifar10Loader::new(&self.config.data_dir).with_limit(self.config.limit);
        ensure!(
            loader.num_classes() == self.config.num_classes,
            "dataset has {} classes but the model is configured for {}",
            loader.num_classes(),
            self.config.num_classes
        );
        let train_images = loader.load(Split::Train)?;
        let test_images  = loader.load(Split::Test)?;
        ensure!(!train_images.is_empty(), "training split is empty");
        ensure!(!test_images.is_empty(), "test split is empty");

        // ── Step 3: Colour normalisation ──────────────────────────────────────
        if self.config.fit_normalization {
            self.config.normalizer = ColorNormalizer::fit(&train_images, loader.shape())?;
        }

        // ── Step 4: Build Burn datasets ───────────────────────────────────────
        let train_dataset = ImageDataset::new(train_images);
        let test_dataset  = ImageDataset::new(test_images);
        tracing::debug!(
            "Training class counts: {:?}",
            train_dataset.class_counts(self.config.num_classes)
        );

        // ── Step 5: Save config for evaluation ────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&self.config.checkpoint_dir)?;
        ckpt_manager.save_config(&self.config)?;
        let metrics = MetricsLogger::new(&self.config.checkpoint_dir)?;
        tracing::info!("Epoch metrics go to '{}'", metrics.csv_path().display());

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        run_training(&self.config, train_dataset, test_dataset, &ckpt_manager, &metrics)
    }
}
