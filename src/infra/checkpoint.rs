// ============================================================
// Layer 6: Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved:
//   1. Model weights (.mpk.gz file): one per epoch
//   2. latest_epoch.json           : which epoch was last saved
//   3. train_config.json           : architecture + preprocessing
//
// File naming convention:
//   checkpoints/
//     model_epoch_1.mpk.gz   ← weights after epoch 1
//     model_epoch_2.mpk.gz   ← weights after epoch 2
//     ...
//     latest_epoch.json      ← contains the number of latest epoch
//     train_config.json      ← TrainConfig used for the run
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::ResNetV2;

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Save model weights for a given epoch and point
    /// latest_epoch.json at them.
    pub fn save_model<B: Backend>(&self, model: &ResNetV2<B>, epoch: usize) -> Result<()> {
        // Recorder adds the .mpk.gz extension
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", path.display())
            })?;

        let latest_path = self.dir.join("latest_epoch.json");
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| "Failed to write latest_epoch.json")?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the latest saved weights into `model`.
    ///
    /// The model must have the same architecture as the one that
    /// was saved or loading will fail.
    pub fn load_model<B: Backend>(
        &self,
        model:  ResNetV2<B>,
        device: &B::Device,
    ) -> Result<ResNetV2<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Save the training configuration to JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| {
                format!("Cannot write config to '{}'", path.display())
            })?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the training configuration saved by `save_config`.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' before 'evaluate'.",
                    path.display()
                )
            })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Invalid config in '{}'", path.display()))
    }

    /// Epoch number recorded in latest_epoch.json.
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join("latest_epoch.json");

        let s = fs::read_to_string(&path)
            .with_context(|| {
                "Cannot find 'latest_epoch.json'. \
                 Have you run 'train' first?"
            })?;

        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::image::ImageShape;
    use crate::ml::model::ResNetV2Config;
    use burn::backend::NdArray;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("resnet-v2-cifar-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = scratch_dir("config");
        let ckpt = CheckpointManager::new(&dir).unwrap();

        let cfg = TrainConfig { epochs: 3, stacks: 2, ..TrainConfig::default() };
        ckpt.save_config(&cfg).unwrap();
        let loaded = ckpt.load_config().unwrap();

        assert_eq!(loaded.epochs, 3);
        assert_eq!(loaded.stacks, 2);
        assert_eq!(loaded.normalizer, cfg.normalizer);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir  = scratch_dir("missing");
        let ckpt = CheckpointManager::new(&dir).unwrap();
        assert!(ckpt.latest_epoch().is_err());
        assert!(ckpt.load_config().is_err());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_model_round_trip_uses_latest_epoch() {
        type B = NdArray;
        let dir    = scratch_dir("model");
        let ckpt   = CheckpointManager::new(&dir).unwrap();
        let device = Default::default();
        let cfg    = ResNetV2Config::new(10)
            .with_filters([2, 4, 8])
            .with_stacks(1)
            .with_input(ImageShape::new(3, 8, 8));

        let model: ResNetV2<B> = cfg.init(&device).unwrap();
        ckpt.save_model(&model, 1).unwrap();
        ckpt.save_model(&model, 2).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        let fresh: ResNetV2<B> = cfg.init(&device).unwrap();
        let loaded = ckpt.load_model(fresh, &device).unwrap();
        assert_eq!(loaded.num_blocks(), model.num_blocks());
        fs::remove_dir_all(&dir).ok();
    }
}
