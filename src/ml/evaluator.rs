// ============================================================
// Layer 5: Evaluator
// ============================================================
// Runs a model over a labelled image set without gradients and
// reports sample-weighted mean loss and top-1 accuracy. Used for
// the per-epoch validation pass, the final test evaluation, and
// the stand-alone `evaluate` command.

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
    train::ClassificationOutput,
};
use std::sync::Arc;

use crate::data::{batcher::{ImageBatch, ImageBatcher}, dataset::ImageDataset, preprocessor::ColorNormalizer};
use crate::domain::image::ImageShape;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::backend::{cpu_device, gpu_device, CpuBackend, DeviceKind, GpuBackend};
use crate::ml::model::ResNetV2;

/// Running totals over a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvalStats {
    loss_sum: f64,
    correct:  usize,
    samples:  usize,
}

impl EvalStats {
    /// Add one batch given its mean loss.
    pub fn record(&mut self, mean_loss: f64, correct: usize, samples: usize) {
        self.loss_sum += mean_loss * samples as f64;
        self.correct  += correct;
        self.samples  += samples;
    }

    pub fn record_output<B: Backend>(&mut self, output: &ClassificationOutput<B>) {
        let (loss, correct, samples) = batch_stats(output);
        self.record(loss, correct, samples);
    }

    pub fn mean_loss(&self) -> f64 {
        if self.samples > 0 { self.loss_sum / self.samples as f64 } else { f64::NAN }
    }

    pub fn accuracy(&self) -> f64 {
        if self.samples > 0 { self.correct as f64 / self.samples as f64 } else { 0.0 }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }
}

/// (mean loss, correct predictions, batch size) of one batch.
pub fn batch_stats<B: Backend>(output: &ClassificationOutput<B>) -> (f64, usize, usize) {
    let loss: f64 = output.loss.clone().into_scalar().elem();

    // argmax(1) returns shape [batch, 1]: flatten to [batch]
    let predicted = output.output.clone().argmax(1).flatten::<1>(0, 1);
    let correct: i64 = predicted
        .equal(output.targets.clone())
        .int().sum().into_scalar().elem();

    (loss, correct as usize, output.targets.dims()[0])
}

pub fn evaluate<B: Backend>(
    model:  &ResNetV2<B>,
    loader: &Arc<dyn DataLoader<ImageBatch<B>>>,
) -> EvalStats {
    let mut stats = EvalStats::default();
    for batch in loader.iter() {
        let output = model.forward_classification(batch.images, batch.targets);
        stats.record_output(&output);
    }
    stats
}

/// A trained model plus everything needed to feed it test images.
pub struct Evaluator<B: Backend> {
    model:      ResNetV2<B>,
    device:     B::Device,
    shape:      ImageShape,
    normalizer: ColorNormalizer,
}

impl<B: Backend> Evaluator<B> {
    pub fn new(model: ResNetV2<B>, device: B::Device, shape: ImageShape, normalizer: ColorNormalizer) -> Self {
        Self { model, device, shape, normalizer }
    }

    /// Rebuild the architecture from the saved config and load the
    /// latest weights into it.
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, device: B::Device) -> Result<Self> {
        let cfg   = ckpt_manager.load_config()?;
        let model = cfg.model_config().init::<B>(&device)?;
        let model = ckpt_manager.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint");
        Ok(Self::new(model, device, cfg.model_config().input, cfg.normalizer))
    }

    pub fn evaluate(&self, dataset: ImageDataset, batch_size: usize, num_workers: usize) -> EvalStats {
        let batcher = ImageBatcher::<B>::new(self.device.clone(), self.shape, self.normalizer.clone());
        let loader  = DataLoaderBuilder::new(batcher)
            .batch_size(batch_size)
            .num_workers(num_workers)
            .build(dataset);
        evaluate(&self.model, &loader)
    }
}

/// Load the latest checkpoint on the requested device and score it.
pub fn evaluate_checkpoint(
    ckpt_manager: &CheckpointManager,
    device:       DeviceKind,
    dataset:      ImageDataset,
    batch_size:   usize,
    num_workers:  usize,
) -> Result<EvalStats> {
    let stats = match device {
        DeviceKind::Wgpu => {
            let device = gpu_device();
            tracing::info!("Using WGPU device: {:?}", device);
            Evaluator::<GpuBackend>::from_checkpoint(ckpt_manager, device)?
                .evaluate(dataset, batch_size, num_workers)
        }
        DeviceKind::Cpu => {
            Evaluator::<CpuBackend>::from_checkpoint(ckpt_manager, cpu_device())?
                .evaluate(dataset, batch_size, num_workers)
        }
    };
    Ok(stats)
}
