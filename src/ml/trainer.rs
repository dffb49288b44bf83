// ============================================================
// Layer 5: Training Loop
// ============================================================
// Fit loop using Burn's DataLoader and SGD:
//
//   for each epoch:
//     lr ← StepSchedule::lr_at(epoch)        (the LR callback)
//     for each shuffled, augmented batch:
//       forward → cross-entropy + λ·Σ‖W‖² → backward → SGD(momentum, Nesterov) step
//     validate on the held-out split with model.valid()
//     append metrics row, save checkpoint
//
//   final evaluation on the held-out split at a larger batch size
//
// Key Burn insight:
//   - Training uses Autodiff<Backend> for gradients
//   - model.valid() returns the model on the inner backend
//   - Validation batcher must also use the inner backend
//
// Reference: Burn Book §5, Sutskever et al. (2013) Nesterov momentum

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{momentum::MomentumConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::ImageBatcher, dataset::ImageDataset};
use crate::infra::{checkpoint::CheckpointManager, metrics::{EpochMetrics, MetricsLogger}};
use crate::ml::backend::{cpu_device, gpu_device, CpuTrainBackend, DeviceKind, GpuTrainBackend};
use crate::ml::evaluator::{evaluate, EvalStats, Evaluator};
use crate::ml::model::ResNetV2;

/// Outcome of a full training run.
#[derive(Debug, Clone, Copy)]
pub struct TrainReport {
    pub best_epoch:   usize,
    pub best_val_acc: f64,
    pub test:         EvalStats,
}

pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: ImageDataset,
    test_dataset:  ImageDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
) -> Result<TrainReport> {
    match cfg.device {
        DeviceKind::Wgpu => {
            let device = gpu_device();
            tracing::info!("Using WGPU device: {:?}", device);
            train_loop::<GpuTrainBackend>(cfg, train_dataset, test_dataset, ckpt_manager, metrics, device)
        }
        DeviceKind::Cpu => {
            tracing::info!("Using NdArray CPU backend");
            train_loop::<CpuTrainBackend>(cfg, train_dataset, test_dataset, ckpt_manager, metrics, cpu_device())
        }
    }
}

/// SGD with (Nesterov) momentum and no dampening. Regularisation is
/// part of the loss, see [`training_loss`].
pub fn optimizer_config(cfg: &TrainConfig) -> SgdConfig {
    let momentum = MomentumConfig::new()
        .with_momentum(cfg.momentum)
        .with_dampening(0.0)
        .with_nesterov(cfg.nesterov);

    SgdConfig::new().with_momentum(Some(momentum))
}

/// Data loss plus `l2 * Σ‖W‖²` over convolution and dense kernels.
/// BatchNorm parameters and biases are left unregularised.
pub fn training_loss<B: Backend>(model: &ResNetV2<B>, data_loss: Tensor<B, 1>, l2: f64) -> Tensor<B, 1> {
    if l2 > 0.0 {
        data_loss + model.l2_penalty().mul_scalar(l2)
    } else {
        data_loss
    }
}

fn train_loop<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: ImageDataset,
    test_dataset:  ImageDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
    device:        B::Device,
) -> Result<TrainReport> {
    B::seed(cfg.seed);

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = cfg.model_config();
    let plan      = model_cfg.plan()?;
    tracing::info!("Architecture:\n{}", plan.render_table());
    let mut model: ResNetV2<B> = model_cfg.init(&device)?;
    let (out_h, out_w) = plan.output_hw();
    tracing::info!(
        "Model ready: depth {}, {} blocks, {} parameters, {}x{}x{} feature map",
        plan.depth(), model.num_blocks(), model.num_params(),
        plan.feature_channels(), out_h, out_w
    );
    tracing::info!(
        "Normalisation mean {:?} std {:?}",
        cfg.normalizer.mean(), cfg.normalizer.std()
    );

    // ── SGD with Nesterov momentum ────────────────────────────────────────────
    // v = μ*v + g
    // θ = θ - lr * (g + μ*v)
    let mut optim = optimizer_config(cfg).init();
    let schedule  = cfg.schedule()?;
    tracing::info!(
        "SGD lr {} (x{} at epochs {:?}), momentum {}, nesterov {}, l2 {}",
        schedule.base_lr(), cfg.lr_gamma, schedule.milestones(),
        cfg.momentum, cfg.nesterov, cfg.weight_decay
    );

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_batcher = ImageBatcher::<B>::new(device.clone(), model_cfg.input, cfg.normalizer.clone())
        .with_augmenter(cfg.augmenter());
    let train_loader = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers)
        .build(train_dataset);

    // ── Validation data loader (InnerBackend: no autodiff overhead) ──────────
    let val_batcher = ImageBatcher::<B::InnerBackend>::new(device.clone(), model_cfg.input, cfg.normalizer.clone());
    let val_loader  = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.eval_batch_size)
        .num_workers(cfg.num_workers)
        .build(test_dataset.clone());

    let mut best_epoch   = 0usize;
    let mut best_val_acc = f64::NEG_INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 0..cfg.epochs {
        let lr = schedule.lr_at(epoch);
        tracing::debug!("Epoch {} learning rate {}", epoch + 1, lr);

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_stats = EvalStats::default();

        for batch in train_loader.iter() {
            let output = model.forward_classification(batch.images, batch.targets);
            train_stats.record_output(&output);

            let loss  = training_loss(&model, output.loss, cfg.weight_decay);
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        // model.valid() → ResNetV2<InnerBackend>, batch norm uses running stats
        let val_stats = evaluate(&model.valid(), &val_loader);

        println!(
            "Epoch {:>3}/{} | lr={:.4} | loss={:.4} | acc={:.2}% | val_loss={:.4} | val_acc={:.2}%",
            epoch + 1, cfg.epochs, lr,
            train_stats.mean_loss(), train_stats.accuracy() * 100.0,
            val_stats.mean_loss(), val_stats.accuracy() * 100.0,
        );

        let row = EpochMetrics::new(
            epoch + 1, lr,
            train_stats.mean_loss(), train_stats.accuracy(),
            val_stats.mean_loss(), val_stats.accuracy(),
        );
        if row.is_improvement(best_val_acc) {
            best_val_acc = row.val_acc;
            best_epoch   = row.epoch;
        }
        metrics.log(&row)?;

        ckpt_manager.save_model(&model, epoch + 1)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch + 1);
    }

    // ── Final evaluation ──────────────────────────────────────────────────────
    let evaluator = Evaluator::<B::InnerBackend>::new(model.valid(), device, model_cfg.input, cfg.normalizer.clone());
    let test      = evaluator.evaluate(test_dataset, cfg.eval_batch_size, cfg.num_workers);
    tracing::info!(
        "Final evaluation on {} images: loss {:.4}, accuracy {:.4}",
        test.samples(), test.mean_loss(), test.accuracy()
    );

    tracing::info!("Training complete!");
    Ok(TrainReport { best_epoch, best_val_acc, test })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::image::ImageShape;
    use crate::ml::model::ResNetV2Config;
    use burn::{
        backend::{Autodiff, NdArray},
        module::Param,
        tensor::Distribution,
    };

    type TestBackend = Autodiff<NdArray>;

    #[derive(Module, Debug)]
    struct Scalar<B: Backend> {
        w: Param<Tensor<B, 1>>,
    }

    /// Value of a single weight after each of two steps with a constant
    /// gradient of 2 and lr 0.1.
    fn two_steps(cfg: &TrainConfig) -> Vec<f32> {
        let device    = Default::default();
        let mut model = Scalar::<TestBackend> { w: Param::from_tensor(Tensor::zeros([1], &device)) };
        let mut optim = optimizer_config(cfg).init();

        let mut values = Vec::new();
        for _ in 0..2 {
            let loss  = model.w.val().sum().mul_scalar(2.0);
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model     = optim.step(0.1, model, grads);
            values.push(model.w.val().into_scalar().elem::<f32>());
        }
        values
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_nesterov_update() {
        // v1 = 2,         θ1 = -0.1 * (2 + 0.9 * 2)   = -0.38
        // v2 = 0.9*2 + 2, θ2 = θ1 - 0.1 * (2 + 0.9 * 3.8) = -0.922
        let values = two_steps(&TrainConfig::default());
        assert!(close(values[0], -0.38), "{values:?}");
        assert!(close(values[1], -0.922), "{values:?}");
    }

    #[test]
    fn test_classical_momentum_update() {
        // θ1 = -0.1 * 2 = -0.2, θ2 = -0.2 - 0.1 * 3.8 = -0.58
        let cfg    = TrainConfig { nesterov: false, ..TrainConfig::default() };
        let values = two_steps(&cfg);
        assert!(close(values[0], -0.2), "{values:?}");
        assert!(close(values[1], -0.58), "{values:?}");
    }

    #[test]
    fn test_l2_decays_kernels_but_not_batch_norm() {
        let device = Default::default();
        let cfg    = TrainConfig::default();
        let model: ResNetV2<TestBackend> = ResNetV2Config::new(10)
            .with_filters([2, 4, 8])
            .with_stacks(1)
            .with_input(ImageShape::new(3, 8, 8))
            .init(&device)
            .unwrap();
        let stem_before = model.stem.weight.val().into_data().to_vec::<f32>().unwrap();

        let x         = Tensor::<TestBackend, 4>::random([2, 3, 8, 8], Distribution::Normal(0.0, 1.0), &device);
        let data_loss = model.forward(x).sum().mul_scalar(0.0);
        let loss      = training_loss(&model, data_loss, cfg.weight_decay);

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        let model = optimizer_config(&cfg).init().step(0.1, model, grads);

        let gamma = model.final_norm.gamma.val().into_data().to_vec::<f32>().unwrap();
        let beta  = model.final_norm.beta.val().into_data().to_vec::<f32>().unwrap();
        assert!(gamma.iter().all(|&g| g == 1.0), "{gamma:?}");
        assert!(beta.iter().all(|&b| b == 0.0), "{beta:?}");
        let bias = model.classifier.bias.as_ref().unwrap().val().into_data().to_vec::<f32>().unwrap();
        assert!(bias.iter().all(|&b| b == 0.0), "{bias:?}");

        // One Nesterov step on g = 2λw scales each kernel weight by
        // 1 - lr * (1 + μ) * 2λ.
        let factor     = 1.0 - 0.1 * 1.9 * 2.0 * cfg.weight_decay as f32;
        let stem_after = model.stem.weight.val().into_data().to_vec::<f32>().unwrap();
        for (before, after) in stem_before.iter().zip(&stem_after) {
            assert!((after - before * factor).abs() <= 1e-6 * before.abs().max(1e-3));
        }
    }

    #[test]
    fn test_zero_l2_leaves_data_loss() {
        let device = Default::default();
        let model: ResNetV2<NdArray> = ResNetV2Config::new(10)
            .with_filters([2, 4, 8])
            .with_stacks(1)
            .with_input(ImageShape::new(3, 8, 8))
            .init(&device)
            .unwrap();
        let data_loss = Tensor::<NdArray, 1>::from_floats([1.5], &device);
        let loss: f32 = training_loss(&model, data_loss, 0.0).into_scalar().elem();
        assert_eq!(loss, 1.5);
    }
}
