use anyhow::Result;
use burn::{
    module::Param,
    nn::{
        conv::Conv2d,
        loss::CrossEntropyLossConfig,
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        BatchNorm, Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
    train::ClassificationOutput,
};

use crate::domain::architecture::{ArchitecturePlan, BlockStyle, NUM_STAGES};
use crate::domain::image::ImageShape;
use crate::ml::blocks::{batch_norm, conv2d, he_normal, kernel_sq_norm, Stage};

// #[derive(Config)] derives Clone and serde itself.
#[derive(Config, Debug)]
pub struct ResNetV2Config {
    pub num_classes: usize,
    #[config(default = "[16, 32, 64]")]
    pub filters:     [usize; 3],
    #[config(default = 9)]
    pub stacks:      usize,
    #[config(default = "BlockStyle::Basic")]
    pub block_style: BlockStyle,
    #[config(default = "ImageShape::CIFAR10")]
    pub input:       ImageShape,
}

impl ResNetV2Config {
    pub fn plan(&self) -> Result<ArchitecturePlan> {
        ArchitecturePlan::new(self.input, self.filters, self.stacks, self.block_style, self.num_classes)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ResNetV2<B>> {
        let plan = self.plan()?;
        Ok(ResNetV2::from_plan(&plan, device))
    }
}

#[derive(Module, Debug)]
pub struct ResNetV2<B: Backend> {
    pub stem:       Conv2d<B>,
    pub stages:     Vec<Stage<B>>,
    pub final_norm: BatchNorm<B, 2>,
    pub pool:       AdaptiveAvgPool2d,
    pub classifier: Linear<B>,
}

impl<B: Backend> ResNetV2<B> {
    pub fn from_plan(plan: &ArchitecturePlan, device: &B::Device) -> Self {
        let stem = conv2d(plan.input.channels, plan.stem_channels, 3, 1, device);

        let stages = (1..=NUM_STAGES)
            .map(|stage| Stage::from_specs(plan.stage(stage), device))
            .collect();

        let features   = plan.feature_channels();
        let final_norm = batch_norm(features, device);
        let pool       = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        // The initializer also fills the bias; dense biases start at zero.
        let mut classifier = LinearConfig::new(features, plan.num_classes)
            .with_initializer(he_normal())
            .init(device);
        classifier.bias = Some(Param::from_tensor(Tensor::zeros([plan.num_classes], device)));

        ResNetV2 { stem, stages, final_norm, pool, classifier }
    }

    /// images: [batch, C, H, W] → feature map entering the head
    pub fn features(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.stem.forward(images);
        for stage in &self.stages {
            x = stage.forward(x);
        }
        x
    }

    /// images: [batch, C, H, W] → logits: [batch, num_classes]
    ///
    /// Softmax is left to the loss (training) or the caller (inference).
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.final_norm.forward(self.features(images)));
        let x = self.pool.forward(x); // [batch, C, 1, 1]
        let [batch_size, channels, _, _] = x.dims();
        self.classifier.forward(x.reshape([batch_size, channels]))
    }

    pub fn forward_classification(
        &self,
        images:  Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss   = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());
        ClassificationOutput::new(loss, output, targets)
    }

    /// Squared L2 norm of the convolution and dense kernels.
    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        let dense   = self.classifier.weight.val();
        let mut sum = kernel_sq_norm(&self.stem) + (dense.clone() * dense).sum();
        for stage in &self.stages {
            sum = sum + stage.l2_penalty();
        }
        sum
    }

    pub fn num_blocks(&self) -> usize {
        self.stages.iter().map(Stage::num_blocks).sum()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        optim::{GradientsParams, Optimizer, SgdConfig},
        tensor::Distribution,
    };

    type TestBackend = NdArray;

    fn tiny_config(style: BlockStyle) -> ResNetV2Config {
        ResNetV2Config::new(10)
            .with_filters([4, 8, 16])
            .with_stacks(2)
            .with_block_style(style)
            .with_input(ImageShape::new(3, 8, 8))
    }

    fn images<B: Backend>(batch: usize, device: &B::Device) -> Tensor<B, 4> {
        Tensor::random([batch, 3, 8, 8], Distribution::Normal(0.0, 1.0), device)
    }

    #[test]
    fn test_default_config_is_resnet56_layout() {
        let cfg  = ResNetV2Config::new(10);
        let plan = cfg.plan().unwrap();
        assert_eq!(cfg.filters, [16, 32, 64]);
        assert_eq!(cfg.stacks, 9);
        assert_eq!(plan.depth(), 56);
    }

    #[test]
    fn test_forward_produces_class_logits() {
        let device = Default::default();
        for style in [BlockStyle::Basic, BlockStyle::Bottleneck] {
            let model: ResNetV2<TestBackend> = tiny_config(style).init(&device).unwrap();
            assert_eq!(model.forward(images(2, &device)).dims(), [2, 10]);
        }
    }

    #[test]
    fn test_features_follow_the_plan() {
        let device = Default::default();
        for style in [BlockStyle::Basic, BlockStyle::Bottleneck] {
            let cfg   = tiny_config(style);
            let plan  = cfg.plan().unwrap();
            let model: ResNetV2<TestBackend> = cfg.init(&device).unwrap();

            let (h, w) = plan.output_hw();
            assert_eq!(
                model.features(images(1, &device)).dims(),
                [1, plan.feature_channels(), h, w]
            );
            assert_eq!(model.num_blocks(), plan.blocks.len());
        }
    }

    #[test]
    fn test_classifier_bias_starts_at_zero() {
        let model: ResNetV2<TestBackend> = tiny_config(BlockStyle::Basic).init(&Default::default()).unwrap();
        let bias = model.classifier.bias.as_ref().unwrap().val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(bias, vec![0.0; 10]);
    }

    #[test]
    fn test_l2_penalty_covers_every_kernel() {
        let model: ResNetV2<TestBackend> = tiny_config(BlockStyle::Bottleneck).init(&Default::default()).unwrap();
        let stages: f32 = model.stages.iter().map(|s| s.l2_penalty().into_scalar().elem::<f32>()).sum();
        let stem:   f32 = kernel_sq_norm(&model.stem).into_scalar().elem();
        let dense:  f32 = model.classifier.weight.val().powf_scalar(2.0).sum().into_scalar().elem();
        let total:  f32 = model.l2_penalty().into_scalar().elem();
        assert!(stages > 0.0 && stem > 0.0 && dense > 0.0);
        assert!((total - (stages + stem + dense)).abs() < 1e-3 * total);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let device = Default::default();
        let result = ResNetV2Config::new(10).with_stacks(0).init::<TestBackend>(&device);
        assert!(result.is_err());
    }

    #[test]
    fn test_sgd_step_keeps_loss_finite() {
        type B = Autodiff<NdArray>;
        let device = Default::default();
        let mut model: ResNetV2<B> = tiny_config(BlockStyle::Basic).init(&device).unwrap();
        let mut optim = SgdConfig::new().init();

        let x       = images::<B>(4, &device);
        let targets = Tensor::<B, 1, Int>::from_ints([0, 1, 2, 3], &device);

        for _ in 0..2 {
            let output = model.forward_classification(x.clone(), targets.clone());
            let loss: f64 = output.loss.clone().into_scalar().elem();
            assert!(loss.is_finite());

            let grads = GradientsParams::from_grads(output.loss.backward(), &model);
            model = optim.step(0.01, model, grads);
        }
    }
}
