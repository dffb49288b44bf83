// ============================================================
// Layer 5: Residual Block Constructors
// ============================================================
// Pre-activation ("v2") building blocks. Normalisation and ReLU
// come BEFORE each convolution, and the residual sum is left
// un-activated:
//
//   PreActConv        BN → ReLU → Conv(k, stride)
//
//   IdentityBlock     x ─┬─ PreActConv3x3 → PreActConv3x3 ─(+)─▶
//                        └──────────────────────────────────┘
//
//   ProjectionBlock   a = ReLU(BN(x))
//                     a ─┬─ Conv3x3/s → PreActConv3x3 ─(+)─▶
//                        └─ Conv1x1/s ─────────────────┘
//
//   BottleneckBlock   a = ReLU(BN(x))
//                     a ─┬─ Conv1x1/s(w) → PreActConv3x3(w) → PreActConv1x1(4w) ─(+)─▶
//                        └─ PreActConv1x1/s(4w) ──────────────────────────────┘
//
// Every convolution is bias-free, He-normal initialised and uses
// "same" padding. Only convolution kernels carry the L2 penalty.
// BatchNorm uses epsilon 1e-5 and keeps 90% of its
// running statistics per step (Burn momentum 0.1).
//
// Reference: He et al. (2016) Identity Mappings in Deep Residual Networks
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::domain::architecture::{same_padding, BlockKind, BlockSpec};

const BN_MOMENTUM: f64 = 0.1;
const BN_EPSILON:  f64 = 1e-5;

/// He-normal: std = sqrt(2 / fan_in).
pub fn he_normal() -> Initializer {
    Initializer::KaimingNormal { gain: std::f64::consts::SQRT_2, fan_out_only: false }
}

/// Bias-free, He-initialised convolution with "same" padding.
pub fn conv2d<B: Backend>(
    in_channels:  usize,
    out_channels: usize,
    kernel:       usize,
    stride:       usize,
    device:       &B::Device,
) -> Conv2d<B> {
    let pad = same_padding(kernel);
    Conv2dConfig::new([in_channels, out_channels], [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(pad, pad))
        .with_bias(false)
        .with_initializer(he_normal())
        .init(device)
}

/// Sum of squared kernel weights of one convolution.
pub fn kernel_sq_norm<B: Backend>(conv: &Conv2d<B>) -> Tensor<B, 1> {
    let w = conv.weight.val();
    (w.clone() * w).sum()
}

pub fn batch_norm<B: Backend>(channels: usize, device: &B::Device) -> BatchNorm<B, 2> {
    BatchNormConfig::new(channels)
        .with_momentum(BN_MOMENTUM)
        .with_epsilon(BN_EPSILON)
        .init(device)
}

// ─── PreActConv ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct PreActConv<B: Backend> {
    pub norm: BatchNorm<B, 2>,
    pub conv: Conv2d<B>,
}

impl<B: Backend> PreActConv<B> {
    pub fn new(
        in_channels:  usize,
        out_channels: usize,
        kernel:       usize,
        stride:       usize,
        device:       &B::Device,
    ) -> Self {
        Self {
            norm: batch_norm(in_channels, device),
            conv: conv2d(in_channels, out_channels, kernel, stride, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.conv.forward(relu(self.norm.forward(x)))
    }

    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        kernel_sq_norm(&self.conv)
    }
}

// ─── IdentityBlock ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct IdentityBlock<B: Backend> {
    pub first:  PreActConv<B>,
    pub second: PreActConv<B>,
}

impl<B: Backend> IdentityBlock<B> {
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            first:  PreActConv::new(channels, channels, 3, 1, device),
            second: PreActConv::new(channels, channels, 3, 1, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = self.second.forward(self.first.forward(x.clone()));
        residual + x
    }

    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        self.first.l2_penalty() + self.second.l2_penalty()
    }
}

// ─── ProjectionBlock ──────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ProjectionBlock<B: Backend> {
    pub norm:     BatchNorm<B, 2>,
    pub conv:     Conv2d<B>,
    pub second:   PreActConv<B>,
    pub shortcut: Conv2d<B>,
}

impl<B: Backend> ProjectionBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        Self {
            norm:     batch_norm(in_channels, device),
            conv:     conv2d(in_channels, out_channels, 3, stride, device),
            second:   PreActConv::new(out_channels, out_channels, 3, 1, device),
            shortcut: conv2d(in_channels, out_channels, 1, stride, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        // The shortcut branches off after the shared pre-activation.
        let activated = relu(self.norm.forward(x));
        let main      = self.second.forward(self.conv.forward(activated.clone()));
        main + self.shortcut.forward(activated)
    }

    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        kernel_sq_norm(&self.conv) + self.second.l2_penalty() + kernel_sq_norm(&self.shortcut)
    }
}

// ─── BottleneckBlock ──────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BottleneckBlock<B: Backend> {
    pub norm:     BatchNorm<B, 2>,
    pub reduce:   Conv2d<B>,
    pub conv:     PreActConv<B>,
    pub expand:   PreActConv<B>,
    pub shortcut: PreActConv<B>,
}

impl<B: Backend> BottleneckBlock<B> {
    pub fn new(
        in_channels:  usize,
        width:        usize,
        out_channels: usize,
        stride:       usize,
        device:       &B::Device,
    ) -> Self {
        Self {
            norm:     batch_norm(in_channels, device),
            reduce:   conv2d(in_channels, width, 1, stride, device),
            conv:     PreActConv::new(width, width, 3, 1, device),
            expand:   PreActConv::new(width, out_channels, 1, 1, device),
            shortcut: PreActConv::new(in_channels, out_channels, 1, stride, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let activated = relu(self.norm.forward(x));
        let main = self.expand.forward(
            self.conv.forward(self.reduce.forward(activated.clone()))
        );
        main + self.shortcut.forward(activated)
    }

    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        kernel_sq_norm(&self.reduce)
            + self.conv.l2_penalty()
            + self.expand.l2_penalty()
            + self.shortcut.l2_penalty()
    }
}

// ─── Stage ────────────────────────────────────────────────────────────────────
/// The blocks of one stage, applied in order: projection (if any),
/// then identity blocks, then bottleneck blocks. A stage built from
/// a plan only ever uses one of the two block families.
#[derive(Module, Debug)]
pub struct Stage<B: Backend> {
    pub projection:  Option<ProjectionBlock<B>>,
    pub identities:  Vec<IdentityBlock<B>>,
    pub bottlenecks: Vec<BottleneckBlock<B>>,
}

impl<B: Backend> Stage<B> {
    pub fn from_specs<'a>(specs: impl IntoIterator<Item = &'a BlockSpec>, device: &B::Device) -> Self {
        let mut stage = Stage { projection: None, identities: Vec::new(), bottlenecks: Vec::new() };

        for spec in specs {
            match spec.kind {
                BlockKind::Projection => {
                    stage.projection = Some(ProjectionBlock::new(
                        spec.in_channels, spec.out_channels, spec.stride, device,
                    ));
                }
                BlockKind::Identity => {
                    stage.identities.push(IdentityBlock::new(spec.out_channels, device));
                }
                BlockKind::Bottleneck => {
                    stage.bottlenecks.push(BottleneckBlock::new(
                        spec.in_channels, spec.width, spec.out_channels, spec.stride, device,
                    ));
                }
            }
        }
        stage
    }

    pub fn num_blocks(&self) -> usize {
        usize::from(self.projection.is_some()) + self.identities.len() + self.bottlenecks.len()
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = match &self.projection {
            Some(block) => block.forward(x),
            None        => x,
        };
        for block in &self.identities {
            x = block.forward(x);
        }
        for block in &self.bottlenecks {
            x = block.forward(x);
        }
        x
    }

    /// Squared L2 norm of every convolution kernel in the stage.
    /// BatchNorm scales and offsets are not included.
    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        let parts: Vec<Tensor<B, 1>> = self.projection.iter().map(ProjectionBlock::l2_penalty)
            .chain(self.identities.iter().map(IdentityBlock::l2_penalty))
            .chain(self.bottlenecks.iter().map(BottleneckBlock::l2_penalty))
            .collect();
        Tensor::cat(parts, 0).sum()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray;

    fn input(dims: [usize; 4]) -> Tensor<TestBackend, 4> {
        Tensor::random(dims, Distribution::Normal(0.0, 1.0), &Default::default())
    }

    #[test]
    fn test_preact_conv_same_padding() {
        let device = Default::default();
        let layer  = PreActConv::<TestBackend>::new(3, 5, 3, 1, &device);
        assert_eq!(layer.forward(input([2, 3, 6, 6])).dims(), [2, 5, 6, 6]);

        let strided = PreActConv::<TestBackend>::new(3, 5, 1, 2, &device);
        assert_eq!(strided.forward(input([2, 3, 7, 7])).dims(), [2, 5, 4, 4]);
    }

    #[test]
    fn test_identity_block_keeps_shape() {
        let block = IdentityBlock::<TestBackend>::new(4, &Default::default());
        assert_eq!(block.forward(input([1, 4, 8, 8])).dims(), [1, 4, 8, 8]);
    }

    #[test]
    fn test_projection_block_downsamples_and_widens() {
        let block = ProjectionBlock::<TestBackend>::new(4, 8, 2, &Default::default());
        assert_eq!(block.forward(input([2, 4, 8, 8])).dims(), [2, 8, 4, 4]);
    }

    #[test]
    fn test_bottleneck_block_expands() {
        let block = BottleneckBlock::<TestBackend>::new(4, 2, 8, 2, &Default::default());
        assert_eq!(block.forward(input([1, 4, 6, 6])).dims(), [1, 8, 3, 3]);
    }

    #[test]
    fn test_l2_penalty_sums_squared_kernels() {
        let block = IdentityBlock::<TestBackend>::new(2, &Default::default());
        let expected: f32 = [&block.first.conv, &block.second.conv]
            .iter()
            .flat_map(|conv| conv.weight.val().into_data().to_vec::<f32>().unwrap())
            .map(|w| w * w)
            .sum();
        let penalty: f32 = block.l2_penalty().into_scalar().elem();
        assert!((penalty - expected).abs() < 1e-4 * expected.max(1.0));
    }

    #[test]
    fn test_convolutions_have_no_bias() {
        let conv = conv2d::<TestBackend>(3, 4, 3, 1, &Default::default());
        assert!(conv.bias.is_none());
    }
}
