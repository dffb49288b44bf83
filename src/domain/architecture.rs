// ============================================================
// Layer 3: Architecture Plan
// ============================================================
// Describes the pre-activation residual network block by block
// without building any tensors:
//
//   stem     3x3 conv, stride 1            C_in  -> f0
//   stage 1  `stacks` blocks               f0
//   stage 2  `stacks` blocks, first stride 2   -> f1
//   stage 3  `stacks` blocks, first stride 2   -> f2
//   head     BN -> ReLU -> global avg pool -> dense(num_classes)
//
// With the basic style a stage that changes width opens with a
// projection block; everything else is an identity block.
// With the bottleneck style every block is a bottleneck whose
// output is 4x its inner width.
//
// All convolutions use "same" padding, so a stride-s layer maps
// H to ceil(H / s).
//
// The Burn model in `ml::model` is built by walking this plan, so
// the plan is the single place where channel/stride bookkeeping
// lives.
//
// Reference: He et al. (2016) Identity Mappings in Deep Residual Networks

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::domain::image::ImageShape;

/// Output channels of a bottleneck block relative to its inner width.
pub const BOTTLENECK_EXPANSION: usize = 4;

/// Number of residual stages.
pub const NUM_STAGES: usize = 3;

/// Which residual unit the stages are built from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStyle {
    /// Two 3x3 convolutions per block
    #[default]
    Basic,
    /// 1x1 -> 3x3 -> 1x1 with 4x expansion
    Bottleneck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// x + F(x); keeps channels and resolution
    Identity,
    /// Shared pre-activation, strided 3x3 main path, 1x1 shortcut
    Projection,
    /// Shared pre-activation, 1x1/3x3/1x1 main path, pre-activated 1x1 shortcut
    Bottleneck,
}

impl BlockKind {
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Identity   => "identity",
            BlockKind::Projection => "projection",
            BlockKind::Bottleneck => "bottleneck",
        }
    }
}

/// One residual block with its resolved channel and stride numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpec {
    /// 1-based stage index
    pub stage:        usize,
    pub kind:         BlockKind,
    pub in_channels:  usize,
    /// Inner convolution width (the stage filter count)
    pub width:        usize,
    pub out_channels: usize,
    pub stride:       usize,
    pub input_hw:     (usize, usize),
    pub output_hw:    (usize, usize),
}

impl BlockSpec {
    /// Trainable parameters: conv kernels (no bias) plus BN gamma/beta.
    pub fn trainable_params(&self) -> usize {
        let (i, w, o) = (self.in_channels, self.width, self.out_channels);
        match self.kind {
            BlockKind::Identity => 2 * (bn_params(o) + conv_params(3, o, o)),
            BlockKind::Projection => {
                bn_params(i)
                    + conv_params(3, i, o)
                    + bn_params(o) + conv_params(3, o, o)
                    + conv_params(1, i, o)
            }
            BlockKind::Bottleneck => {
                bn_params(i)
                    + conv_params(1, i, w)
                    + bn_params(w) + conv_params(3, w, w)
                    + bn_params(w) + conv_params(1, w, o)
                    + bn_params(i) + conv_params(1, i, o)
            }
        }
    }
}

/// The full layer-by-layer layout of the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchitecturePlan {
    pub input:         ImageShape,
    pub stem_channels: usize,
    pub blocks:        Vec<BlockSpec>,
    pub num_classes:   usize,
    pub style:         BlockStyle,
}

impl ArchitecturePlan {
    pub fn new(
        input:       ImageShape,
        filters:     [usize; NUM_STAGES],
        stacks:      usize,
        style:       BlockStyle,
        num_classes: usize,
    ) -> Result<Self> {
        ensure!(stacks > 0, "stacks must be at least 1");
        ensure!(
            filters.iter().all(|&f| f > 0),
            "every stage needs at least one filter, got {:?}",
            filters
        );
        ensure!(num_classes >= 2, "need at least 2 classes, got {num_classes}");
        ensure!(
            input.channels > 0 && input.height > 0 && input.width > 0,
            "input shape must be non-empty, got {:?}",
            input
        );

        let stem_channels = filters[0];
        let mut channels  = stem_channels;
        let mut hw        = (input.height, input.width);
        let mut blocks    = Vec::with_capacity(NUM_STAGES * stacks);

        for (index, &width) in filters.iter().enumerate() {
            let stage = index + 1;

            for position in 0..stacks {
                // Only the first block of stages 2 and 3 downsamples.
                let stride = if index > 0 && position == 0 { 2 } else { 1 };

                let kind = match style {
                    BlockStyle::Basic if index > 0 && position == 0 => BlockKind::Projection,
                    BlockStyle::Basic      => BlockKind::Identity,
                    BlockStyle::Bottleneck => BlockKind::Bottleneck,
                };

                let out_channels = match kind {
                    BlockKind::Bottleneck => width * BOTTLENECK_EXPANSION,
                    _ => width,
                };

                if kind == BlockKind::Identity {
                    ensure!(
                        channels == out_channels,
                        "identity block in stage {stage} would change channels {channels} -> {out_channels}"
                    );
                }

                let output_hw = (same_out(hw.0, stride), same_out(hw.1, stride));
                blocks.push(BlockSpec {
                    stage,
                    kind,
                    in_channels: channels,
                    width,
                    out_channels,
                    stride,
                    input_hw: hw,
                    output_hw,
                });

                channels = out_channels;
                hw       = output_hw;
            }
        }

        Ok(Self { input, stem_channels, blocks, num_classes, style })
    }

    /// Channels entering the classification head.
    pub fn feature_channels(&self) -> usize {
        self.blocks
            .last()
            .map(|b| b.out_channels)
            .unwrap_or(self.stem_channels)
    }

    /// Spatial size of the last feature map.
    pub fn output_hw(&self) -> (usize, usize) {
        self.blocks
            .last()
            .map(|b| b.output_hw)
            .unwrap_or((self.input.height, self.input.width))
    }

    /// Blocks belonging to one (1-based) stage.
    pub fn stage(&self, stage: usize) -> impl Iterator<Item = &BlockSpec> {
        self.blocks.iter().filter(move |b| b.stage == stage)
    }

    /// Weighted layers: stem + convolutions on the main paths + dense.
    pub fn depth(&self) -> usize {
        let per_block = |b: &BlockSpec| match b.kind {
            BlockKind::Identity | BlockKind::Projection => 2,
            BlockKind::Bottleneck => 3,
        };
        1 + self.blocks.iter().map(per_block).sum::<usize>() + 1
    }

    pub fn trainable_params(&self) -> usize {
        let stem   = conv_params(3, self.input.channels, self.stem_channels);
        let blocks = self.blocks.iter().map(BlockSpec::trainable_params).sum::<usize>();
        let c      = self.feature_channels();
        let head   = bn_params(c) + c * self.num_classes + self.num_classes;
        stem + blocks + head
    }

    /// Human-readable layer table, printed by the `summary` command
    /// and logged before training.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let (h, w) = (self.input.height, self.input.width);

        let _ = writeln!(
            out,
            "{:<6} {:<11} {:>14} {:>6} {:>14}",
            "stage", "block", "channels", "stride", "output"
        );
        let _ = writeln!(out, "{}", "-".repeat(55));
        let _ = writeln!(
            out,
            "{:<6} {:<11} {:>14} {:>6} {:>14}",
            "input", "-", "-", "-",
            format!("{}x{}x{}", self.input.channels, h, w)
        );
        let _ = writeln!(
            out,
            "{:<6} {:<11} {:>14} {:>6} {:>14}",
            "stem", "conv3x3",
            format!("{} -> {}", self.input.channels, self.stem_channels),
            1,
            format!("{}x{}x{}", self.stem_channels, h, w)
        );
        for b in &self.blocks {
            let _ = writeln!(
                out,
                "{:<6} {:<11} {:>14} {:>6} {:>14}",
                b.stage,
                b.kind.name(),
                format!("{} -> {}", b.in_channels, b.out_channels),
                b.stride,
                format!("{}x{}x{}", b.out_channels, b.output_hw.0, b.output_hw.1)
            );
        }
        let _ = writeln!(
            out,
            "{:<6} {:<11} {:>14} {:>6} {:>14}",
            "head", "gap+dense",
            format!("{} -> {}", self.feature_channels(), self.num_classes),
            "-",
            format!("{}", self.num_classes)
        );
        let _ = writeln!(out, "{}", "-".repeat(55));
        let _ = writeln!(out, "depth: {} weighted layers", self.depth());
        let _ = write!(out, "trainable params: {}", self.trainable_params());
        out
    }
}

/// "same" padding output size for a stride-s convolution.
pub fn same_out(size: usize, stride: usize) -> usize {
    (size + stride - 1) / stride
}

/// Symmetric padding that gives "same" output for an odd kernel.
pub fn same_padding(kernel: usize) -> usize {
    kernel / 2
}

fn conv_params(kernel: usize, in_channels: usize, out_channels: usize) -> usize {
    kernel * kernel * in_channels * out_channels
}

fn bn_params(channels: usize) -> usize {
    2 * channels
}
