// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// Defines the subcommands `train`, `evaluate` and `summary`
// and all their configurable flags. Defaults reproduce the
// reference CIFAR-10 recipe: ResNet-56 v2, 200 epochs, batch 128,
// SGD 0.1 with Nesterov momentum, decay x0.1 at epochs 80 and 150.
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};

use crate::application::train_use_case::TrainConfig;
use crate::domain::architecture::BlockStyle;
use crate::ml::backend::DeviceKind;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the network on CIFAR-10 and evaluate it on the test split
    Train(TrainArgs),

    /// Score the latest checkpoint on the CIFAR-10 test split
    Evaluate(EvaluateArgs),

    /// Print the layer table and parameter count for a configuration
    Summary(SummaryArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BlockStyleArg {
    Basic,
    Bottleneck,
}

impl From<BlockStyleArg> for BlockStyle {
    fn from(a: BlockStyleArg) -> Self {
        match a {
            BlockStyleArg::Basic      => BlockStyle::Basic,
            BlockStyleArg::Bottleneck => BlockStyle::Bottleneck,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DeviceArg {
    /// GPU through WGPU (Vulkan / Metal / DX12)
    Wgpu,
    /// NdArray CPU backend
    Cpu,
}

impl From<DeviceArg> for DeviceKind {
    fn from(a: DeviceArg) -> Self {
        match a {
            DeviceArg::Wgpu => DeviceKind::Wgpu,
            DeviceArg::Cpu  => DeviceKind::Cpu,
        }
    }
}

/// Architecture flags shared by `train` and `summary`.
#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Filters of the three stages, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = [16, 32, 64])]
    pub filters: Vec<usize>,

    /// Blocks per stage (9 gives ResNet-56 with the basic style)
    #[arg(long, default_value_t = 9)]
    pub stacks: usize,

    /// Residual unit the stages are built from
    #[arg(long, value_enum, default_value_t = BlockStyleArg::Basic)]
    pub block_style: BlockStyleArg,
}

impl ModelArgs {
    fn apply(self, cfg: &mut TrainConfig) -> Result<()> {
        cfg.filters = <[usize; 3]>::try_from(self.filters.as_slice())
            .with_context(|| format!("--filters needs exactly 3 values, got {:?}", self.filters))?;
        cfg.stacks      = self.stacks;
        cfg.block_style = self.block_style.into();
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory with the extracted CIFAR-10 binary batches
    #[arg(long, default_value = "data/cifar-10-batches-bin")]
    pub data_dir: String,

    /// Directory to save checkpoints, config and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 200)]
    pub epochs: usize,

    /// Training mini-batch size
    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,

    /// Batch size for validation and the final evaluation
    #[arg(long, default_value_t = 256)]
    pub eval_batch_size: usize,

    /// Initial learning rate
    #[arg(long, default_value_t = 0.1)]
    pub lr: f64,

    /// Epochs (0-indexed) at which the learning rate is multiplied by --lr-gamma
    #[arg(long, value_delimiter = ',', default_values_t = [80, 150])]
    pub lr_milestones: Vec<usize>,

    /// Learning-rate decay factor at each milestone
    #[arg(long, default_value_t = 0.1)]
    pub lr_gamma: f64,

    /// SGD momentum
    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,

    /// Use classical instead of Nesterov momentum
    #[arg(long)]
    pub no_nesterov: bool,

    /// L2 penalty coefficient on convolution and dense kernels
    #[arg(long, default_value_t = 1e-4)]
    pub weight_decay: f64,

    /// Disable random flips and shifts
    #[arg(long)]
    pub no_augment: bool,

    /// Compute per-channel mean/std from the training set instead of
    /// using the standard CIFAR-10 statistics
    #[arg(long)]
    pub fit_normalization: bool,

    /// Use at most this many images per split (quick runs)
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Data loader worker threads
    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,

    #[arg(long, value_enum, default_value_t = DeviceArg::Wgpu)]
    pub device: DeviceArg,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl TryFrom<TrainArgs> for TrainConfig {
    type Error = anyhow::Error;

    fn try_from(a: TrainArgs) -> Result<Self> {
        let mut cfg = TrainConfig {
            data_dir:          a.data_dir,
            checkpoint_dir:    a.checkpoint_dir,
            epochs:            a.epochs,
            batch_size:        a.batch_size,
            eval_batch_size:   a.eval_batch_size,
            lr:                a.lr,
            lr_milestones:     a.lr_milestones,
            lr_gamma:          a.lr_gamma,
            momentum:          a.momentum,
            nesterov:          !a.no_nesterov,
            weight_decay:      a.weight_decay,
            augment:           !a.no_augment,
            fit_normalization: a.fit_normalization,
            limit:             a.limit,
            seed:              a.seed,
            num_workers:       a.num_workers,
            device:            a.device.into(),
            ..TrainConfig::default()
        };
        a.model.apply(&mut cfg)?;
        Ok(cfg)
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Dataset directory (defaults to the one used for training)
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Device override (defaults to the one used for training)
    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,

    #[arg(long, default_value_t = 256)]
    pub batch_size: usize,

    /// Use at most this many test images
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub model: ModelArgs,
}

impl TryFrom<SummaryArgs> for TrainConfig {
    type Error = anyhow::Error;

    fn try_from(a: SummaryArgs) -> Result<Self> {
        let mut cfg = TrainConfig::default();
        a.model.apply(&mut cfg)?;
        Ok(cfg)
    }
}
