// ============================================================
// Layer 5: ML / Model Layer (Burn)
// ============================================================
// Every Burn model, optimiser and backend type lives here.
// The data layer only borrows Burn's Dataset/Batcher traits.
//
//   backend.rs  : WGPU / NdArray backend aliases and selection
//
//   blocks.rs   : pre-activation residual block constructors
//                  • BN → ReLU → Conv units (1x1 and 3x3)
//                  • identity, projection and bottleneck blocks
//                  • a Stage that chains them
//
//   model.rs    : ResNetV2 built by walking an ArchitecturePlan:
//                  stem conv → 3 stages → BN/ReLU → GAP → dense
//
//   trainer.rs  : the fit loop: SGD with Nesterov momentum,
//                  step LR schedule, validation, checkpoints
//
//   evaluator.rs: loss / accuracy over a dataset, and loading a
//                  trained checkpoint for the `evaluate` command
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            He et al. (2016) Identity Mappings in Deep Residual Networks

/// Backend aliases and device selection
pub mod backend;

/// Residual block constructors
pub mod blocks;

/// The ResNet-v2 network
pub mod model;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Evaluation passes and checkpoint scoring
pub mod evaluator;
