// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// From files on disk to tensor batches:
//
//   cifar-10-batches-bin/*.bin
//       │
//       ▼
//   Cifar10Loader     → decodes records into LabeledImage (u8, CHW)
//       │
//       ▼
//   ImageDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   ImageBatcher      → ColorNormalizer (+ Augmenter for training)
//       │               stacks into [N, C, H, W] tensors
//       ▼
//   DataLoader        → shuffles and feeds batches to the fit loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the CIFAR-10 binary distribution
pub mod loader;

/// Per-channel mean/std standardisation
pub mod preprocessor;

/// Random flips and translations for training batches
pub mod augment;

/// Implements Burn's Dataset trait for labelled images
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
