// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Plain Rust types that describe the network and the training
// recipe. Nothing in here touches Burn, the filesystem or a GPU,
// so every rule about channel and stride bookkeeping can be
// unit tested on its own.
//
// Reference: He et al. (2016) Identity Mappings in Deep Residual Networks
//            Rust Book §5 (Structs), §10 (Traits)

// Image shapes, labelled images and dataset splits
pub mod image;

// The residual stack layout: stages, blocks, channels, strides
pub mod architecture;

// Step-decay learning-rate schedule
pub mod schedule;

// Core abstractions (traits) that other layers implement
pub mod traits;
