// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Persistence concerns shared by training and evaluation:
//
//   checkpoint.rs: model weights via Burn's CompactRecorder,
//                   plus the TrainConfig as JSON so `evaluate`
//                   can rebuild the exact architecture
//
//   metrics.rs   : per-epoch loss / accuracy rows in a CSV file
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling with anyhow)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
