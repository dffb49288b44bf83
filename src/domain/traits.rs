// ============================================================
// Layer 3: Core Traits (Abstractions)
// ============================================================
// The application layer only knows that images come from
// "somewhere". The CIFAR-10 binary reader is one implementation;
// an image-folder or in-memory source would be another.

use anyhow::Result;

use crate::domain::image::{ImageShape, LabeledImage, Split};

// ─── ImageSource ──────────────────────────────────────────────────────────────
/// Any component that can hand out labelled images for a split.
pub trait ImageSource {
    /// Shape every returned image has.
    fn shape(&self) -> ImageShape;

    /// Number of distinct labels.
    fn num_classes(&self) -> usize;

    /// Load every image of the requested split.
    fn load(&self, split: Split) -> Result<Vec<LabeledImage>>;
}
