// ============================================================
// Layer 3: Image Domain Types
// ============================================================
// A labelled image as it comes off disk: raw 8-bit pixels in
// channel-major (CHW) order plus a class index. Normalisation and
// augmentation happen later in the data layer.

use serde::{Deserialize, Serialize};

/// Channel / height / width of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub channels: usize,
    pub height:   usize,
    pub width:    usize,
}

impl ImageShape {
    /// 32x32 RGB images, as in CIFAR-10.
    pub const CIFAR10: ImageShape = ImageShape { channels: 3, height: 32, width: 32 };

    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        Self { channels, height, width }
    }

    /// Number of values in one image (C * H * W)
    pub const fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Number of values in one channel plane (H * W)
    pub const fn plane(&self) -> usize {
        self.height * self.width
    }
}

/// One image with its class label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledImage {
    /// Raw pixels, CHW order, `shape.len()` bytes
    pub pixels: Vec<u8>,
    pub label:  u8,
}

impl LabeledImage {
    pub fn new(pixels: Vec<u8>, label: u8) -> Self {
        Self { pixels, label }
    }
}

/// Which half of the dataset to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Test  => write!(f, "test"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cifar_shape_len() {
        assert_eq!(ImageShape::CIFAR10.len(), 3072);
        assert_eq!(ImageShape::CIFAR10.plane(), 1024);
    }
}
