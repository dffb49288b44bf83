// ============================================================
// Layer 4: Colour Preprocessor
// ============================================================
// Per-channel standardisation of 8-bit pixels:
//
//   x'[c] = (x[c] - mean[c]) / std[c]
//
// The default statistics are the CIFAR-10 training-set values
// on the 0..255 scale. `fit` recomputes them from any image set.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::domain::image::{ImageShape, LabeledImage};

pub const CIFAR10_MEAN: [f32; 3] = [125.307, 122.95, 113.865];
pub const CIFAR10_STD:  [f32; 3] = [62.9932, 62.0887, 66.7048];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorNormalizer {
    mean: Vec<f32>,
    std:  Vec<f32>,
}

impl ColorNormalizer {
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> Result<Self> {
        ensure!(
            mean.len() == std.len() && !mean.is_empty(),
            "mean ({}) and std ({}) need one entry per channel",
            mean.len(),
            std.len()
        );
        ensure!(std.iter().all(|&s| s > 0.0), "std must be positive, got {:?}", std);
        Ok(Self { mean, std })
    }

    pub fn cifar10() -> Self {
        Self { mean: CIFAR10_MEAN.to_vec(), std: CIFAR10_STD.to_vec() }
    }

    /// Per-channel mean and (population) standard deviation of `images`.
    pub fn fit(images: &[LabeledImage], shape: ImageShape) -> Result<Self> {
        ensure!(!images.is_empty(), "cannot fit normalisation on an empty image set");

        let plane     = shape.plane();
        let mut sum   = vec![0f64; shape.channels];
        let mut sq    = vec![0f64; shape.channels];

        for image in images {
            for (c, channel) in image.pixels.chunks(plane).take(shape.channels).enumerate() {
                for &p in channel {
                    let v = p as f64;
                    sum[c] += v;
                    sq[c]  += v * v;
                }
            }
        }

        let n = (images.len() * plane) as f64;
        let mean: Vec<f32> = sum.iter().map(|s| (s / n) as f32).collect();
        let std: Vec<f32> = sum
            .iter()
            .zip(&sq)
            .map(|(s, q)| {
                let m = s / n;
                ((q / n - m * m).max(0.0).sqrt()) as f32
            })
            .collect();

        tracing::info!("Fitted normalisation: mean={:?} std={:?}", mean, std);
        Self::new(mean, std)
    }

    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    pub fn std(&self) -> &[f32] {
        &self.std
    }

    /// Standardise one CHW image into a new f32 buffer.
    pub fn normalize(&self, pixels: &[u8], shape: ImageShape) -> Vec<f32> {
        let mut out = Vec::with_capacity(shape.len());
        for ((channel, &m), &s) in pixels
            .chunks(shape.plane())
            .zip(&self.mean)
            .zip(&self.std)
        {
            out.extend(channel.iter().map(|&p| (p as f32 - m) / s));
        }
        out
    }
}

impl Default for ColorNormalizer {
    fn default() -> Self {
        Self::cifar10()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_each_channel_with_its_own_stats() {
        let n      = ColorNormalizer::new(vec![10.0, 20.0], vec![2.0, 4.0]).unwrap();
        let shape  = ImageShape::new(2, 1, 2);
        let out    = n.normalize(&[10, 14, 20, 28], shape);
        assert_eq!(out, vec![0.0, 2.0, 0.0, 2.0]);
    }

    #[test]
    fn test_cifar_mean_pixel_maps_near_zero() {
        let n     = ColorNormalizer::cifar10();
        let shape = ImageShape::new(3, 1, 1);
        let out   = n.normalize(&[125, 123, 114], shape);
        assert!(out.iter().all(|v| v.abs() < 0.01));
    }

    #[test]
    fn test_fit_recovers_statistics() {
        let shape  = ImageShape::new(1, 1, 2);
        let images = vec![
            LabeledImage::new(vec![0, 10], 0),
            LabeledImage::new(vec![10, 0], 1),
        ];
        let n = ColorNormalizer::fit(&images, shape).unwrap();
        assert!((n.mean()[0] - 5.0).abs() < 1e-6);
        assert!((n.std()[0] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_fit_rejects_constant_channel() {
        let shape  = ImageShape::new(1, 1, 1);
        let images = vec![LabeledImage::new(vec![7], 0)];
        assert!(ColorNormalizer::fit(&images, shape).is_err());
    }

    #[test]
    fn test_rejects_mismatched_stats() {
        assert!(ColorNormalizer::new(vec![1.0, 2.0], vec![1.0]).is_err());
        assert!(ColorNormalizer::new(vec![1.0], vec![0.0]).is_err());
    }
}
