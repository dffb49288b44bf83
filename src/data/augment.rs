// ============================================================
// Layer 4: Real-time Augmentation
// ============================================================
// Applied to every training image each time it is batched:
//
//   1. horizontal flip with probability 0.5
//   2. random translation of up to 12.5% of the width / height
//      (4 pixels on a 32x32 image) in either direction
//
// Translation is by whole pixels. Pixels shifted in from outside
// the frame take the constant `fill` value; since augmentation
// runs after normalisation, the default 0.0 is the dataset mean.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::image::ImageShape;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Augmenter {
    pub horizontal_flip: bool,
    /// Maximum shift as a fraction of the image side
    pub shift_fraction:  f32,
    pub fill:            f32,
}

impl Default for Augmenter {
    fn default() -> Self {
        Self { horizontal_flip: true, shift_fraction: 0.125, fill: 0.0 }
    }
}

impl Augmenter {
    /// Largest translation in pixels for a side of `size`.
    pub fn max_shift(&self, size: usize) -> usize {
        (self.shift_fraction * size as f32).round() as usize
    }

    /// Draw a random flip/shift and apply it to one CHW image.
    pub fn apply<R: Rng + ?Sized>(&self, image: &[f32], shape: ImageShape, rng: &mut R) -> Vec<f32> {
        let flip = self.horizontal_flip && rng.gen_bool(0.5);
        let dy   = random_shift(self.max_shift(shape.height), rng);
        let dx   = random_shift(self.max_shift(shape.width), rng);
        self.transform(image, shape, flip, dy, dx)
    }

    /// Flip (optionally), then move content by `dy` rows and `dx` columns.
    /// Positive shifts move content down / right.
    pub fn transform(&self, image: &[f32], shape: ImageShape, flip: bool, dy: i64, dx: i64) -> Vec<f32> {
        let (h, w)  = (shape.height as i64, shape.width as i64);
        let plane   = shape.plane();
        let mut out = vec![self.fill; shape.len()];

        for c in 0..shape.channels {
            let base = c * plane;
            for y in 0..h {
                let sy = y - dy;
                if sy < 0 || sy >= h {
                    continue;
                }
                for x in 0..w {
                    let shifted = x - dx;
                    if shifted < 0 || shifted >= w {
                        continue;
                    }
                    let sx = if flip { w - 1 - shifted } else { shifted };
                    out[base + (y * w + x) as usize] = image[base + (sy * w + sx) as usize];
                }
            }
        }
        out
    }
}

fn random_shift<R: Rng + ?Sized>(max: usize, rng: &mut R) -> i64 {
    if max == 0 {
        return 0;
    }
    let max = max as i64;
    rng.gen_range(-max..=max)
}
