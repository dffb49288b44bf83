// ============================================================
// Layer 4: Image Batcher
// ============================================================
// Implements Burn's Batcher trait: turns a Vec<LabeledImage> into
//
//   images:  Tensor<B, 4>       [N, C, H, W]  normalised (+ augmented)
//   targets: Tensor<B, 1, Int>  [N]           class indices
//
// Targets stay as class indices; Burn's cross-entropy takes
// indices directly, so no one-hot encoding is needed.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::{augment::Augmenter, preprocessor::ColorNormalizer};
use crate::domain::image::{ImageShape, LabeledImage};

#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    pub images:  Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    device:     B::Device,
    shape:      ImageShape,
    normalizer: ColorNormalizer,
    /// Only set for the training loader
    augmenter:  Option<Augmenter>,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, shape: ImageShape, normalizer: ColorNormalizer) -> Self {
        Self { device, shape, normalizer, augmenter: None }
    }

    pub fn with_augmenter(mut self, augmenter: Option<Augmenter>) -> Self {
        self.augmenter = augmenter;
        self
    }
}

impl<B: Backend> Batcher<LabeledImage, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<LabeledImage>) -> ImageBatch<B> {
        let batch_size = items.len();
        let shape      = self.shape;
        let mut rng    = rand::thread_rng();

        let mut values = Vec::with_capacity(batch_size * shape.len());
        for item in &items {
            let normalized = self.normalizer.normalize(&item.pixels, shape);
            match &self.augmenter {
                Some(aug) => values.extend(aug.apply(&normalized, shape, &mut rng)),
                None      => values.extend(normalized),
            }
        }

        let labels: Vec<i64> = items.iter().map(|item| item.label as i64).collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(values, [batch_size, shape.channels, shape.height, shape.width]),
            &self.device,
        );
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [batch_size]),
            &self.device,
        );

        ImageBatch { images, targets }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shapes_and_values() {
        let device     = Default::default();
        let shape      = ImageShape::new(2, 1, 2);
        let normalizer = ColorNormalizer::new(vec![0.0, 10.0], vec![1.0, 2.0]).unwrap();
        let batcher    = ImageBatcher::<TestBackend>::new(device, shape, normalizer);

        let batch = batcher.batch(vec![
            LabeledImage::new(vec![1, 2, 10, 14], 4),
            LabeledImage::new(vec![0, 0, 12, 12], 9),
        ]);

        assert_eq!(batch.images.dims(), [2, 2, 1, 2]);
        assert_eq!(batch.targets.dims(), [2]);

        let values = batch.images.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![1.0, 2.0, 0.0, 2.0, 0.0, 0.0, 1.0, 1.0]);

        let targets = batch.targets.into_data().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![4, 9]);
    }

    #[test]
    fn test_augmented_batch_keeps_shape() {
        let device  = Default::default();
        let shape   = ImageShape::new(3, 8, 8);
        let batcher = ImageBatcher::<TestBackend>::new(device, shape, ColorNormalizer::cifar10())
            .with_augmenter(Some(Augmenter::default()));

        let batch = batcher.batch(vec![LabeledImage::new(vec![128; shape.len()], 0); 3]);
        assert_eq!(batch.images.dims(), [3, 3, 8, 8]);
    }
}
