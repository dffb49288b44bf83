use burn::data::dataset::Dataset;

use crate::domain::image::LabeledImage;

/// In-memory image set exposed through Burn's `Dataset` trait.
#[derive(Debug, Clone)]
pub struct ImageDataset {
    images: Vec<LabeledImage>,
}

impl ImageDataset {
    pub fn new(images: Vec<LabeledImage>) -> Self { Self { images } }

    /// Images per label, indexed by label.
    pub fn class_counts(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for image in &self.images {
            if let Some(c) = counts.get_mut(image.label as usize) {
                *c += 1;
            }
        }
        counts
    }
}

impl Dataset<LabeledImage> for ImageDataset {
    fn get(&self, index: usize) -> Option<LabeledImage> {
        self.images.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_counts() {
        let ds = ImageDataset::new(vec![
            LabeledImage::new(vec![0], 1),
            LabeledImage::new(vec![0], 1),
            LabeledImage::new(vec![0], 2),
        ]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.class_counts(3), vec![0, 2, 1]);
        assert!(ds.get(3).is_none());
    }
}
