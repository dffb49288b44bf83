// ============================================================
// Layer 4: CIFAR-10 Loader
// ============================================================
// Reads the "binary version" of CIFAR-10 as distributed at
// https://www.cs.toronto.edu/~kriz/cifar.html
//
// Layout of cifar-10-batches-bin/:
//   data_batch_1.bin .. data_batch_5.bin   ← 50,000 training images
//   test_batch.bin                         ← 10,000 test images
//
// Every file is a flat sequence of 3073-byte records:
//   <1 x label byte><1024 x red><1024 x green><1024 x blue>
//
// The pixel block is already channel-major (CHW), which is the
// layout Burn's conv2d expects, so records are copied as-is.

use anyhow::{bail, ensure, Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::image::{ImageShape, LabeledImage, Split};
use crate::domain::traits::ImageSource;

pub const CIFAR10_CLASSES: usize = 10;

const TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const TEST_FILES: [&str; 1] = ["test_batch.bin"];

/// Loads CIFAR-10 from its binary distribution directory.
pub struct Cifar10Loader {
    dir:   PathBuf,
    /// Cap on images per split, for quick smoke runs
    limit: Option<usize>,
}

impl Cifar10Loader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), limit: None }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    fn files(split: Split) -> &'static [&'static str] {
        match split {
            Split::Train => &TRAIN_FILES,
            Split::Test  => &TEST_FILES,
        }
    }
}

impl ImageSource for Cifar10Loader {
    fn shape(&self) -> ImageShape {
        ImageShape::CIFAR10
    }

    fn num_classes(&self) -> usize {
        CIFAR10_CLASSES
    }

    fn load(&self, split: Split) -> Result<Vec<LabeledImage>> {
        if !self.dir.is_dir() {
            bail!(
                "CIFAR-10 directory '{}' not found. Download cifar-10-binary.tar.gz \
                 from https://www.cs.toronto.edu/~kriz/cifar.html and extract it there.",
                self.dir.display()
            );
        }

        let mut images = Vec::new();
        for name in Self::files(split) {
            if self.limit.is_some_and(|limit| images.len() >= limit) {
                break;
            }
            let path  = self.dir.join(name);
            let batch = load_batch_file(&path, self.shape(), self.num_classes())?;
            tracing::debug!("Read {} images from '{}'", batch.len(), path.display());
            images.extend(batch);
        }

        if let Some(limit) = self.limit {
            images.truncate(limit);
        }

        tracing::info!("Loaded {} {} images from '{}'", images.len(), split, self.dir.display());
        Ok(images)
    }
}

fn load_batch_file(path: &Path, shape: ImageShape, num_classes: usize) -> Result<Vec<LabeledImage>> {
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read CIFAR-10 batch '{}'", path.display()))?;
    parse_records(&bytes, shape, num_classes)
        .with_context(|| format!("Malformed CIFAR-10 batch '{}'", path.display()))
}

/// Decode a buffer of `<label><pixels>` records.
pub fn parse_records(bytes: &[u8], shape: ImageShape, num_classes: usize) -> Result<Vec<LabeledImage>> {
    let record_len = 1 + shape.len();
    ensure!(
        bytes.len() % record_len == 0,
        "length {} is not a multiple of the {}-byte record size",
        bytes.len(),
        record_len
    );

    bytes
        .chunks_exact(record_len)
        .enumerate()
        .map(|(index, record)| {
            let label = record[0];
            ensure!(
                (label as usize) < num_classes,
                "record {index} has label {label}, expected < {num_classes}"
            );
            Ok(LabeledImage::new(record[1..].to_vec(), label))
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const TINY: ImageShape = ImageShape::new(3, 2, 2);

    fn record(label: u8, fill: u8) -> Vec<u8> {
        let mut r = vec![label];
        r.extend(std::iter::repeat(fill).take(TINY.len()));
        r
    }

    #[test]
    fn test_parses_consecutive_records() {
        let mut bytes = record(3, 10);
        bytes.extend(record(7, 20));

        let images = parse_records(&bytes, TINY, 10).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].label, 3);
        assert_eq!(images[1].label, 7);
        assert_eq!(images[1].pixels, vec![20; 12]);
    }

    #[test]
    fn test_rejects_truncated_buffer() {
        let mut bytes = record(1, 0);
        bytes.pop();
        assert!(parse_records(&bytes, TINY, 10).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_label() {
        let bytes = record(10, 0);
        assert!(parse_records(&bytes, TINY, 10).is_err());
    }

    #[test]
    fn test_empty_buffer_is_empty_batch() {
        assert!(parse_records(&[], TINY, 10).unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let loader = Cifar10Loader::new("does/not/exist/cifar-10-batches-bin");
        let err    = loader.load(Split::Train).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
