//! src/dataset.rs
//!
//! Random-access sample sources.
//!
//! A [`Dataset`] hands out owned [`Sample`]s by index, with an optional
//! transform applied on the way out. Loader workers share datasets through
//! `Arc`, so every implementation must be `Send + Sync`.

use crate::datapoints::{tensor, Label};
use crate::io::read_encoded;
use crate::sample::Sample;
use crate::transforms::Transform;
use anyhow::{anyhow, ensure, Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Index-addressable collection of samples.
pub trait Dataset: Send + Sync {
    /// Returns the (transformed) sample at `index`.
    fn get(&self, index: usize) -> Result<Sample>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type SharedTransform = Arc<dyn Transform>;

fn apply(transform: Option<&SharedTransform>, sample: Sample) -> Result<Sample> {
    match transform {
        Some(t) => t.forward(sample),
        None => Ok(sample),
    }
}

/// A dataset that stores all samples in contiguous memory with
/// atomic-reference counting (`Arc<[Sample]>`).
///
/// Cloning only bumps the `Arc` counters; the samples themselves share their
/// payload buffers, so handing a clone to each worker is cheap.
#[derive(Clone)]
pub struct InMemoryDataset {
    samples: Arc<[Sample]>,
    transform: Option<SharedTransform>,
    metadata: HashMap<String, String>,
}

impl InMemoryDataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples: samples.into(),
            transform: None,
            metadata: HashMap::new(),
        }
    }

    /// Applies `transform` to every sample returned by [`Dataset::get`].
    pub fn with_transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Adds/updates metadata and returns the modified dataset.
    /// Enables chaining: `dataset.with_metadata("split", "train")`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    /// The stored samples, untransformed.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

impl Dataset for InMemoryDataset {
    fn get(&self, index: usize) -> Result<Sample> {
        let sample = self.samples.get(index).cloned().ok_or_else(|| {
            anyhow!(
                "Index {} out of bounds for dataset of length {}",
                index,
                self.samples.len()
            )
        })?;
        apply(self.transform.as_ref(), sample)
            .with_context(|| format!("Failed to transform sample {}", index))
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

impl fmt::Debug for InMemoryDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDataset")
            .field("len", &self.samples.len())
            .field("has_transform", &self.transform.is_some())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Image files read lazily from disk.
///
/// Each sample holds the undecoded bytes under `"image"` (so a
/// [`DecodeImage`](crate::transforms::DecodeImage) stage decides when to pay
/// for decoding) and, when labels were given, a [`Label`] under `"label"`.
#[derive(Clone)]
pub struct ImageFileDataset {
    paths: Arc<[PathBuf]>,
    labels: Option<Arc<[i64]>>,
    transform: Option<SharedTransform>,
}

impl ImageFileDataset {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into(),
            labels: None,
            transform: None,
        }
    }

    pub fn with_labels(mut self, labels: Vec<i64>) -> Result<Self> {
        ensure!(
            labels.len() == self.paths.len(),
            "Expected {} labels, got {}",
            self.paths.len(),
            labels.len()
        );
        self.labels = Some(labels.into());
        Ok(self)
    }

    pub fn with_transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Collects the files directly under `root` whose extension is one of
    /// `extensions` (case-insensitive), sorted by path.
    pub fn from_dir(root: impl AsRef<Path>, extensions: &[&str]) -> Result<Self> {
        let root = root.as_ref();
        let mut paths = std::fs::read_dir(root)
            .with_context(|| format!("Failed to read directory: {}", root.display()))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        paths.retain(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        });
        paths.sort();
        Ok(Self::new(paths))
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Dataset for ImageFileDataset {
    fn get(&self, index: usize) -> Result<Sample> {
        let path = self.paths.get(index).ok_or_else(|| {
            anyhow!(
                "Index {} out of bounds for dataset of length {}",
                index,
                self.paths.len()
            )
        })?;
        let mut sample = Sample::from_single("image", read_encoded(path)?);
        if let Some(labels) = &self.labels {
            let label = Label::new(tensor(&[], vec![labels[index] as f32])?)?;
            sample = sample.with_feature("label", label);
        }
        apply(self.transform.as_ref(), sample)
            .with_context(|| format!("Failed to transform {}", path.display()))
    }

    fn len(&self) -> usize {
        self.paths.len()
    }
}

impl fmt::Debug for ImageFileDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFileDataset")
            .field("len", &self.paths.len())
            .field("labelled", &self.labels.is_some())
            .field("has_transform", &self.transform.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoints::Value;
    use crate::io::encode_png;
    use crate::transforms::{DecodeImage, ToImage};
    use image::{DynamicImage, RgbImage};

    fn create_test_samples(n: usize) -> Result<Vec<Sample>> {
        (0..n)
            .map(|i| {
                Ok(Sample::from_single("x", tensor(&[1, 1, 1], vec![i as f32])?)
                    .with_feature("id", i as i64))
            })
            .collect()
    }

    #[test]
    fn test_in_memory_random_access() -> Result<()> {
        let dataset = InMemoryDataset::new(create_test_samples(3)?).with_metadata("split", "train");

        assert_eq!(dataset.len(), 3);
        assert!(!dataset.is_empty());
        assert_eq!(dataset.get(2)?.get_value("id")?, &Value::Int(2));
        assert_eq!(dataset.metadata("split"), Some("train"));
        assert!(dataset.get(3).is_err());
        Ok(())
    }

    #[test]
    fn test_in_memory_applies_transform() -> Result<()> {
        let dataset = InMemoryDataset::new(create_test_samples(2)?).with_transform(ToImage);
        let sample = dataset.get(1)?;
        let image = sample.get_value("x")?.as_image().cloned().ok_or_else(|| anyhow!("kind"))?;
        assert_eq!(image.data()[[0, 0, 0]], 1.0);
        assert!(dataset.samples()[1].get_value("x")?.as_tensor().is_some());
        Ok(())
    }

    #[test]
    fn test_image_files_from_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["b.png", "a.PNG"] {
            let raster = DynamicImage::ImageRgb8(RgbImage::new(2, 3));
            std::fs::write(dir.path().join(name), encode_png(&raster)?)?;
        }
        std::fs::write(dir.path().join("notes.txt"), "skip")?;

        let dataset = ImageFileDataset::from_dir(dir.path(), &["png"])?
            .with_labels(vec![4, 7])?
            .with_transform(DecodeImage);
        assert_eq!(dataset.len(), 2);
        assert!(dataset.paths()[0].ends_with("a.PNG"));

        let sample = dataset.get(1)?;
        let raster = match sample.get_value("image")? {
            Value::Raster(r) => r.clone(),
            other => return Err(anyhow!("unexpected leaf {:?}", other.kind())),
        };
        assert_eq!((raster.width(), raster.height()), (2, 3));
        assert!(matches!(sample.get_value("label")?, Value::Datapoint(_)));
        Ok(())
    }

    #[test]
    fn test_label_count_must_match() {
        let dataset = ImageFileDataset::new(vec![PathBuf::from("a.png")]);
        assert!(dataset.with_labels(vec![1, 2]).is_err());
    }
}
