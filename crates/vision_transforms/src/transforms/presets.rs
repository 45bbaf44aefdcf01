//! Standard evaluation pipelines.

use super::conversion::ToImage;
use super::core::Transform;
use super::geometric::{CenterCrop, Resize, ResizeTo};
use super::meta::ConvertImageDtype;
use super::photometric::Normalize;
use crate::datapoints::DType;
use crate::dispatch::Dispatcher;
use crate::params::Interpolation;
use crate::sample::Sample;
use anyhow::{Context, Result};

/// Resize the shorter side, center crop, convert to float and normalize.
///
/// # Example
/// ```ignore
/// let eval = ImageClassificationEval::new(224)?; // resize 256, ImageNet statistics
/// let sample = eval.forward(sample)?;
/// ```
#[derive(Debug, Clone)]
pub struct ImageClassificationEval {
    resize: Resize,
    crop: CenterCrop,
    normalize: Normalize,
}

impl ImageClassificationEval {
    pub fn new(crop_size: usize) -> Result<Self> {
        Self::with_options(crop_size, 256, Normalize::imagenet(), Interpolation::Bilinear)
    }

    pub fn with_options(
        crop_size: usize,
        resize_size: usize,
        normalize: Normalize,
        interpolation: Interpolation,
    ) -> Result<Self> {
        Ok(Self {
            resize: Resize::new(ResizeTo::Shorter(resize_size), interpolation)?,
            crop: CenterCrop::new((crop_size, crop_size))?,
            normalize,
        })
    }
}

impl Transform for ImageClassificationEval {
    fn forward_with(&self, sample: Sample, dispatcher: &Dispatcher) -> Result<Sample> {
        let sample = self.resize.forward_with(sample, dispatcher)?;
        let sample = self.crop.forward_with(sample, dispatcher)?;
        let sample = ToImage.forward_with(sample, dispatcher)?;
        let sample = ConvertImageDtype::new(DType::F32).forward_with(sample, dispatcher)?;
        self.normalize
            .forward_with(sample, dispatcher)
            .context("ImageClassificationEval: normalization failed")
    }
}

/// Converts images to float in `[0, 1]`; boxes and labels are untouched.
#[derive(Debug, Clone, Default)]
pub struct ObjectDetectionEval;

impl Transform for ObjectDetectionEval {
    fn forward_with(&self, sample: Sample, dispatcher: &Dispatcher) -> Result<Sample> {
        ToImage
            .then(ConvertImageDtype::new(DType::F32))
            .forward_with(sample, dispatcher)
    }
}

/// Optionally resizes (masks with nearest sampling), then converts images to
/// float and normalizes them.
#[derive(Debug, Clone)]
pub struct SemanticSegmentationEval {
    resize: Option<Resize>,
    normalize: Normalize,
}

impl SemanticSegmentationEval {
    pub fn new(resize_size: Option<usize>) -> Result<Self> {
        let resize = resize_size
            .map(|size| Resize::new(ResizeTo::Shorter(size), Interpolation::Bilinear))
            .transpose()?;
        Ok(Self {
            resize,
            normalize: Normalize::imagenet(),
        })
    }

    pub fn with_normalize(mut self, normalize: Normalize) -> Self {
        self.normalize = normalize;
        self
    }
}

impl Transform for SemanticSegmentationEval {
    fn forward_with(&self, sample: Sample, dispatcher: &Dispatcher) -> Result<Sample> {
        let sample = match &self.resize {
            Some(resize) => resize.forward_with(sample, dispatcher)?,
            None => sample,
        };
        ToImage
            .then(ConvertImageDtype::new(DType::F32))
            .forward_with(sample, dispatcher)
            .and_then(|sample| self.normalize.forward_with(sample, dispatcher))
    }
}
