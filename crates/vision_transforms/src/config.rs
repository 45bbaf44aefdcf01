//! src/config.rs
//!
//! Declarative pipelines.
//!
//! A pipeline is a JSON list of transform entries, each tagged with its
//! `type`. Omitted fields take the same defaults as the Rust constructors.
//!
//! ```ignore
//! let config = PipelineConfig::from_json(r#"{
//!     "transforms": [
//!         {"type": "DecodeImage"},
//!         {"type": "ToImage"},
//!         {"type": "RandomResizedCrop", "size": [224, 224]},
//!         {"type": "RandomHorizontalFlip", "p": 0.5},
//!         {"type": "ConvertImageDtype", "dtype": "f32"},
//!         {"type": "Normalize", "mean": [0.485, 0.456, 0.406], "std": [0.229, 0.224, 0.225]}
//!     ]
//! }"#)?;
//! let pipeline = config.build()?;
//! ```

use crate::datapoints::{BoundingBoxFormat, ColorSpace, DType};
use crate::params::Interpolation;
use crate::transforms::{
    AutoAugment, AutoAugmentPolicy, BoxedTransform, CenterCrop, ClampBoundingBoxes, CleanupBoxes, ColorJitter, Compose,
    ConvertBoundingBoxFormat, ConvertColorSpace, ConvertImageDtype, DecodeImage, GaussianBlur, Grayscale, Identity,
    ImageClassificationEval, LabelToOneHot, Normalize, ObjectDetectionEval, Pad, RandAugment, RandomAdjustSharpness,
    RandomAffine, RandomApply, RandomAutocontrast, RandomChoice, RandomCrop, RandomCutmix, RandomEqualize,
    RandomErasing, RandomGrayscale, RandomHorizontalFlip, RandomInvert, RandomIoUCrop, RandomMixup, RandomOrder,
    RandomPhotometricDistort, RandomPosterize, RandomResizedCrop, RandomRotation, RandomShortestSize, RandomSolarize,
    RandomVerticalFlip, RandomZoomOut, Resize, ResizeTo, ScaleJitter, SemanticSegmentationEval, ToImage, ToRaster, Transform, TrivialAugmentWide, UniformTemporalSubsample,
};
use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

fn default_half() -> f64 {
    0.5
}

fn default_tenth() -> f64 {
    0.1
}

fn default_one() -> f64 {
    1.0
}

fn default_erasing_scale() -> (f64, f64) {
    (0.02, 0.33)
}

fn default_erasing_ratio() -> (f64, f64) {
    (0.3, 3.3)
}

fn default_crop_scale() -> (f64, f64) {
    (0.08, 1.0)
}

fn default_crop_ratio() -> (f64, f64) {
    (3.0 / 4.0, 4.0 / 3.0)
}

fn default_zoom_side_range() -> (f64, f64) {
    (1.0, 4.0)
}

fn default_num_channels() -> usize {
    1
}

fn default_num_ops() -> usize {
    2
}

fn default_magnitude() -> usize {
    9
}

fn default_bins() -> usize {
    31
}

fn default_resize_size() -> usize {
    256
}

/// One stage of a [`PipelineConfig`].
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum TransformConfig {
    RandomHorizontalFlip {
        #[serde(default = "default_half")]
        p: f64,
    },
    RandomVerticalFlip {
        #[serde(default = "default_half")]
        p: f64,
    },
    /// `size` is `[height, width]`, or `[shorter_side]` to keep the aspect ratio
    Resize {
        size: Vec<usize>,
        #[serde(default)]
        interpolation: Interpolation,
        max_size: Option<usize>,
    },
    RandomShortestSize {
        min_size: Vec<usize>,
        max_size: Option<usize>,
        #[serde(default)]
        interpolation: Interpolation,
    },
    ScaleJitter {
        target_size: (usize, usize),
        scale_range: Option<(f64, f64)>,
        #[serde(default)]
        interpolation: Interpolation,
    },
    CenterCrop {
        size: (usize, usize),
    },
    RandomCrop {
        size: (usize, usize),
        padding: Option<Vec<usize>>,
        #[serde(default)]
        pad_if_needed: bool,
        #[serde(default)]
        fill: f64,
    },
    RandomResizedCrop {
        size: (usize, usize),
        #[serde(default = "default_crop_scale")]
        scale: (f64, f64),
        #[serde(default = "default_crop_ratio")]
        ratio: (f64, f64),
        #[serde(default)]
        interpolation: Interpolation,
    },
    Pad {
        padding: Vec<usize>,
        #[serde(default)]
        fill: f64,
    },
    RandomZoomOut {
        #[serde(default = "default_zoom_side_range")]
        side_range: (f64, f64),
        #[serde(default)]
        fill: f64,
        #[serde(default = "default_half")]
        p: f64,
    },
    RandomRotation {
        degrees: (f64, f64),
        #[serde(default)]
        interpolation: Interpolation,
        #[serde(default)]
        fill: f64,
    },
    RandomAffine {
        degrees: (f64, f64),
        translate: Option<(f64, f64)>,
        scale: Option<(f64, f64)>,
        /// `[x_min, x_max, y_min, y_max]` in degrees
        shear: Option<[f64; 4]>,
        #[serde(default)]
        interpolation: Interpolation,
        #[serde(default)]
        fill: f64,
    },
    RandomIoUCrop {
        scale: Option<(f64, f64)>,
        aspect_ratio: Option<(f64, f64)>,
        sampler_options: Option<Vec<f64>>,
        trials: Option<usize>,
    },
    ColorJitter {
        #[serde(default)]
        brightness: f64,
        #[serde(default)]
        contrast: f64,
        #[serde(default)]
        saturation: f64,
        #[serde(default)]
        hue: f64,
    },
    Grayscale {
        #[serde(default = "default_num_channels")]
        num_output_channels: usize,
    },
    RandomGrayscale {
        #[serde(default = "default_tenth")]
        p: f64,
    },
    GaussianBlur {
        kernel_size: (usize, usize),
        sigma: Option<(f64, f64)>,
    },
    RandomPhotometricDistort {
        #[serde(default = "default_half")]
        p: f64,
    },
    RandomInvert {
        #[serde(default = "default_half")]
        p: f64,
    },
    RandomPosterize {
        bits: u8,
        #[serde(default = "default_half")]
        p: f64,
    },
    RandomSolarize {
        threshold: f64,
        #[serde(default = "default_half")]
        p: f64,
    },
    RandomAutocontrast {
        #[serde(default = "default_half")]
        p: f64,
    },
    RandomEqualize {
        #[serde(default = "default_half")]
        p: f64,
    },
    RandomAdjustSharpness {
        sharpness_factor: f64,
        #[serde(default = "default_half")]
        p: f64,
    },
    Normalize {
        mean: Vec<f64>,
        std: Vec<f64>,
    },
    ConvertBoundingBoxFormat {
        format: BoundingBoxFormat,
    },
    ClampBoundingBoxes,
    CleanupBoxes {
        #[serde(default = "default_one")]
        min_size: f64,
    },
    ConvertImageDtype {
        dtype: DType,
    },
    ConvertColorSpace {
        color_space: ColorSpace,
    },
    RandomErasing {
        #[serde(default = "default_half")]
        p: f64,
        #[serde(default = "default_erasing_scale")]
        scale: (f64, f64),
        #[serde(default = "default_erasing_ratio")]
        ratio: (f64, f64),
        value: Option<Vec<f64>>,
    },
    RandomMixup {
        alpha: f64,
        #[serde(default = "default_one")]
        p: f64,
    },
    RandomCutmix {
        alpha: f64,
        #[serde(default = "default_one")]
        p: f64,
    },
    LabelToOneHot {
        num_categories: Option<usize>,
    },
    AutoAugment {
        #[serde(default)]
        policy: AutoAugmentPolicy,
        interpolation: Option<Interpolation>,
        fill: Option<f64>,
    },
    RandAugment {
        #[serde(default = "default_num_ops")]
        num_ops: usize,
        #[serde(default = "default_magnitude")]
        magnitude: usize,
        #[serde(default = "default_bins")]
        num_magnitude_bins: usize,
        interpolation: Option<Interpolation>,
        fill: Option<f64>,
    },
    TrivialAugmentWide {
        #[serde(default = "default_bins")]
        num_magnitude_bins: usize,
        interpolation: Option<Interpolation>,
        fill: Option<f64>,
    },
    UniformTemporalSubsample {
        num_samples: usize,
    },
    DecodeImage,
    ToImage,
    ToRaster,
    Identity,
    Compose {
        transforms: Vec<TransformConfig>,
    },
    RandomApply {
        transforms: Vec<TransformConfig>,
        #[serde(default = "default_half")]
        p: f64,
    },
    RandomChoice {
        transforms: Vec<TransformConfig>,
        weights: Option<Vec<f64>>,
    },
    RandomOrder {
        transforms: Vec<TransformConfig>,
    },
    ImageClassificationEval {
        crop_size: usize,
        #[serde(default = "default_resize_size")]
        resize_size: usize,
        mean: Option<Vec<f64>>,
        std: Option<Vec<f64>>,
        #[serde(default)]
        interpolation: Interpolation,
    },
    ObjectDetectionEval,
    SemanticSegmentationEval {
        resize_size: Option<usize>,
        mean: Option<Vec<f64>>,
        std: Option<Vec<f64>>,
    },
}

fn boxed(transform: impl Transform + 'static) -> Result<BoxedTransform> {
    Ok(Box::new(transform))
}

fn build_all(configs: &[TransformConfig]) -> Result<Vec<BoxedTransform>> {
    configs.iter().map(TransformConfig::build).collect()
}

fn normalize_or_imagenet(mean: &Option<Vec<f64>>, std: &Option<Vec<f64>>) -> Result<Normalize> {
    match (mean, std) {
        (Some(mean), Some(std)) => Normalize::new(mean.clone(), std.clone()),
        (None, None) => Ok(Normalize::imagenet()),
        _ => bail!("mean and std must be given together"),
    }
}

impl TransformConfig {
    /// Instantiates the described transform, validating its parameters.
    pub fn build(&self) -> Result<BoxedTransform> {
        use TransformConfig as C;
        match self {
            C::RandomHorizontalFlip { p } => boxed(RandomHorizontalFlip::new(*p)?),
            C::RandomVerticalFlip { p } => boxed(RandomVerticalFlip::new(*p)?),
            C::Resize {
                size,
                interpolation,
                max_size,
            } => {
                let target = match size.as_slice() {
                    [side] => ResizeTo::Shorter(*side),
                    [h, w] => ResizeTo::Exact(*h, *w),
                    _ => bail!("Resize size must have 1 or 2 elements (got {})", size.len()),
                };
                let resize = Resize::new(target, *interpolation)?;
                match max_size {
                    Some(max) => boxed(resize.with_max_size(*max)?),
                    None => boxed(resize),
                }
            }
            C::RandomShortestSize {
                min_size,
                max_size,
                interpolation,
            } => {
                let resize = RandomShortestSize::new(min_size.clone())?.with_interpolation(*interpolation);
                match max_size {
                    Some(max) => boxed(resize.with_max_size(*max)?),
                    None => boxed(resize),
                }
            }
            C::ScaleJitter {
                target_size,
                scale_range,
                interpolation,
            } => {
                let jitter = ScaleJitter::new(*target_size)?.with_interpolation(*interpolation);
                match scale_range {
                    Some(range) => boxed(jitter.with_scale_range(*range)?),
                    None => boxed(jitter),
                }
            }
            C::CenterCrop { size } => boxed(CenterCrop::new(*size)?),
            C::RandomCrop {
                size,
                padding,
                pad_if_needed,
                fill,
            } => {
                let mut crop = RandomCrop::new(*size)?
                    .pad_if_needed(*pad_if_needed)
                    .with_fill(*fill);
                if let Some(padding) = padding {
                    crop = crop.with_padding(padding)?;
                }
                boxed(crop)
            }
            C::RandomResizedCrop {
                size,
                scale,
                ratio,
                interpolation,
            } => boxed(RandomResizedCrop::with_ranges(*size, *scale, *ratio)?.with_interpolation(*interpolation)),
            C::Pad { padding, fill } => boxed(Pad::new(padding)?.with_fill(*fill)),
            C::RandomZoomOut { side_range, fill, p } => boxed(
                RandomZoomOut::new()
                    .with_side_range(*side_range)?
                    .with_fill(*fill)
                    .with_probability(*p)?,
            ),
            C::RandomRotation {
                degrees,
                interpolation,
                fill,
            } => boxed(
                RandomRotation::new(*degrees)?
                    .with_interpolation(*interpolation)
                    .with_fill(*fill),
            ),
            C::RandomAffine {
                degrees,
                translate,
                scale,
                shear,
                interpolation,
                fill,
            } => {
                let mut affine = RandomAffine::new(*degrees)?
                    .with_interpolation(*interpolation)
                    .with_fill(*fill);
                if let Some(translate) = translate {
                    affine = affine.with_translate(*translate)?;
                }
                if let Some(scale) = scale {
                    affine = affine.with_scale(*scale)?;
                }
                if let Some(shear) = shear {
                    affine = affine.with_shear(*shear)?;
                }
                boxed(affine)
            }
            C::RandomIoUCrop {
                scale,
                aspect_ratio,
                sampler_options,
                trials,
            } => {
                let mut crop = RandomIoUCrop::new();
                if let Some(scale) = scale {
                    crop = crop.with_scale(*scale)?;
                }
                if let Some(aspect_ratio) = aspect_ratio {
                    crop = crop.with_aspect_ratio(*aspect_ratio)?;
                }
                if let Some(options) = sampler_options {
                    crop = crop.with_sampler_options(options.clone())?;
                }
                if let Some(trials) = trials {
                    crop = crop.with_trials(*trials)?;
                }
                boxed(crop)
            }
            C::ColorJitter {
                brightness,
                contrast,
                saturation,
                hue,
            } => boxed(
                ColorJitter::new()
                    .brightness(*brightness)?
                    .contrast(*contrast)?
                    .saturation(*saturation)?
                    .hue(*hue)?,
            ),
            C::Grayscale { num_output_channels } => boxed(Grayscale::new(*num_output_channels)?),
            C::RandomGrayscale { p } => boxed(RandomGrayscale::new(*p)?),
            C::GaussianBlur { kernel_size, sigma } => {
                let blur = GaussianBlur::new(*kernel_size)?;
                match sigma {
                    Some(sigma) => boxed(blur.with_sigma(*sigma)?),
                    None => boxed(blur),
                }
            }
            C::RandomPhotometricDistort { p } => boxed(RandomPhotometricDistort::new().with_probability(*p)?),
            C::RandomInvert { p } => boxed(RandomInvert::new(*p)?),
            C::RandomPosterize { bits, p } => boxed(RandomPosterize::new(*bits, *p)?),
            C::RandomSolarize { threshold, p } => boxed(RandomSolarize::new(*threshold, *p)?),
            C::RandomAutocontrast { p } => boxed(RandomAutocontrast::new(*p)?),
            C::RandomEqualize { p } => boxed(RandomEqualize::new(*p)?),
            C::RandomAdjustSharpness { sharpness_factor, p } => {
                boxed(RandomAdjustSharpness::new(*sharpness_factor, *p)?)
            }
            C::Normalize { mean, std } => boxed(Normalize::new(mean.clone(), std.clone())?),
            C::ConvertBoundingBoxFormat { format } => boxed(ConvertBoundingBoxFormat::new(*format)),
            C::ClampBoundingBoxes => boxed(ClampBoundingBoxes),
            C::CleanupBoxes { min_size } => boxed(CleanupBoxes::new(*min_size)?),
            C::ConvertImageDtype { dtype } => boxed(ConvertImageDtype::new(*dtype)),
            C::ConvertColorSpace { color_space } => boxed(ConvertColorSpace::new(*color_space)),
            C::RandomErasing {
                p,
                scale,
                ratio,
                value,
            } => {
                let mut erasing = RandomErasing::new(*p)?.with_scale(*scale)?.with_ratio(*ratio)?;
                if let Some(value) = value {
                    erasing = erasing.with_value(value.clone())?;
                }
                boxed(erasing)
            }
            C::RandomMixup { alpha, p } => boxed(RandomMixup::new(*alpha)?.with_probability(*p)?),
            C::RandomCutmix { alpha, p } => boxed(RandomCutmix::new(*alpha)?.with_probability(*p)?),
            C::LabelToOneHot { num_categories } => match num_categories {
                Some(n) => boxed(LabelToOneHot::with_num_categories(*n)?),
                None => boxed(LabelToOneHot::new()),
            },
            C::AutoAugment {
                policy,
                interpolation,
                fill,
            } => {
                let mut augment = AutoAugment::new(*policy);
                if let Some(interpolation) = interpolation {
                    augment = augment.with_interpolation(*interpolation);
                }
                if let Some(fill) = fill {
                    augment = augment.with_fill(*fill);
                }
                boxed(augment)
            }
            C::RandAugment {
                num_ops,
                magnitude,
                num_magnitude_bins,
                interpolation,
                fill,
            } => {
                let mut augment = RandAugment::new()
                    .with_num_ops(*num_ops)
                    .with_magnitude(*magnitude, *num_magnitude_bins)?;
                if let Some(interpolation) = interpolation {
                    augment = augment.with_interpolation(*interpolation);
                }
                if let Some(fill) = fill {
                    augment = augment.with_fill(*fill);
                }
                boxed(augment)
            }
            C::TrivialAugmentWide {
                num_magnitude_bins,
                interpolation,
                fill,
            } => {
                let mut augment = TrivialAugmentWide::new().with_num_magnitude_bins(*num_magnitude_bins)?;
                if let Some(interpolation) = interpolation {
                    augment = augment.with_interpolation(*interpolation);
                }
                if let Some(fill) = fill {
                    augment = augment.with_fill(*fill);
                }
                boxed(augment)
            }
            C::UniformTemporalSubsample { num_samples } => {
                boxed(UniformTemporalSubsample::new(*num_samples)?)
            }
            C::DecodeImage => boxed(DecodeImage),
            C::ToImage => boxed(ToImage),
            C::ToRaster => boxed(ToRaster),
            C::Identity => boxed(Identity),
            C::Compose { transforms } => boxed(Compose::new(build_all(transforms)?)),
            C::RandomApply { transforms, p } => boxed(RandomApply::new(build_all(transforms)?, *p)?),
            C::RandomChoice { transforms, weights } => match weights {
                Some(w) => boxed(RandomChoice::with_weights(build_all(transforms)?, w.clone())?),
                None => boxed(RandomChoice::new(build_all(transforms)?)?),
            },
            C::RandomOrder { transforms } => boxed(RandomOrder::new(build_all(transforms)?)),
            C::ImageClassificationEval {
                crop_size,
                resize_size,
                mean,
                std,
                interpolation,
            } => boxed(ImageClassificationEval::with_options(
                *crop_size,
                *resize_size,
                normalize_or_imagenet(mean, std)?,
                *interpolation,
            )?),
            C::ObjectDetectionEval => boxed(ObjectDetectionEval),
            C::SemanticSegmentationEval {
                resize_size,
                mean,
                std,
            } => boxed(
                SemanticSegmentationEval::new(*resize_size)?
                    .with_normalize(normalize_or_imagenet(mean, std)?),
            ),
        }
    }
}

/// A list of transform stages applied in order.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub transforms: Vec<TransformConfig>,
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse pipeline config")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config: {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid pipeline config: {}", path.display()))
    }

    /// Builds every stage into a [`Compose`].
    pub fn build(&self) -> Result<Compose> {
        ensure!(!self.transforms.is_empty(), "Pipeline config has no transforms");
        let transforms = self
            .transforms
            .iter()
            .enumerate()
            .map(|(i, config)| config.build().with_context(|| format!("Invalid transform #{}", i)))
            .collect::<Result<Vec<_>>>()?;
        debug!(stages = transforms.len(), "built pipeline from config");
        Ok(Compose::new(transforms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoints::{tensor, BoundingBoxes, Image, Value};
    use crate::sample::Sample;
    use anyhow::anyhow;

    #[test]
    fn test_parse_and_run_flip_pipeline() -> Result<()> {
        let config = PipelineConfig::from_json(
            r#"{"transforms": [
                {"type": "RandomHorizontalFlip", "p": 1.0},
                {"type": "ConvertBoundingBoxFormat", "format": "XYWH"}
            ]}"#,
        )?;
        let pipeline = config.build()?;
        assert_eq!(pipeline.len(), 2);

        let image = Image::new(tensor(&[1, 2, 2], vec![0.0, 1.0, 0.0, 1.0])?)?;
        let boxes = BoundingBoxes::from_rows(&[[0.0, 0.0, 1.0, 1.0]], BoundingBoxFormat::Xyxy, (2, 2))?;
        let out = pipeline.forward(Sample::from_single("image", image).with_feature("boxes", boxes))?;

        let image = out.get_value("image")?.as_image().cloned().ok_or_else(|| anyhow!("kind"))?;
        assert_eq!(image.data().iter().copied().collect::<Vec<_>>(), vec![1.0, 0.0, 1.0, 0.0]);
        let boxes = out.get_value("boxes")?.as_bounding_boxes().cloned().ok_or_else(|| anyhow!("kind"))?;
        assert_eq!(boxes.format(), BoundingBoxFormat::Xywh);
        assert_eq!(boxes.rows(), vec![[1.0, 0.0, 1.0, 1.0]]);
        Ok(())
    }

    #[test]
    fn test_defaults_and_nesting() -> Result<()> {
        let config = PipelineConfig::from_json(
            r#"{"transforms": [
                {"type": "RandomApply", "transforms": [{"type": "ColorJitter", "brightness": 0.4}]},
                {"type": "Resize", "size": [32]},
                {"type": "RandAugment"},
                {"type": "ImageClassificationEval", "crop_size": 16}
            ]}"#,
        )?;
        match &config.transforms[0] {
            TransformConfig::RandomApply { transforms, p } => {
                assert_eq!(*p, 0.5);
                assert_eq!(transforms.len(), 1);
            }
            other => return Err(anyhow!("unexpected config {:?}", other)),
        }
        assert_eq!(config.build()?.len(), 4);
        Ok(())
    }

    #[test]
    fn test_detection_entries() -> Result<()> {
        let config = PipelineConfig::from_json(
            r#"{"transforms": [
                {"type": "RandomPhotometricDistort"},
                {"type": "GaussianBlur", "kernel_size": [3, 3], "sigma": [0.5, 1.0]},
                {"type": "CleanupBoxes"},
                {"type": "RandomShortestSize", "min_size": [480, 512], "max_size": 1333},
                {"type": "ScaleJitter", "target_size": [1024, 1024]}
            ]}"#,
        )?;
        match &config.transforms[2] {
            TransformConfig::CleanupBoxes { min_size } => assert_eq!(*min_size, 1.0),
            other => return Err(anyhow!("unexpected config {:?}", other)),
        }
        assert_eq!(config.build()?.len(), 5);

        let even = PipelineConfig::from_json(r#"{"transforms": [{"type": "GaussianBlur", "kernel_size": [2, 3]}]}"#)?;
        assert!(even.build().is_err());
        Ok(())
    }

    #[test]
    fn test_rejects_unknown_type_and_bad_values() -> Result<()> {
        assert!(PipelineConfig::from_json(r#"{"transforms": [{"type": "Sharpen"}]}"#).is_err());

        let bad_p = PipelineConfig::from_json(r#"{"transforms": [{"type": "RandomVerticalFlip", "p": 2.0}]}"#)?;
        let err = bad_p.build().unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid transform #0"));

        let bad_size = PipelineConfig::from_json(r#"{"transforms": [{"type": "Resize", "size": [1, 2, 3]}]}"#)?;
        assert!(bad_size.build().is_err());

        assert!(PipelineConfig::from_json(r#"{"transforms": []}"#)?.build().is_err());
        Ok(())
    }

    #[test]
    fn test_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pipeline.json");
        std::fs::write(
            &path,
            r#"{"transforms": [{"type": "ToImage"}, {"type": "ConvertImageDtype", "dtype": "f32"}]}"#,
        )?;
        let pipeline = PipelineConfig::from_file(&path)?.build()?;
        let out = pipeline.forward(Sample::from_single("x", tensor(&[1, 1, 1], vec![0.5])?))?;
        assert!(matches!(out.get_value("x")?, Value::Datapoint(_)));
        Ok(())
    }
}
