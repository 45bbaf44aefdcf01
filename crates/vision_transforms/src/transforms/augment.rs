//! Erasing, batch mixing and label encoding.

use super::core::{check_probability, check_range, uniform, TransformNode};
use crate::datapoints::{Datapoint, Kind, Value};
use crate::dispatch::Dispatcher;
use crate::error::VisionError;
use crate::params::Params;
use crate::query;
use crate::rng::{worker_gen_beta, worker_gen_range};
use anyhow::{ensure, Result};
use tracing::{debug, warn};

const IMAGE_LIKE: &[Kind] = &[Kind::Tensor, Kind::Raster, Kind::Image, Kind::Video];

// ============================================================================
// RandomErasing
// ============================================================================

/// Erases a random rectangle of every image with probability `p`.
///
/// The rectangle covers a `scale` fraction of the image with an aspect ratio
/// drawn log-uniformly from `ratio`. When no rectangle fits after a bounded
/// number of attempts, the sample is returned unchanged.
#[derive(Debug, Clone)]
pub struct RandomErasing {
    p: f64,
    scale: (f64, f64),
    ratio: (f64, f64),
    /// Fill in payload units, one entry or one per channel.
    value: Vec<f64>,
}

impl RandomErasing {
    const MAX_ATTEMPTS: usize = 10;

    /// Scale `(0.02, 0.33)`, ratio `(0.3, 3.3)`, fill 0.
    pub fn new(p: f64) -> Result<Self> {
        check_probability(p)?;
        Ok(Self {
            p,
            scale: (0.02, 0.33),
            ratio: (0.3, 3.3),
            value: vec![0.0],
        })
    }

    pub fn with_scale(mut self, scale: (f64, f64)) -> Result<Self> {
        check_range("scale", scale)?;
        ensure!(
            scale.0 >= 0.0 && scale.1 <= 1.0,
            "scale must lie within [0, 1] (got {:?})",
            scale
        );
        self.scale = scale;
        Ok(self)
    }

    pub fn with_ratio(mut self, ratio: (f64, f64)) -> Result<Self> {
        check_range("ratio", ratio)?;
        ensure!(ratio.0 > 0.0, "ratio must be positive (got {:?})", ratio);
        self.ratio = ratio;
        Ok(self)
    }

    pub fn with_value(mut self, value: Vec<f64>) -> Result<Self> {
        ensure!(!value.is_empty(), "erase value must not be empty");
        self.value = value;
        Ok(self)
    }
}

impl TransformNode for RandomErasing {
    fn transformed_kinds(&self) -> &[Kind] {
        IMAGE_LIKE
    }

    fn probability(&self) -> f64 {
        self.p
    }

    fn check_inputs(&self, leaves: &[Value]) -> Result<()> {
        if query::has_any(leaves, &[Kind::BoundingBoxes, Kind::Mask]) {
            warn!("RandomErasing leaves bounding boxes and masks untouched");
        }
        Ok(())
    }

    fn get_params(&self, leaves: &[Value]) -> Result<Params> {
        let (h, w) = query::image_size(leaves)?;
        let channels = query::channel_count(leaves)?;
        if self.value.len() != 1 && self.value.len() != channels {
            return Err(VisionError::parameter(
                "RandomErasing",
                format!(
                    "fill has {} values but the image has {} channels",
                    self.value.len(),
                    channels
                ),
            )
            .into());
        }

        let area = (h * w) as f64;
        let log_ratio = (self.ratio.0.ln(), self.ratio.1.ln());
        for _ in 0..Self::MAX_ATTEMPTS {
            let erase_area = area * uniform(self.scale);
            let aspect = uniform(log_ratio).exp();
            let eh = (erase_area * aspect).sqrt().round() as usize;
            let ew = (erase_area / aspect).sqrt().round() as usize;
            if eh == 0 || ew == 0 || eh >= h || ew >= w {
                continue;
            }
            return Ok(Params::new()
                .with("top", worker_gen_range::<usize, _>(0..=h - eh))
                .with("left", worker_gen_range::<usize, _>(0..=w - ew))
                .with("height", eh)
                .with("width", ew)
                .with("value", self.value.clone()));
        }
        debug!(h, w, "RandomErasing found no region");
        Ok(Params::new())
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        if params.is_empty() {
            return Ok(value);
        }
        dispatcher.dispatch("erase", value, params)
    }
}

// ============================================================================
// Mixup / Cutmix
// ============================================================================

const BATCH_KINDS: &[Kind] = &[Kind::Tensor, Kind::Image, Kind::Video, Kind::OneHotLabel];

fn is_batched_image(value: &Value) -> bool {
    match value {
        Value::Datapoint(Datapoint::Image(image)) => image.data().ndim() >= 4,
        Value::Datapoint(Datapoint::Video(video)) => video.data().ndim() >= 5,
        Value::Tensor(t) => t.ndim() >= 4,
        _ => false,
    }
}

/// Batch mixing needs one batched image or video, a one-hot label and no
/// spatial annotations.
fn check_mixing_inputs(transform: &'static str, leaves: &[Value]) -> Result<()> {
    if query::has_any(leaves, &[Kind::BoundingBoxes, Kind::Mask]) {
        return Err(VisionError::incompatible(
            transform,
            "bounding boxes and masks cannot be mixed across a batch",
        )
        .into());
    }
    if !leaves.iter().any(is_batched_image) {
        return Err(VisionError::incompatible(
            transform,
            "requires a batched image [B, C, H, W] or video [B, T, C, H, W]",
        )
        .into());
    }
    if !query::kind_present(leaves, Kind::OneHotLabel) {
        return Err(VisionError::incompatible(
            transform,
            "requires one-hot labels; apply LabelToOneHot first",
        )
        .into());
    }
    Ok(())
}

/// Blends each sample of a batch with its neighbour, images and one-hot
/// labels alike, with a weight drawn from `Beta(alpha, alpha)`.
#[derive(Debug, Clone)]
pub struct RandomMixup {
    alpha: f64,
    p: f64,
}

impl RandomMixup {
    pub fn new(alpha: f64) -> Result<Self> {
        ensure!(alpha > 0.0, "alpha must be positive (got {})", alpha);
        Ok(Self { alpha, p: 1.0 })
    }

    pub fn with_probability(mut self, p: f64) -> Result<Self> {
        check_probability(p)?;
        self.p = p;
        Ok(self)
    }
}

impl TransformNode for RandomMixup {
    fn transformed_kinds(&self) -> &[Kind] {
        BATCH_KINDS
    }

    fn probability(&self) -> f64 {
        self.p
    }

    fn check_inputs(&self, leaves: &[Value]) -> Result<()> {
        check_mixing_inputs("RandomMixup", leaves)
    }

    fn get_params(&self, _: &[Value]) -> Result<Params> {
        Ok(Params::new().with("lambda", worker_gen_beta(self.alpha, self.alpha)?))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("mixup", value, params)
    }
}

/// Pastes a random box from each batch neighbour; labels are mixed by the
/// pasted area.
#[derive(Debug, Clone)]
pub struct RandomCutmix {
    alpha: f64,
    p: f64,
}

impl RandomCutmix {
    pub fn new(alpha: f64) -> Result<Self> {
        ensure!(alpha > 0.0, "alpha must be positive (got {})", alpha);
        Ok(Self { alpha, p: 1.0 })
    }

    pub fn with_probability(mut self, p: f64) -> Result<Self> {
        check_probability(p)?;
        self.p = p;
        Ok(self)
    }
}

impl TransformNode for RandomCutmix {
    fn transformed_kinds(&self) -> &[Kind] {
        BATCH_KINDS
    }

    fn probability(&self) -> f64 {
        self.p
    }

    fn check_inputs(&self, leaves: &[Value]) -> Result<()> {
        check_mixing_inputs("RandomCutmix", leaves)
    }

    fn get_params(&self, leaves: &[Value]) -> Result<Params> {
        let lambda = worker_gen_beta(self.alpha, self.alpha)?;
        let (h, w) = query::image_size(leaves)?;
        let cx = worker_gen_range::<usize, _>(0..w) as f64;
        let cy = worker_gen_range::<usize, _>(0..h) as f64;
        let cut = (1.0 - lambda).sqrt();
        let (half_w, half_h) = (w as f64 * cut / 2.0, h as f64 * cut / 2.0);

        let x1 = (cx - half_w).max(0.0).floor();
        let y1 = (cy - half_h).max(0.0).floor();
        let x2 = (cx + half_w).min(w as f64).floor();
        let y2 = (cy + half_h).min(h as f64).floor();
        let pasted = (x2 - x1) * (y2 - y1) / (w * h) as f64;

        Ok(Params::new()
            .with("box", vec![x1, y1, x2, y2])
            .with("lambda", 1.0 - pasted))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("cutmix", value, params)
    }
}

// ============================================================================
// LabelToOneHot
// ============================================================================

/// Encodes class-index labels as one-hot rows.
#[derive(Debug, Clone, Default)]
pub struct LabelToOneHot {
    num_categories: Option<usize>,
}

impl LabelToOneHot {
    /// The category count comes from each label's categories, or its largest index.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_categories(num_categories: usize) -> Result<Self> {
        ensure!(num_categories > 0, "num_categories must be positive");
        Ok(Self {
            num_categories: Some(num_categories),
        })
    }
}

impl TransformNode for LabelToOneHot {
    fn transformed_kinds(&self) -> &[Kind] {
        &[Kind::Label]
    }

    fn get_params(&self, _: &[Value]) -> Result<Params> {
        let mut params = Params::new();
        if let Some(n) = self.num_categories {
            params.set("num_categories", n);
        }
        Ok(params)
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("label_to_one_hot", value, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoints::{tensor, BoundingBoxFormat, BoundingBoxes, Image, Label, OneHotLabel};
    use crate::rng::init_worker_rng;
    use crate::sample::Sample;
    use crate::transforms::Transform;
    use anyhow::anyhow;

    fn batch() -> Result<Sample> {
        let images = Image::new(tensor(&[2, 1, 2, 2], vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0])?)?;
        let labels = OneHotLabel::new(tensor(&[2, 2], vec![1.0, 0.0, 0.0, 1.0])?)?;
        Ok(Sample::new()
            .with_feature("image", images)
            .with_feature("label", labels))
    }

    fn data(sample: &Sample, name: &str) -> Result<Vec<f32>> {
        let dp = sample
            .get_value(name)?
            .as_datapoint()
            .ok_or_else(|| anyhow!("{name} is not a datapoint"))?;
        Ok(dp.data().iter().copied().collect())
    }

    #[test]
    fn test_erasing_fills_a_region() -> Result<()> {
        init_worker_rng(0, 0, 31);
        let image = Image::new(tensor(&[1, 20, 20], vec![1.0; 400])?)?;
        let erasing = RandomErasing::new(1.0)?.with_scale((0.1, 0.2))?;
        let out = erasing.forward(Sample::from_single("image", image))?;
        let zeros = data(&out, "image")?.iter().filter(|&&v| v == 0.0).count();
        assert!((20..=120).contains(&zeros), "erased {zeros} pixels");
        Ok(())
    }

    #[test]
    fn test_erasing_without_a_fitting_region_is_identity() -> Result<()> {
        init_worker_rng(0, 0, 32);
        let image = Image::new(tensor(&[1, 2, 2], vec![1.0; 4])?)?;
        let sample = Sample::from_single("image", image);
        let erasing = RandomErasing::new(1.0)?.with_scale((0.9, 1.0))?;
        assert_eq!(erasing.forward(sample.clone())?, sample);
        Ok(())
    }

    #[test]
    fn test_mixup_blends_images_and_labels_alike() -> Result<()> {
        init_worker_rng(0, 0, 33);
        let out = RandomMixup::new(1.0)?.forward(batch()?)?;
        let images = data(&out, "image")?;
        let labels = data(&out, "label")?;
        // out[0] = lambda * 0 + (1 - lambda) * 1, label[0] = [lambda, 1 - lambda]
        assert!((images[0] - labels[1]).abs() < 1e-6);
        assert!((labels[0] + labels[1] - 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_cutmix_label_weight_matches_pasted_area() -> Result<()> {
        init_worker_rng(0, 0, 34);
        let out = RandomCutmix::new(1.0)?.forward(batch()?)?;
        let images = data(&out, "image")?;
        let labels = data(&out, "label")?;
        let pasted = images[..4].iter().filter(|&&v| v == 1.0).count() as f32 / 4.0;
        assert!((labels[1] - pasted).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_mixing_requires_batched_images_and_one_hot_labels() -> Result<()> {
        let unbatched = Sample::new()
            .with_feature("image", Image::new(tensor(&[1, 2, 2], vec![0.0; 4])?)?)
            .with_feature("label", OneHotLabel::new(tensor(&[2], vec![1.0, 0.0])?)?);
        let err = RandomMixup::new(0.2)?.forward(unbatched).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VisionError>(),
            Some(VisionError::IncompatibleInput { .. })
        ));

        let boxes = BoundingBoxes::from_rows(&[[0.0, 0.0, 1.0, 1.0]], BoundingBoxFormat::Xyxy, (2, 2))?;
        let with_boxes = batch()?.with_feature("boxes", boxes);
        assert!(RandomCutmix::new(0.2)?.forward(with_boxes).is_err());

        let plain_labels = batch()?.with_feature("label", Label::new(tensor(&[2], vec![0.0, 1.0])?)?);
        assert!(RandomMixup::new(0.2)?.forward(plain_labels).is_err());
        Ok(())
    }

    #[test]
    fn test_label_to_one_hot() -> Result<()> {
        let label = Label::new(tensor(&[2], vec![1.0, 0.0])?)?;
        let out = LabelToOneHot::with_num_categories(3)?.forward(Sample::from_single("label", label))?;
        assert_eq!(data(&out, "label")?, vec![0.0, 1.0, 0.0, 1.0, 0.0, 0.0]);
        Ok(())
    }
}
