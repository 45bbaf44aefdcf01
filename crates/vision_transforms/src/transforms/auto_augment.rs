//! Learned and random augmentation policies: AutoAugment, RandAugment and
//! TrivialAugmentWide.
//!
//! Each policy picks a short list of `(operation, magnitude)` pairs per call
//! and applies them in order to the whole sample. Geometric operations move
//! every spatial leaf together; photometric ones only touch image-like leaves.

use super::core::{Transform, PHOTOMETRIC, SPATIAL};
use crate::datapoints::Value;
use crate::dispatch::Dispatcher;
use crate::params::{Interpolation, Params};
use crate::query;
use crate::rng::{worker_gen_bool, worker_gen_range};
use crate::sample::Sample;
use crate::tree::{flatten, rebuild};
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use tracing::trace;

/// Operations shared by the policies below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AugmentOp {
    Identity,
    ShearX,
    ShearY,
    TranslateX,
    TranslateY,
    Rotate,
    Brightness,
    Color,
    Contrast,
    Sharpness,
    Posterize,
    Solarize,
    AutoContrast,
    Equalize,
    Invert,
}

/// Magnitude ranges: the standard space of AutoAugment and RandAugment, or
/// the wider one of TrivialAugment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Space {
    Standard,
    Wide,
}

fn linspace(lo: f64, hi: f64, bins: usize, index: usize) -> f64 {
    if bins <= 1 {
        return lo;
    }
    lo + (hi - lo) * index as f64 / (bins - 1) as f64
}

impl AugmentOp {
    fn is_geometric(self) -> bool {
        matches!(
            self,
            AugmentOp::ShearX
                | AugmentOp::ShearY
                | AugmentOp::TranslateX
                | AugmentOp::TranslateY
                | AugmentOp::Rotate
        )
    }

    /// Whether the magnitude is negated with probability 0.5.
    fn is_signed(self) -> bool {
        self.is_geometric()
            || matches!(
                self,
                AugmentOp::Brightness | AugmentOp::Color | AugmentOp::Contrast | AugmentOp::Sharpness
            )
    }

    /// Magnitude of bin `index` out of `bins`; `None` for operations without
    /// one. Solarize yields a fraction of the value range.
    fn magnitude(self, space: Space, bins: usize, index: usize, (h, w): (usize, usize)) -> Option<f64> {
        let wide = space == Space::Wide;
        let value = match self {
            AugmentOp::ShearX | AugmentOp::ShearY => linspace(0.0, if wide { 0.99 } else { 0.3 }, bins, index),
            AugmentOp::TranslateX if wide => linspace(0.0, 32.0, bins, index),
            AugmentOp::TranslateY if wide => linspace(0.0, 32.0, bins, index),
            AugmentOp::TranslateX => linspace(0.0, 150.0 / 331.0 * w as f64, bins, index),
            AugmentOp::TranslateY => linspace(0.0, 150.0 / 331.0 * h as f64, bins, index),
            AugmentOp::Rotate => linspace(0.0, if wide { 135.0 } else { 30.0 }, bins, index),
            AugmentOp::Brightness | AugmentOp::Color | AugmentOp::Contrast | AugmentOp::Sharpness => {
                linspace(0.0, if wide { 0.99 } else { 0.9 }, bins, index)
            }
            AugmentOp::Posterize => {
                let step = (bins.max(2) - 1) as f64 / if wide { 6.0 } else { 4.0 };
                8.0 - (index as f64 / step).round()
            }
            AugmentOp::Solarize => linspace(1.0, 0.0, bins, index),
            AugmentOp::Identity | AugmentOp::AutoContrast | AugmentOp::Equalize | AugmentOp::Invert => {
                return None
            }
        };
        Some(value)
    }

    fn apply(self, value: Value, magnitude: f64, fill: &Fill, dispatcher: &Dispatcher) -> Result<Value> {
        let kinds = if self.is_geometric() { SPATIAL } else { PHOTOMETRIC };
        if !value.kind().is_some_and(|kind| kinds.contains(&kind)) {
            return Ok(value);
        }

        let affine = || {
            Params::new()
                .with("angle", 0.0)
                .with("translate", vec![0.0, 0.0])
                .with("scale", 1.0)
                .with("shear", vec![0.0, 0.0])
                .with("interpolation", fill.interpolation)
                .with("fill", fill.fill)
        };
        let factor = |m: f64| Params::new().with("factor", 1.0 + m);

        let (op, params) = match self {
            AugmentOp::Identity => return Ok(value),
            AugmentOp::ShearX => ("affine", affine().with("shear", vec![magnitude.to_degrees(), 0.0])),
            AugmentOp::ShearY => ("affine", affine().with("shear", vec![0.0, magnitude.to_degrees()])),
            AugmentOp::TranslateX => ("affine", affine().with("translate", vec![magnitude.trunc(), 0.0])),
            AugmentOp::TranslateY => ("affine", affine().with("translate", vec![0.0, magnitude.trunc()])),
            AugmentOp::Rotate => (
                "rotate",
                Params::new()
                    .with("angle", magnitude)
                    .with("interpolation", fill.interpolation)
                    .with("fill", fill.fill),
            ),
            AugmentOp::Brightness => ("adjust_brightness", factor(magnitude)),
            AugmentOp::Color => ("adjust_saturation", factor(magnitude)),
            AugmentOp::Contrast => ("adjust_contrast", factor(magnitude)),
            AugmentOp::Sharpness => ("adjust_sharpness", factor(magnitude)),
            AugmentOp::Posterize => ("posterize", Params::new().with("bits", magnitude as i64)),
            AugmentOp::Solarize => {
                let threshold = magnitude * query::value_bound(&value) as f64;
                ("solarize", Params::new().with("threshold", threshold))
            }
            AugmentOp::AutoContrast => ("autocontrast", Params::new()),
            AugmentOp::Equalize => ("equalize", Params::new()),
            AugmentOp::Invert => ("invert", Params::new()),
        };
        dispatcher.dispatch(op, value, &params)
    }
}

/// Resampling settings shared by the geometric operations.
#[derive(Debug, Clone, Copy)]
struct Fill {
    interpolation: Interpolation,
    fill: f64,
}

impl Default for Fill {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::Nearest,
            fill: 0.0,
        }
    }
}

/// Draws a magnitude for `op`, flipping its sign for signed operations.
fn draw(op: AugmentOp, space: Space, bins: usize, index: usize, size: (usize, usize)) -> (AugmentOp, f64) {
    let magnitude = match op.magnitude(space, bins, index, size) {
        Some(m) if op.is_signed() && worker_gen_bool(0.5) => -m,
        Some(m) => m,
        None => 0.0,
    };
    (op, magnitude)
}

/// Flattens once, applies the chosen operations in order and rebuilds.
fn run(
    name: &str,
    sample: Sample,
    fill: &Fill,
    dispatcher: &Dispatcher,
    choose: impl FnOnce((usize, usize)) -> Vec<(AugmentOp, f64)>,
) -> Result<Sample> {
    let (mut leaves, spec) = flatten(sample);
    let ops = choose(query::image_size(&leaves)?);
    for (op, magnitude) in ops {
        trace!(transform = name, ?op, magnitude, "auto augment");
        leaves = leaves
            .into_iter()
            .map(|leaf| op.apply(leaf, magnitude, fill, dispatcher))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("{name}: {op:?} failed"))?;
    }
    Ok(rebuild(leaves, &spec)?)
}

// ============================================================================
// AutoAugment
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoAugmentPolicy {
    #[default]
    ImageNet,
    Cifar10,
    Svhn,
}

/// `(operation, probability, magnitude bin)`
type Step = (AugmentOp, f64, Option<usize>);

use AugmentOp::*;

#[rustfmt::skip]
static IMAGENET_POLICY: [[Step; 2]; 25] = [
    [(Posterize, 0.4, Some(8)), (Rotate, 0.6, Some(9))],
    [(Solarize, 0.6, Some(5)), (AutoContrast, 0.6, None)],
    [(Equalize, 0.8, None), (Equalize, 0.6, None)],
    [(Posterize, 0.6, Some(7)), (Posterize, 0.6, Some(6))],
    [(Equalize, 0.4, None), (Solarize, 0.2, Some(4))],
    [(Equalize, 0.4, None), (Rotate, 0.8, Some(8))],
    [(Solarize, 0.6, Some(3)), (Equalize, 0.6, None)],
    [(Posterize, 0.8, Some(5)), (Equalize, 1.0, None)],
    [(Rotate, 0.2, Some(3)), (Solarize, 0.6, Some(8))],
    [(Equalize, 0.6, None), (Posterize, 0.4, Some(6))],
    [(Rotate, 0.8, Some(8)), (Color, 0.4, Some(0))],
    [(Rotate, 0.4, Some(9)), (Equalize, 0.6, None)],
    [(Equalize, 0.0, None), (Equalize, 0.8, None)],
    [(Invert, 0.6, None), (Equalize, 1.0, None)],
    [(Color, 0.6, Some(4)), (Contrast, 1.0, Some(8))],
    [(Rotate, 0.8, Some(8)), (Color, 1.0, Some(2))],
    [(Color, 0.8, Some(8)), (Solarize, 0.8, Some(7))],
    [(Sharpness, 0.4, Some(7)), (Invert, 0.6, None)],
    [(ShearX, 0.6, Some(5)), (Equalize, 1.0, None)],
    [(Color, 0.4, Some(0)), (Equalize, 0.6, None)],
    [(Equalize, 0.4, None), (Solarize, 0.2, Some(4))],
    [(Solarize, 0.6, Some(5)), (AutoContrast, 0.6, None)],
    [(Invert, 0.6, None), (Equalize, 1.0, None)],
    [(Color, 0.6, Some(4)), (Contrast, 1.0, Some(8))],
    [(Equalize, 0.8, None), (Equalize, 0.6, None)],
];

#[rustfmt::skip]
static CIFAR10_POLICY: [[Step; 2]; 25] = [
    [(Invert, 0.1, None), (Contrast, 0.2, Some(6))],
    [(Rotate, 0.7, Some(2)), (TranslateX, 0.3, Some(9))],
    [(Sharpness, 0.8, Some(1)), (Sharpness, 0.9, Some(3))],
    [(ShearY, 0.5, Some(8)), (TranslateY, 0.7, Some(9))],
    [(AutoContrast, 0.5, None), (Equalize, 0.9, None)],
    [(ShearY, 0.2, Some(7)), (Posterize, 0.3, Some(7))],
    [(Color, 0.4, Some(3)), (Brightness, 0.6, Some(7))],
    [(Sharpness, 0.3, Some(9)), (Brightness, 0.7, Some(9))],
    [(Equalize, 0.6, None), (Equalize, 0.5, None)],
    [(Contrast, 0.6, Some(7)), (Sharpness, 0.6, Some(5))],
    [(Color, 0.7, Some(7)), (TranslateX, 0.5, Some(8))],
    [(Equalize, 0.3, None), (AutoContrast, 0.4, None)],
    [(TranslateY, 0.4, Some(3)), (Sharpness, 0.2, Some(6))],
    [(Brightness, 0.9, Some(6)), (Color, 0.2, Some(8))],
    [(Solarize, 0.5, Some(2)), (Invert, 0.0, None)],
    [(Equalize, 0.2, None), (AutoContrast, 0.6, None)],
    [(Equalize, 0.2, None), (Equalize, 0.6, None)],
    [(Color, 0.9, Some(9)), (Equalize, 0.6, None)],
    [(AutoContrast, 0.8, None), (Solarize, 0.2, Some(8))],
    [(Brightness, 0.1, Some(3)), (Color, 0.7, Some(0))],
    [(Solarize, 0.4, Some(5)), (AutoContrast, 0.9, None)],
    [(TranslateY, 0.9, Some(9)), (TranslateY, 0.7, Some(9))],
    [(AutoContrast, 0.9, None), (Solarize, 0.8, Some(3))],
    [(Equalize, 0.8, None), (Invert, 0.1, None)],
    [(TranslateY, 0.7, Some(9)), (AutoContrast, 0.9, None)],
];

#[rustfmt::skip]
static SVHN_POLICY: [[Step; 2]; 25] = [
    [(ShearX, 0.9, Some(4)), (Invert, 0.2, None)],
    [(ShearY, 0.9, Some(8)), (Invert, 0.7, None)],
    [(Equalize, 0.6, None), (Solarize, 0.6, Some(6))],
    [(Invert, 0.9, None), (Equalize, 0.6, None)],
    [(Equalize, 0.6, None), (Rotate, 0.9, Some(3))],
    [(ShearX, 0.9, Some(4)), (AutoContrast, 0.8, None)],
    [(ShearY, 0.9, Some(8)), (Invert, 0.4, None)],
    [(ShearY, 0.9, Some(5)), (Solarize, 0.2, Some(6))],
    [(Invert, 0.9, None), (AutoContrast, 0.8, None)],
    [(Equalize, 0.6, None), (Rotate, 0.9, Some(3))],
    [(ShearX, 0.9, Some(4)), (Solarize, 0.3, Some(3))],
    [(ShearY, 0.8, Some(8)), (Invert, 0.7, None)],
    [(Equalize, 0.9, None), (TranslateY, 0.6, Some(6))],
    [(Invert, 0.9, None), (Equalize, 0.6, None)],
    [(Contrast, 0.3, Some(3)), (Rotate, 0.8, Some(4))],
    [(Invert, 0.8, None), (TranslateY, 0.0, Some(2))],
    [(ShearY, 0.7, Some(6)), (Solarize, 0.4, Some(8))],
    [(Invert, 0.6, None), (Rotate, 0.8, Some(4))],
    [(ShearY, 0.3, Some(7)), (TranslateX, 0.9, Some(3))],
    [(ShearX, 0.1, Some(6)), (Invert, 0.6, None)],
    [(Solarize, 0.7, Some(2)), (TranslateY, 0.6, Some(7))],
    [(ShearY, 0.8, Some(4)), (Invert, 0.8, None)],
    [(ShearX, 0.7, Some(9)), (TranslateY, 0.8, Some(3))],
    [(ShearY, 0.8, Some(5)), (AutoContrast, 0.7, None)],
    [(ShearX, 0.7, Some(2)), (Invert, 0.1, None)],
];

impl AutoAugmentPolicy {
    fn steps(self) -> &'static [[Step; 2]] {
        match self {
            AutoAugmentPolicy::ImageNet => &IMAGENET_POLICY,
            AutoAugmentPolicy::Cifar10 => &CIFAR10_POLICY,
            AutoAugmentPolicy::Svhn => &SVHN_POLICY,
        }
    }
}

/// Applies one randomly chosen sub-policy of a learned policy.
#[derive(Debug, Clone)]
pub struct AutoAugment {
    policy: AutoAugmentPolicy,
    fill: Fill,
}

impl AutoAugment {
    const BINS: usize = 10;

    pub fn new(policy: AutoAugmentPolicy) -> Self {
        Self {
            policy,
            fill: Fill::default(),
        }
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.fill.interpolation = interpolation;
        self
    }

    pub fn with_fill(mut self, fill: f64) -> Self {
        self.fill.fill = fill;
        self
    }

    fn choose(&self, size: (usize, usize)) -> Vec<(AugmentOp, f64)> {
        let steps = self.policy.steps();
        let sub_policy = &steps[worker_gen_range::<usize, _>(0..steps.len())];
        sub_policy
            .iter()
            .filter(|(_, p, _)| worker_gen_bool(*p))
            .map(|&(op, _, bin)| draw(op, Space::Standard, Self::BINS, bin.unwrap_or(0), size))
            .collect()
    }
}

impl Transform for AutoAugment {
    fn forward_with(&self, sample: Sample, dispatcher: &Dispatcher) -> Result<Sample> {
        run("AutoAugment", sample, &self.fill, dispatcher, |size| self.choose(size))
    }
}

// ============================================================================
// RandAugment
// ============================================================================

static RAND_SPACE: [AugmentOp; 14] = [
    Identity, ShearX, ShearY, TranslateX, TranslateY, Rotate, Brightness, Color, Contrast,
    Sharpness, Posterize, Solarize, AutoContrast, Equalize,
];

/// Applies `num_ops` operations drawn uniformly, all at bin `magnitude`.
#[derive(Debug, Clone)]
pub struct RandAugment {
    num_ops: usize,
    magnitude: usize,
    num_magnitude_bins: usize,
    fill: Fill,
}

impl RandAugment {
    /// Two operations at magnitude 9 of 31 bins.
    pub fn new() -> Self {
        Self {
            num_ops: 2,
            magnitude: 9,
            num_magnitude_bins: 31,
            fill: Fill::default(),
        }
    }

    pub fn with_num_ops(mut self, num_ops: usize) -> Self {
        self.num_ops = num_ops;
        self
    }

    pub fn with_magnitude(mut self, magnitude: usize, num_magnitude_bins: usize) -> Result<Self> {
        ensure!(num_magnitude_bins >= 2, "need at least 2 magnitude bins");
        ensure!(
            magnitude < num_magnitude_bins,
            "magnitude {} is out of range for {} bins",
            magnitude,
            num_magnitude_bins
        );
        self.magnitude = magnitude;
        self.num_magnitude_bins = num_magnitude_bins;
        Ok(self)
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.fill.interpolation = interpolation;
        self
    }

    pub fn with_fill(mut self, fill: f64) -> Self {
        self.fill.fill = fill;
        self
    }

    fn choose(&self, size: (usize, usize)) -> Vec<(AugmentOp, f64)> {
        (0..self.num_ops)
            .map(|_| RAND_SPACE[worker_gen_range::<usize, _>(0..RAND_SPACE.len())])
            .filter(|&op| op != Identity)
            .map(|op| draw(op, Space::Standard, self.num_magnitude_bins, self.magnitude, size))
            .collect()
    }
}

impl Default for RandAugment {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for RandAugment {
    fn forward_with(&self, sample: Sample, dispatcher: &Dispatcher) -> Result<Sample> {
        run("RandAugment", sample, &self.fill, dispatcher, |size| self.choose(size))
    }
}

// ============================================================================
// TrivialAugmentWide
// ============================================================================

/// Applies a single operation drawn uniformly, at a uniformly drawn bin of the
/// wide magnitude space.
#[derive(Debug, Clone)]
pub struct TrivialAugmentWide {
    num_magnitude_bins: usize,
    fill: Fill,
}

impl TrivialAugmentWide {
    pub fn new() -> Self {
        Self {
            num_magnitude_bins: 31,
            fill: Fill::default(),
        }
    }

    pub fn with_num_magnitude_bins(mut self, bins: usize) -> Result<Self> {
        ensure!(bins >= 2, "need at least 2 magnitude bins");
        self.num_magnitude_bins = bins;
        Ok(self)
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.fill.interpolation = interpolation;
        self
    }

    pub fn with_fill(mut self, fill: f64) -> Self {
        self.fill.fill = fill;
        self
    }

    fn choose(&self, size: (usize, usize)) -> Vec<(AugmentOp, f64)> {
        let op = RAND_SPACE[worker_gen_range::<usize, _>(0..RAND_SPACE.len())];
        if op == Identity {
            return Vec::new();
        }
        let bin = worker_gen_range::<usize, _>(0..self.num_magnitude_bins);
        vec![draw(op, Space::Wide, self.num_magnitude_bins, bin, size)]
    }
}

impl Default for TrivialAugmentWide {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for TrivialAugmentWide {
    fn forward_with(&self, sample: Sample, dispatcher: &Dispatcher) -> Result<Sample> {
        run("TrivialAugmentWide", sample, &self.fill, dispatcher, |size| self.choose(size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoints::{tensor, BoundingBoxFormat, BoundingBoxes, DType, Image, Label};
    use crate::error::VisionError;
    use crate::rng::init_worker_rng;
    use anyhow::anyhow;

    fn detection_sample() -> Result<Sample> {
        let data = (0..3 * 16 * 16).map(|v| (v % 256) as f32).collect();
        let image = Image::new(tensor(&[3, 16, 16], data)?)?.with_dtype(DType::U8);
        let boxes = BoundingBoxes::from_rows(&[[2.0, 2.0, 10.0, 12.0]], BoundingBoxFormat::Xyxy, (16, 16))?;
        let label = Label::new(tensor(&[1], vec![3.0])?)?;
        Ok(Sample::new()
            .with_feature("image", image)
            .with_feature("boxes", boxes)
            .with_feature("label", label))
    }

    #[test]
    fn test_policy_tables_reference_valid_bins() {
        for policy in [AutoAugmentPolicy::ImageNet, AutoAugmentPolicy::Cifar10, AutoAugmentPolicy::Svhn] {
            for step in policy.steps().iter().flatten() {
                let (op, p, bin) = *step;
                assert!((0.0..=1.0).contains(&p));
                assert_eq!(bin.is_some(), op.magnitude(Space::Standard, 10, 0, (1, 1)).is_some(), "{op:?}");
                assert!(bin.map_or(true, |b| b < AutoAugment::BINS));
            }
        }
    }

    #[test]
    fn test_magnitude_bins() {
        let size = (331, 662);
        assert_eq!(Posterize.magnitude(Space::Standard, 10, 0, size), Some(8.0));
        assert_eq!(Posterize.magnitude(Space::Standard, 10, 9, size), Some(4.0));
        assert_eq!(Posterize.magnitude(Space::Wide, 31, 30, size), Some(2.0));
        assert_eq!(Solarize.magnitude(Space::Standard, 10, 0, size), Some(1.0));
        assert_eq!(TranslateX.magnitude(Space::Standard, 10, 9, size), Some(300.0));
        assert_eq!(TranslateY.magnitude(Space::Wide, 31, 30, size), Some(32.0));
        assert_eq!(Equalize.magnitude(Space::Standard, 10, 3, size), None);
    }

    #[test]
    fn test_policies_keep_annotations_consistent() -> Result<()> {
        init_worker_rng(0, 0, 41);
        let policies: Vec<Box<dyn Transform>> = vec![
            Box::new(AutoAugment::new(AutoAugmentPolicy::ImageNet)),
            Box::new(AutoAugment::new(AutoAugmentPolicy::Cifar10)),
            Box::new(AutoAugment::new(AutoAugmentPolicy::Svhn)),
            Box::new(RandAugment::new()),
            Box::new(TrivialAugmentWide::new()),
        ];
        for policy in &policies {
            for _ in 0..10 {
                let out = policy.forward(detection_sample()?)?;
                let image = out.get_value("image")?.as_image().cloned().ok_or_else(|| anyhow!("image"))?;
                let boxes = out
                    .get_value("boxes")?
                    .as_bounding_boxes()
                    .cloned()
                    .ok_or_else(|| anyhow!("boxes"))?;
                assert_eq!(image.spatial_size(), (16, 16));
                assert_eq!(image.dtype(), DType::U8);
                assert!(image.data().iter().all(|v| (0.0..=255.0).contains(v)));
                assert_eq!(boxes.canvas_size(), (16, 16));
                assert_eq!(out.get_value("label")?, detection_sample()?.get_value("label")?);
            }
        }
        Ok(())
    }

    #[test]
    fn test_zero_ops_is_identity() -> Result<()> {
        let rand = RandAugment::new().with_num_ops(0);
        assert_eq!(rand.forward(detection_sample()?)?, detection_sample()?);
        assert!(RandAugment::new().with_magnitude(31, 31).is_err());
        Ok(())
    }

    #[test]
    fn test_requires_an_image() -> Result<()> {
        let err = TrivialAugmentWide::new()
            .forward(Sample::from_single("label", Label::new(tensor(&[1], vec![0.0])?)?))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<VisionError>(), Some(VisionError::NoImageFound)));
        Ok(())
    }
}
