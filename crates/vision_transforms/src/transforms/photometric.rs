//! Photometric transforms. They touch pixel values only, so masks, boxes and
//! labels pass through unchanged.

use super::core::{check_probability, check_range, uniform, TransformNode, PHOTOMETRIC};
use crate::datapoints::{Kind, Value};
use crate::dispatch::Dispatcher;
use crate::error::VisionError;
use crate::params::Params;
use crate::query;
use crate::rng::{with_rng, worker_gen_bool, worker_gen_f64};
use anyhow::{ensure, Result};
use rand::seq::SliceRandom;

/// Declares a `Random*` node that dispatches one operation with fixed
/// parameters and probability `p`.
macro_rules! random_op {
    ($(#[$doc:meta])* $name:ident, $op:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            p: f64,
            params: Params,
        }

        impl TransformNode for $name {
            fn transformed_kinds(&self) -> &[Kind] {
                PHOTOMETRIC
            }

            fn probability(&self) -> f64 {
                self.p
            }

            fn get_params(&self, _: &[Value]) -> Result<Params> {
                Ok(self.params.clone())
            }

            fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
                dispatcher.dispatch($op, value, params)
            }
        }
    };
}

// ============================================================================
// ColorJitter
// ============================================================================

const JITTER_OPS: [&str; 4] = [
    "adjust_brightness",
    "adjust_contrast",
    "adjust_saturation",
    "adjust_hue",
];

/// Randomly changes brightness, contrast, saturation and hue, in a random
/// order per call.
///
/// Each of brightness/contrast/saturation is a factor range around 1; hue is
/// a shift range within `[-0.5, 0.5]`. Unset adjustments are skipped.
#[derive(Debug, Clone, Default)]
pub struct ColorJitter {
    ranges: [Option<(f64, f64)>; 4],
}

impl ColorJitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factor drawn from `[max(0, 1 - b), 1 + b]`.
    pub fn brightness(self, b: f64) -> Result<Self> {
        self.factor_range(0, "brightness", b)
    }

    pub fn contrast(self, c: f64) -> Result<Self> {
        self.factor_range(1, "contrast", c)
    }

    pub fn saturation(self, s: f64) -> Result<Self> {
        self.factor_range(2, "saturation", s)
    }

    /// Shift drawn from `[-h, h]`, `0 <= h <= 0.5`.
    pub fn hue(mut self, h: f64) -> Result<Self> {
        ensure!((0.0..=0.5).contains(&h), "hue must be in [0, 0.5] (got {})", h);
        self.ranges[3] = (h > 0.0).then_some((-h, h));
        Ok(self)
    }

    fn factor_range(mut self, slot: usize, name: &str, value: f64) -> Result<Self> {
        ensure!(value >= 0.0, "{} must be non-negative (got {})", name, value);
        let range = ((1.0 - value).max(0.0), 1.0 + value);
        check_range(name, range)?;
        self.ranges[slot] = (value > 0.0).then_some(range);
        Ok(self)
    }
}

impl TransformNode for ColorJitter {
    fn transformed_kinds(&self) -> &[Kind] {
        PHOTOMETRIC
    }

    /// `order` lists the adjustments to run; each has its own factor entry.
    fn get_params(&self, _: &[Value]) -> Result<Params> {
        let mut order: Vec<usize> = (0..JITTER_OPS.len()).collect();
        with_rng(|rng| order.shuffle(rng));

        let mut params = Params::new();
        let mut applied = Vec::new();
        for slot in order {
            if let Some(range) = self.ranges[slot] {
                params.set(JITTER_OPS[slot], uniform(range));
                applied.push(slot as f64);
            }
        }
        params.set("order", applied);
        Ok(params)
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        let mut value = value;
        for slot in params.floats("order")? {
            let op = JITTER_OPS[slot as usize];
            let factor = Params::new().with("factor", params.float(op)?);
            value = dispatcher.dispatch(op, value, &factor)?;
        }
        Ok(value)
    }
}

// ============================================================================
// Grayscale
// ============================================================================

/// Converts RGB input to grayscale with 1 or 3 output channels.
#[derive(Debug, Clone)]
pub struct Grayscale {
    num_output_channels: usize,
}

impl Grayscale {
    pub fn new(num_output_channels: usize) -> Result<Self> {
        ensure!(
            num_output_channels == 1 || num_output_channels == 3,
            "num_output_channels must be 1 or 3 (got {})",
            num_output_channels
        );
        Ok(Self { num_output_channels })
    }
}

impl TransformNode for Grayscale {
    fn transformed_kinds(&self) -> &[Kind] {
        PHOTOMETRIC
    }

    fn get_params(&self, _: &[Value]) -> Result<Params> {
        Ok(Params::new().with("num_output_channels", self.num_output_channels))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("rgb_to_grayscale", value, params)
    }
}

/// Converts to grayscale with probability `p`, keeping the input's channel
/// count.
#[derive(Debug, Clone)]
pub struct RandomGrayscale {
    p: f64,
}

impl RandomGrayscale {
    pub fn new(p: f64) -> Result<Self> {
        check_probability(p)?;
        Ok(Self { p })
    }
}

impl TransformNode for RandomGrayscale {
    fn transformed_kinds(&self) -> &[Kind] {
        PHOTOMETRIC
    }

    fn probability(&self) -> f64 {
        self.p
    }

    fn get_params(&self, leaves: &[Value]) -> Result<Params> {
        let channels = query::channel_count(leaves)?;
        Ok(Params::new().with("num_output_channels", channels))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("rgb_to_grayscale", value, params)
    }
}

// ============================================================================
// Random single-op adjustments
// ============================================================================

random_op!(
    /// Inverts pixel values with probability `p`.
    RandomInvert,
    "invert"
);

impl RandomInvert {
    pub fn new(p: f64) -> Result<Self> {
        check_probability(p)?;
        Ok(Self { p, params: Params::new() })
    }
}

random_op!(
    /// Keeps the top `bits` bits of each 8-bit channel value with probability `p`.
    RandomPosterize,
    "posterize"
);

impl RandomPosterize {
    pub fn new(bits: u8, p: f64) -> Result<Self> {
        check_probability(p)?;
        ensure!(bits <= 8, "bits must be in [0, 8] (got {})", bits);
        Ok(Self {
            p,
            params: Params::new().with("bits", bits as i64),
        })
    }
}

random_op!(
    /// Inverts values at or above `threshold` (payload units) with probability `p`.
    RandomSolarize,
    "solarize"
);

impl RandomSolarize {
    pub fn new(threshold: f64, p: f64) -> Result<Self> {
        check_probability(p)?;
        ensure!(threshold >= 0.0, "threshold must be non-negative (got {})", threshold);
        Ok(Self {
            p,
            params: Params::new().with("threshold", threshold),
        })
    }
}

random_op!(
    /// Stretches each channel to the full value range with probability `p`.
    RandomAutocontrast,
    "autocontrast"
);

impl RandomAutocontrast {
    pub fn new(p: f64) -> Result<Self> {
        check_probability(p)?;
        Ok(Self { p, params: Params::new() })
    }
}

random_op!(
    /// Equalizes each channel's histogram with probability `p`.
    RandomEqualize,
    "equalize"
);

impl RandomEqualize {
    pub fn new(p: f64) -> Result<Self> {
        check_probability(p)?;
        Ok(Self { p, params: Params::new() })
    }
}

random_op!(
    /// Sharpens (factor > 1) or blurs (factor < 1) with probability `p`.
    RandomAdjustSharpness,
    "adjust_sharpness"
);

impl RandomAdjustSharpness {
    pub fn new(factor: f64, p: f64) -> Result<Self> {
        check_probability(p)?;
        ensure!(factor >= 0.0, "sharpness factor must be non-negative (got {})", factor);
        Ok(Self {
            p,
            params: Params::new().with("factor", factor),
        })
    }
}

// ============================================================================
// GaussianBlur
// ============================================================================

/// Blurs pixel values with a Gaussian kernel. Sigma is drawn per call from
/// `sigma` and used on both axes.
#[derive(Debug, Clone)]
pub struct GaussianBlur {
    kernel_size: (usize, usize),
    sigma: (f64, f64),
}

impl GaussianBlur {
    /// `kernel_size` is `(height, width)`; both must be odd.
    pub fn new(kernel_size: (usize, usize)) -> Result<Self> {
        ensure!(
            kernel_size.0 % 2 == 1 && kernel_size.1 % 2 == 1,
            "kernel size must be odd and positive (got {:?})",
            kernel_size
        );
        Ok(Self {
            kernel_size,
            sigma: (0.1, 2.0),
        })
    }

    pub fn with_sigma(mut self, sigma: (f64, f64)) -> Result<Self> {
        check_range("sigma", sigma)?;
        ensure!(sigma.0 > 0.0, "sigma must be positive (got {:?})", sigma);
        self.sigma = sigma;
        Ok(self)
    }
}

impl TransformNode for GaussianBlur {
    fn transformed_kinds(&self) -> &[Kind] {
        PHOTOMETRIC
    }

    fn get_params(&self, _: &[Value]) -> Result<Params> {
        let sigma = uniform(self.sigma);
        Ok(Params::new()
            .with("kernel_size", self.kernel_size)
            .with("sigma", vec![sigma, sigma]))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("gaussian_blur", value, params)
    }
}

// ============================================================================
// RandomPhotometricDistort
// ============================================================================

/// SSD-style photometric distortion.
///
/// Brightness, contrast, saturation, hue and a channel shuffle are each
/// applied independently with probability `p`. Contrast runs either right
/// after brightness or after hue, chosen per call.
#[derive(Debug, Clone)]
pub struct RandomPhotometricDistort {
    brightness: (f64, f64),
    contrast: (f64, f64),
    saturation: (f64, f64),
    hue: (f64, f64),
    p: f64,
}

impl RandomPhotometricDistort {
    pub fn new() -> Self {
        Self {
            brightness: (0.875, 1.125),
            contrast: (0.5, 1.5),
            saturation: (0.5, 1.5),
            hue: (-0.05, 0.05),
            p: 0.5,
        }
    }

    pub fn with_probability(mut self, p: f64) -> Result<Self> {
        check_probability(p)?;
        self.p = p;
        Ok(self)
    }

    pub fn with_ranges(
        mut self,
        brightness: (f64, f64),
        contrast: (f64, f64),
        saturation: (f64, f64),
        hue: (f64, f64),
    ) -> Result<Self> {
        for (name, range) in [
            ("brightness", brightness),
            ("contrast", contrast),
            ("saturation", saturation),
        ] {
            check_range(name, range)?;
            ensure!(range.0 >= 0.0, "{} factors must be non-negative (got {:?})", name, range);
        }
        check_range("hue", hue)?;
        ensure!(
            -0.5 <= hue.0 && hue.1 <= 0.5,
            "hue range must lie within [-0.5, 0.5] (got {:?})",
            hue
        );
        self.brightness = brightness;
        self.contrast = contrast;
        self.saturation = saturation;
        self.hue = hue;
        Ok(self)
    }

    fn draw(&self) -> bool {
        worker_gen_f64() < self.p
    }
}

impl Default for RandomPhotometricDistort {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformNode for RandomPhotometricDistort {
    fn transformed_kinds(&self) -> &[Kind] {
        PHOTOMETRIC
    }

    fn check_inputs(&self, leaves: &[Value]) -> Result<()> {
        if query::count_kind(leaves, Kind::is_image_like) > 1 {
            return Err(VisionError::incompatible(
                "RandomPhotometricDistort",
                "the channel shuffle needs a single image or video",
            )
            .into());
        }
        Ok(())
    }

    fn get_params(&self, leaves: &[Value]) -> Result<Params> {
        let mut params = Params::new();
        for (op, range) in [
            ("adjust_brightness", self.brightness),
            ("adjust_contrast", self.contrast),
            ("adjust_saturation", self.saturation),
            ("adjust_hue", self.hue),
        ] {
            if self.draw() {
                params.set(op, uniform(range));
            }
        }
        params.set("contrast_before", worker_gen_bool(0.5));
        if self.draw() {
            let mut permutation: Vec<f64> = (0..query::channel_count(leaves)?).map(|c| c as f64).collect();
            with_rng(|rng| permutation.shuffle(rng));
            params.set("permutation", permutation);
        }
        Ok(params)
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        let contrast_before = params.bool("contrast_before")?;
        let order = [
            ("adjust_brightness", true),
            ("adjust_contrast", contrast_before),
            ("adjust_saturation", true),
            ("adjust_hue", true),
            ("adjust_contrast", !contrast_before),
        ];
        let mut value = value;
        for (op, here) in order {
            if let (true, Some(factor)) = (here, params.opt_float(op)?) {
                value = dispatcher.dispatch(op, value, &Params::new().with("factor", factor))?;
            }
        }
        if let Some(permutation) = params.opt_floats("permutation")? {
            value = dispatcher.dispatch(
                "permute_channels",
                value,
                &Params::new().with("permutation", permutation),
            )?;
        }
        Ok(value)
    }
}

// ============================================================================
// Normalize
// ============================================================================

/// Normalizes float tensors with per-channel `mean` and `std`.
///
/// # Example
/// ```ignore
/// let normalize = Normalize::new(vec![0.485, 0.456, 0.406], vec![0.229, 0.224, 0.225])?;
/// ```
#[derive(Debug, Clone)]
pub struct Normalize {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Normalize {
    pub fn new(mean: Vec<f64>, std: Vec<f64>) -> Result<Self> {
        ensure!(
            mean.len() == std.len(),
            "Mean and std must have same length (got {} and {})",
            mean.len(),
            std.len()
        );
        ensure!(!mean.is_empty(), "Mean and std must not be empty");
        ensure!(
            std.iter().all(|&s| s > 0.0),
            "Standard deviation values must be positive (got {:?})",
            std
        );
        Ok(Self { mean, std })
    }

    /// ImageNet statistics.
    pub fn imagenet() -> Self {
        Self {
            mean: vec![0.485, 0.456, 0.406],
            std: vec![0.229, 0.224, 0.225],
        }
    }
}

impl TransformNode for Normalize {
    fn transformed_kinds(&self) -> &[Kind] {
        &[Kind::Tensor, Kind::Image, Kind::Video]
    }

    fn check_inputs(&self, leaves: &[Value]) -> Result<()> {
        if query::kind_present(leaves, Kind::Raster) {
            return Err(VisionError::incompatible(
                "Normalize",
                "raster images cannot be normalized; convert them with ToImage first",
            )
            .into());
        }
        Ok(())
    }

    fn get_params(&self, _: &[Value]) -> Result<Params> {
        Ok(Params::new()
            .with("mean", self.mean.clone())
            .with("std", self.std.clone()))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("normalize", value, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoints::{tensor, DType, Image, Mask};
    use crate::rng::init_worker_rng;
    use crate::sample::Sample;
    use crate::transforms::Transform;
    use anyhow::anyhow;
    use image::{DynamicImage, RgbImage};

    fn rgb_u8(values: [f32; 3]) -> Result<Image> {
        let data = values.iter().flat_map(|&v| [v; 4]).collect();
        Ok(Image::new(tensor(&[3, 2, 2], data)?)?.with_dtype(DType::U8))
    }

    fn pixels(sample: &Sample, name: &str) -> Result<Vec<f32>> {
        let value = sample.get_value(name)?;
        let data = value
            .as_datapoint()
            .map(|dp| dp.data().clone())
            .or_else(|| value.as_tensor().cloned())
            .ok_or_else(|| anyhow!("{name} has no array payload"))?;
        Ok(data.iter().copied().collect())
    }

    #[test]
    fn test_invert_leaves_masks_alone() -> Result<()> {
        let mask = Mask::new(tensor(&[2, 2], vec![0.0, 1.0, 1.0, 0.0])?)?;
        let sample = Sample::new()
            .with_feature("image", rgb_u8([0.0, 100.0, 255.0])?)
            .with_feature("mask", mask.clone());
        let out = RandomInvert::new(1.0)?.forward(sample)?;

        let inverted = pixels(&out, "image")?;
        assert_eq!(inverted[0], 255.0);
        assert_eq!(inverted[4], 155.0);
        assert_eq!(inverted[8], 0.0);
        assert_eq!(out.get_value("mask")?, &Value::from(mask));
        Ok(())
    }

    #[test]
    fn test_color_jitter_identity_ranges() -> Result<()> {
        init_worker_rng(0, 0, 21);
        let image = rgb_u8([10.0, 120.0, 250.0])?;
        let jitter = ColorJitter::new()
            .brightness(0.0)?
            .contrast(0.0)?
            .saturation(0.0)?
            .hue(0.0)?;
        let out = jitter.forward(Sample::from_single("image", image.clone()))?;
        assert_eq!(out.get_value("image")?, &Value::from(image));
        Ok(())
    }

    #[test]
    fn test_color_jitter_applies_each_adjustment_once() -> Result<()> {
        init_worker_rng(0, 0, 22);
        let jitter = ColorJitter::new().brightness(0.5)?.hue(0.1)?;
        let params = jitter.get_params(&[])?;
        let order = params.floats("order")?;
        assert_eq!(order.len(), 2);
        assert!(order.contains(&0.0) && order.contains(&3.0));
        assert!((0.5..=1.5).contains(&params.float("adjust_brightness")?));
        assert!(ColorJitter::new().hue(0.7).is_err());

        let out = jitter.forward(Sample::from_single("image", rgb_u8([10.0, 120.0, 250.0])?))?;
        assert!(pixels(&out, "image")?.iter().all(|v| (0.0..=255.0).contains(v)));
        Ok(())
    }

    #[test]
    fn test_random_grayscale_keeps_channel_count() -> Result<()> {
        let out = RandomGrayscale::new(1.0)?
            .forward(Sample::from_single("image", rgb_u8([30.0, 30.0, 30.0])?))?;
        let image = out.get_value("image")?.as_image().cloned().ok_or_else(|| anyhow!("kind"))?;
        assert_eq!(image.num_channels(), 3);
        assert!(image.data().iter().all(|&v| v == 30.0));

        let gray = Grayscale::new(1)?.forward(Sample::from_single("image", rgb_u8([30.0, 30.0, 30.0])?))?;
        let gray = gray.get_value("image")?.as_image().cloned().ok_or_else(|| anyhow!("kind"))?;
        assert_eq!(gray.num_channels(), 1);
        Ok(())
    }

    #[test]
    fn test_posterize_and_solarize() -> Result<()> {
        let sample = Sample::from_single("image", rgb_u8([7.0, 130.0, 250.0])?);
        let out = RandomPosterize::new(4, 1.0)?.forward(sample.clone())?;
        let values = pixels(&out, "image")?;
        assert_eq!((values[0], values[4], values[8]), (0.0, 128.0, 240.0));

        let out = RandomSolarize::new(128.0, 1.0)?.forward(sample)?;
        let values = pixels(&out, "image")?;
        assert_eq!((values[0], values[4], values[8]), (7.0, 125.0, 5.0));
        assert!(RandomPosterize::new(9, 1.0).is_err());
        Ok(())
    }

    #[test]
    fn test_normalize_rejects_rasters() -> Result<()> {
        let raster = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
        let err = Normalize::imagenet()
            .forward(Sample::from_single("image", raster))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VisionError>(),
            Some(VisionError::IncompatibleInput { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_normalize_float_image() -> Result<()> {
        let image = Image::new(tensor(&[2, 1, 1], vec![0.5, 1.0])?)?;
        let out = Normalize::new(vec![0.5, 0.5], vec![0.5, 0.25])?
            .forward(Sample::from_single("image", image))?;
        assert_eq!(pixels(&out, "image")?, vec![0.0, 2.0]);
        assert!(Normalize::new(vec![0.5], vec![0.0]).is_err());
        assert!(Normalize::new(vec![0.5, 0.5], vec![1.0]).is_err());
        Ok(())
    }

    #[test]
    fn test_gaussian_blur_smooths_and_keeps_kinds() -> Result<()> {
        init_worker_rng(0, 0, 4);
        let mut data = vec![0.0; 3 * 5 * 5];
        for c in 0..3 {
            data[c * 25 + 12] = 1.0;
        }
        let image = Image::new(tensor(&[3, 5, 5], data)?)?;
        let mask = Mask::new(tensor(&[5, 5], vec![1.0; 25])?)?;
        let sample = Sample::from_single("image", image).with_feature("mask", mask.clone());

        let blur = GaussianBlur::new((3, 3))?.with_sigma((0.5, 1.5))?;
        let out = blur.forward(sample)?;
        let blurred = pixels(&out, "image")?;
        assert!(blurred[12] < 1.0 && blurred[11] > 0.0);
        assert_eq!(out.get_value("mask")?, &Value::from(mask));

        assert!(GaussianBlur::new((4, 3)).is_err());
        assert!(GaussianBlur::new((3, 3))?.with_sigma((0.0, 1.0)).is_err());
        Ok(())
    }

    #[test]
    fn test_photometric_distort_always_on_shuffles_channels() -> Result<()> {
        init_worker_rng(0, 0, 8);
        let distort = RandomPhotometricDistort::new()
            .with_ranges((1.0, 1.0), (1.0, 1.0), (1.0, 1.0), (0.0, 0.0))?
            .with_probability(1.0)?;
        for _ in 0..10 {
            let out = distort.forward(Sample::from_single("image", rgb_u8([10.0, 120.0, 250.0])?))?;
            let mut channels: Vec<f32> = pixels(&out, "image")?.chunks(4).map(|c| c[0]).collect();
            channels.sort_by(f32::total_cmp);
            assert_eq!(channels, vec![10.0, 120.0, 250.0]);
        }

        let never = RandomPhotometricDistort::new().with_probability(0.0)?;
        let image = rgb_u8([10.0, 120.0, 250.0])?;
        let out = never.forward(Sample::from_single("image", image.clone()))?;
        assert_eq!(out.get_value("image")?, &Value::from(image));
        Ok(())
    }

    #[test]
    fn test_photometric_distort_rejects_two_images() -> Result<()> {
        let sample = Sample::new()
            .with_feature("a", rgb_u8([0.0, 0.0, 0.0])?)
            .with_feature("b", rgb_u8([0.0, 0.0, 0.0])?);
        let err = RandomPhotometricDistort::new().forward(sample).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VisionError>(),
            Some(VisionError::IncompatibleInput { .. })
        ));
        Ok(())
    }
}
