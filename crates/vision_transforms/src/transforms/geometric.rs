//! Geometric transforms.
//!
//! Parameters are drawn once per call from the sample's canvas size, so an
//! image and its boxes and masks move together.

use super::core::{canvas_size, check_probability, check_range, uniform, TransformNode, SPATIAL};
use crate::datapoints::{BoundingBoxFormat, Kind, Value};
use crate::dispatch::Dispatcher;
use crate::error::VisionError;
use crate::params::{Interpolation, Params};
use crate::query;
use crate::rng::{worker_gen_f64, worker_gen_range};
use anyhow::{bail, ensure, Result};
use tracing::debug;

// ============================================================================
// Flips
// ============================================================================

/// Flips the sample horizontally with probability `p`.
///
/// # Example
/// ```ignore
/// let flip = RandomHorizontalFlip::new(0.5)?; // 50% flip chance
/// let augmented = flip.forward(sample)?;
/// ```
#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    p: f64,
}

impl RandomHorizontalFlip {
    pub fn new(p: f64) -> Result<Self> {
        check_probability(p)?;
        Ok(Self { p })
    }
}

impl TransformNode for RandomHorizontalFlip {
    fn transformed_kinds(&self) -> &[Kind] {
        SPATIAL
    }

    fn probability(&self) -> f64 {
        self.p
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("horizontal_flip", value, params)
    }
}

/// Flips the sample vertically with probability `p`.
#[derive(Debug, Clone)]
pub struct RandomVerticalFlip {
    p: f64,
}

impl RandomVerticalFlip {
    pub fn new(p: f64) -> Result<Self> {
        check_probability(p)?;
        Ok(Self { p })
    }
}

impl TransformNode for RandomVerticalFlip {
    fn transformed_kinds(&self) -> &[Kind] {
        SPATIAL
    }

    fn probability(&self) -> f64 {
        self.p
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("vertical_flip", value, params)
    }
}

// ============================================================================
// Resize
// ============================================================================

/// Target of a [`Resize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeTo {
    /// `(height, width)`
    Exact(usize, usize),
    /// Length of the shorter side; the aspect ratio is kept.
    Shorter(usize),
}

/// Resizes every spatial leaf to the same output size.
#[derive(Debug, Clone)]
pub struct Resize {
    size: ResizeTo,
    max_size: Option<usize>,
    interpolation: Interpolation,
}

impl Resize {
    pub fn new(size: ResizeTo, interpolation: Interpolation) -> Result<Self> {
        match size {
            ResizeTo::Exact(h, w) => ensure!(
                h > 0 && w > 0,
                "Image dimensions must be positive after resizing (got {}x{})",
                h,
                w
            ),
            ResizeTo::Shorter(s) => ensure!(s > 0, "shorter side must be positive"),
        }
        Ok(Self {
            size,
            max_size: None,
            interpolation,
        })
    }

    /// Caps the longer side when resizing by the shorter side.
    pub fn with_max_size(mut self, max_size: usize) -> Result<Self> {
        if let ResizeTo::Shorter(s) = self.size {
            ensure!(
                max_size > s,
                "max_size ({}) must be larger than the requested size ({})",
                max_size,
                s
            );
        }
        self.max_size = Some(max_size);
        Ok(self)
    }

    /// Output `(height, width)` for an input of `(h, w)`.
    pub fn output_size(&self, (h, w): (usize, usize)) -> (usize, usize) {
        match self.size {
            ResizeTo::Exact(oh, ow) => (oh, ow),
            ResizeTo::Shorter(size) => {
                let (short, long) = if w <= h { (w, h) } else { (h, w) };
                let mut new_short = size;
                let mut new_long = (size as f64 * long as f64 / short as f64) as usize;
                if let Some(max_size) = self.max_size {
                    if new_long > max_size {
                        new_short = (max_size as f64 * new_short as f64 / new_long as f64) as usize;
                        new_long = max_size;
                    }
                }
                let (new_short, new_long) = (new_short.max(1), new_long.max(1));
                if w <= h {
                    (new_long, new_short)
                } else {
                    (new_short, new_long)
                }
            }
        }
    }
}

impl TransformNode for Resize {
    fn transformed_kinds(&self) -> &[Kind] {
        SPATIAL
    }

    fn get_params(&self, leaves: &[Value]) -> Result<Params> {
        let size = match self.size {
            ResizeTo::Exact(h, w) => (h, w),
            ResizeTo::Shorter(_) => self.output_size(canvas_size(leaves)?),
        };
        Ok(Params::new()
            .with("size", size)
            .with("interpolation", self.interpolation))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("resize", value, params)
    }
}

/// Resizes so the shorter side matches a size drawn from `min_size`, with
/// the longer side capped at `max_size`.
#[derive(Debug, Clone)]
pub struct RandomShortestSize {
    min_size: Vec<usize>,
    max_size: Option<usize>,
    interpolation: Interpolation,
}

impl RandomShortestSize {
    pub fn new(min_size: Vec<usize>) -> Result<Self> {
        ensure!(!min_size.is_empty(), "min_size needs at least one candidate");
        ensure!(
            min_size.iter().all(|&s| s > 0),
            "shorter side candidates must be positive (got {:?})",
            min_size
        );
        Ok(Self {
            min_size,
            max_size: None,
            interpolation: Interpolation::Bilinear,
        })
    }

    pub fn with_max_size(mut self, max_size: usize) -> Result<Self> {
        ensure!(max_size > 0, "max_size must be positive");
        self.max_size = Some(max_size);
        Ok(self)
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }
}

impl TransformNode for RandomShortestSize {
    fn transformed_kinds(&self) -> &[Kind] {
        SPATIAL
    }

    fn get_params(&self, leaves: &[Value]) -> Result<Params> {
        let (h, w) = canvas_size(leaves)?;
        let short = self.min_size[worker_gen_range(0..self.min_size.len())];
        let mut r = short as f64 / h.min(w) as f64;
        if let Some(max_size) = self.max_size {
            r = r.min(max_size as f64 / h.max(w) as f64);
        }
        let size = (
            ((h as f64 * r + 0.5) as usize).max(1),
            ((w as f64 * r + 0.5) as usize).max(1),
        );
        Ok(Params::new()
            .with("size", size)
            .with("interpolation", self.interpolation))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("resize", value, params)
    }
}

/// Resizes to fit `target_size` scaled by a factor drawn from
/// `scale_range`, keeping the aspect ratio.
#[derive(Debug, Clone)]
pub struct ScaleJitter {
    target_size: (usize, usize),
    scale_range: (f64, f64),
    interpolation: Interpolation,
}

impl ScaleJitter {
    pub fn new(target_size: (usize, usize)) -> Result<Self> {
        ensure!(
            target_size.0 > 0 && target_size.1 > 0,
            "target size must be positive (got {:?})",
            target_size
        );
        Ok(Self {
            target_size,
            scale_range: (0.1, 2.0),
            interpolation: Interpolation::Bilinear,
        })
    }

    pub fn with_scale_range(mut self, scale_range: (f64, f64)) -> Result<Self> {
        check_range("scale_range", scale_range)?;
        ensure!(scale_range.0 > 0.0, "scale_range must be positive (got {:?})", scale_range);
        self.scale_range = scale_range;
        Ok(self)
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }
}

impl TransformNode for ScaleJitter {
    fn transformed_kinds(&self) -> &[Kind] {
        SPATIAL
    }

    fn get_params(&self, leaves: &[Value]) -> Result<Params> {
        let (h, w) = canvas_size(leaves)?;
        let scale = uniform(self.scale_range);
        let fit = (self.target_size.0 as f64 / h as f64).min(self.target_size.1 as f64 / w as f64);
        let r = fit * scale;
        let size = (((h as f64 * r) as usize).max(1), ((w as f64 * r) as usize).max(1));
        debug!(scale, ?size, "scale jitter");
        Ok(Params::new()
            .with("size", size)
            .with("interpolation", self.interpolation))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("resize", value, params)
    }
}

// ============================================================================
// Crops
// ============================================================================

/// Crops the centre; crops larger than the input are zero-padded.
#[derive(Debug, Clone)]
pub struct CenterCrop {
    size: (usize, usize),
}

impl CenterCrop {
    pub fn new(size: (usize, usize)) -> Result<Self> {
        ensure!(size.0 > 0 && size.1 > 0, "crop size must be positive (got {:?})", size);
        Ok(Self { size })
    }
}

impl TransformNode for CenterCrop {
    fn transformed_kinds(&self) -> &[Kind] {
        SPATIAL
    }

    fn get_params(&self, _: &[Value]) -> Result<Params> {
        Ok(Params::new().with("size", self.size))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("center_crop", value, params)
    }
}

/// `[left, top, right, bottom]` from 1, 2 or 4 values.
fn expand_padding(padding: &[usize]) -> Result<[usize; 4]> {
    match *padding {
        [all] => Ok([all; 4]),
        [horizontal, vertical] => Ok([horizontal, vertical, horizontal, vertical]),
        [l, t, r, b] => Ok([l, t, r, b]),
        _ => bail!("padding needs 1, 2 or 4 values, got {}", padding.len()),
    }
}

fn padding_param(padding: [usize; 4]) -> Vec<f64> {
    padding.iter().map(|&p| p as f64).collect()
}

/// Crops a random region of `size`, optionally padding the input first.
#[derive(Debug, Clone)]
pub struct RandomCrop {
    size: (usize, usize),
    padding: [usize; 4],
    pad_if_needed: bool,
    fill: f64,
}

impl RandomCrop {
    pub fn new(size: (usize, usize)) -> Result<Self> {
        ensure!(size.0 > 0 && size.1 > 0, "crop size must be positive (got {:?})", size);
        Ok(Self {
            size,
            padding: [0; 4],
            pad_if_needed: false,
            fill: 0.0,
        })
    }

    pub fn with_padding(mut self, padding: &[usize]) -> Result<Self> {
        self.padding = expand_padding(padding)?;
        Ok(self)
    }

    /// Pads inputs smaller than the crop up to the crop size.
    pub fn pad_if_needed(mut self, pad_if_needed: bool) -> Self {
        self.pad_if_needed = pad_if_needed;
        self
    }

    /// Fill value for padded pixels, in payload units.
    pub fn with_fill(mut self, fill: f64) -> Self {
        self.fill = fill;
        self
    }
}

impl TransformNode for RandomCrop {
    fn transformed_kinds(&self) -> &[Kind] {
        SPATIAL
    }

    fn get_params(&self, leaves: &[Value]) -> Result<Params> {
        let (h, w) = canvas_size(leaves)?;
        let (crop_h, crop_w) = self.size;
        let [mut l, mut t, mut r, mut b] = self.padding;
        let mut padded_h = h + t + b;
        let mut padded_w = w + l + r;

        if self.pad_if_needed && padded_h < crop_h {
            let diff = crop_h - padded_h;
            t += diff;
            b += diff;
            padded_h += 2 * diff;
        }
        if self.pad_if_needed && padded_w < crop_w {
            let diff = crop_w - padded_w;
            l += diff;
            r += diff;
            padded_w += 2 * diff;
        }
        if crop_h > padded_h || crop_w > padded_w {
            return Err(VisionError::parameter(
                "RandomCrop",
                format!(
                    "required crop size {:?} is larger than the padded input size {:?}",
                    self.size,
                    (padded_h, padded_w)
                ),
            )
            .into());
        }

        let top = worker_gen_range::<usize, _>(0..=padded_h - crop_h);
        let left = worker_gen_range::<usize, _>(0..=padded_w - crop_w);
        let mut params = Params::new()
            .with("top", top as i64)
            .with("left", left as i64)
            .with("height", crop_h)
            .with("width", crop_w);
        if [l, t, r, b] != [0; 4] {
            params.set("padding", padding_param([l, t, r, b]));
            params.set("fill", self.fill);
        }
        Ok(params)
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        let value = if params.contains("padding") {
            dispatcher.dispatch("pad", value, params)?
        } else {
            value
        };
        dispatcher.dispatch("crop", value, params)
    }
}

/// Crops a random area and aspect ratio, then resizes to `size`.
#[derive(Debug, Clone)]
pub struct RandomResizedCrop {
    size: (usize, usize),
    scale: (f64, f64),
    ratio: (f64, f64),
    interpolation: Interpolation,
}

impl RandomResizedCrop {
    const MAX_ATTEMPTS: usize = 10;

    /// Default scale `(0.08, 1.0)` and ratio `(3/4, 4/3)`.
    pub fn new(size: (usize, usize)) -> Result<Self> {
        Self::with_ranges(size, (0.08, 1.0), (3.0 / 4.0, 4.0 / 3.0))
    }

    pub fn with_ranges(size: (usize, usize), scale: (f64, f64), ratio: (f64, f64)) -> Result<Self> {
        ensure!(size.0 > 0 && size.1 > 0, "output size must be positive (got {:?})", size);
        check_range("scale", scale)?;
        check_range("ratio", ratio)?;
        ensure!(scale.0 > 0.0 && ratio.0 > 0.0, "scale and ratio must be positive");
        Ok(Self {
            size,
            scale,
            ratio,
            interpolation: Interpolation::Bilinear,
        })
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// `(top, left, height, width)` of the crop region.
    fn sample_region(&self, (h, w): (usize, usize)) -> Result<(usize, usize, usize, usize)> {
        let area = (h * w) as f64;
        let log_ratio = (self.ratio.0.ln(), self.ratio.1.ln());

        for _ in 0..Self::MAX_ATTEMPTS {
            let target_area = area * uniform(self.scale);
            let aspect = uniform(log_ratio).exp();
            let cw = (target_area * aspect).sqrt().round() as usize;
            let ch = (target_area / aspect).sqrt().round() as usize;
            if 0 < cw && cw <= w && 0 < ch && ch <= h {
                let top = worker_gen_range::<usize, _>(0..=h - ch);
                let left = worker_gen_range::<usize, _>(0..=w - cw);
                return Ok((top, left, ch, cw));
            }
        }

        if self.scale.0 > 1.0 {
            return Err(VisionError::parameter(
                "RandomResizedCrop",
                format!(
                    "no crop within scale {:?} fits a {}x{} input after {} attempts",
                    self.scale,
                    h,
                    w,
                    Self::MAX_ATTEMPTS
                ),
            )
            .into());
        }

        debug!(h, w, "RandomResizedCrop falling back to a centre crop");
        let in_ratio = w as f64 / h as f64;
        let (ch, cw) = if in_ratio < self.ratio.0 {
            ((w as f64 / self.ratio.0).round() as usize, w)
        } else if in_ratio > self.ratio.1 {
            (h, (h as f64 * self.ratio.1).round() as usize)
        } else {
            (h, w)
        };
        let (ch, cw) = (ch.clamp(1, h), cw.clamp(1, w));
        Ok(((h - ch) / 2, (w - cw) / 2, ch, cw))
    }
}

impl TransformNode for RandomResizedCrop {
    fn transformed_kinds(&self) -> &[Kind] {
        SPATIAL
    }

    fn get_params(&self, leaves: &[Value]) -> Result<Params> {
        let (top, left, height, width) = self.sample_region(canvas_size(leaves)?)?;
        Ok(Params::new()
            .with("top", top as i64)
            .with("left", left as i64)
            .with("height", height)
            .with("width", width)
            .with("size", self.size)
            .with("interpolation", self.interpolation))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("resized_crop", value, params)
    }
}

// ============================================================================
// Padding
// ============================================================================

/// Pads every side with a constant `fill`.
#[derive(Debug, Clone)]
pub struct Pad {
    padding: [usize; 4],
    fill: f64,
}

impl Pad {
    /// `padding` holds 1 (all sides), 2 (left/right, top/bottom) or 4
    /// (left, top, right, bottom) values.
    pub fn new(padding: &[usize]) -> Result<Self> {
        Ok(Self {
            padding: expand_padding(padding)?,
            fill: 0.0,
        })
    }

    pub fn with_fill(mut self, fill: f64) -> Self {
        self.fill = fill;
        self
    }
}

impl TransformNode for Pad {
    fn transformed_kinds(&self) -> &[Kind] {
        SPATIAL
    }

    fn get_params(&self, _: &[Value]) -> Result<Params> {
        Ok(Params::new()
            .with("padding", padding_param(self.padding))
            .with("fill", self.fill))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("pad", value, params)
    }
}

/// Places the input at a random position on a larger canvas.
#[derive(Debug, Clone)]
pub struct RandomZoomOut {
    fill: f64,
    side_range: (f64, f64),
    p: f64,
}

impl RandomZoomOut {
    /// Side range `(1, 4)`, applied with probability 0.5.
    pub fn new() -> Self {
        Self {
            fill: 0.0,
            side_range: (1.0, 4.0),
            p: 0.5,
        }
    }

    pub fn with_side_range(mut self, side_range: (f64, f64)) -> Result<Self> {
        check_range("side_range", side_range)?;
        ensure!(
            side_range.0 >= 1.0,
            "side_range must start at 1 or above (got {})",
            side_range.0
        );
        self.side_range = side_range;
        Ok(self)
    }

    pub fn with_fill(mut self, fill: f64) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_probability(mut self, p: f64) -> Result<Self> {
        check_probability(p)?;
        self.p = p;
        Ok(self)
    }
}

impl Default for RandomZoomOut {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformNode for RandomZoomOut {
    fn transformed_kinds(&self) -> &[Kind] {
        SPATIAL
    }

    fn probability(&self) -> f64 {
        self.p
    }

    fn get_params(&self, leaves: &[Value]) -> Result<Params> {
        let (h, w) = canvas_size(leaves)?;
        let ratio = uniform(self.side_range);
        let canvas_w = (w as f64 * ratio) as usize;
        let canvas_h = (h as f64 * ratio) as usize;
        let left = ((canvas_w - w) as f64 * worker_gen_f64()) as usize;
        let top = ((canvas_h - h) as f64 * worker_gen_f64()) as usize;
        let right = canvas_w - (left + w);
        let bottom = canvas_h - (top + h);
        Ok(Params::new()
            .with("padding", padding_param([left, top, right, bottom]))
            .with("fill", self.fill))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("pad", value, params)
    }
}

// ============================================================================
// Rotation / affine
// ============================================================================

/// Rotates by an angle drawn from `degrees` (counter-clockwise, degrees).
#[derive(Debug, Clone)]
pub struct RandomRotation {
    degrees: (f64, f64),
    interpolation: Interpolation,
    fill: f64,
    center: Option<[f64; 2]>,
}

impl RandomRotation {
    pub fn new(degrees: (f64, f64)) -> Result<Self> {
        check_range("degrees", degrees)?;
        Ok(Self {
            degrees,
            interpolation: Interpolation::Nearest,
            fill: 0.0,
            center: None,
        })
    }

    /// `(-degrees, degrees)`
    pub fn symmetric(degrees: f64) -> Result<Self> {
        ensure!(degrees >= 0.0, "degrees must be non-negative (got {})", degrees);
        Self::new((-degrees, degrees))
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_fill(mut self, fill: f64) -> Self {
        self.fill = fill;
        self
    }

    /// Rotation centre in pixel coordinates `[x, y]`.
    pub fn with_center(mut self, center: [f64; 2]) -> Self {
        self.center = Some(center);
        self
    }
}

impl TransformNode for RandomRotation {
    fn transformed_kinds(&self) -> &[Kind] {
        SPATIAL
    }

    fn get_params(&self, _: &[Value]) -> Result<Params> {
        let mut params = Params::new()
            .with("angle", uniform(self.degrees))
            .with("interpolation", self.interpolation)
            .with("fill", self.fill);
        if let Some(center) = self.center {
            params.set("center", center.to_vec());
        }
        Ok(params)
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("rotate", value, params)
    }
}

/// Random rotation, translation, scale and shear in one warp.
#[derive(Debug, Clone)]
pub struct RandomAffine {
    degrees: (f64, f64),
    /// Maximum fraction of the width and height.
    translate: Option<(f64, f64)>,
    scale: Option<(f64, f64)>,
    /// `(x_min, x_max, y_min, y_max)` in degrees.
    shear: Option<[f64; 4]>,
    interpolation: Interpolation,
    fill: f64,
    center: Option<[f64; 2]>,
}

impl RandomAffine {
    pub fn new(degrees: (f64, f64)) -> Result<Self> {
        check_range("degrees", degrees)?;
        Ok(Self {
            degrees,
            translate: None,
            scale: None,
            shear: None,
            interpolation: Interpolation::Nearest,
            fill: 0.0,
            center: None,
        })
    }

    pub fn with_translate(mut self, translate: (f64, f64)) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&translate.0) && (0.0..=1.0).contains(&translate.1),
            "translation values must be in [0, 1] (got {:?})",
            translate
        );
        self.translate = Some(translate);
        Ok(self)
    }

    pub fn with_scale(mut self, scale: (f64, f64)) -> Result<Self> {
        check_range("scale", scale)?;
        ensure!(scale.0 > 0.0, "scale values must be positive (got {:?})", scale);
        self.scale = Some(scale);
        Ok(self)
    }

    /// Shear along x only.
    pub fn with_shear_x(self, shear: (f64, f64)) -> Result<Self> {
        self.with_shear([shear.0, shear.1, 0.0, 0.0])
    }

    pub fn with_shear(mut self, shear: [f64; 4]) -> Result<Self> {
        check_range("shear x", (shear[0], shear[1]))?;
        check_range("shear y", (shear[2], shear[3]))?;
        self.shear = Some(shear);
        Ok(self)
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_fill(mut self, fill: f64) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_center(mut self, center: [f64; 2]) -> Self {
        self.center = Some(center);
        self
    }
}

impl TransformNode for RandomAffine {
    fn transformed_kinds(&self) -> &[Kind] {
        SPATIAL
    }

    fn get_params(&self, leaves: &[Value]) -> Result<Params> {
        let angle = uniform(self.degrees);
        let translate = match self.translate {
            Some((fx, fy)) => {
                let (h, w) = canvas_size(leaves)?;
                let max_dx = fx * w as f64;
                let max_dy = fy * h as f64;
                vec![uniform((-max_dx, max_dx)).round(), uniform((-max_dy, max_dy)).round()]
            }
            None => vec![0.0, 0.0],
        };
        let scale = self.scale.map_or(1.0, uniform);
        let shear = match self.shear {
            Some([x0, x1, y0, y1]) => vec![uniform((x0, x1)), uniform((y0, y1))],
            None => vec![0.0, 0.0],
        };
        let mut params = Params::new()
            .with("angle", angle)
            .with("translate", translate)
            .with("scale", scale)
            .with("shear", shear)
            .with("interpolation", self.interpolation)
            .with("fill", self.fill);
        if let Some(center) = self.center {
            params.set("center", center.to_vec());
        }
        Ok(params)
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("affine", value, params)
    }
}

// ============================================================================
// RandomIoUCrop
// ============================================================================

/// SSD-style crop: picks a minimum IoU from `sampler_options`, then searches
/// for a crop whose overlap with at least one box centred inside it reaches
/// that threshold. Boxes whose centre falls outside the crop are zeroed.
#[derive(Debug, Clone)]
pub struct RandomIoUCrop {
    scale: (f64, f64),
    aspect_ratio: (f64, f64),
    sampler_options: Vec<f64>,
    trials: usize,
}

impl RandomIoUCrop {
    const MAX_ROUNDS: usize = 100;

    pub fn new() -> Self {
        Self {
            scale: (0.3, 1.0),
            aspect_ratio: (0.5, 2.0),
            sampler_options: vec![0.0, 0.1, 0.3, 0.5, 0.7, 0.9, 2.0],
            trials: 40,
        }
    }

    /// Crop side range as a fraction of the image side, within `(0, 1]`.
    pub fn with_scale(mut self, scale: (f64, f64)) -> Result<Self> {
        check_range("scale", scale)?;
        ensure!(
            scale.0 > 0.0 && scale.1 <= 1.0,
            "scale must lie within (0, 1], got {:?}",
            scale
        );
        self.scale = scale;
        Ok(self)
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: (f64, f64)) -> Result<Self> {
        check_range("aspect_ratio", aspect_ratio)?;
        self.aspect_ratio = aspect_ratio;
        Ok(self)
    }

    /// Minimum IoU candidates; a value of 1 or more leaves the sample uncropped.
    pub fn with_sampler_options(mut self, options: Vec<f64>) -> Result<Self> {
        ensure!(!options.is_empty(), "sampler_options must not be empty");
        self.sampler_options = options;
        Ok(self)
    }

    pub fn with_trials(mut self, trials: usize) -> Result<Self> {
        ensure!(trials > 0, "trials must be positive");
        self.trials = trials;
        Ok(self)
    }
}

impl Default for RandomIoUCrop {
    fn default() -> Self {
        Self::new()
    }
}

fn iou(a: [f32; 4], b: [f32; 4]) -> f32 {
    let iw = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let ih = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = iw * ih;
    let area = |r: [f32; 4]| (r[2] - r[0]) * (r[3] - r[1]);
    let union = area(a) + area(b) - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

impl TransformNode for RandomIoUCrop {
    fn transformed_kinds(&self) -> &[Kind] {
        SPATIAL
    }

    fn check_inputs(&self, leaves: &[Value]) -> Result<()> {
        let images = query::count_kind(leaves, Kind::is_image_like);
        if images != 1 {
            return Err(VisionError::incompatible(
                "RandomIoUCrop",
                format!("requires exactly one image or video, found {images}"),
            )
            .into());
        }
        query::bounding_boxes(leaves).map_err(|_| {
            VisionError::incompatible("RandomIoUCrop", "requires exactly one BoundingBoxes value")
        })?;
        Ok(())
    }

    fn get_params(&self, leaves: &[Value]) -> Result<Params> {
        let (h, w) = query::image_size(leaves)?;
        let boxes = query::bounding_boxes(leaves)?;
        let xyxy = boxes.to_format(BoundingBoxFormat::Xyxy)?;
        let rows: Vec<[f32; 4]> = xyxy.outer_iter().map(|r| [r[0], r[1], r[2], r[3]]).collect();

        for _ in 0..Self::MAX_ROUNDS {
            let idx = worker_gen_range::<usize, _>(0..self.sampler_options.len());
            let min_jaccard = self.sampler_options[idx];
            if min_jaccard >= 1.0 {
                return Ok(Params::new());
            }

            for _ in 0..self.trials {
                let (rx, ry) = (
                    self.scale.0 + (self.scale.1 - self.scale.0) * worker_gen_f64(),
                    self.scale.0 + (self.scale.1 - self.scale.0) * worker_gen_f64(),
                );
                let new_w = (w as f64 * rx) as usize;
                let new_h = (h as f64 * ry) as usize;
                if new_w == 0 || new_h == 0 || new_w > w || new_h > h {
                    continue;
                }
                let aspect = new_w as f64 / new_h as f64;
                if !(self.aspect_ratio.0..=self.aspect_ratio.1).contains(&aspect) {
                    continue;
                }

                let left = ((w - new_w) as f64 * worker_gen_f64()) as usize;
                let top = ((h - new_h) as f64 * worker_gen_f64()) as usize;
                let crop = [left as f32, top as f32, (left + new_w) as f32, (top + new_h) as f32];

                let within: Vec<bool> = rows
                    .iter()
                    .map(|b| {
                        let (cx, cy) = ((b[0] + b[2]) / 2.0, (b[1] + b[3]) / 2.0);
                        crop[0] < cx && cx < crop[2] && crop[1] < cy && cy < crop[3]
                    })
                    .collect();
                let best = rows
                    .iter()
                    .zip(&within)
                    .filter(|(_, inside)| **inside)
                    .map(|(b, _)| iou(*b, crop))
                    .fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |a| a.max(v))));
                match best {
                    Some(best) if best as f64 >= min_jaccard => {
                        let within: Vec<f64> =
                            within.iter().map(|&keep| if keep { 1.0 } else { 0.0 }).collect();
                        return Ok(Params::new()
                            .with("top", top as i64)
                            .with("left", left as i64)
                            .with("height", new_h)
                            .with("width", new_w)
                            .with("is_within_crop", within));
                    }
                    _ => continue,
                }
            }
        }
        Err(VisionError::parameter(
            "RandomIoUCrop",
            format!("no crop satisfied the IoU constraints after {} rounds", Self::MAX_ROUNDS),
        )
        .into())
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        if params.is_empty() {
            return Ok(value);
        }
        let cropped = dispatcher.dispatch("crop", value, params)?;
        let Some(boxes) = cropped.as_bounding_boxes() else {
            return Ok(cropped);
        };
        let within = params.floats("is_within_crop")?;
        let mut data = boxes.data().to_owned();
        for (mut row, keep) in data.outer_iter_mut().zip(within) {
            if keep == 0.0 {
                row.fill(0.0);
            }
        }
        Ok(boxes.wrap_like(data.into_shared())?.into())
    }
}
