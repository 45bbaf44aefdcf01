//! Metadata-changing transforms.

use super::core::TransformNode;
use crate::datapoints::{BoundingBoxFormat, ColorSpace, DType, Kind, Overrides, Value};
use crate::dispatch::Dispatcher;
use crate::error::VisionError;
use crate::params::Params;
use crate::query;
use anyhow::{ensure, Result};
use ndarray::Axis;
use tracing::debug;

/// Re-encodes every BoundingBoxes leaf in `format`.
#[derive(Debug, Clone)]
pub struct ConvertBoundingBoxFormat {
    format: BoundingBoxFormat,
}

impl ConvertBoundingBoxFormat {
    pub fn new(format: BoundingBoxFormat) -> Self {
        Self { format }
    }
}

impl TransformNode for ConvertBoundingBoxFormat {
    fn transformed_kinds(&self) -> &[Kind] {
        &[Kind::BoundingBoxes]
    }

    fn get_params(&self, _: &[Value]) -> Result<Params> {
        Ok(Params::new().with("format", self.format))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("convert_bounding_box_format", value, params)
    }
}

/// Clamps every box to its canvas.
#[derive(Debug, Clone, Default)]
pub struct ClampBoundingBoxes;

impl TransformNode for ClampBoundingBoxes {
    fn transformed_kinds(&self) -> &[Kind] {
        &[Kind::BoundingBoxes]
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("clamp_bounding_boxes", value, params)
    }
}

/// Drops boxes narrower or shorter than `min_size` pixels.
///
/// Label and one-hot label leaves with one row per box lose the same rows, so
/// they stay paired with the surviving boxes. Everything else passes through.
#[derive(Debug, Clone)]
pub struct CleanupBoxes {
    min_size: f64,
}

impl CleanupBoxes {
    pub fn new(min_size: f64) -> Result<Self> {
        ensure!(min_size > 0.0, "min_size must be positive (got {})", min_size);
        Ok(Self { min_size })
    }
}

impl Default for CleanupBoxes {
    fn default() -> Self {
        Self { min_size: 1.0 }
    }
}

impl TransformNode for CleanupBoxes {
    fn transformed_kinds(&self) -> &[Kind] {
        &[Kind::BoundingBoxes, Kind::Label, Kind::OneHotLabel]
    }

    fn check_inputs(&self, leaves: &[Value]) -> Result<()> {
        query::bounding_boxes(leaves).map_err(|_| {
            VisionError::incompatible("CleanupBoxes", "requires exactly one BoundingBoxes value")
        })?;
        Ok(())
    }

    /// `keep` lists the surviving row indices out of `num_boxes`.
    fn get_params(&self, leaves: &[Value]) -> Result<Params> {
        let boxes = query::bounding_boxes(leaves)?;
        let xyxy = boxes.to_format(BoundingBoxFormat::Xyxy)?;
        let min_size = self.min_size as f32;
        let keep: Vec<f64> = xyxy
            .outer_iter()
            .enumerate()
            .filter(|(_, r)| r[2] - r[0] >= min_size && r[3] - r[1] >= min_size)
            .map(|(i, _)| i as f64)
            .collect();
        if keep.len() < boxes.num_boxes() {
            debug!(kept = keep.len(), total = boxes.num_boxes(), "dropping degenerate boxes");
        }
        Ok(Params::new()
            .with("keep", keep)
            .with("num_boxes", boxes.num_boxes()))
    }

    fn transform(&self, value: Value, params: &Params, _: &Dispatcher) -> Result<Value> {
        let num_boxes = params.usize("num_boxes")?;
        let Value::Datapoint(datapoint) = &value else {
            return Ok(value);
        };
        let data = datapoint.data();
        if data.ndim() == 0 || data.len_of(Axis(0)) != num_boxes {
            return Ok(value);
        }
        let keep: Vec<usize> = params.floats("keep")?.into_iter().map(|i| i as usize).collect();
        let kept = data.select(Axis(0), &keep).into_shared();
        Ok(datapoint.wrap_like(kept, &Overrides::none())?.into())
    }
}

/// Converts images and videos to `dtype`, rescaling values to its range.
#[derive(Debug, Clone)]
pub struct ConvertImageDtype {
    dtype: DType,
}

impl ConvertImageDtype {
    pub fn new(dtype: DType) -> Self {
        Self { dtype }
    }
}

impl TransformNode for ConvertImageDtype {
    fn transformed_kinds(&self) -> &[Kind] {
        &[Kind::Image, Kind::Video]
    }

    fn get_params(&self, _: &[Value]) -> Result<Params> {
        Ok(Params::new().with("dtype", self.dtype))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("convert_dtype", value, params)
    }
}

/// Converts images to `color_space`.
#[derive(Debug, Clone)]
pub struct ConvertColorSpace {
    color_space: ColorSpace,
}

impl ConvertColorSpace {
    pub fn new(color_space: ColorSpace) -> Self {
        Self { color_space }
    }
}

impl TransformNode for ConvertColorSpace {
    fn transformed_kinds(&self) -> &[Kind] {
        &[Kind::Image]
    }

    fn get_params(&self, _: &[Value]) -> Result<Params> {
        Ok(Params::new().with("color_space", self.color_space))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("convert_color_space", value, params)
    }
}
