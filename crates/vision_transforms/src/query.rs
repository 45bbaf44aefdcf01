//! Read-only questions about a flattened sample.

use crate::datapoints::{BoundingBoxes, Datapoint, DType, Kind, Value};
use crate::error::{VisionError, VisionResult};
use crate::kernels::util::RasterDepth;
use image::GenericImageView;

/// `(height, width)` of a single pixel-carrying or canvas-bound leaf.
pub fn spatial_size(value: &Value) -> Option<(usize, usize)> {
    match value {
        Value::Raster(img) => {
            let (w, h) = img.dimensions();
            Some((h as usize, w as usize))
        }
        Value::Tensor(t) if t.ndim() >= 2 => {
            let shape = t.shape();
            Some((shape[shape.len() - 2], shape[shape.len() - 1]))
        }
        Value::Datapoint(dp) => dp.spatial_size(),
        _ => None,
    }
}

/// Spatial size of the first image-like leaf (Image, Video, Raster or Tensor).
pub fn image_size(leaves: &[Value]) -> VisionResult<(usize, usize)> {
    leaves
        .iter()
        .filter(|leaf| leaf.kind().is_some_and(Kind::is_image_like))
        .find_map(spatial_size)
        .ok_or(VisionError::NoImageFound)
}

/// Channel count of the first image-like leaf.
pub fn channel_count(leaves: &[Value]) -> VisionResult<usize> {
    leaves
        .iter()
        .find_map(|leaf| match leaf {
            Value::Datapoint(Datapoint::Image(image)) => Some(image.num_channels()),
            Value::Datapoint(Datapoint::Video(video)) => Some(video.num_channels()),
            Value::Raster(img) => Some(img.color().channel_count() as usize),
            Value::Tensor(t) if t.ndim() >= 3 => Some(t.shape()[t.ndim() - 3]),
            Value::Tensor(t) if t.ndim() == 2 => Some(1),
            _ => None,
        })
        .ok_or(VisionError::NoImageFound)
}

pub fn kind_present(leaves: &[Value], kind: Kind) -> bool {
    leaves.iter().any(|leaf| leaf.kind() == Some(kind))
}

pub fn has_any(leaves: &[Value], kinds: &[Kind]) -> bool {
    kinds.iter().any(|&kind| kind_present(leaves, kind))
}

pub fn has_all(leaves: &[Value], kinds: &[Kind]) -> bool {
    kinds.iter().all(|&kind| kind_present(leaves, kind))
}

pub fn count_kind(leaves: &[Value], pred: impl Fn(Kind) -> bool) -> usize {
    leaves
        .iter()
        .filter(|leaf| leaf.kind().is_some_and(&pred))
        .count()
}

/// The single BoundingBoxes leaf of a sample.
pub fn bounding_boxes(leaves: &[Value]) -> VisionResult<&BoundingBoxes> {
    let mut found = leaves.iter().filter_map(Value::as_bounding_boxes);
    match (found.next(), found.next()) {
        (Some(boxes), None) => Ok(boxes),
        (None, _) => Err(VisionError::incompatible(
            "query",
            "no bounding boxes found in the sample",
        )),
        (Some(_), Some(_)) => Err(VisionError::incompatible(
            "query",
            "found multiple bounding box values in the sample",
        )),
    }
}

/// Upper bound of a leaf's value range: the dtype maximum for images and
/// videos, the sample maximum for rasters, 1 for plain tensors.
pub fn value_bound(value: &Value) -> f32 {
    match value {
        Value::Datapoint(Datapoint::Image(image)) => image.dtype().max_value(),
        Value::Datapoint(Datapoint::Video(video)) => video.dtype().max_value(),
        Value::Raster(img) => RasterDepth::of(img).bound(),
        _ => DType::F32.max_value(),
    }
}
