use super::{Kind, Tensor};
use crate::error::{VisionError, VisionResult};
use ndarray::{Array2, Axis, Ix2};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Coordinate layout of each box row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoundingBoxFormat {
    /// `[x1, y1, x2, y2]`
    Xyxy,
    /// `[x, y, width, height]`
    Xywh,
    /// `[center_x, center_y, width, height]`
    Cxcywh,
}

impl fmt::Display for BoundingBoxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoundingBoxFormat::Xyxy => "XYXY",
            BoundingBoxFormat::Xywh => "XYWH",
            BoundingBoxFormat::Cxcywh => "CXCYWH",
        })
    }
}

impl FromStr for BoundingBoxFormat {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "XYXY" => Ok(BoundingBoxFormat::Xyxy),
            "XYWH" => Ok(BoundingBoxFormat::Xywh),
            "CXCYWH" => Ok(BoundingBoxFormat::Cxcywh),
            other => Err(VisionError::invalid_param(
                "format",
                format!("unknown bounding box format `{other}`"),
            )),
        }
    }
}

/// Converts every row of an `[N, 4]` array between coordinate formats.
pub fn convert_box_format(
    boxes: &Array2<f32>,
    from: BoundingBoxFormat,
    to: BoundingBoxFormat,
) -> Array2<f32> {
    if from == to {
        return boxes.clone();
    }
    let mut out = boxes.clone();
    for mut row in out.rows_mut() {
        let [a, b, c, d] = [row[0], row[1], row[2], row[3]];
        let (x1, y1, x2, y2) = match from {
            BoundingBoxFormat::Xyxy => (a, b, c, d),
            BoundingBoxFormat::Xywh => (a, b, a + c, b + d),
            BoundingBoxFormat::Cxcywh => (a - c / 2.0, b - d / 2.0, a + c / 2.0, b + d / 2.0),
        };
        let converted = match to {
            BoundingBoxFormat::Xyxy => [x1, y1, x2, y2],
            BoundingBoxFormat::Xywh => [x1, y1, x2 - x1, y2 - y1],
            BoundingBoxFormat::Cxcywh => [(x1 + x2) / 2.0, (y1 + y2) / 2.0, x2 - x1, y2 - y1],
        };
        for (slot, value) in row.iter_mut().zip(converted) {
            *slot = value;
        }
    }
    out
}

// ============================================================================
// BoundingBoxes
// ============================================================================

/// A set of boxes `[N, 4]` on a canvas of `(height, width)`.
///
/// Coordinates are only meaningful together with the format and the canvas
/// size. A single box given as `[4]` is stored as `[1, 4]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBoxes {
    data: Tensor,
    format: BoundingBoxFormat,
    canvas_size: (usize, usize),
}

impl BoundingBoxes {
    pub fn new(
        data: Tensor,
        format: BoundingBoxFormat,
        canvas_size: (usize, usize),
    ) -> VisionResult<Self> {
        let data = match data.ndim() {
            1 => data.insert_axis(Axis(0)),
            2 => data,
            n => {
                return Err(VisionError::validation(
                    Kind::BoundingBoxes,
                    format!("expected a 1D or 2D payload, got {n}D"),
                ))
            }
        };
        if data.shape()[1] != 4 {
            return Err(VisionError::validation(
                Kind::BoundingBoxes,
                format!(
                    "{format} boxes need 4 coordinates per row, got shape {:?}",
                    data.shape()
                ),
            ));
        }
        if canvas_size.0 == 0 || canvas_size.1 == 0 {
            return Err(VisionError::validation(
                Kind::BoundingBoxes,
                format!("canvas size must be non-empty, got {canvas_size:?}"),
            ));
        }
        Ok(Self {
            data,
            format,
            canvas_size,
        })
    }

    /// Builds boxes from rows of coordinates.
    pub fn from_rows(
        rows: &[[f32; 4]],
        format: BoundingBoxFormat,
        canvas_size: (usize, usize),
    ) -> VisionResult<Self> {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Self::new(
            super::tensor(&[rows.len(), 4], flat)?,
            format,
            canvas_size,
        )
    }

    pub fn wrap_like(&self, data: Tensor) -> VisionResult<Self> {
        Self::new(data, self.format, self.canvas_size)
    }

    pub fn data(&self) -> &Tensor {
        &self.data
    }

    pub fn into_data(self) -> Tensor {
        self.data
    }

    pub fn format(&self) -> BoundingBoxFormat {
        self.format
    }

    /// `(height, width)` of the image the boxes refer to.
    pub fn canvas_size(&self) -> (usize, usize) {
        self.canvas_size
    }

    pub fn num_boxes(&self) -> usize {
        self.data.shape()[0]
    }

    /// The payload as an owned `[N, 4]` array.
    pub fn to_array2(&self) -> VisionResult<Array2<f32>> {
        Ok(self.data.to_owned().into_dimensionality::<Ix2>()?)
    }

    /// Coordinates converted to `format`.
    pub fn to_format(&self, format: BoundingBoxFormat) -> VisionResult<Array2<f32>> {
        Ok(convert_box_format(&self.to_array2()?, self.format, format))
    }

    pub fn rows(&self) -> Vec<[f32; 4]> {
        self.data
            .outer_iter()
            .map(|row| [row[0], row[1], row[2], row[3]])
            .collect()
    }

    /// Replaces the payload with `xyxy` coordinates re-expressed in this
    /// value's format, on a (possibly new) canvas.
    pub fn from_xyxy_like(
        &self,
        xyxy: &Array2<f32>,
        canvas_size: (usize, usize),
    ) -> VisionResult<Self> {
        let converted = convert_box_format(xyxy, BoundingBoxFormat::Xyxy, self.format);
        Self::new(converted.into_dyn().into_shared(), self.format, canvas_size)
    }
}
