use super::{Kind, Tensor};
use crate::error::{VisionError, VisionResult};
use ndarray::Axis;
use serde::Deserialize;
use std::str::FromStr;

/// Value range convention of an image payload.
///
/// Payloads are always stored as `f32`; the dtype records whether the values
/// follow the 8-bit `[0, 255]` convention or the float `[0, 1]` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    U8,
    F32,
}

impl DType {
    /// Largest representable intensity.
    pub fn max_value(self) -> f32 {
        match self {
            DType::U8 => 255.0,
            DType::F32 => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColorSpace {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl ColorSpace {
    pub fn num_channels(self) -> usize {
        match self {
            ColorSpace::Gray => 1,
            ColorSpace::GrayAlpha => 2,
            ColorSpace::Rgb => 3,
            ColorSpace::Rgba => 4,
        }
    }

    pub fn from_num_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(ColorSpace::Gray),
            2 => Some(ColorSpace::GrayAlpha),
            3 => Some(ColorSpace::Rgb),
            4 => Some(ColorSpace::Rgba),
            _ => None,
        }
    }
}

impl FromStr for ColorSpace {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GRAY" => Ok(ColorSpace::Gray),
            "GRAY_ALPHA" => Ok(ColorSpace::GrayAlpha),
            "RGB" => Ok(ColorSpace::Rgb),
            "RGBA" => Ok(ColorSpace::Rgba),
            other => Err(VisionError::invalid_param(
                "color_space",
                format!("unknown color space `{other}`"),
            )),
        }
    }
}

// ============================================================================
// Image
// ============================================================================

/// Image payload of shape `[..., C, H, W]`.
///
/// A rank-2 payload is read as a single-channel image and gains a leading
/// channel axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    data: Tensor,
    color_space: Option<ColorSpace>,
    dtype: DType,
}

impl Image {
    /// Wraps a float image (`[0, 1]` value range) without a color space.
    pub fn new(data: Tensor) -> VisionResult<Self> {
        Self::from_parts(data, None, DType::F32)
    }

    pub(crate) fn from_parts(
        data: Tensor,
        color_space: Option<ColorSpace>,
        dtype: DType,
    ) -> VisionResult<Self> {
        let data = match data.ndim() {
            0 | 1 => {
                return Err(VisionError::validation(
                    Kind::Image,
                    format!("expected at least 2 dimensions, got shape {:?}", data.shape()),
                ))
            }
            2 => data.insert_axis(Axis(0)),
            _ => data,
        };
        let image = Self {
            data,
            color_space,
            dtype,
        };
        image.check_color_space()?;
        Ok(image)
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> VisionResult<Self> {
        self.color_space = Some(color_space);
        self.check_color_space()?;
        Ok(self)
    }

    fn check_color_space(&self) -> VisionResult<()> {
        match self.color_space {
            Some(cs) if cs.num_channels() != self.num_channels() => Err(VisionError::validation(
                Kind::Image,
                format!(
                    "color space {:?} needs {} channels but payload has {}",
                    cs,
                    cs.num_channels(),
                    self.num_channels()
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Derives an image from this one's metadata and a new payload.
    pub fn wrap_like(&self, data: Tensor) -> VisionResult<Self> {
        Self::from_parts(data, self.color_space, self.dtype)
    }

    pub fn data(&self) -> &Tensor {
        &self.data
    }

    pub fn into_data(self) -> Tensor {
        self.data
    }

    pub fn color_space(&self) -> Option<ColorSpace> {
        self.color_space
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn num_channels(&self) -> usize {
        self.data.shape()[self.data.ndim() - 3]
    }

    /// `(height, width)`
    pub fn spatial_size(&self) -> (usize, usize) {
        let shape = self.data.shape();
        (shape[shape.len() - 2], shape[shape.len() - 1])
    }
}

// ============================================================================
// Video
// ============================================================================

/// Video payload of shape `[..., T, C, H, W]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Video {
    data: Tensor,
    dtype: DType,
}

impl Video {
    pub fn new(data: Tensor) -> VisionResult<Self> {
        if data.ndim() < 4 {
            return Err(VisionError::validation(
                Kind::Video,
                format!(
                    "expected at least 4 dimensions [T, C, H, W], got shape {:?}",
                    data.shape()
                ),
            ));
        }
        Ok(Self {
            data,
            dtype: DType::F32,
        })
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn wrap_like(&self, data: Tensor) -> VisionResult<Self> {
        Ok(Self::new(data)?.with_dtype(self.dtype))
    }

    pub fn data(&self) -> &Tensor {
        &self.data
    }

    pub fn into_data(self) -> Tensor {
        self.data
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn num_frames(&self) -> usize {
        self.data.shape()[self.data.ndim() - 4]
    }

    pub fn num_channels(&self) -> usize {
        self.data.shape()[self.data.ndim() - 3]
    }

    pub fn spatial_size(&self) -> (usize, usize) {
        let shape = self.data.shape();
        (shape[shape.len() - 2], shape[shape.len() - 1])
    }
}
