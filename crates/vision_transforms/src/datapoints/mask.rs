use super::{Kind, Tensor};
use crate::error::{VisionError, VisionResult};

/// Segmentation or detection mask of shape `[..., H, W]`.
///
/// Values are category ids (or 0/1 for binary masks) and must be integral.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    data: Tensor,
}

impl Mask {
    pub fn new(data: Tensor) -> VisionResult<Self> {
        if data.ndim() < 2 {
            return Err(VisionError::validation(
                Kind::Mask,
                format!("expected at least 2 dimensions, got shape {:?}", data.shape()),
            ));
        }
        if let Some(v) = data.iter().find(|v| v.fract() != 0.0) {
            return Err(VisionError::validation(
                Kind::Mask,
                format!("mask values must be integral, found {v}"),
            ));
        }
        Ok(Self { data })
    }

    pub fn wrap_like(&self, data: Tensor) -> VisionResult<Self> {
        Self::new(data)
    }

    pub fn data(&self) -> &Tensor {
        &self.data
    }

    pub fn into_data(self) -> Tensor {
        self.data
    }

    pub fn spatial_size(&self) -> (usize, usize) {
        let shape = self.data.shape();
        (shape[shape.len() - 2], shape[shape.len() - 1])
    }
}
