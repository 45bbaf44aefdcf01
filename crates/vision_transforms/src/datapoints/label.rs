use super::{Kind, Tensor};
use crate::error::{VisionError, VisionResult};
use std::sync::Arc;

/// Integer class labels, shape `[]` or `[N]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    data: Tensor,
    categories: Option<Arc<[String]>>,
}

impl Label {
    pub fn new(data: Tensor) -> VisionResult<Self> {
        Self::from_parts(data, None)
    }

    pub(crate) fn from_parts(data: Tensor, categories: Option<Arc<[String]>>) -> VisionResult<Self> {
        if data.ndim() > 1 {
            return Err(VisionError::validation(
                Kind::Label,
                format!("expected a scalar or 1D payload, got shape {:?}", data.shape()),
            ));
        }
        if let Some(categories) = &categories {
            if let Some(v) = data
                .iter()
                .find(|v| **v < 0.0 || **v as usize >= categories.len())
            {
                return Err(VisionError::validation(
                    Kind::Label,
                    format!("label {v} is outside of {} categories", categories.len()),
                ));
            }
        }
        Ok(Self { data, categories })
    }

    pub fn with_categories(self, categories: Vec<String>) -> VisionResult<Self> {
        Self::from_parts(self.data, Some(categories.into()))
    }

    pub fn wrap_like(&self, data: Tensor) -> VisionResult<Self> {
        Self::from_parts(data, self.categories.clone())
    }

    pub fn data(&self) -> &Tensor {
        &self.data
    }

    pub fn into_data(self) -> Tensor {
        self.data
    }

    pub fn categories(&self) -> Option<&[String]> {
        self.categories.as_deref()
    }

    pub(crate) fn categories_arc(&self) -> Option<Arc<[String]>> {
        self.categories.clone()
    }

    /// Category names for each label, if categories are known.
    pub fn to_categories(&self) -> Option<Vec<&str>> {
        let categories = self.categories.as_ref()?;
        Some(
            self.data
                .iter()
                .map(|v| categories[*v as usize].as_str())
                .collect(),
        )
    }
}

/// One-hot (or soft) labels, shape `[..., K]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OneHotLabel {
    data: Tensor,
    categories: Option<Arc<[String]>>,
}

impl OneHotLabel {
    pub fn new(data: Tensor) -> VisionResult<Self> {
        Self::from_parts(data, None)
    }

    pub(crate) fn from_parts(data: Tensor, categories: Option<Arc<[String]>>) -> VisionResult<Self> {
        if data.ndim() == 0 {
            return Err(VisionError::validation(
                Kind::OneHotLabel,
                "expected at least one dimension",
            ));
        }
        if let Some(categories) = &categories {
            let k = data.shape()[data.ndim() - 1];
            if k != categories.len() {
                return Err(VisionError::validation(
                    Kind::OneHotLabel,
                    format!("last dimension is {k} but {} categories are declared", categories.len()),
                ));
            }
        }
        Ok(Self { data, categories })
    }

    pub fn with_categories(self, categories: Vec<String>) -> VisionResult<Self> {
        Self::from_parts(self.data, Some(categories.into()))
    }

    pub fn wrap_like(&self, data: Tensor) -> VisionResult<Self> {
        Self::from_parts(data, self.categories.clone())
    }

    pub fn data(&self) -> &Tensor {
        &self.data
    }

    pub fn into_data(self) -> Tensor {
        self.data
    }

    pub fn num_categories(&self) -> usize {
        self.data.shape()[self.data.ndim() - 1]
    }

    pub fn categories(&self) -> Option<&[String]> {
        self.categories.as_deref()
    }

    pub(crate) fn categories_arc(&self) -> Option<Arc<[String]>> {
        self.categories.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoints::tensor;
    use anyhow::Result;

    #[test]
    fn test_label_categories() -> Result<()> {
        let label = Label::new(tensor(&[2], vec![1.0, 0.0])?)?
            .with_categories(vec!["cat".into(), "dog".into()])?;
        assert_eq!(label.to_categories(), Some(vec!["dog", "cat"]));

        let out_of_range = Label::new(tensor(&[1], vec![2.0])?)?
            .with_categories(vec!["cat".into(), "dog".into()]);
        assert!(out_of_range.is_err());
        Ok(())
    }

    #[test]
    fn test_one_hot_categories_match_last_dim() -> Result<()> {
        let one_hot = OneHotLabel::new(tensor(&[1, 3], vec![0.0, 1.0, 0.0])?)?;
        assert_eq!(one_hot.num_categories(), 3);
        assert!(one_hot.with_categories(vec!["a".into(), "b".into()]).is_err());
        Ok(())
    }
}
