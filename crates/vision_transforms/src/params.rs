//! Named kernel parameters.
//!
//! A transform computes one [`Params`] bag per call and hands the same bag to
//! every kernel it dispatches, so an image and its boxes see identical crop
//! offsets, angles and flip decisions.

use crate::datapoints::{BoundingBoxFormat, ColorSpace, DType};
use crate::error::{VisionError, VisionResult};
use image::imageops::FilterType;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Resampling filter used by resize and affine kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
}

impl Interpolation {
    /// Equivalent `image` crate filter for raster kernels.
    pub fn filter_type(self) -> FilterType {
        match self {
            Interpolation::Nearest => FilterType::Nearest,
            Interpolation::Bilinear => FilterType::Triangle,
            Interpolation::Bicubic => FilterType::CatmullRom,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Bool(bool),
    Int(i64),
    Float(f64),
    Floats(Vec<f64>),
    /// `(height, width)`
    Size(usize, usize),
    Format(BoundingBoxFormat),
    ColorSpace(ColorSpace),
    DType(DType),
    Interpolation(Interpolation),
}

impl Param {
    fn type_name(&self) -> &'static str {
        match self {
            Param::Bool(_) => "bool",
            Param::Int(_) => "int",
            Param::Float(_) => "float",
            Param::Floats(_) => "float list",
            Param::Size(..) => "size",
            Param::Format(_) => "box format",
            Param::ColorSpace(_) => "color space",
            Param::DType(_) => "dtype",
            Param::Interpolation(_) => "interpolation",
        }
    }
}

macro_rules! impl_param_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Param {
                fn from(value: $ty) -> Self {
                    Param::$variant(value)
                }
            }
        )*
    };
}

impl_param_from!(
    bool => Bool,
    i64 => Int,
    f64 => Float,
    Vec<f64> => Floats,
    BoundingBoxFormat => Format,
    ColorSpace => ColorSpace,
    DType => DType,
    Interpolation => Interpolation,
);

impl From<usize> for Param {
    fn from(value: usize) -> Self {
        Param::Int(value as i64)
    }
}

impl From<f32> for Param {
    fn from(value: f32) -> Self {
        Param::Float(value as f64)
    }
}

impl From<(usize, usize)> for Param {
    fn from((height, width): (usize, usize)) -> Self {
        Param::Size(height, width)
    }
}

impl From<&[f64]> for Param {
    fn from(value: &[f64]) -> Self {
        Param::Floats(value.to_vec())
    }
}

/// Ordered `name -> Param` bag with typed getters.
///
/// Getters fail with [`VisionError::InvalidParam`] when the entry is missing or
/// holds another type; the `opt_*` variants only fail on a type mismatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: BTreeMap<String, Param>,
}

macro_rules! getter {
    ($get:ident, $opt:ident, $variant:ident, $ty:ty) => {
        pub fn $get(&self, name: &str) -> VisionResult<$ty> {
            self.$opt(name)?
                .ok_or_else(|| VisionError::invalid_param(name, "missing"))
        }

        pub fn $opt(&self, name: &str) -> VisionResult<Option<$ty>> {
            match self.entries.get(name) {
                None => Ok(None),
                Some(Param::$variant(v)) => Ok(Some(v.clone())),
                Some(other) => Err(Self::mismatch(name, stringify!($variant), other)),
            }
        }
    };
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Param>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Param>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn mismatch(name: &str, expected: &str, found: &Param) -> VisionError {
        VisionError::invalid_param(
            name,
            format!("expected {}, found {}", expected.to_lowercase(), found.type_name()),
        )
    }

    getter!(bool, opt_bool, Bool, bool);
    getter!(int, opt_int, Int, i64);
    getter!(floats, opt_floats, Floats, Vec<f64>);
    getter!(format, opt_format, Format, BoundingBoxFormat);
    getter!(color_space, opt_color_space, ColorSpace, ColorSpace);
    getter!(dtype, opt_dtype, DType, DType);
    getter!(interpolation, opt_interpolation, Interpolation, Interpolation);

    /// Float entries also accept integers.
    pub fn float(&self, name: &str) -> VisionResult<f64> {
        self.opt_float(name)?
            .ok_or_else(|| VisionError::invalid_param(name, "missing"))
    }

    pub fn opt_float(&self, name: &str) -> VisionResult<Option<f64>> {
        match self.entries.get(name) {
            None => Ok(None),
            Some(Param::Float(v)) => Ok(Some(*v)),
            Some(Param::Int(v)) => Ok(Some(*v as f64)),
            Some(other) => Err(Self::mismatch(name, "Float", other)),
        }
    }

    /// A non-negative integer entry.
    pub fn usize(&self, name: &str) -> VisionResult<usize> {
        let value = self.int(name)?;
        usize::try_from(value)
            .map_err(|_| VisionError::invalid_param(name, format!("must be non-negative, got {value}")))
    }

    pub fn size(&self, name: &str) -> VisionResult<(usize, usize)> {
        match self.entries.get(name) {
            None => Err(VisionError::invalid_param(name, "missing")),
            Some(Param::Size(h, w)) => Ok((*h, *w)),
            Some(other) => Err(Self::mismatch(name, "Size", other)),
        }
    }
}
