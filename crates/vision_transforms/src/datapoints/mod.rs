//! src/datapoints/mod.rs
//!
//! Typed values that flow through a transform pipeline.
//!
//! A [`Datapoint`] pairs an array payload with the metadata needed to interpret
//! it (box format and canvas size, image dtype, label categories, ...). A
//! [`Value`] is any leaf of a [`Sample`](crate::sample::Sample): a datapoint, a
//! plain array, a host raster image, encoded bytes, or a pass-through scalar.
//!
//! ```text
//! Value
//! ├── Tensor        plain ArcArray<f32, IxDyn>
//! ├── Raster        image::DynamicImage
//! ├── Encoded       EncodedImage (undecoded bytes)
//! ├── Datapoint
//! │   ├── Image          [..., C, H, W]    color space, dtype
//! │   ├── Video          [..., T, C, H, W] dtype
//! │   ├── Mask           [..., H, W]
//! │   ├── BoundingBoxes  [N, 4]            format, canvas size
//! │   ├── Label          [N]               categories
//! │   └── OneHotLabel    [..., K]          categories
//! └── Str / Int / Float / Bool / None      passed through untouched
//! ```

mod bounding_boxes;
mod image;
mod label;
mod mask;

pub use self::bounding_boxes::{convert_box_format, BoundingBoxFormat, BoundingBoxes};
pub use self::image::{ColorSpace, DType, Image, Video};
pub use self::label::{Label, OneHotLabel};
pub use self::mask::Mask;

use crate::error::{VisionError, VisionResult};
use ::image::DynamicImage;
use ndarray::{ArcArray, IxDyn};
use std::fmt;
use std::sync::Arc;

/// Plain array payload. Clones share the underlying buffer.
pub type Tensor = ArcArray<f32, IxDyn>;

/// Builds a [`Tensor`] from a shape and row-major data.
pub fn tensor(shape: &[usize], data: Vec<f32>) -> VisionResult<Tensor> {
    Ok(Tensor::from_shape_vec(IxDyn(shape), data)?)
}

// ============================================================================
// Kind
// ============================================================================

/// Semantic category used as the second key of the kernel registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Tensor,
    Raster,
    EncodedImage,
    Image,
    Video,
    Mask,
    BoundingBoxes,
    Label,
    OneHotLabel,
}

impl Kind {
    pub const ALL: [Kind; 9] = [
        Kind::Tensor,
        Kind::Raster,
        Kind::EncodedImage,
        Kind::Image,
        Kind::Video,
        Kind::Mask,
        Kind::BoundingBoxes,
        Kind::Label,
        Kind::OneHotLabel,
    ];

    /// Kinds tried, in order, when no kernel is registered for `self`.
    /// Plain-array kinds come before annotation kinds.
    pub fn fallbacks(self) -> &'static [Kind] {
        match self {
            Kind::Image | Kind::Video | Kind::Mask => &[Kind::Tensor],
            _ => &[],
        }
    }

    /// Kinds that carry pixels and define an image size.
    pub fn is_image_like(self) -> bool {
        matches!(self, Kind::Tensor | Kind::Raster | Kind::Image | Kind::Video)
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Tensor => "Tensor",
            Kind::Raster => "Raster",
            Kind::EncodedImage => "EncodedImage",
            Kind::Image => "Image",
            Kind::Video => "Video",
            Kind::Mask => "Mask",
            Kind::BoundingBoxes => "BoundingBoxes",
            Kind::Label => "Label",
            Kind::OneHotLabel => "OneHotLabel",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// EncodedImage
// ============================================================================

/// Undecoded image bytes (PNG, JPEG, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage(Arc<[u8]>);

impl EncodedImage {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// ============================================================================
// Overrides
// ============================================================================

/// Metadata replacements applied by [`Datapoint::wrap_like`].
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub format: Option<BoundingBoxFormat>,
    pub canvas_size: Option<(usize, usize)>,
    pub color_space: Option<ColorSpace>,
    pub dtype: Option<DType>,
    pub categories: Option<Arc<[String]>>,
}

impl Overrides {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: BoundingBoxFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn canvas_size(mut self, canvas_size: (usize, usize)) -> Self {
        self.canvas_size = Some(canvas_size);
        self
    }

    pub fn color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = Some(color_space);
        self
    }

    pub fn dtype(mut self, dtype: DType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    pub fn categories(mut self, categories: Arc<[String]>) -> Self {
        self.categories = Some(categories);
        self
    }

    fn reject_unless(&self, kind: Kind, allowed: &[&str]) -> VisionResult<()> {
        let set = [
            ("format", self.format.is_some()),
            ("canvas_size", self.canvas_size.is_some()),
            ("color_space", self.color_space.is_some()),
            ("dtype", self.dtype.is_some()),
            ("categories", self.categories.is_some()),
        ];
        match set
            .iter()
            .find(|(name, present)| *present && !allowed.contains(name))
        {
            Some((name, _)) => Err(VisionError::validation(
                kind,
                format!("override `{name}` does not apply to this kind"),
            )),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Datapoint
// ============================================================================

/// A payload tagged with its kind and kind-specific metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum Datapoint {
    Image(Image),
    Video(Video),
    Mask(Mask),
    BoundingBoxes(BoundingBoxes),
    Label(Label),
    OneHotLabel(OneHotLabel),
}

impl Datapoint {
    pub fn kind(&self) -> Kind {
        match self {
            Datapoint::Image(_) => Kind::Image,
            Datapoint::Video(_) => Kind::Video,
            Datapoint::Mask(_) => Kind::Mask,
            Datapoint::BoundingBoxes(_) => Kind::BoundingBoxes,
            Datapoint::Label(_) => Kind::Label,
            Datapoint::OneHotLabel(_) => Kind::OneHotLabel,
        }
    }

    pub fn data(&self) -> &Tensor {
        match self {
            Datapoint::Image(v) => v.data(),
            Datapoint::Video(v) => v.data(),
            Datapoint::Mask(v) => v.data(),
            Datapoint::BoundingBoxes(v) => v.data(),
            Datapoint::Label(v) => v.data(),
            Datapoint::OneHotLabel(v) => v.data(),
        }
    }

    pub fn into_data(self) -> Tensor {
        match self {
            Datapoint::Image(v) => v.into_data(),
            Datapoint::Video(v) => v.into_data(),
            Datapoint::Mask(v) => v.into_data(),
            Datapoint::BoundingBoxes(v) => v.into_data(),
            Datapoint::Label(v) => v.into_data(),
            Datapoint::OneHotLabel(v) => v.into_data(),
        }
    }

    /// Derives a new datapoint from `self`'s metadata and a new payload.
    ///
    /// Metadata is copied unless overridden; the result is validated against
    /// the new payload's shape.
    pub fn wrap_like(&self, data: Tensor, overrides: &Overrides) -> VisionResult<Datapoint> {
        let kind = self.kind();
        Ok(match self {
            Datapoint::Image(image) => {
                overrides.reject_unless(kind, &["color_space", "dtype"])?;
                Datapoint::Image(Image::from_parts(
                    data,
                    overrides.color_space.or(image.color_space()),
                    overrides.dtype.unwrap_or(image.dtype()),
                )?)
            }
            Datapoint::Video(video) => {
                overrides.reject_unless(kind, &["dtype"])?;
                Datapoint::Video(Video::new(data)?.with_dtype(overrides.dtype.unwrap_or(video.dtype())))
            }
            Datapoint::Mask(_) => {
                overrides.reject_unless(kind, &[])?;
                Datapoint::Mask(Mask::new(data)?)
            }
            Datapoint::BoundingBoxes(boxes) => {
                overrides.reject_unless(kind, &["format", "canvas_size"])?;
                Datapoint::BoundingBoxes(BoundingBoxes::new(
                    data,
                    overrides.format.unwrap_or(boxes.format()),
                    overrides.canvas_size.unwrap_or(boxes.canvas_size()),
                )?)
            }
            Datapoint::Label(label) => {
                overrides.reject_unless(kind, &["categories"])?;
                Datapoint::Label(Label::from_parts(
                    data,
                    overrides.categories.clone().or_else(|| label.categories_arc()),
                )?)
            }
            Datapoint::OneHotLabel(label) => {
                overrides.reject_unless(kind, &["categories"])?;
                Datapoint::OneHotLabel(OneHotLabel::from_parts(
                    data,
                    overrides.categories.clone().or_else(|| label.categories_arc()),
                )?)
            }
        })
    }

    /// `(height, width)` for kinds that live on an image canvas.
    pub fn spatial_size(&self) -> Option<(usize, usize)> {
        match self {
            Datapoint::Image(v) => Some(v.spatial_size()),
            Datapoint::Video(v) => Some(v.spatial_size()),
            Datapoint::Mask(v) => Some(v.spatial_size()),
            Datapoint::BoundingBoxes(v) => Some(v.canvas_size()),
            Datapoint::Label(_) | Datapoint::OneHotLabel(_) => None,
        }
    }
}

// ============================================================================
// Value
// ============================================================================

/// A leaf of a sample tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Tensor(Tensor),
    Raster(DynamicImage),
    Encoded(EncodedImage),
    Datapoint(Datapoint),
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
}

impl Value {
    /// The dispatch kind, or `None` for pass-through scalars.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Value::Tensor(_) => Some(Kind::Tensor),
            Value::Raster(_) => Some(Kind::Raster),
            Value::Encoded(_) => Some(Kind::EncodedImage),
            Value::Datapoint(dp) => Some(dp.kind()),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "str",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::None => "none",
            other => other.kind().map(Kind::name).unwrap_or("unknown"),
        }
    }

    pub fn as_datapoint(&self) -> Option<&Datapoint> {
        match self {
            Value::Datapoint(dp) => Some(dp),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Value::Datapoint(Datapoint::Image(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_bounding_boxes(&self) -> Option<&BoundingBoxes> {
        match self {
            Value::Datapoint(Datapoint::BoundingBoxes(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_mask(&self) -> Option<&Mask> {
        match self {
            Value::Datapoint(Datapoint::Mask(v)) => Some(v),
            _ => None,
        }
    }
}

/// Classifies a value by kind.
pub fn kind_of(value: &Value) -> Option<Kind> {
    value.kind()
}

impl From<Tensor> for Value {
    fn from(value: Tensor) -> Self {
        Value::Tensor(value)
    }
}

impl From<DynamicImage> for Value {
    fn from(value: DynamicImage) -> Self {
        Value::Raster(value)
    }
}

impl From<EncodedImage> for Value {
    fn from(value: EncodedImage) -> Self {
        Value::Encoded(value)
    }
}

impl From<Datapoint> for Value {
    fn from(value: Datapoint) -> Self {
        Value::Datapoint(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

// ============================================================================
// Payload
// ============================================================================

/// A concrete leaf type that kernels can be registered for.
///
/// The registry keys a typed kernel by `Self::KIND` and converts the incoming
/// [`Value`] with `from_value` before calling it.
pub trait Payload: Sized + Send + 'static {
    const KIND: Kind;

    fn from_value(value: Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

macro_rules! impl_value_payload {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl Payload for $ty {
            const KIND: Kind = Kind::$kind;

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

macro_rules! impl_datapoint_payload {
    ($ty:ident) => {
        impl Payload for $ty {
            const KIND: Kind = Kind::$ty;

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::Datapoint(Datapoint::$ty(v)) => Some(v),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::Datapoint(Datapoint::$ty(self))
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::Datapoint(Datapoint::$ty(value))
            }
        }

        impl From<$ty> for Datapoint {
            fn from(value: $ty) -> Self {
                Datapoint::$ty(value)
            }
        }
    };
}

impl_value_payload!(Tensor, Tensor, Tensor);
impl_value_payload!(DynamicImage, Raster, Raster);
impl_value_payload!(EncodedImage, EncodedImage, Encoded);
impl_datapoint_payload!(Image);
impl_datapoint_payload!(Video);
impl_datapoint_payload!(Mask);
impl_datapoint_payload!(BoundingBoxes);
impl_datapoint_payload!(Label);
impl_datapoint_payload!(OneHotLabel);

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_kind_of_classifies_leaves() -> Result<()> {
        let image = Image::new(tensor(&[3, 2, 2], vec![0.0; 12])?)?;
        assert_eq!(kind_of(&image.into()), Some(Kind::Image));
        assert_eq!(kind_of(&Value::from("cat")), None);
        assert_eq!(kind_of(&Value::Tensor(tensor(&[2], vec![1.0, 2.0])?)), Some(Kind::Tensor));
        Ok(())
    }

    #[test]
    fn test_wrap_like_preserves_metadata() -> Result<()> {
        let boxes = BoundingBoxes::new(
            tensor(&[1, 4], vec![0.0, 0.0, 1.0, 1.0])?,
            BoundingBoxFormat::Xyxy,
            (10, 20),
        )?;
        let reference = Datapoint::from(boxes);

        for n in [0, 1, 3] {
            let wrapped = reference.wrap_like(tensor(&[n, 4], vec![2.0; n * 4])?, &Overrides::none())?;
            let Datapoint::BoundingBoxes(out) = wrapped else {
                panic!("kind changed")
            };
            assert_eq!(out.format(), BoundingBoxFormat::Xyxy);
            assert_eq!(out.canvas_size(), (10, 20));
            assert_eq!(out.num_boxes(), n);
        }
        Ok(())
    }

    #[test]
    fn test_wrap_like_applies_overrides() -> Result<()> {
        let boxes = BoundingBoxes::new(
            tensor(&[4], vec![0.0, 0.0, 1.0, 1.0])?,
            BoundingBoxFormat::Xyxy,
            (10, 20),
        )?;
        let reference = Datapoint::from(boxes);
        let wrapped = reference.wrap_like(
            tensor(&[1, 4], vec![0.0; 4])?,
            &Overrides::none().format(BoundingBoxFormat::Cxcywh).canvas_size((5, 5)),
        )?;
        let Datapoint::BoundingBoxes(out) = wrapped else {
            panic!("kind changed")
        };
        assert_eq!(out.format(), BoundingBoxFormat::Cxcywh);
        assert_eq!(out.canvas_size(), (5, 5));
        Ok(())
    }

    #[test]
    fn test_wrap_like_rejects_foreign_override() -> Result<()> {
        let mask = Datapoint::from(Mask::new(tensor(&[2, 2], vec![0.0, 1.0, 1.0, 0.0])?)?);
        let err = mask
            .wrap_like(
                tensor(&[2, 2], vec![0.0; 4])?,
                &Overrides::none().format(BoundingBoxFormat::Xywh),
            )
            .unwrap_err();
        assert!(matches!(err, VisionError::Validation { kind: Kind::Mask, .. }));
        Ok(())
    }

    #[test]
    fn test_wrap_like_validates_new_payload() -> Result<()> {
        let boxes = Datapoint::from(BoundingBoxes::new(
            tensor(&[1, 4], vec![0.0, 0.0, 1.0, 1.0])?,
            BoundingBoxFormat::Xyxy,
            (4, 4),
        )?);
        let err = boxes
            .wrap_like(tensor(&[1, 3], vec![0.0; 3])?, &Overrides::none())
            .unwrap_err();
        assert!(matches!(err, VisionError::Validation { .. }));
        Ok(())
    }

    use proptest::prelude::*;

    fn box_format() -> impl Strategy<Value = BoundingBoxFormat> {
        prop_oneof![
            Just(BoundingBoxFormat::Xyxy),
            Just(BoundingBoxFormat::Xywh),
            Just(BoundingBoxFormat::Cxcywh),
        ]
    }

    fn dtype() -> impl Strategy<Value = DType> {
        prop_oneof![Just(DType::U8), Just(DType::F32)]
    }

    proptest! {
        #[test]
        fn test_wrap_like_keeps_image_metadata(
            channels in 1usize..=4,
            tagged in any::<bool>(),
            dtype in dtype(),
            (h, w) in (1usize..6, 1usize..6),
            (new_h, new_w) in (1usize..6, 1usize..6),
        ) {
            let mut image = Image::new(tensor(&[channels, h, w], vec![0.0; channels * h * w])?)?
                .with_dtype(dtype);
            if tagged {
                if let Some(cs) = ColorSpace::from_num_channels(channels) {
                    image = image.with_color_space(cs)?;
                }
            }
            let reference = Datapoint::from(image.clone());
            let wrapped = reference.wrap_like(
                tensor(&[channels, new_h, new_w], vec![1.0; channels * new_h * new_w])?,
                &Overrides::none(),
            )?;
            let Datapoint::Image(out) = wrapped else {
                return Err(TestCaseError::fail("kind changed"));
            };
            prop_assert_eq!(out.color_space(), image.color_space());
            prop_assert_eq!(out.dtype(), dtype);
            prop_assert_eq!(out.spatial_size(), (new_h, new_w));
        }

        #[test]
        fn test_wrap_like_keeps_box_metadata(
            format in box_format(),
            canvas in (1usize..100, 1usize..100),
            rows in 0usize..5,
            new_rows in 0usize..5,
        ) {
            let reference = Datapoint::from(BoundingBoxes::new(
                tensor(&[rows, 4], vec![0.5; rows * 4])?,
                format,
                canvas,
            )?);
            let wrapped = reference.wrap_like(tensor(&[new_rows, 4], vec![1.0; new_rows * 4])?, &Overrides::none())?;
            prop_assert_eq!(wrapped.kind(), Kind::BoundingBoxes);
            let Datapoint::BoundingBoxes(out) = wrapped else {
                return Err(TestCaseError::fail("kind changed"));
            };
            prop_assert_eq!(out.format(), format);
            prop_assert_eq!(out.canvas_size(), canvas);
            prop_assert_eq!(out.num_boxes(), new_rows);
        }
    }
}
