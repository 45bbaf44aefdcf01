//! Conversions between encoded bytes, host rasters, arrays and datapoints.

use super::core::TransformNode;
use crate::datapoints::{Kind, Value};
use crate::dispatch::Dispatcher;
use crate::params::Params;
use anyhow::Result;

/// Decodes every EncodedImage leaf into a raster.
#[derive(Debug, Clone, Default)]
pub struct DecodeImage;

impl TransformNode for DecodeImage {
    fn transformed_kinds(&self) -> &[Kind] {
        &[Kind::EncodedImage]
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("decode_image", value, params)
    }
}

/// Wraps rasters and plain arrays as Image datapoints.
///
/// Rasters become 8-bit images with the color space implied by their channels.
#[derive(Debug, Clone, Default)]
pub struct ToImage;

impl TransformNode for ToImage {
    fn transformed_kinds(&self) -> &[Kind] {
        &[Kind::Raster, Kind::Tensor]
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("to_image", value, params)
    }
}

/// Converts Image datapoints and plain arrays back to host rasters.
#[derive(Debug, Clone, Default)]
pub struct ToRaster;

impl TransformNode for ToRaster {
    fn transformed_kinds(&self) -> &[Kind] {
        &[Kind::Image, Kind::Tensor]
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("to_raster", value, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoints::{ColorSpace, DType, EncodedImage};
    use crate::error::VisionError;
    use crate::io::encode_png;
    use crate::sample::Sample;
    use crate::transforms::Transform;
    use anyhow::anyhow;
    use image::{DynamicImage, Rgb, RgbImage};

    #[test]
    fn test_decode_then_wrap() -> Result<()> {
        let mut rgb = RgbImage::new(3, 2);
        rgb.put_pixel(2, 1, Rgb([10, 20, 30]));
        let raster = DynamicImage::ImageRgb8(rgb);
        let encoded = EncodedImage::new(encode_png(&raster)?);

        let pipeline = DecodeImage.then(ToImage);
        let out = pipeline.forward(Sample::from_single("image", encoded).with_feature("path", "a.png"))?;
        let image = out.get_value("image")?.as_image().cloned().ok_or_else(|| anyhow!("kind"))?;
        assert_eq!(image.dtype(), DType::U8);
        assert_eq!(image.color_space(), Some(ColorSpace::Rgb));
        assert_eq!(image.spatial_size(), (2, 3));
        assert_eq!(image.data()[[1, 1, 2]], 20.0);
        assert_eq!(out.get_value("path")?, &Value::from("a.png"));

        let back = ToRaster.forward(out)?;
        assert_eq!(back.get_value("image")?, &Value::Raster(raster));
        Ok(())
    }

    #[test]
    fn test_corrupt_bytes_are_a_decode_error() -> Result<()> {
        let err = DecodeImage
            .forward(Sample::from_single("image", EncodedImage::new(vec![0u8, 1, 2, 3])))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<VisionError>(), Some(VisionError::Decode(_))));
        Ok(())
    }
}
