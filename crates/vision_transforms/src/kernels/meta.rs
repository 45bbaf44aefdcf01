//! Metadata kernels: dtype, color space and box format conversions.

use super::photometric::rgb_to_grayscale;
use super::util::{box_rows, from_images, map_boxes, to_images};
use crate::datapoints::{BoundingBoxes, ColorSpace, DType, Image, Tensor, Video};
use crate::dispatch::DispatcherBuilder;
use crate::error::VisionResult;
use crate::params::Params;
use anyhow::{anyhow, ensure, Result};
use ndarray::{concatenate, Array4, Axis, IxDyn};

pub(crate) fn register(b: &mut DispatcherBuilder) -> VisionResult<()> {
    b.register("convert_dtype", convert_dtype_image)?
        .register("convert_dtype", convert_dtype_video)?
        .register("convert_color_space", convert_color_space_image)?
        .register("convert_bounding_box_format", convert_format_boxes)?
        .register("convert_bounding_box_format", convert_format_tensor)?
        .register("clamp_bounding_boxes", clamp_bounding_boxes)?;
    Ok(())
}

// ============================================================================
// Dtype
// ============================================================================

/// Rescales values from the range of `from` to the range of `to`.
pub fn convert_dtype_array(t: &Tensor, from: DType, to: DType) -> Tensor {
    match (from, to) {
        (DType::U8, DType::F32) => t.mapv(|v| v / 255.0).into_shared(),
        // Scaling by slightly less than 256 keeps 1.0 at 255 and spreads the
        // rest evenly over the 256 buckets.
        (DType::F32, DType::U8) => t
            .mapv(|v| (v * (256.0 - 1e-3)).floor().clamp(0.0, 255.0))
            .into_shared(),
        _ => t.clone(),
    }
}

pub fn convert_dtype_image(image: Image, params: &Params) -> Result<Image> {
    let to = params.dtype("dtype")?;
    let data = convert_dtype_array(image.data(), image.dtype(), to);
    Ok(image.wrap_like(data)?.with_dtype(to))
}

pub fn convert_dtype_video(video: Video, params: &Params) -> Result<Video> {
    let to = params.dtype("dtype")?;
    let data = convert_dtype_array(video.data(), video.dtype(), to);
    Ok(video.wrap_like(data)?.with_dtype(to))
}

// ============================================================================
// Color space
// ============================================================================

fn has_alpha(cs: ColorSpace) -> bool {
    matches!(cs, ColorSpace::GrayAlpha | ColorSpace::Rgba)
}

fn is_gray(cs: ColorSpace) -> bool {
    matches!(cs, ColorSpace::Gray | ColorSpace::GrayAlpha)
}

/// Converts between gray and RGB, adding an opaque alpha channel or dropping
/// a fully opaque one as required.
pub fn convert_color_space_image(image: Image, params: &Params) -> Result<Image> {
    let to = params.color_space("color_space")?;
    let from = match image.color_space() {
        Some(cs) => cs,
        None => ColorSpace::from_num_channels(image.num_channels()).ok_or_else(|| {
            anyhow!(
                "cannot infer the color space of an image with {} channels",
                image.num_channels()
            )
        })?,
    };
    if from == to {
        return Ok(image.with_color_space(to)?);
    }

    let bound = image.dtype().max_value();
    let (lead, images) = to_images(image.data())?;
    let color_channels = if is_gray(from) { 1 } else { 3 };
    let color = images.slice_axis(Axis(1), (0..color_channels).into()).to_owned();
    let alpha = has_alpha(from).then(|| {
        images
            .slice_axis(Axis(1), (color_channels..color_channels + 1).into())
            .to_owned()
    });

    let color = match (is_gray(from), is_gray(to)) {
        (true, false) => concatenate(Axis(1), &[color.view(), color.view(), color.view()])?,
        (false, true) => {
            let gray = rgb_to_grayscale(&from_images(&lead, color)?, &Params::new(), bound)?;
            to_images(&gray)?.1
        }
        _ => color,
    };

    let out: Array4<f32> = match (alpha, has_alpha(to)) {
        (Some(alpha), true) => concatenate(Axis(1), &[color.view(), alpha.view()])?,
        (None, true) => {
            let (b, _, h, w) = color.dim();
            let opaque = Array4::from_elem((b, 1, h, w), bound);
            concatenate(Axis(1), &[color.view(), opaque.view()])?
        }
        (Some(alpha), false) => {
            ensure!(
                alpha.iter().all(|&a| a == bound),
                "cannot drop the alpha channel of a {from:?} image that is not fully opaque"
            );
            color
        }
        (None, false) => color,
    };

    let data = from_images(&lead, out)?;
    Ok(Image::from_parts(data, Some(to), image.dtype())?)
}

// ============================================================================
// Boxes
// ============================================================================

pub fn convert_format_boxes(boxes: BoundingBoxes, params: &Params) -> Result<BoundingBoxes> {
    let format = params.format("format")?;
    let converted = boxes.to_format(format)?;
    Ok(BoundingBoxes::new(
        converted.into_dyn().into_shared(),
        format,
        boxes.canvas_size(),
    )?)
}

/// A plain array carries no format, so the source format must be given as
/// `old_format`.
pub fn convert_format_tensor(t: Tensor, params: &Params) -> Result<Tensor> {
    let from = params.format("old_format")?;
    let to = params.format("format")?;
    let rows = box_rows(&t)?;
    let converted = crate::datapoints::convert_box_format(&rows, from, to);
    Ok(converted.into_shape_with_order(IxDyn(t.shape()))?.into_shared())
}

pub fn clamp_bounding_boxes(boxes: BoundingBoxes, _: &Params) -> Result<BoundingBoxes> {
    map_boxes(&boxes, boxes.canvas_size(), true, |b| b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoints::{tensor, BoundingBoxFormat};

    #[test]
    fn test_dtype_round_trip_keeps_extremes() -> Result<()> {
        let image = Image::new(tensor(&[1, 1, 3], vec![0.0, 0.5, 1.0])?)?;
        let params = Params::new().with("dtype", DType::U8);
        let u8_image = convert_dtype_image(image, &params)?;
        assert_eq!(u8_image.dtype(), DType::U8);
        assert_eq!(
            u8_image.data().iter().copied().collect::<Vec<_>>(),
            vec![0.0, 127.0, 255.0]
        );

        let back = convert_dtype_image(u8_image, &Params::new().with("dtype", DType::F32))?;
        assert_eq!(back.data().iter().last().copied(), Some(1.0));
        Ok(())
    }

    #[test]
    fn test_gray_to_rgba_and_back() -> Result<()> {
        let gray = Image::new(tensor(&[1, 1, 2], vec![0.2, 0.8])?)?
            .with_color_space(ColorSpace::Gray)?;
        let rgba = convert_color_space_image(
            gray,
            &Params::new().with("color_space", ColorSpace::Rgba),
        )?;
        assert_eq!(rgba.data().shape(), &[4, 1, 2]);
        assert_eq!(rgba.color_space(), Some(ColorSpace::Rgba));
        assert_eq!(
            rgba.data().iter().copied().collect::<Vec<_>>(),
            vec![0.2, 0.8, 0.2, 0.8, 0.2, 0.8, 1.0, 1.0]
        );

        let rgb = convert_color_space_image(rgba, &Params::new().with("color_space", ColorSpace::Rgb))?;
        assert_eq!(rgb.num_channels(), 3);
        Ok(())
    }

    #[test]
    fn test_translucent_alpha_cannot_be_dropped() -> Result<()> {
        let image = Image::new(tensor(&[2, 1, 1], vec![0.5, 0.3])?)?
            .with_color_space(ColorSpace::GrayAlpha)?;
        let result = convert_color_space_image(image, &Params::new().with("color_space", ColorSpace::Gray));
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_box_format_conversion() -> Result<()> {
        let boxes = BoundingBoxes::from_rows(&[[1.0, 2.0, 4.0, 6.0]], BoundingBoxFormat::Xyxy, (10, 10))?;
        let params = Params::new().with("format", BoundingBoxFormat::Cxcywh);
        let converted = convert_format_boxes(boxes, &params)?;
        assert_eq!(converted.format(), BoundingBoxFormat::Cxcywh);
        assert_eq!(converted.rows(), vec![[2.5, 4.0, 3.0, 4.0]]);

        let plain = tensor(&[4], vec![1.0, 2.0, 3.0, 4.0])?;
        let params = Params::new()
            .with("old_format", BoundingBoxFormat::Xywh)
            .with("format", BoundingBoxFormat::Xyxy);
        let out = convert_format_tensor(plain.clone(), &params)?;
        assert_eq!(out.shape(), &[4]);
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 4.0, 6.0]);

        assert!(convert_format_tensor(plain, &Params::new().with("format", BoundingBoxFormat::Xyxy)).is_err());
        Ok(())
    }

    #[test]
    fn test_clamp_keeps_format() -> Result<()> {
        let boxes = BoundingBoxes::from_rows(&[[-2.0, 1.0, 5.0, 5.0]], BoundingBoxFormat::Xywh, (4, 4))?;
        let clamped = clamp_bounding_boxes(boxes, &Params::new())?;
        assert_eq!(clamped.format(), BoundingBoxFormat::Xywh);
        assert_eq!(clamped.rows(), vec![[0.0, 1.0, 3.0, 3.0]]);
        Ok(())
    }
}
