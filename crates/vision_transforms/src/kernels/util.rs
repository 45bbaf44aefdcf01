//! Layout helpers shared by the kernels.
//!
//! Plain arrays are `[..., H, W]` (planes) or `[..., C, H, W]` (images). The
//! helpers fold every leading dimension into one batch axis, run a per-plane
//! or per-image closure on a standard-layout copy, and unfold the result.

use crate::datapoints::{BoundingBoxFormat, BoundingBoxes, Tensor};
use anyhow::{bail, ensure, Context, Result};
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageBuffer, Luma, LumaA, Rgb, Rgb32FImage, Rgba, Rgba32FImage, RgbImage,
    RgbaImage,
};
use ndarray::{Array2, Array3, Array4, ArrayView2, ArrayViewMut2, Axis, Ix3, IxDyn};

/// `(height, width)` of a plain array.
pub(crate) fn spatial(t: &Tensor) -> Result<(usize, usize)> {
    ensure!(
        t.ndim() >= 2,
        "expected an array with at least 2 dimensions [..., H, W], got shape {:?}",
        t.shape()
    );
    let shape = t.shape();
    Ok((shape[shape.len() - 2], shape[shape.len() - 1]))
}

fn leading(shape: &[usize], trailing: usize) -> (Vec<usize>, usize) {
    let lead = shape[..shape.len() - trailing].to_vec();
    let batch = lead.iter().product();
    (lead, batch)
}

/// Folds `[..., H, W]` into `[B, H, W]`.
pub(crate) fn to_planes(t: &Tensor) -> Result<(Vec<usize>, Array3<f32>)> {
    let (h, w) = spatial(t)?;
    let (lead, batch) = leading(t.shape(), 2);
    let planes = t
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((batch, h, w))?;
    Ok((lead, planes))
}

/// Inverse of [`to_planes`].
pub(crate) fn from_planes(lead: &[usize], planes: Array3<f32>) -> Result<Tensor> {
    let (_, h, w) = planes.dim();
    let mut shape = lead.to_vec();
    shape.extend([h, w]);
    Ok(planes.into_shape_with_order(IxDyn(&shape))?.into_shared())
}

/// Runs `f` on every `[H, W]` plane, writing into planes of size `out_hw`.
pub(crate) fn map_planes<F>(t: &Tensor, out_hw: (usize, usize), f: F) -> Result<Tensor>
where
    F: Fn(ArrayView2<f32>, ArrayViewMut2<f32>),
{
    let (lead, planes) = to_planes(t)?;
    let mut out = Array3::<f32>::zeros((planes.dim().0, out_hw.0, out_hw.1));
    for (src, dst) in planes.outer_iter().zip(out.outer_iter_mut()) {
        f(src, dst);
    }
    from_planes(&lead, out)
}

/// Folds `[..., C, H, W]` into `[B, C, H, W]`.
pub(crate) fn to_images(t: &Tensor) -> Result<(Vec<usize>, Array4<f32>)> {
    ensure!(
        t.ndim() >= 3,
        "expected an array with at least 3 dimensions [..., C, H, W], got shape {:?}",
        t.shape()
    );
    let shape = t.shape();
    let (c, h, w) = (shape[shape.len() - 3], shape[shape.len() - 2], shape[shape.len() - 1]);
    let (lead, batch) = leading(shape, 3);
    let images = t
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((batch, c, h, w))?;
    Ok((lead, images))
}

/// Inverse of [`to_images`]; the channel count may have changed.
pub(crate) fn from_images(lead: &[usize], images: Array4<f32>) -> Result<Tensor> {
    let (_, c, h, w) = images.dim();
    let mut shape = lead.to_vec();
    shape.extend([c, h, w]);
    Ok(images.into_shape_with_order(IxDyn(&shape))?.into_shared())
}

pub(crate) fn channels(t: &Tensor) -> Result<usize> {
    ensure!(t.ndim() >= 3, "expected [..., C, H, W], got shape {:?}", t.shape());
    Ok(t.shape()[t.ndim() - 3])
}

// ============================================================================
// Raster <-> array
// ============================================================================

/// Sample type of one raster channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RasterDepth {
    U8,
    U16,
    F32,
}

impl RasterDepth {
    pub(crate) fn of(img: &DynamicImage) -> Self {
        let color = img.color();
        match color.bytes_per_pixel() / color.channel_count().max(1) {
            1 => RasterDepth::U8,
            2 => RasterDepth::U16,
            _ => RasterDepth::F32,
        }
    }

    /// Largest intensity in the raster's own units.
    pub(crate) fn bound(self) -> f32 {
        match self {
            RasterDepth::U8 => 255.0,
            RasterDepth::U16 => 65535.0,
            RasterDepth::F32 => 1.0,
        }
    }
}

/// Converts a raster to a `[C, H, W]` array in its own units: `[0, 255]` for
/// 8-bit, `[0, 65535]` for 16-bit and `[0, 1]` for float rasters.
pub(crate) fn raster_to_tensor(img: &DynamicImage) -> Result<Tensor> {
    fn widen<T: Copy + Into<f32>>(raw: Vec<T>) -> Vec<f32> {
        raw.into_iter().map(Into::into).collect()
    }

    let (w, h) = (img.width() as usize, img.height() as usize);
    let (c, raw) = match (RasterDepth::of(img), img.color().channel_count()) {
        (RasterDepth::U8, 1) => (1, widen(img.to_luma8().into_raw())),
        (RasterDepth::U8, 2) => (2, widen(img.to_luma_alpha8().into_raw())),
        (RasterDepth::U8, 4) => (4, widen(img.to_rgba8().into_raw())),
        (RasterDepth::U8, _) => (3, widen(img.to_rgb8().into_raw())),
        (RasterDepth::U16, 1) => (1, widen(img.to_luma16().into_raw())),
        (RasterDepth::U16, 2) => (2, widen(img.to_luma_alpha16().into_raw())),
        (RasterDepth::U16, 4) => (4, widen(img.to_rgba16().into_raw())),
        (RasterDepth::U16, _) => (3, widen(img.to_rgb16().into_raw())),
        (RasterDepth::F32, 4) => (4, img.to_rgba32f().into_raw()),
        (RasterDepth::F32, _) => (3, img.to_rgb32f().into_raw()),
    };
    let hwc = Array3::from_shape_vec((h, w, c), raw)?;
    Ok(hwc
        .permuted_axes([2, 0, 1])
        .as_standard_layout()
        .into_owned()
        .into_dyn()
        .into_shared())
}

/// Converts a `[C, H, W]` (or `[H, W]`) array whose values lie in
/// `[0, bound]` to an 8-bit raster.
pub(crate) fn tensor_to_raster(t: &Tensor, bound: f32) -> Result<DynamicImage> {
    tensor_to_raster_as(t, bound, RasterDepth::U8)
}

/// Like [`tensor_to_raster`], storing `depth` samples.
///
/// Float rasters only come in RGB and RGBA, so float results with 1 or 2
/// channels are stored as 16-bit gray.
pub(crate) fn tensor_to_raster_as(t: &Tensor, bound: f32, depth: RasterDepth) -> Result<DynamicImage> {
    let chw = match t.ndim() {
        2 => t.view().insert_axis(Axis(0)),
        3 => t.view(),
        n => bail!("a raster needs a [C, H, W] array, got {n} dimensions"),
    };
    let chw = chw.into_dimensionality::<Ix3>()?;
    let (c, h, w) = chw.dim();
    ensure!((1..=4).contains(&c), "a raster supports 1 to 4 channels, got {c}");
    let depth = match (depth, c) {
        (RasterDepth::F32, 1 | 2) => RasterDepth::U16,
        (depth, _) => depth,
    };
    let scale = depth.bound() / bound;
    let hwc = chw.permuted_axes([1, 2, 0]);
    let (w, h) = (w as u32, h as u32);
    let img = match depth {
        RasterDepth::U8 => {
            let raw: Vec<u8> = hwc.iter().map(|v| (v * scale).round().clamp(0.0, 255.0) as u8).collect();
            match c {
                1 => GrayImage::from_raw(w, h, raw).map(DynamicImage::ImageLuma8),
                2 => GrayAlphaImage::from_raw(w, h, raw).map(DynamicImage::ImageLumaA8),
                3 => RgbImage::from_raw(w, h, raw).map(DynamicImage::ImageRgb8),
                _ => RgbaImage::from_raw(w, h, raw).map(DynamicImage::ImageRgba8),
            }
        }
        RasterDepth::U16 => {
            let raw: Vec<u16> = hwc.iter().map(|v| (v * scale).round().clamp(0.0, 65535.0) as u16).collect();
            match c {
                1 => ImageBuffer::<Luma<u16>, _>::from_raw(w, h, raw).map(DynamicImage::ImageLuma16),
                2 => ImageBuffer::<LumaA<u16>, _>::from_raw(w, h, raw).map(DynamicImage::ImageLumaA16),
                3 => ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, raw).map(DynamicImage::ImageRgb16),
                _ => ImageBuffer::<Rgba<u16>, _>::from_raw(w, h, raw).map(DynamicImage::ImageRgba16),
            }
        }
        RasterDepth::F32 => {
            let raw: Vec<f32> = hwc.iter().map(|v| v * scale).collect();
            match c {
                3 => Rgb32FImage::from_raw(w, h, raw).map(DynamicImage::ImageRgb32F),
                _ => Rgba32FImage::from_raw(w, h, raw).map(DynamicImage::ImageRgba32F),
            }
        }
    };
    img.context("raster buffer does not match its dimensions")
}

/// Applies an array operation to a raster through its array form, in the
/// raster's own units, and stores the result at the raster's depth.
pub(crate) fn via_tensor<F>(img: DynamicImage, f: F) -> Result<DynamicImage>
where
    F: FnOnce(Tensor) -> Result<Tensor>,
{
    let depth = RasterDepth::of(&img);
    let out = f(raster_to_tensor(&img)?)?;
    tensor_to_raster_as(&out, depth.bound(), depth)
}

// ============================================================================
// Boxes
// ============================================================================

/// Maps every box through `f` in XYXY coordinates, optionally clamps the
/// result to `canvas` and re-expresses it in the original format.
pub(crate) fn map_boxes<F>(
    boxes: &BoundingBoxes,
    canvas: (usize, usize),
    clamp: bool,
    f: F,
) -> Result<BoundingBoxes>
where
    F: Fn([f32; 4]) -> [f32; 4],
{
    let mut xyxy = boxes.to_format(BoundingBoxFormat::Xyxy)?;
    let (h, w) = (canvas.0 as f32, canvas.1 as f32);
    for mut row in xyxy.rows_mut() {
        let [x1, y1, x2, y2] = f([row[0], row[1], row[2], row[3]]);
        let out = if clamp {
            [x1.clamp(0.0, w), y1.clamp(0.0, h), x2.clamp(0.0, w), y2.clamp(0.0, h)]
        } else {
            [x1, y1, x2, y2]
        };
        for (slot, value) in row.iter_mut().zip(out) {
            *slot = value;
        }
    }
    Ok(boxes.from_xyxy_like(&xyxy, canvas)?)
}

/// Converts a `[N, 4]` or `[4]` plain array to an owned `[N, 4]` array.
pub(crate) fn box_rows(t: &Tensor) -> Result<Array2<f32>> {
    let rows = match t.ndim() {
        1 => t.view().insert_axis(Axis(0)),
        _ => t.view(),
    };
    let rows = rows
        .into_dimensionality::<ndarray::Ix2>()
        .context("boxes must be [N, 4] or [4]")?;
    ensure!(rows.ncols() == 4, "boxes need 4 coordinates per row, got {}", rows.ncols());
    Ok(rows.to_owned())
}
