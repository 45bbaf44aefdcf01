//! Geometric kernels: flips, resize, crops, padding and affine warps.
//!
//! Plain-array kernels act on the last two axes, so images, videos and masks
//! reach them through the dispatcher's fallback. Box kernels compute in XYXY
//! and write back in the boxes' own format.

use super::util::{map_boxes, map_planes, spatial, via_tensor};
use crate::datapoints::{BoundingBoxes, Mask, Tensor};
use crate::dispatch::DispatcherBuilder;
use crate::error::VisionResult;
use crate::params::{Interpolation, Params};
use anyhow::{ensure, Result};
use image::{imageops, DynamicImage};
use ndarray::{ArrayD, ArrayView2, Axis, IxDyn, Slice};

pub(crate) fn register(b: &mut DispatcherBuilder) -> VisionResult<()> {
    b.register("horizontal_flip", horizontal_flip_tensor)?
        .register("horizontal_flip", horizontal_flip_raster)?
        .register("horizontal_flip", horizontal_flip_boxes)?
        .register("vertical_flip", vertical_flip_tensor)?
        .register("vertical_flip", vertical_flip_raster)?
        .register("vertical_flip", vertical_flip_boxes)?
        .register("resize", resize_tensor)?
        .register("resize", resize_raster)?
        .register("resize", resize_mask)?
        .register("resize", resize_boxes)?
        .register("crop", crop_tensor)?
        .register("crop", crop_raster)?
        .register("crop", crop_boxes)?
        .register("center_crop", center_crop_tensor)?
        .register("center_crop", center_crop_raster)?
        .register("center_crop", center_crop_boxes)?
        .register("resized_crop", resized_crop_tensor)?
        .register("resized_crop", resized_crop_raster)?
        .register("resized_crop", resized_crop_mask)?
        .register("resized_crop", resized_crop_boxes)?
        .register("pad", pad_tensor)?
        .register("pad", pad_raster)?
        .register("pad", pad_mask)?
        .register("pad", pad_boxes)?
        .register("affine", affine_tensor)?
        .register("affine", affine_raster)?
        .register("affine", affine_mask)?
        .register("affine", affine_boxes)?
        .register("rotate", rotate_tensor)?
        .register("rotate", rotate_raster)?
        .register("rotate", rotate_mask)?
        .register("rotate", rotate_boxes)?;
    Ok(())
}

// ============================================================================
// Flips
// ============================================================================

/// Zero-copy: only the stride of the width axis changes.
pub fn horizontal_flip_tensor(mut t: Tensor, _: &Params) -> Result<Tensor> {
    spatial(&t)?;
    let axis = Axis(t.ndim() - 1);
    t.invert_axis(axis);
    Ok(t)
}

pub fn vertical_flip_tensor(mut t: Tensor, _: &Params) -> Result<Tensor> {
    spatial(&t)?;
    let axis = Axis(t.ndim() - 2);
    t.invert_axis(axis);
    Ok(t)
}

pub fn horizontal_flip_raster(mut img: DynamicImage, _: &Params) -> Result<DynamicImage> {
    imageops::flip_horizontal_in_place(&mut img);
    Ok(img)
}

pub fn vertical_flip_raster(mut img: DynamicImage, _: &Params) -> Result<DynamicImage> {
    imageops::flip_vertical_in_place(&mut img);
    Ok(img)
}

pub fn horizontal_flip_boxes(boxes: BoundingBoxes, _: &Params) -> Result<BoundingBoxes> {
    let canvas = boxes.canvas_size();
    let w = canvas.1 as f32;
    map_boxes(&boxes, canvas, false, |[x1, y1, x2, y2]| [w - x2, y1, w - x1, y2])
}

pub fn vertical_flip_boxes(boxes: BoundingBoxes, _: &Params) -> Result<BoundingBoxes> {
    let canvas = boxes.canvas_size();
    let h = canvas.0 as f32;
    map_boxes(&boxes, canvas, false, |[x1, y1, x2, y2]| [x1, h - y2, x2, h - y1])
}

// ============================================================================
// Resize
// ============================================================================

fn resize_args(params: &Params) -> Result<((usize, usize), Interpolation)> {
    let size = params.size("size")?;
    ensure!(
        size.0 > 0 && size.1 > 0,
        "Image dimensions must be positive after resizing (got {}x{})",
        size.0,
        size.1
    );
    Ok((size, params.opt_interpolation("interpolation")?.unwrap_or_default()))
}

/// Legacy nearest-neighbour source index.
fn nearest_index(dst: usize, scale: f32, len: usize) -> usize {
    ((dst as f32 * scale).floor() as usize).min(len - 1)
}

/// Half-pixel-centred source coordinate (`align_corners = false`).
fn source_coord(dst: usize, scale: f32) -> f32 {
    (dst as f32 + 0.5) * scale - 0.5
}

fn cubic_weights(t: f32) -> [f32; 4] {
    const A: f32 = -0.75;
    let near = |x: f32| ((A + 2.0) * x - (A + 3.0)) * x * x + 1.0;
    let far = |x: f32| ((A * x - 5.0 * A) * x + 8.0 * A) * x - 4.0 * A;
    [far(t + 1.0), near(t), near(1.0 - t), far(2.0 - t)]
}

fn resize_plane(src: ArrayView2<f32>, mut dst: ndarray::ArrayViewMut2<f32>, mode: Interpolation) {
    let (h, w) = src.dim();
    let (oh, ow) = dst.dim();
    let (sy, sx) = (h as f32 / oh as f32, w as f32 / ow as f32);
    match mode {
        Interpolation::Nearest => {
            for y in 0..oh {
                let iy = nearest_index(y, sy, h);
                for x in 0..ow {
                    dst[[y, x]] = src[[iy, nearest_index(x, sx, w)]];
                }
            }
        }
        Interpolation::Bilinear => {
            for y in 0..oh {
                let fy = source_coord(y, sy).max(0.0);
                let y0 = (fy as usize).min(h - 1);
                let y1 = (y0 + 1).min(h - 1);
                let ly = fy - y0 as f32;
                for x in 0..ow {
                    let fx = source_coord(x, sx).max(0.0);
                    let x0 = (fx as usize).min(w - 1);
                    let x1 = (x0 + 1).min(w - 1);
                    let lx = fx - x0 as f32;
                    let top = src[[y0, x0]] * (1.0 - lx) + src[[y0, x1]] * lx;
                    let bottom = src[[y1, x0]] * (1.0 - lx) + src[[y1, x1]] * lx;
                    dst[[y, x]] = top * (1.0 - ly) + bottom * ly;
                }
            }
        }
        Interpolation::Bicubic => {
            let at = |i: i64, len: usize| i.clamp(0, len as i64 - 1) as usize;
            for y in 0..oh {
                let fy = source_coord(y, sy);
                let y0 = fy.floor();
                let wy = cubic_weights(fy - y0);
                for x in 0..ow {
                    let fx = source_coord(x, sx);
                    let x0 = fx.floor();
                    let wx = cubic_weights(fx - x0);
                    let mut acc = 0.0;
                    for (i, wyi) in wy.iter().enumerate() {
                        let row = at(y0 as i64 - 1 + i as i64, h);
                        for (j, wxj) in wx.iter().enumerate() {
                            acc += wyi * wxj * src[[row, at(x0 as i64 - 1 + j as i64, w)]];
                        }
                    }
                    dst[[y, x]] = acc;
                }
            }
        }
    }
}

pub(crate) fn resize_array(t: &Tensor, size: (usize, usize), mode: Interpolation) -> Result<Tensor> {
    let (h, w) = spatial(t)?;
    ensure!(h > 0 && w > 0, "cannot resize an empty array of shape {:?}", t.shape());
    if (h, w) == size {
        return Ok(t.clone());
    }
    map_planes(t, size, |src, dst| resize_plane(src, dst, mode))
}

pub fn resize_tensor(t: Tensor, params: &Params) -> Result<Tensor> {
    let (size, mode) = resize_args(params)?;
    resize_array(&t, size, mode)
}

/// Masks always use nearest-neighbour so category ids stay intact.
pub fn resize_mask(mask: Mask, params: &Params) -> Result<Mask> {
    let (size, _) = resize_args(params)?;
    Ok(mask.wrap_like(resize_array(mask.data(), size, Interpolation::Nearest)?)?)
}

pub fn resize_raster(img: DynamicImage, params: &Params) -> Result<DynamicImage> {
    let ((h, w), mode) = resize_args(params)?;
    Ok(img.resize_exact(w as u32, h as u32, mode.filter_type()))
}

pub fn resize_boxes(boxes: BoundingBoxes, params: &Params) -> Result<BoundingBoxes> {
    let ((oh, ow), _) = resize_args(params)?;
    let (h, w) = boxes.canvas_size();
    let (rh, rw) = (oh as f32 / h as f32, ow as f32 / w as f32);
    map_boxes(&boxes, (oh, ow), false, |[x1, y1, x2, y2]| {
        [x1 * rw, y1 * rh, x2 * rw, y2 * rh]
    })
}

// ============================================================================
// Crop
// ============================================================================

struct CropArgs {
    top: i64,
    left: i64,
    height: usize,
    width: usize,
}

impl CropArgs {
    fn from_params(params: &Params) -> Result<Self> {
        let args = Self {
            top: params.int("top")?,
            left: params.int("left")?,
            height: params.usize("height")?,
            width: params.usize("width")?,
        };
        ensure!(
            args.height > 0 && args.width > 0,
            "crop size must be positive (got {}x{})",
            args.height,
            args.width
        );
        Ok(args)
    }

    /// Centred crop; an oversized crop is padded equally on both sides.
    fn centered(image: (usize, usize), crop: (usize, usize)) -> Self {
        let offset = |len: usize, crop: usize| -> i64 {
            if crop > len {
                -(((crop - len) / 2) as i64)
            } else {
                ((len - crop) as f64 / 2.0).round_ties_even() as i64
            }
        };
        Self {
            top: offset(image.0, crop.0),
            left: offset(image.1, crop.1),
            height: crop.0,
            width: crop.1,
        }
    }

    fn in_bounds(&self, (h, w): (usize, usize)) -> bool {
        self.top >= 0
            && self.left >= 0
            && self.top as usize + self.height <= h
            && self.left as usize + self.width <= w
    }
}

/// Crops the last two axes. In-bounds crops are views of the same buffer;
/// regions outside the input are zero-filled.
fn crop_array(mut t: Tensor, args: &CropArgs) -> Result<Tensor> {
    let (h, w) = spatial(&t)?;
    let (ya, xa) = (Axis(t.ndim() - 2), Axis(t.ndim() - 1));

    if args.in_bounds((h, w)) {
        let (top, left) = (args.top as usize, args.left as usize);
        t.slice_axis_inplace(ya, Slice::from(top..top + args.height));
        t.slice_axis_inplace(xa, Slice::from(left..left + args.width));
        return Ok(t);
    }

    let mut shape = t.shape().to_vec();
    let nd = shape.len();
    shape[nd - 2] = args.height;
    shape[nd - 1] = args.width;
    let mut out = ArrayD::<f32>::zeros(IxDyn(&shape));

    let y0 = args.top.max(0);
    let y1 = (args.top + args.height as i64).min(h as i64);
    let x0 = args.left.max(0);
    let x1 = (args.left + args.width as i64).min(w as i64);
    if y0 < y1 && x0 < x1 {
        let src = t.slice_axis(ya, Slice::from(y0 as usize..y1 as usize));
        let src = src.slice_axis(xa, Slice::from(x0 as usize..x1 as usize));
        let dst_y = (y0 - args.top) as usize..(y1 - args.top) as usize;
        let dst_x = (x0 - args.left) as usize..(x1 - args.left) as usize;
        let mut rows = out.slice_axis_mut(ya, Slice::from(dst_y));
        rows.slice_axis_mut(xa, Slice::from(dst_x)).assign(&src);
    }
    Ok(out.into_shared())
}

fn crop_raster_with(img: DynamicImage, args: &CropArgs) -> Result<DynamicImage> {
    let (h, w) = (img.height() as usize, img.width() as usize);
    if args.in_bounds((h, w)) {
        return Ok(img.crop_imm(
            args.left as u32,
            args.top as u32,
            args.width as u32,
            args.height as u32,
        ));
    }
    via_tensor(img, |t| crop_array(t, args))
}

fn crop_boxes_with(boxes: &BoundingBoxes, args: &CropArgs) -> Result<BoundingBoxes> {
    let (dx, dy) = (args.left as f32, args.top as f32);
    map_boxes(boxes, (args.height, args.width), true, |[x1, y1, x2, y2]| {
        [x1 - dx, y1 - dy, x2 - dx, y2 - dy]
    })
}

pub fn crop_tensor(t: Tensor, params: &Params) -> Result<Tensor> {
    crop_array(t, &CropArgs::from_params(params)?)
}

pub fn crop_raster(img: DynamicImage, params: &Params) -> Result<DynamicImage> {
    crop_raster_with(img, &CropArgs::from_params(params)?)
}

pub fn crop_boxes(boxes: BoundingBoxes, params: &Params) -> Result<BoundingBoxes> {
    crop_boxes_with(&boxes, &CropArgs::from_params(params)?)
}

pub fn center_crop_tensor(t: Tensor, params: &Params) -> Result<Tensor> {
    let args = CropArgs::centered(spatial(&t)?, params.size("size")?);
    crop_array(t, &args)
}

pub fn center_crop_raster(img: DynamicImage, params: &Params) -> Result<DynamicImage> {
    let image = (img.height() as usize, img.width() as usize);
    let args = CropArgs::centered(image, params.size("size")?);
    crop_raster_with(img, &args)
}

pub fn center_crop_boxes(boxes: BoundingBoxes, params: &Params) -> Result<BoundingBoxes> {
    let args = CropArgs::centered(boxes.canvas_size(), params.size("size")?);
    crop_boxes_with(&boxes, &args)
}

pub fn resized_crop_tensor(t: Tensor, params: &Params) -> Result<Tensor> {
    let (size, mode) = resize_args(params)?;
    let cropped = crop_array(t, &CropArgs::from_params(params)?)?;
    resize_array(&cropped, size, mode)
}

pub fn resized_crop_mask(mask: Mask, params: &Params) -> Result<Mask> {
    let (size, _) = resize_args(params)?;
    let cropped = crop_array(mask.data().clone(), &CropArgs::from_params(params)?)?;
    Ok(mask.wrap_like(resize_array(&cropped, size, Interpolation::Nearest)?)?)
}

pub fn resized_crop_raster(img: DynamicImage, params: &Params) -> Result<DynamicImage> {
    let cropped = crop_raster(img, params)?;
    resize_raster(cropped, params)
}

pub fn resized_crop_boxes(boxes: BoundingBoxes, params: &Params) -> Result<BoundingBoxes> {
    let cropped = crop_boxes(boxes, params)?;
    resize_boxes(cropped, params)
}

// ============================================================================
// Pad
// ============================================================================

/// `[left, top, right, bottom]`
fn padding(params: &Params) -> Result<[usize; 4]> {
    let padding = params.floats("padding")?;
    let padding: [f64; 4] = match padding[..] {
        [all] => [all; 4],
        [horizontal, vertical] => [horizontal, vertical, horizontal, vertical],
        [l, t, r, b] => [l, t, r, b],
        _ => anyhow::bail!("padding needs 1, 2 or 4 values, got {}", padding.len()),
    };
    ensure!(
        padding.iter().all(|p| *p >= 0.0 && p.fract() == 0.0),
        "padding must be non-negative integers, got {:?}",
        padding
    );
    Ok(padding.map(|p| p as usize))
}

fn pad_array(t: &Tensor, [l, top, r, b]: [usize; 4], fill: f32) -> Result<Tensor> {
    let (h, w) = spatial(t)?;
    let mut shape = t.shape().to_vec();
    let nd = shape.len();
    shape[nd - 2] = h + top + b;
    shape[nd - 1] = w + l + r;
    let mut out = ArrayD::<f32>::from_elem(IxDyn(&shape), fill);
    let mut rows = out.slice_axis_mut(Axis(nd - 2), Slice::from(top..top + h));
    rows.slice_axis_mut(Axis(nd - 1), Slice::from(l..l + w))
        .assign(t);
    Ok(out.into_shared())
}

pub fn pad_tensor(t: Tensor, params: &Params) -> Result<Tensor> {
    let fill = params.opt_float("fill")?.unwrap_or(0.0) as f32;
    pad_array(&t, padding(params)?, fill)
}

pub fn pad_raster(img: DynamicImage, params: &Params) -> Result<DynamicImage> {
    let fill = params.opt_float("fill")?.unwrap_or(0.0) as f32;
    let padding = padding(params)?;
    via_tensor(img, |t| pad_array(&t, padding, fill))
}

/// Masks are padded with the background id 0.
pub fn pad_mask(mask: Mask, params: &Params) -> Result<Mask> {
    Ok(mask.wrap_like(pad_array(mask.data(), padding(params)?, 0.0)?)?)
}

pub fn pad_boxes(boxes: BoundingBoxes, params: &Params) -> Result<BoundingBoxes> {
    let [l, t, r, b] = padding(params)?;
    let (h, w) = boxes.canvas_size();
    let (dx, dy) = (l as f32, t as f32);
    map_boxes(&boxes, (h + t + b, w + l + r), false, |[x1, y1, x2, y2]| {
        [x1 + dx, y1 + dy, x2 + dx, y2 + dy]
    })
}

// ============================================================================
// Affine
// ============================================================================

/// Row-major 2x3 matrix `[a, b, c, d, e, f]` mapping `(x, y)` to
/// `(a x + b y + c, d x + e y + f)`.
pub type AffineMatrix = [f64; 6];

/// Rotation (clockwise degrees) and shear about `center`, then scale and
/// translate. With `inverted`, returns the output-to-input mapping.
pub fn affine_matrix(
    center: [f64; 2],
    angle: f64,
    translate: [f64; 2],
    scale: f64,
    shear: [f64; 2],
    inverted: bool,
) -> AffineMatrix {
    let rot = angle.to_radians();
    let (sx, sy) = (shear[0].to_radians(), shear[1].to_radians());
    let [cx, cy] = center;
    let [tx, ty] = translate;

    let a = (rot - sy).cos() / sy.cos();
    let b = -(rot - sy).cos() * sx.tan() / sy.cos() - rot.sin();
    let c = (rot - sy).sin() / sy.cos();
    let d = -(rot - sy).sin() * sx.tan() / sy.cos() + rot.cos();

    if inverted {
        let mut m = [d, -b, 0.0, -c, a, 0.0].map(|v| v / scale);
        m[2] += m[0] * (-cx - tx) + m[1] * (-cy - ty) + cx;
        m[5] += m[3] * (-cx - tx) + m[4] * (-cy - ty) + cy;
        m
    } else {
        let mut m = [a, b, 0.0, c, d, 0.0].map(|v| v * scale);
        m[2] += m[0] * (-cx) + m[1] * (-cy) + cx + tx;
        m[5] += m[3] * (-cx) + m[4] * (-cy) + cy + ty;
        m
    }
}

struct AffineArgs {
    angle: f64,
    translate: [f64; 2],
    scale: f64,
    shear: [f64; 2],
    /// Pixel coordinates; the image centre when absent.
    center: Option<[f64; 2]>,
    interpolation: Interpolation,
    fill: f32,
}

fn pair(params: &Params, name: &str) -> Result<[f64; 2]> {
    match params.opt_floats(name)?.as_deref() {
        None => Ok([0.0, 0.0]),
        Some([a]) => Ok([*a, 0.0]),
        Some([a, b]) => Ok([*a, *b]),
        Some(other) => anyhow::bail!("`{name}` needs 1 or 2 values, got {}", other.len()),
    }
}

impl AffineArgs {
    fn from_params(params: &Params) -> Result<Self> {
        let scale = params.opt_float("scale")?.unwrap_or(1.0);
        ensure!(scale > 0.0, "affine scale must be positive (got {})", scale);
        let center = match params.opt_floats("center")?.as_deref() {
            None => None,
            Some([x, y]) => Some([*x, *y]),
            Some(other) => anyhow::bail!("`center` needs 2 values, got {}", other.len()),
        };
        Ok(Self {
            angle: params.opt_float("angle")?.unwrap_or(0.0),
            translate: pair(params, "translate")?,
            scale,
            shear: pair(params, "shear")?,
            center,
            interpolation: params.opt_interpolation("interpolation")?.unwrap_or(Interpolation::Nearest),
            fill: params.opt_float("fill")?.unwrap_or(0.0) as f32,
        })
    }

    /// Rotation is counter-clockwise, the opposite of the affine angle.
    fn rotation(params: &Params) -> Result<Self> {
        let mut args = Self::from_params(params)?;
        args.angle = -params.float("angle")?;
        args.translate = [0.0, 0.0];
        args.scale = 1.0;
        args.shear = [0.0, 0.0];
        Ok(args)
    }
}

fn sample(src: &ArrayView2<f32>, x: f64, y: f64, mode: Interpolation, fill: f32) -> f32 {
    let (h, w) = src.dim();
    let at = |xi: i64, yi: i64| -> f32 {
        if xi >= 0 && yi >= 0 && (xi as usize) < w && (yi as usize) < h {
            src[[yi as usize, xi as usize]]
        } else {
            fill
        }
    };
    match mode {
        Interpolation::Nearest => at(x.round() as i64, y.round() as i64),
        // Bicubic warps use bilinear sampling.
        Interpolation::Bilinear | Interpolation::Bicubic => {
            let (x0, y0) = (x.floor(), y.floor());
            let (lx, ly) = ((x - x0) as f32, (y - y0) as f32);
            let (x0, y0) = (x0 as i64, y0 as i64);
            let top = at(x0, y0) * (1.0 - lx) + at(x0 + 1, y0) * lx;
            let bottom = at(x0, y0 + 1) * (1.0 - lx) + at(x0 + 1, y0 + 1) * lx;
            top * (1.0 - ly) + bottom * ly
        }
    }
}

fn affine_array(t: &Tensor, args: &AffineArgs) -> Result<Tensor> {
    let (h, w) = spatial(t)?;
    let (hw, ww) = (h as f64 * 0.5, w as f64 * 0.5);
    // Sampling works in coordinates relative to the image centre.
    let center = args.center.map_or([0.0, 0.0], |[x, y]| [x - ww, y - hw]);
    let m = affine_matrix(center, args.angle, args.translate, args.scale, args.shear, true);
    map_planes(t, (h, w), |src, mut dst| {
        for y in 0..h {
            let v = y as f64 + 0.5 - hw;
            for x in 0..w {
                let u = x as f64 + 0.5 - ww;
                let sx = m[0] * u + m[1] * v + m[2] + ww - 0.5;
                let sy = m[3] * u + m[4] * v + m[5] + hw - 0.5;
                dst[[y, x]] = sample(&src, sx, sy, args.interpolation, args.fill);
            }
        }
    })
}

fn affine_boxes_with(boxes: &BoundingBoxes, args: &AffineArgs) -> Result<BoundingBoxes> {
    let canvas = boxes.canvas_size();
    let center = args
        .center
        .unwrap_or([canvas.1 as f64 * 0.5, canvas.0 as f64 * 0.5]);
    let m = affine_matrix(center, args.angle, args.translate, args.scale, args.shear, false);
    let apply = |x: f32, y: f32| -> (f32, f32) {
        let (x, y) = (x as f64, y as f64);
        (
            (m[0] * x + m[1] * y + m[2]) as f32,
            (m[3] * x + m[4] * y + m[5]) as f32,
        )
    };
    map_boxes(boxes, canvas, true, |[x1, y1, x2, y2]| {
        let corners = [apply(x1, y1), apply(x2, y1), apply(x1, y2), apply(x2, y2)];
        let xs = corners.map(|c| c.0);
        let ys = corners.map(|c| c.1);
        [
            xs.iter().copied().fold(f32::INFINITY, f32::min),
            ys.iter().copied().fold(f32::INFINITY, f32::min),
            xs.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            ys.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        ]
    })
}

fn affine_mask_with(mask: &Mask, mut args: AffineArgs) -> Result<Mask> {
    args.interpolation = Interpolation::Nearest;
    args.fill = 0.0;
    Ok(mask.wrap_like(affine_array(mask.data(), &args)?)?)
}

pub fn affine_tensor(t: Tensor, params: &Params) -> Result<Tensor> {
    affine_array(&t, &AffineArgs::from_params(params)?)
}

pub fn affine_raster(img: DynamicImage, params: &Params) -> Result<DynamicImage> {
    let args = AffineArgs::from_params(params)?;
    via_tensor(img, |t| affine_array(&t, &args))
}

pub fn affine_mask(mask: Mask, params: &Params) -> Result<Mask> {
    affine_mask_with(&mask, AffineArgs::from_params(params)?)
}

pub fn affine_boxes(boxes: BoundingBoxes, params: &Params) -> Result<BoundingBoxes> {
    affine_boxes_with(&boxes, &AffineArgs::from_params(params)?)
}

pub fn rotate_tensor(t: Tensor, params: &Params) -> Result<Tensor> {
    affine_array(&t, &AffineArgs::rotation(params)?)
}

pub fn rotate_raster(img: DynamicImage, params: &Params) -> Result<DynamicImage> {
    let args = AffineArgs::rotation(params)?;
    via_tensor(img, |t| affine_array(&t, &args))
}

pub fn rotate_mask(mask: Mask, params: &Params) -> Result<Mask> {
    affine_mask_with(&mask, AffineArgs::rotation(params)?)
}

pub fn rotate_boxes(boxes: BoundingBoxes, params: &Params) -> Result<BoundingBoxes> {
    affine_boxes_with(&boxes, &AffineArgs::rotation(params)?)
}
