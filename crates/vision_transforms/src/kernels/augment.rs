//! Erasing and batch-mixing kernels.

use super::util::{from_images, spatial, to_images, via_tensor};
use crate::datapoints::{OneHotLabel, Tensor};
use crate::dispatch::DispatcherBuilder;
use crate::error::VisionResult;
use crate::params::Params;
use anyhow::{ensure, Result};
use image::DynamicImage;
use ndarray::{concatenate, s, ArrayD, Axis, Slice};

pub(crate) fn register(b: &mut DispatcherBuilder) -> VisionResult<()> {
    b.register("erase", |t: Tensor, p: &Params| erase(&t, p))?
        .register("erase", |img: DynamicImage, p: &Params| {
            via_tensor(img, |t| erase(&t, p))
        })?
        .register("mixup", |t: Tensor, p: &Params| mixup(&t, p))?
        .register("mixup", mixup_labels)?
        .register("cutmix", |t: Tensor, p: &Params| cutmix(&t, p))?
        .register("cutmix", cutmix_labels)?;
    Ok(())
}

// ============================================================================
// Erase
// ============================================================================

/// Fills the region `[top, top + height) x [left, left + width)` of every
/// image with `value`, given in payload units with one entry or one per
/// channel.
pub fn erase(t: &Tensor, params: &Params) -> Result<Tensor> {
    let top = params.usize("top")?;
    let left = params.usize("left")?;
    let height = params.usize("height")?;
    let width = params.usize("width")?;
    let value = params.opt_floats("value")?.unwrap_or_else(|| vec![0.0]);

    let (h, w) = spatial(t)?;
    ensure!(
        top + height <= h && left + width <= w,
        "erase region {}x{} at ({}, {}) exceeds the {}x{} image",
        height,
        width,
        top,
        left,
        h,
        w
    );
    let (lead, mut images) = to_images(t)?;
    let c = images.dim().1;
    ensure!(
        value.len() == 1 || value.len() == c,
        "erase value must have 1 or {} entries, got {}",
        c,
        value.len()
    );
    for mut image in images.outer_iter_mut() {
        for (ch, mut plane) in image.outer_iter_mut().enumerate() {
            let fill = value[if value.len() == 1 { 0 } else { ch }] as f32;
            plane
                .slice_mut(s![top..top + height, left..left + width])
                .fill(fill);
        }
    }
    from_images(&lead, images)
}

// ============================================================================
// Mixup / Cutmix
// ============================================================================

/// Shifts the batch axis by one: `out[i] = t[i - 1]`.
fn roll_batch(t: &Tensor) -> Result<ArrayD<f32>> {
    ensure!(t.ndim() >= 1 && t.shape()[0] > 0, "expected a non-empty batch");
    let b = t.shape()[0];
    let last = t.slice_axis(Axis(0), Slice::from(b - 1..b));
    let rest = t.slice_axis(Axis(0), Slice::from(0..b - 1));
    Ok(concatenate(Axis(0), &[last, rest])?)
}

fn mix(t: &Tensor, lambda: f32) -> Result<Tensor> {
    let rolled = roll_batch(t)?;
    let mut out = t.to_owned();
    out.zip_mut_with(&rolled, |v, r| *v = lambda * *v + (1.0 - lambda) * r);
    Ok(out.into_shared())
}

fn lambda(params: &Params) -> Result<f32> {
    let lambda = params.float("lambda")?;
    ensure!(
        (0.0..=1.0).contains(&lambda),
        "lambda must be in [0, 1] (got {})",
        lambda
    );
    Ok(lambda as f32)
}

/// `lambda * batch + (1 - lambda) * batch.roll(1, 0)`
pub fn mixup(t: &Tensor, params: &Params) -> Result<Tensor> {
    ensure!(t.ndim() >= 4, "mixup expects a batch [B, ..., C, H, W], got shape {:?}", t.shape());
    mix(t, lambda(params)?)
}

pub fn mixup_labels(labels: OneHotLabel, params: &Params) -> Result<OneHotLabel> {
    ensure!(labels.data().ndim() >= 2, "mixup expects batched one-hot labels [B, K]");
    Ok(labels.wrap_like(mix(labels.data(), lambda(params)?)?)?)
}

/// Pastes the `box = [x1, y1, x2, y2]` region of the rolled batch.
pub fn cutmix(t: &Tensor, params: &Params) -> Result<Tensor> {
    ensure!(t.ndim() >= 4, "cutmix expects a batch [B, ..., C, H, W], got shape {:?}", t.shape());
    let coords = params.floats("box")?;
    ensure!(coords.len() == 4, "cutmix box needs 4 coordinates, got {}", coords.len());
    let (h, w) = spatial(t)?;
    let x1 = (coords[0].max(0.0) as usize).min(w);
    let y1 = (coords[1].max(0.0) as usize).min(h);
    let x2 = (coords[2].max(0.0) as usize).clamp(x1, w);
    let y2 = (coords[3].max(0.0) as usize).clamp(y1, h);

    let rolled = roll_batch(t)?;
    let mut out = t.to_owned();
    let (hy, wx) = (Axis(t.ndim() - 2), Axis(t.ndim() - 1));
    let mut region = out.view_mut();
    region.slice_axis_inplace(hy, Slice::from(y1..y2));
    region.slice_axis_inplace(wx, Slice::from(x1..x2));
    let mut source = rolled.view();
    source.slice_axis_inplace(hy, Slice::from(y1..y2));
    source.slice_axis_inplace(wx, Slice::from(x1..x2));
    region.assign(&source);
    Ok(out.into_shared())
}

/// The label weight is `lambda`, already corrected for the pasted area.
pub fn cutmix_labels(labels: OneHotLabel, params: &Params) -> Result<OneHotLabel> {
    mixup_labels(labels, params)
}
