//! Conversions between host rasters, encoded bytes, arrays and datapoints.

use super::util::{raster_to_tensor, tensor_to_raster, RasterDepth};
use crate::datapoints::{ColorSpace, DType, EncodedImage, Image, Label, OneHotLabel, Tensor};
use crate::dispatch::DispatcherBuilder;
use crate::error::VisionResult;
use crate::io;
use crate::params::Params;
use anyhow::{ensure, Result};
use image::DynamicImage;
use ndarray::{ArrayD, IxDyn};

pub(crate) fn register(b: &mut DispatcherBuilder) -> VisionResult<()> {
    b.register("to_image", raster_to_image)?
        .register("to_image", tensor_to_image)?
        .register("to_raster", image_to_raster)?
        .register("to_raster", |t: Tensor, _: &Params| tensor_to_raster(&t, 1.0))?
        .register("decode_image", decode_image)?
        .register("label_to_one_hot", label_to_one_hot)?;
    Ok(())
}

/// Image with the color space implied by the raster's channels.
///
/// 8-bit rasters become `U8` images. 16-bit and float rasters become `F32`
/// images in `[0, 1]` so no precision is lost.
pub fn raster_to_image(img: DynamicImage, _: &Params) -> Result<Image> {
    let depth = RasterDepth::of(&img);
    let data = raster_to_tensor(&img)?;
    let channels = data.shape()[0];
    let (data, dtype) = match depth {
        RasterDepth::U8 => (data, DType::U8),
        _ => (data.mapv(|v| v / depth.bound()).into_shared(), DType::F32),
    };
    Ok(Image::from_parts(data, ColorSpace::from_num_channels(channels), dtype)?)
}

pub fn tensor_to_image(t: Tensor, _: &Params) -> Result<Image> {
    Ok(Image::new(t)?)
}

pub fn image_to_raster(image: Image, _: &Params) -> Result<DynamicImage> {
    tensor_to_raster(image.data(), image.dtype().max_value())
}

pub fn decode_image(encoded: EncodedImage, _: &Params) -> Result<DynamicImage> {
    Ok(io::decode_image(encoded.as_bytes())?)
}

/// `[]` or `[N]` class indices to `[K]` or `[N, K]` one-hot rows.
///
/// The category count comes from `num_categories`, then from the label's
/// categories, then from the largest index.
pub fn label_to_one_hot(label: Label, params: &Params) -> Result<OneHotLabel> {
    let indices: Vec<usize> = label
        .data()
        .iter()
        .map(|&v| {
            ensure!(v >= 0.0 && v.fract() == 0.0, "label {v} is not a class index");
            Ok(v as usize)
        })
        .collect::<Result<_>>()?;
    let num_categories = match params.opt_int("num_categories")? {
        Some(n) => usize::try_from(n)?,
        None => match label.categories() {
            Some(categories) => categories.len(),
            None => indices.iter().max().map_or(0, |m| m + 1),
        },
    };
    ensure!(num_categories > 0, "one-hot encoding needs at least one category");
    if let Some(&bad) = indices.iter().find(|&&i| i >= num_categories) {
        anyhow::bail!("label {bad} is outside of {num_categories} categories");
    }

    let mut shape = label.data().shape().to_vec();
    shape.push(num_categories);
    let mut one_hot = ArrayD::<f32>::zeros(IxDyn(&shape));
    for (row, &index) in one_hot
        .as_slice_mut()
        .into_iter()
        .flat_map(|s| s.chunks_mut(num_categories))
        .zip(&indices)
    {
        row[index] = 1.0;
    }
    Ok(OneHotLabel::from_parts(one_hot.into_shared(), label.categories_arc())?)
}
