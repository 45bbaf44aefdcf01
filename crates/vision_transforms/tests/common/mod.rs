#![allow(dead_code)]

use anyhow::{anyhow, Result};
use image::{DynamicImage, Rgb, RgbImage};
use vision_transforms::{
    tensor, BoundingBoxFormat, BoundingBoxes, Image, Label, Mask, Sample, Value,
};

/// 1x2x2 image whose right column is lit: `[[0, 1], [0, 1]]`.
pub fn right_column_image() -> Result<Image> {
    Ok(Image::new(tensor(&[1, 2, 2], vec![0.0, 1.0, 0.0, 1.0])?)?)
}

/// Detection sample on a `height x width` canvas with one box and metadata.
pub fn detection_sample(height: usize, width: usize) -> Result<Sample> {
    let data = (0..3 * height * width).map(|i| (i % 7) as f32 / 7.0).collect();
    let image = Image::new(tensor(&[3, height, width], data)?)?;
    let boxes = BoundingBoxes::from_rows(
        &[[1.0, 1.0, width as f32 / 2.0, height as f32 / 2.0]],
        BoundingBoxFormat::Xyxy,
        (height, width),
    )?;
    let mask = Mask::new(tensor(&[height, width], vec![1.0; height * width])?)?;
    Ok(Sample::from_single("image", image)
        .with_feature("boxes", boxes)
        .with_feature("mask", mask)
        .with_feature("labels", Label::new(tensor(&[1], vec![2.0])?)?)
        .with_feature("path", "img_0001.png"))
}

/// Raster with a per-index marker in the red channel of the top-left pixel.
pub fn marked_raster(index: u8, width: u32, height: u32) -> DynamicImage {
    let mut img = RgbImage::from_pixel(width, height, Rgb([0, 64, 128]));
    img.put_pixel(0, 0, Rgb([index, 0, 0]));
    DynamicImage::ImageRgb8(img)
}

pub fn image_at(sample: &Sample, feature: &str) -> Result<Image> {
    sample
        .get_value(feature)?
        .as_image()
        .cloned()
        .ok_or_else(|| anyhow!("{} is not an image", feature))
}

pub fn boxes_at(sample: &Sample, feature: &str) -> Result<BoundingBoxes> {
    sample
        .get_value(feature)?
        .as_bounding_boxes()
        .cloned()
        .ok_or_else(|| anyhow!("{} is not a bounding box set", feature))
}

pub fn values(image: &Image) -> Vec<f32> {
    image.data().iter().copied().collect()
}

pub fn is_pass_through(value: &Value) -> bool {
    value.kind().is_none()
}
