//! End-to-end transform tests on mixed samples.
//!
//! Tests cover:
//! - One parameter draw shared by every leaf of a sample (image/box/mask agree)
//! - Pass-through leaves and sample structure are preserved
//! - Parameter-search failures surface as typed errors
//! - Raster inputs flow through geometric, photometric and auto-augment stages

mod common;
use common::{boxes_at, detection_sample, image_at, is_pass_through, marked_raster, right_column_image, values};

use anyhow::{anyhow, Result};
use vision_transforms::rng::init_worker_rng;
use vision_transforms::transforms::{
    AutoAugment, AutoAugmentPolicy, CenterCrop, ColorJitter, Compose, ConvertBoundingBoxFormat,
    ConvertImageDtype, DecodeImage, Normalize, RandAugment, RandomApply, RandomChoice,
    RandomHorizontalFlip, RandomIoUCrop, RandomResizedCrop, RandomRotation, Resize, ResizeTo, ToImage,
    TrivialAugmentWide,
};
use vision_transforms::{
    io::encode_png, BoundingBoxFormat, BoundingBoxes, DType, EncodedImage, Interpolation, Kind,
    Sample, Transform, Value, VisionError,
};

// ============================================================================
// Shared parameters
// ============================================================================

#[test]
fn test_flip_moves_image_and_boxes_together() -> Result<()> {
    let boxes = BoundingBoxes::from_rows(&[[0.0, 0.0, 1.0, 1.0]], BoundingBoxFormat::Xyxy, (2, 2))?;
    let sample = Sample::from_single("image", right_column_image()?).with_feature("boxes", boxes);

    let out = RandomHorizontalFlip::new(1.0)?.forward(sample)?;

    assert_eq!(values(&image_at(&out, "image")?), vec![1.0, 0.0, 1.0, 0.0]);
    assert_eq!(boxes_at(&out, "boxes")?.rows(), vec![[1.0, 0.0, 2.0, 1.0]]);
    Ok(())
}

#[test]
fn test_box_format_round_trip() -> Result<()> {
    let boxes = BoundingBoxes::from_rows(&[[10.0, 20.0, 50.0, 80.0]], BoundingBoxFormat::Xyxy, (100, 100))?;
    let pipeline = ConvertBoundingBoxFormat::new(BoundingBoxFormat::Cxcywh)
        .then(ConvertBoundingBoxFormat::new(BoundingBoxFormat::Xyxy));
    let out = pipeline.forward(Sample::from_single("boxes", boxes))?;
    assert_eq!(boxes_at(&out, "boxes")?.rows(), vec![[10.0, 20.0, 50.0, 80.0]]);
    Ok(())
}

#[test]
fn test_random_crop_keeps_image_mask_and_canvas_in_step() -> Result<()> {
    init_worker_rng(0, 0, 11);
    let crop = RandomResizedCrop::new((6, 6))?.with_interpolation(Interpolation::Nearest);
    for _ in 0..10 {
        let out = crop.forward(detection_sample(12, 16)?)?;
        let image = image_at(&out, "image")?;
        let mask = out
            .get_value("mask")?
            .as_mask()
            .cloned()
            .ok_or_else(|| anyhow!("mask"))?;
        assert_eq!(image.spatial_size(), (6, 6));
        assert_eq!(mask.spatial_size(), (6, 6));
        assert_eq!(boxes_at(&out, "boxes")?.canvas_size(), (6, 6));
    }
    Ok(())
}

#[test]
fn test_rotation_preserves_structure_and_pass_through() -> Result<()> {
    init_worker_rng(0, 0, 5);
    let input = detection_sample(8, 8)?;
    let out = RandomRotation::symmetric(30.0)?.forward(input.clone())?;

    assert_eq!(out.features().collect::<Vec<_>>(), input.features().collect::<Vec<_>>());
    assert_eq!(out.get_value("path")?, &Value::from("img_0001.png"));
    assert!(is_pass_through(out.get_value("path")?));
    assert_eq!(out.get_value("labels")?, input.get_value("labels")?);
    assert_eq!(image_at(&out, "image")?.spatial_size(), (8, 8));
    Ok(())
}

#[test]
fn test_nested_containers_preserve_sequences() -> Result<()> {
    init_worker_rng(0, 0, 3);
    let nested = Sample::seq([detection_sample(4, 4)?, Sample::Leaf(Value::Int(9))]);
    let pipeline = Compose::new(vec![
        Box::new(RandomApply::new(vec![Box::new(RandomHorizontalFlip::new(1.0)?)], 1.0)?),
        Box::new(RandomChoice::new(vec![
            Box::new(ColorJitter::new().brightness(0.2)?),
            Box::new(ConvertImageDtype::new(DType::U8)),
        ])?),
    ]);
    let out = pipeline.forward(nested)?;
    match out {
        Sample::Seq(items) => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[1], Sample::Leaf(Value::Int(9)));
            assert_eq!(items[0].get_value("path")?, &Value::from("img_0001.png"));
        }
        other => return Err(anyhow!("structure changed: {:?}", other)),
    }
    Ok(())
}

// ============================================================================
// Typed failures
// ============================================================================

#[test]
fn test_impossible_resized_crop_is_a_parameter_error() -> Result<()> {
    let crop = RandomResizedCrop::with_ranges((4, 4), (1.5, 2.0), (1.0, 1.0))?;
    let err = crop.forward(detection_sample(8, 8)?).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VisionError>(),
        Some(VisionError::Parameter { .. })
    ));
    Ok(())
}

#[test]
fn test_iou_crop_requires_boxes() -> Result<()> {
    let sample = Sample::from_single("image", right_column_image()?);
    let err = RandomIoUCrop::new().forward(sample).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VisionError>(),
        Some(VisionError::IncompatibleInput { .. })
    ));
    Ok(())
}

#[test]
fn test_normalize_rejects_rasters() -> Result<()> {
    let sample = Sample::from_single("image", marked_raster(1, 4, 4));
    let err = Normalize::imagenet().forward(sample).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VisionError>(),
        Some(VisionError::IncompatibleInput { .. })
    ));
    Ok(())
}

#[test]
fn test_transform_without_image_reports_no_image() -> Result<()> {
    let sample = Sample::from_single("caption", "a cat").with_feature("id", 3i64);
    let err = RandomResizedCrop::new((2, 2))?.forward(sample).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VisionError>(),
        Some(VisionError::NoImageFound)
    ));
    Ok(())
}

// ============================================================================
// Raster pipelines
// ============================================================================

#[test]
fn test_encoded_bytes_to_normalized_image() -> Result<()> {
    let bytes = encode_png(&marked_raster(200, 20, 10))?;
    let pipeline = DecodeImage
        .then(Resize::new(ResizeTo::Shorter(8), Interpolation::Bilinear)?)
        .then(CenterCrop::new((8, 8))?)
        .then(ToImage)
        .then(ConvertImageDtype::new(DType::F32))
        .then(Normalize::new(vec![0.5; 3], vec![0.5; 3])?);

    let out = pipeline.forward(Sample::from_single("image", EncodedImage::new(bytes)).with_feature("label", 1i64))?;
    let image = image_at(&out, "image")?;
    assert_eq!(image.data().shape(), &[3, 8, 8]);
    assert!(image.data().iter().all(|v| (-1.0..=1.0).contains(v)));
    assert_eq!(out.get_value("label")?, &Value::Int(1));
    Ok(())
}

#[test]
fn test_auto_augment_family_keeps_kinds() -> Result<()> {
    init_worker_rng(0, 0, 21);
    let augmentations: Vec<Box<dyn Transform>> = vec![
        Box::new(AutoAugment::new(AutoAugmentPolicy::ImageNet)),
        Box::new(AutoAugment::new(AutoAugmentPolicy::Svhn)),
        Box::new(RandAugment::new()),
        Box::new(TrivialAugmentWide::new()),
    ];
    for augment in &augmentations {
        for _ in 0..5 {
            let raster = augment.forward(Sample::from_single("image", marked_raster(7, 9, 6)))?;
            let value = raster.get_value("image")?;
            assert_eq!(value.kind(), Some(Kind::Raster));

            let out = augment.forward(detection_sample(6, 9)?)?;
            assert_eq!(image_at(&out, "image")?.spatial_size(), (6, 9));
            assert_eq!(boxes_at(&out, "boxes")?.canvas_size(), (6, 9));
            assert_eq!(out.get_value("path")?, &Value::from("img_0001.png"));
        }
    }
    Ok(())
}
