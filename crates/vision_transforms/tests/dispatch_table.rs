//! Kernel table tests.
//!
//! Tests cover:
//! - Every built-in operation runs on the kinds it advertises, with the
//!   promised output kind and canvas
//! - Datapoint kinds reach plain-array kernels through the fallback
//! - Unsupported kinds and pass-through values are rejected with typed errors
//! - Custom tables extend the built-ins without touching the global one

mod common;
use common::{marked_raster, right_column_image};

use anyhow::{Context, Result};
use vision_transforms::io::encode_png;
use vision_transforms::{
    registry, tensor, BoundingBoxFormat, BoundingBoxes, ColorSpace, DType, Dispatcher, EncodedImage,
    Image, Kind, Label, Mask, OneHotLabel, Params, Tensor, Value, Video, VisionError,
};

// ============================================================================
// Totality
// ============================================================================

/// Input layout a case needs for its plain-array and image kinds.
#[derive(Clone, Copy)]
enum Layout {
    /// `[3, 4, 4]`
    Single,
    /// `[2, 3, 4, 4]`
    Batch,
    /// `[1, 4]` box rows
    BoxRows,
}

/// What a kernel must return for a 4x4 input.
#[derive(Clone, Copy)]
enum Expect {
    /// Same kind on a new `(height, width)` canvas.
    Canvas(usize, usize),
    /// Same kind and same spatial extent as the input.
    Preserved,
    /// A different kind on a `(height, width)` canvas, or none for labels.
    Becomes(Kind, Option<(usize, usize)>),
}

struct Case {
    op: &'static str,
    params: Params,
    kinds: Vec<Kind>,
    layout: Layout,
    expect: Expect,
}

fn case(op: &'static str, params: Params, kinds: &[Kind], expect: Expect) -> Case {
    Case { op, params, kinds: kinds.to_vec(), layout: Layout::Single, expect }
}

fn fixture(kind: Kind, layout: Layout) -> Result<Value> {
    let ramp = |n: usize| (0..n).map(|i| (i % 7) as f32 / 7.0).collect::<Vec<_>>();
    Ok(match (kind, layout) {
        (Kind::Tensor, Layout::BoxRows) => tensor(&[1, 4], vec![0.0, 0.0, 2.0, 2.0])?.into(),
        (Kind::Tensor, Layout::Batch) => tensor(&[2, 3, 4, 4], ramp(96))?.into(),
        (Kind::Tensor, _) => tensor(&[3, 4, 4], ramp(48))?.into(),
        (Kind::Image, Layout::Batch) => Image::new(tensor(&[2, 3, 4, 4], ramp(96))?)?.into(),
        (Kind::Image, _) => Image::new(tensor(&[3, 4, 4], ramp(48))?)?.into(),
        (Kind::Video, _) => Video::new(tensor(&[2, 3, 4, 4], ramp(96))?)?.into(),
        (Kind::Mask, _) => Mask::new(tensor(&[4, 4], vec![1.0; 16])?)?.into(),
        (Kind::Raster, _) => marked_raster(1, 4, 4).into(),
        (Kind::EncodedImage, _) => EncodedImage::new(encode_png(&marked_raster(1, 4, 4))?).into(),
        (Kind::BoundingBoxes, _) => {
            BoundingBoxes::from_rows(&[[0.0, 0.0, 2.0, 2.0]], BoundingBoxFormat::Xyxy, (4, 4))?.into()
        }
        (Kind::Label, _) => Label::new(tensor(&[2], vec![0.0, 2.0])?)?.into(),
        (Kind::OneHotLabel, _) => {
            OneHotLabel::new(tensor(&[2, 3], vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0])?)?.into()
        }
    })
}

fn spatial_of(value: &Value) -> Option<(usize, usize)> {
    match value {
        Value::Tensor(t) if t.ndim() >= 2 => {
            let s = t.shape();
            Some((s[s.len() - 2], s[s.len() - 1]))
        }
        Value::Raster(img) => Some((img.height() as usize, img.width() as usize)),
        Value::Datapoint(d) => d.spatial_size(),
        _ => None,
    }
}

fn builtin_cases() -> Vec<Case> {
    use Kind as K;
    let spatial = [K::Tensor, K::Raster, K::Image, K::Video, K::Mask, K::BoundingBoxes];
    let photometric = [K::Tensor, K::Raster, K::Image, K::Video];
    let region = |p: Params| p.with("top", 0usize).with("left", 1usize).with("height", 2usize).with("width", 3usize);

    let mut cases = vec![
        case("horizontal_flip", Params::new(), &spatial, Expect::Preserved),
        case("vertical_flip", Params::new(), &spatial, Expect::Preserved),
        case("resize", Params::new().with("size", (2usize, 3usize)), &spatial, Expect::Canvas(2, 3)),
        case("crop", region(Params::new()), &spatial, Expect::Canvas(2, 3)),
        case("center_crop", Params::new().with("size", (2usize, 2usize)), &spatial, Expect::Canvas(2, 2)),
        case(
            "resized_crop",
            region(Params::new()).with("size", (3usize, 3usize)),
            &spatial,
            Expect::Canvas(3, 3),
        ),
        case("pad", Params::new().with("padding", vec![1.0]), &spatial, Expect::Canvas(6, 6)),
        case("affine", Params::new().with("angle", 10.0), &spatial, Expect::Preserved),
        case("rotate", Params::new().with("angle", 10.0), &spatial, Expect::Preserved),
        case("erase", region(Params::new()), &photometric, Expect::Preserved),
        case(
            "normalize",
            Params::new().with("mean", vec![0.5]).with("std", vec![0.25]),
            &[K::Tensor, K::Image, K::Video],
            Expect::Preserved,
        ),
        case("convert_dtype", Params::new().with("dtype", DType::U8), &[K::Image, K::Video], Expect::Preserved),
        case(
            "convert_color_space",
            Params::new().with("color_space", ColorSpace::Gray),
            &[K::Image],
            Expect::Preserved,
        ),
        Case {
            layout: Layout::BoxRows,
            ..case(
                "convert_bounding_box_format",
                Params::new()
                    .with("format", BoundingBoxFormat::Cxcywh)
                    .with("old_format", BoundingBoxFormat::Xyxy),
                &[K::BoundingBoxes, K::Tensor],
                Expect::Preserved,
            )
        },
        case("clamp_bounding_boxes", Params::new(), &[K::BoundingBoxes], Expect::Preserved),
        case("to_image", Params::new(), &[K::Raster, K::Tensor], Expect::Becomes(K::Image, Some((4, 4)))),
        case("to_raster", Params::new(), &[K::Image, K::Tensor], Expect::Becomes(K::Raster, Some((4, 4)))),
        case("decode_image", Params::new(), &[K::EncodedImage], Expect::Becomes(K::Raster, Some((4, 4)))),
        case(
            "label_to_one_hot",
            Params::new().with("num_categories", 3i64),
            &[K::Label],
            Expect::Becomes(K::OneHotLabel, None),
        ),
    ];

    for (op, params) in [
        ("adjust_brightness", Params::new().with("factor", 0.5)),
        ("adjust_contrast", Params::new().with("factor", 0.5)),
        ("adjust_saturation", Params::new().with("factor", 0.5)),
        ("adjust_hue", Params::new().with("factor", 0.1)),
        ("adjust_sharpness", Params::new().with("factor", 2.0)),
        ("posterize", Params::new().with("bits", 4i64)),
        ("solarize", Params::new().with("threshold", 0.5)),
        ("autocontrast", Params::new()),
        ("equalize", Params::new()),
        ("invert", Params::new()),
        ("rgb_to_grayscale", Params::new()),
        (
            "gaussian_blur",
            Params::new().with("kernel_size", (3usize, 3usize)).with("sigma", vec![1.0]),
        ),
        ("permute_channels", Params::new().with("permutation", vec![2.0, 0.0, 1.0])),
    ] {
        cases.push(case(op, params, &photometric, Expect::Preserved));
    }

    let batch_kinds = [K::Tensor, K::Image, K::Video, K::OneHotLabel];
    for (op, params) in [
        ("mixup", Params::new().with("lambda", 0.3)),
        ("cutmix", Params::new().with("lambda", 0.75).with("box", vec![0.0, 0.0, 2.0, 2.0])),
        ("uniform_temporal_subsample", Params::new().with("num_samples", 1usize)),
    ] {
        let kinds: &[Kind] = if op == "uniform_temporal_subsample" { &[K::Tensor, K::Video] } else { &batch_kinds };
        cases.push(Case { layout: Layout::Batch, ..case(op, params, kinds, Expect::Preserved) });
    }
    cases
}

#[test]
fn test_every_builtin_operation_runs_on_its_kinds() -> Result<()> {
    let dispatcher = registry();
    for case in builtin_cases() {
        for &kind in &case.kinds {
            assert!(dispatcher.supports(case.op, kind), "{} should support {}", case.op, kind);
            let input = fixture(kind, case.layout)?;
            let before = spatial_of(&input);
            let out = dispatcher
                .dispatch(case.op, input, &case.params)
                .with_context(|| format!("{} on {}", case.op, kind))?;

            let (want_kind, want_size) = match case.expect {
                Expect::Canvas(h, w) => (kind, Some((h, w))),
                Expect::Preserved => (kind, before),
                Expect::Becomes(k, size) => (k, size),
            };
            assert_eq!(out.kind(), Some(want_kind), "{} on {}", case.op, kind);
            assert_eq!(spatial_of(&out), want_size, "{} on {}", case.op, kind);
        }
    }
    Ok(())
}

#[test]
fn test_builtin_table_covers_every_operation() {
    let mut listed: Vec<&str> = builtin_cases().iter().map(|c| c.op).collect();
    listed.sort_unstable();
    assert_eq!(registry().operations(), listed);
}

#[test]
fn test_annotation_kinds_have_no_fallback() {
    let dispatcher = registry();
    assert!(!dispatcher.supports("adjust_brightness", Kind::BoundingBoxes));
    assert!(!dispatcher.supports("normalize", Kind::Raster));
    assert!(!dispatcher.supports("horizontal_flip", Kind::Label));
    assert!(!dispatcher.supports("no_such_op", Kind::Tensor));
}

#[test]
fn test_operations_listing_is_sorted() {
    let ops = registry().operations();
    let mut sorted = ops.clone();
    sorted.sort_unstable();
    assert_eq!(ops, sorted);
    assert!(ops.contains(&"horizontal_flip"));
}

// ============================================================================
// Fallback and errors
// ============================================================================

#[test]
fn test_fallback_rewraps_as_the_original_kind() -> Result<()> {
    let out = registry().dispatch("horizontal_flip", right_column_image()?.into(), &Params::new())?;
    let image = out.as_image().cloned().ok_or_else(|| anyhow::anyhow!("kind"))?;
    assert_eq!(image.data().iter().copied().collect::<Vec<_>>(), vec![1.0, 0.0, 1.0, 0.0]);

    let mask = Mask::new(tensor(&[1, 3], vec![1.0, 2.0, 3.0])?)?;
    let out = registry().dispatch("horizontal_flip", mask.into(), &Params::new())?;
    assert_eq!(out.kind(), Some(Kind::Mask));
    assert_eq!(
        out.as_mask().map(|m| m.data().iter().copied().collect::<Vec<_>>()),
        Some(vec![3.0, 2.0, 1.0])
    );
    Ok(())
}

#[test]
fn test_unsupported_and_pass_through_are_typed_errors() -> Result<()> {
    let str_err = registry()
        .dispatch("normalize", Value::Str("caption".into()), &Params::new())
        .unwrap_err();
    assert!(matches!(
        str_err.downcast_ref::<VisionError>(),
        Some(VisionError::UnsupportedKind { .. })
    ));

    let label = Label::new(tensor(&[], vec![1.0])?)?;
    let err = registry()
        .dispatch("horizontal_flip", label.into(), &Params::new())
        .unwrap_err();
    assert!(err.to_string().contains("horizontal_flip"));
    assert!(matches!(
        err.downcast_ref::<VisionError>(),
        Some(VisionError::UnsupportedKind { .. })
    ));
    Ok(())
}

#[test]
fn test_missing_parameter_names_it() -> Result<()> {
    let err = registry()
        .dispatch("resize", right_column_image()?.into(), &Params::new())
        .unwrap_err();
    assert!(format!("{:#}", err).contains("size"));
    Ok(())
}

// ============================================================================
// Custom tables
// ============================================================================

fn double(t: Tensor, _: &Params) -> Result<Tensor> {
    Ok(t.mapv(|v| v * 2.0).into_shared())
}

#[test]
fn test_custom_table_extends_builtins() -> Result<()> {
    let mut builder = Dispatcher::builder().with_builtin_kernels()?;
    builder.register("double", double)?;
    assert!(matches!(
        builder.register("double", double).map(|_| ()),
        Err(VisionError::Conflict { .. })
    ));
    let dispatcher = builder.build();

    assert!(dispatcher.supports("double", Kind::Image));
    assert!(dispatcher.supports("horizontal_flip", Kind::Raster));
    assert!(!registry().supports("double", Kind::Tensor));

    let out = dispatcher.dispatch("double", right_column_image()?.into(), &Params::new())?;
    assert_eq!(out.kind(), Some(Kind::Image));
    assert_eq!(
        out.as_image().map(|i| i.data().iter().copied().collect::<Vec<_>>()),
        Some(vec![0.0, 2.0, 0.0, 2.0])
    );
    Ok(())
}
