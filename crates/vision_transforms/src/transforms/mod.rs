//! src/transforms/mod.rs
//!
//! Sample-level transforms built on the kernel dispatcher.
//!
//! # Module Organization
//!
//! ```text
//! transforms/
//! ├── core.rs          → Transform / TransformNode traits, Chain
//! ├── container.rs     → Compose, RandomApply, RandomChoice, RandomOrder
//! ├── geometric.rs     → Flips, resizes, crops, padding, rotation, affine
//! ├── photometric.rs   → Color jitter, blur, photometric distort, normalize, ...
//! ├── meta.rs          → Box format, clamping, cleanup, dtype, color space
//! ├── augment.rs       → Erasing, mixup, cutmix, one-hot labels
//! ├── auto_augment.rs  → AutoAugment, RandAugment, TrivialAugmentWide
//! ├── temporal.rs      → Video frame subsampling
//! ├── conversion.rs    → Decode, raster <-> image
//! ├── misc.rs          → Identity, Lambda
//! └── presets.rs       → Evaluation pipelines
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use vision_transforms::transforms::*;
//!
//! let pipeline = DecodeImage
//!     .then(ToImage)
//!     .then(RandomResizedCrop::new((224, 224))?)
//!     .then(RandomHorizontalFlip::new(0.5)?)
//!     .then(ConvertImageDtype::new(DType::F32))
//!     .then(Normalize::imagenet());
//! let sample = pipeline.forward(sample)?;
//! ```

pub mod augment;
pub mod auto_augment;
pub mod container;
pub mod conversion;
pub mod core;
pub mod geometric;
pub mod meta;
pub mod misc;
pub mod photometric;
pub mod presets;
pub mod temporal;

pub use self::augment::{LabelToOneHot, RandomCutmix, RandomErasing, RandomMixup};
pub use self::auto_augment::{AutoAugment, AutoAugmentPolicy, RandAugment, TrivialAugmentWide};
pub use self::container::{BoxedTransform, Compose, RandomApply, RandomChoice, RandomOrder};
pub use self::conversion::{DecodeImage, ToImage, ToRaster};
pub use self::core::{Chain, Transform, TransformNode, PHOTOMETRIC, SPATIAL};
pub use self::geometric::{
    CenterCrop, Pad, RandomAffine, RandomCrop, RandomHorizontalFlip, RandomIoUCrop,
    RandomResizedCrop, RandomRotation, RandomShortestSize, RandomVerticalFlip, RandomZoomOut, Resize,
    ResizeTo, ScaleJitter,
};
pub use self::meta::{
    ClampBoundingBoxes, CleanupBoxes, ConvertBoundingBoxFormat, ConvertColorSpace, ConvertImageDtype,
};
pub use self::misc::{Identity, Lambda};
pub use self::photometric::{
    ColorJitter, GaussianBlur, Grayscale, Normalize, RandomAdjustSharpness, RandomAutocontrast,
    RandomEqualize, RandomGrayscale, RandomInvert, RandomPhotometricDistort, RandomPosterize,
    RandomSolarize,
};
pub use self::presets::{ImageClassificationEval, ObjectDetectionEval, SemanticSegmentationEval};
pub use self::temporal::UniformTemporalSubsample;
