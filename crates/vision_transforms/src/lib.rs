pub mod config;
pub mod datapoints;
pub mod dataset;
pub mod dispatch;
pub mod error;
pub mod io;
pub mod kernels;
pub mod loader;
pub mod params;
pub mod query;
pub mod rng;
pub mod sample;
pub mod transforms;
pub mod tree;

pub use config::{PipelineConfig, TransformConfig};
pub use datapoints::{
    tensor, BoundingBoxFormat, BoundingBoxes, ColorSpace, DType, Datapoint, EncodedImage, Image, Kind, Label,
    Mask, OneHotLabel, Tensor, Value, Video,
};
pub use dataset::{Dataset, ImageFileDataset, InMemoryDataset};
pub use dispatch::{registry, Dispatcher, DispatcherBuilder, Kernel};
pub use error::{VisionError, VisionResult};
pub use loader::{LoaderConfig, SampleLoader};
pub use params::{Interpolation, Params};
pub use sample::Sample;
pub use transforms::{Transform, TransformNode};
