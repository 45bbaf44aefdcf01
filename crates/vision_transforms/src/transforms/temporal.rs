//! Video transforms.

use super::core::TransformNode;
use crate::datapoints::{Kind, Value};
use crate::dispatch::Dispatcher;
use crate::params::Params;
use anyhow::{ensure, Result};

/// Keeps `num_samples` evenly spaced frames of every video.
///
/// Plain arrays are treated as `[..., T, C, H, W]`.
#[derive(Debug, Clone)]
pub struct UniformTemporalSubsample {
    num_samples: usize,
}

impl UniformTemporalSubsample {
    pub fn new(num_samples: usize) -> Result<Self> {
        ensure!(num_samples > 0, "num_samples must be positive");
        Ok(Self { num_samples })
    }
}

impl TransformNode for UniformTemporalSubsample {
    fn transformed_kinds(&self) -> &[Kind] {
        &[Kind::Tensor, Kind::Video]
    }

    fn get_params(&self, _: &[Value]) -> Result<Params> {
        Ok(Params::new().with("num_samples", self.num_samples))
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value> {
        dispatcher.dispatch("uniform_temporal_subsample", value, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoints::{tensor, DType, Image, Video};
    use crate::sample::Sample;
    use crate::transforms::Transform;
    use anyhow::anyhow;

    #[test]
    fn test_subsample_video_keeps_metadata() -> Result<()> {
        let frames = (0..6).map(|v| v as f32).collect();
        let video = Video::new(tensor(&[6, 1, 1, 1], frames)?)?.with_dtype(DType::U8);
        let image = Image::new(tensor(&[1, 1, 1], vec![0.5])?)?;
        let sample = Sample::new()
            .with_feature("video", video)
            .with_feature("poster", image.clone());

        let out = UniformTemporalSubsample::new(3)?.forward(sample)?;
        let Value::Datapoint(dp) = out.get_value("video")? else {
            return Err(anyhow!("video changed kind"));
        };
        assert_eq!(dp.data().iter().copied().collect::<Vec<_>>(), vec![0.0, 2.0, 5.0]);
        assert!(matches!(dp, crate::datapoints::Datapoint::Video(v) if v.dtype() == DType::U8));
        assert_eq!(out.get_value("poster")?, &Value::from(image));
        assert!(UniformTemporalSubsample::new(0).is_err());
        Ok(())
    }
}
