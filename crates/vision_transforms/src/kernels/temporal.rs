use crate::datapoints::Tensor;
use crate::dispatch::DispatcherBuilder;
use crate::error::VisionResult;
use crate::params::Params;
use anyhow::{ensure, Result};
use ndarray::Axis;

pub(crate) fn register(b: &mut DispatcherBuilder) -> VisionResult<()> {
    b.register("uniform_temporal_subsample", uniform_temporal_subsample)?;
    Ok(())
}

/// Evenly spaced frame indices over `0..num_frames`, truncated towards zero.
pub fn temporal_indices(num_frames: usize, num_samples: usize) -> Vec<usize> {
    if num_samples == 1 {
        return vec![0];
    }
    let last = (num_frames - 1) as f64;
    let step = last / (num_samples - 1) as f64;
    (0..num_samples)
        .map(|i| ((i as f64 * step) as usize).min(num_frames - 1))
        .collect()
}

/// Picks `num_samples` frames along the time axis of `[..., T, C, H, W]`.
pub fn uniform_temporal_subsample(t: Tensor, params: &Params) -> Result<Tensor> {
    ensure!(
        t.ndim() >= 4,
        "expected a video [..., T, C, H, W], got shape {:?}",
        t.shape()
    );
    let num_samples = params.usize("num_samples")?;
    let axis = Axis(t.ndim() - 4);
    let num_frames = t.len_of(axis);
    ensure!(num_samples > 0, "num_samples must be positive");
    ensure!(num_frames > 0, "cannot subsample a video without frames");

    let indices = temporal_indices(num_frames, num_samples);
    Ok(t.select(axis, &indices).into_shared())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoints::tensor;

    #[test]
    fn test_indices_match_linspace() {
        assert_eq!(temporal_indices(10, 4), vec![0, 3, 6, 9]);
        assert_eq!(temporal_indices(5, 1), vec![0]);
        // Oversampling repeats frames.
        assert_eq!(temporal_indices(2, 4), vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_subsample_picks_frames() -> Result<()> {
        let video = tensor(&[4, 1, 1, 1], vec![0.0, 1.0, 2.0, 3.0])?;
        let params = Params::new().with("num_samples", 2usize);
        let out = uniform_temporal_subsample(video, &params)?;
        assert_eq!(out.shape(), &[2, 1, 1, 1]);
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![0.0, 3.0]);
        Ok(())
    }
}
