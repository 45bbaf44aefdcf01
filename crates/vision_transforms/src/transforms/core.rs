use crate::datapoints::{Kind, Value};
use crate::dispatch::{registry, Dispatcher};
use crate::error::VisionError;
use crate::params::Params;
use crate::query;
use crate::rng::{worker_gen_bool, worker_gen_range};
use crate::sample::Sample;
use crate::tree::{flatten, rebuild};
use anyhow::{ensure, Context, Result};
use tracing::trace;

/// Kinds that carry a spatial layout.
pub const SPATIAL: &[Kind] = &[
    Kind::Tensor,
    Kind::Raster,
    Kind::Image,
    Kind::Video,
    Kind::Mask,
    Kind::BoundingBoxes,
];

/// Kinds that carry pixel values.
pub const PHOTOMETRIC: &[Kind] = &[Kind::Tensor, Kind::Raster, Kind::Image, Kind::Video];

/// A stage of a sample pipeline.
///
/// Every transform maps a whole [`Sample`] to a new one, so single nodes and
/// containers such as [`Compose`](super::Compose) are interchangeable. Stages
/// can be chained via `.then(...)`.
pub trait Transform: Send + Sync {
    /// Applies the transform, resolving kernels in `dispatcher`.
    fn forward_with(&self, sample: Sample, dispatcher: &Dispatcher) -> Result<Sample>;

    /// Applies the transform with the built-in kernels.
    fn forward(&self, sample: Sample) -> Result<Sample> {
        self.forward_with(sample, registry())
    }

    #[inline]
    fn then<T>(self, next: T) -> Chain<Self, T>
    where
        Self: Sized,
        T: Transform,
    {
        Chain::new(self, next)
    }
}

/// A single operation with shared per-call parameters.
///
/// `forward` flattens the sample, validates it, draws the parameters once and
/// hands the same [`Params`] to every leaf whose kind is in
/// [`transformed_kinds`](Self::transformed_kinds). Other leaves pass through
/// untouched.
pub trait TransformNode: Send + Sync {
    fn transformed_kinds(&self) -> &[Kind];

    /// Structural preconditions on the flattened sample.
    fn check_inputs(&self, _leaves: &[Value]) -> Result<()> {
        Ok(())
    }

    /// Called at most once per `forward`.
    fn get_params(&self, _leaves: &[Value]) -> Result<Params> {
        Ok(Params::new())
    }

    fn transform(&self, value: Value, params: &Params, dispatcher: &Dispatcher) -> Result<Value>;

    /// Probability of applying the node; the decision covers the whole sample.
    fn probability(&self) -> f64 {
        1.0
    }

    fn name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    fn needs_transform(&self, value: &Value) -> bool {
        value
            .kind()
            .is_some_and(|kind| self.transformed_kinds().contains(&kind))
    }
}

impl<T: TransformNode> Transform for T {
    fn forward_with(&self, sample: Sample, dispatcher: &Dispatcher) -> Result<Sample> {
        let (leaves, spec) = flatten(sample);
        self.check_inputs(&leaves)?;

        let p = self.probability();
        if p < 1.0 && !worker_gen_bool(p) {
            trace!(transform = self.name(), "skipped");
            return Ok(rebuild(leaves, &spec)?);
        }

        let params = self
            .get_params(&leaves)
            .with_context(|| format!("{}: failed to compute parameters", self.name()))?;
        let transformed = leaves
            .into_iter()
            .map(|leaf| {
                if self.needs_transform(&leaf) {
                    self.transform(leaf, &params, dispatcher)
                } else {
                    Ok(leaf)
                }
            })
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("{} failed", self.name()))?;
        Ok(rebuild(transformed, &spec)?)
    }
}

// ============================================================================
// Parameter helpers
// ============================================================================

pub(crate) fn check_probability(p: f64) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&p),
        "Probability must be in [0.0, 1.0] range (got {})",
        p
    );
    Ok(())
}

/// Validates a `(min, max)` range.
pub(crate) fn check_range(name: &str, (lo, hi): (f64, f64)) -> Result<()> {
    ensure!(
        lo.is_finite() && hi.is_finite() && lo <= hi,
        "{} range must satisfy min <= max (got ({}, {}))",
        name,
        lo,
        hi
    );
    Ok(())
}

/// Uniform draw from the closed range `[lo, hi]`.
pub(crate) fn uniform((lo, hi): (f64, f64)) -> f64 {
    worker_gen_range(lo..=hi)
}

/// `(height, width)` the sample's spatial leaves share: the first image-like
/// leaf's size, else the size of the first mask or canvas of the first boxes.
pub(crate) fn canvas_size(leaves: &[Value]) -> Result<(usize, usize)> {
    match query::image_size(leaves) {
        Ok(size) => Ok(size),
        Err(VisionError::NoImageFound) => leaves
            .iter()
            .find_map(query::spatial_size)
            .ok_or_else(|| VisionError::NoImageFound.into()),
        Err(e) => Err(e.into()),
    }
}

/// A chain of two transforms (`A` -> `B`)
#[derive(Debug)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> Chain<A, B> {
    /// Creates a new transform chain.
    /// Use [`Transform::then`] for better ergonomics. `Chain::new` is
    /// useful when building pipelines dynamically.
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A, B> Transform for Chain<A, B>
where
    A: Transform,
    B: Transform,
{
    fn forward_with(&self, sample: Sample, dispatcher: &Dispatcher) -> Result<Sample> {
        self.first
            .forward_with(sample, dispatcher)
            .and_then(|mid| self.second.forward_with(mid, dispatcher))
            .with_context(|| {
                format!(
                    "Transform chain failed: {} → {}",
                    std::any::type_name::<A>(),
                    std::any::type_name::<B>()
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoints::tensor;
    use crate::rng::init_worker_rng;
    use anyhow::anyhow;

    struct Negate;

    impl TransformNode for Negate {
        fn transformed_kinds(&self) -> &[Kind] {
            &[Kind::Tensor]
        }

        fn transform(&self, value: Value, _: &Params, _: &Dispatcher) -> Result<Value> {
            let t = value.as_tensor().ok_or_else(|| anyhow!("not a tensor"))?;
            Ok(t.mapv(|v| -v).into_shared().into())
        }
    }

    struct Fail;

    impl TransformNode for Fail {
        fn transformed_kinds(&self) -> &[Kind] {
            &[Kind::Tensor]
        }

        fn check_inputs(&self, _: &[Value]) -> Result<()> {
            Err(VisionError::incompatible("Fail", "always").into())
        }

        fn transform(&self, value: Value, _: &Params, _: &Dispatcher) -> Result<Value> {
            Ok(value)
        }
    }

    struct Coin;

    impl TransformNode for Coin {
        fn transformed_kinds(&self) -> &[Kind] {
            &[Kind::Tensor]
        }

        fn probability(&self) -> f64 {
            0.0
        }

        fn transform(&self, _: Value, _: &Params, _: &Dispatcher) -> Result<Value> {
            Err(anyhow!("must not run"))
        }
    }

    fn sample() -> Result<Sample> {
        Ok(Sample::new()
            .with_feature("x", tensor(&[1], vec![2.0])?)
            .with_feature("name", "keep"))
    }

    #[test]
    fn test_node_transforms_only_declared_kinds() -> Result<()> {
        let out = Negate.forward(sample()?)?;
        let x = out.get_value("x")?.as_tensor().map(|t| t.iter().copied().collect::<Vec<_>>());
        assert_eq!(x, Some(vec![-2.0]));
        assert_eq!(out.get_value("name")?, &Value::from("keep"));
        Ok(())
    }

    #[test]
    fn test_pipeline_construction_using_then() -> Result<()> {
        let out = Negate.then(Negate).forward(sample()?)?;
        assert_eq!(out, sample()?);
        Ok(())
    }

    #[test]
    fn test_zero_probability_skips_but_still_checks() -> Result<()> {
        init_worker_rng(0, 0, 1);
        assert_eq!(Coin.forward(sample()?)?, sample()?);
        Ok(())
    }

    #[test]
    fn test_pipeline_chain_error_context() -> Result<()> {
        let chain = Chain::new(Negate, Fail);
        let err = chain.forward(sample()?).unwrap_err();
        let msg = err.to_string();

        assert!(msg.contains("Transform chain failed"));
        assert!(msg.contains("Negate"));
        assert!(msg.contains("Fail"));
        assert!(matches!(
            err.downcast_ref::<VisionError>(),
            Some(VisionError::IncompatibleInput { .. })
        ));
        Ok(())
    }
}
