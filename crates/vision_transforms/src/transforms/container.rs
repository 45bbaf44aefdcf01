//! Containers composing other transforms.

use super::core::{check_probability, Transform};
use crate::dispatch::Dispatcher;
use crate::rng::{with_rng, worker_gen_bool};
use crate::sample::Sample;
use anyhow::{ensure, Context, Result};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::seq::SliceRandom;
use std::fmt;
use tracing::trace;

pub type BoxedTransform = Box<dyn Transform>;

fn run_all<'a>(
    transforms: impl IntoIterator<Item = &'a BoxedTransform>,
    mut sample: Sample,
    dispatcher: &Dispatcher,
) -> Result<Sample> {
    for (step, transform) in transforms.into_iter().enumerate() {
        sample = transform
            .forward_with(sample, dispatcher)
            .with_context(|| format!("pipeline step {step} failed"))?;
    }
    Ok(sample)
}

// ============================================================================
// Compose
// ============================================================================

/// Applies its transforms in order; each one sees the output of the previous.
#[derive(Default)]
pub struct Compose {
    transforms: Vec<BoxedTransform>,
}

impl Compose {
    pub fn new(transforms: Vec<BoxedTransform>) -> Self {
        Self { transforms }
    }

    /// Appends a transform.
    pub fn push(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl fmt::Debug for Compose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compose").field("len", &self.len()).finish()
    }
}

impl Transform for Compose {
    fn forward_with(&self, sample: Sample, dispatcher: &Dispatcher) -> Result<Sample> {
        run_all(&self.transforms, sample, dispatcher)
    }
}

// ============================================================================
// RandomApply
// ============================================================================

/// Applies all of its transforms with probability `p`, as one unit.
pub struct RandomApply {
    transforms: Vec<BoxedTransform>,
    p: f64,
}

impl RandomApply {
    pub fn new(transforms: Vec<BoxedTransform>, p: f64) -> Result<Self> {
        check_probability(p)?;
        Ok(Self { transforms, p })
    }
}

impl Transform for RandomApply {
    fn forward_with(&self, sample: Sample, dispatcher: &Dispatcher) -> Result<Sample> {
        if !worker_gen_bool(self.p) {
            return Ok(sample);
        }
        run_all(&self.transforms, sample, dispatcher)
    }
}

// ============================================================================
// RandomChoice
// ============================================================================

/// Applies exactly one of its transforms, picked by weight.
pub struct RandomChoice {
    transforms: Vec<BoxedTransform>,
    weights: WeightedIndex<f64>,
}

impl RandomChoice {
    /// Equal weights.
    pub fn new(transforms: Vec<BoxedTransform>) -> Result<Self> {
        let weights = vec![1.0; transforms.len()];
        Self::with_weights(transforms, weights)
    }

    pub fn with_weights(transforms: Vec<BoxedTransform>, weights: Vec<f64>) -> Result<Self> {
        ensure!(!transforms.is_empty(), "RandomChoice needs at least one transform");
        ensure!(
            weights.len() == transforms.len(),
            "got {} weights for {} transforms",
            weights.len(),
            transforms.len()
        );
        let weights = WeightedIndex::new(&weights).context("invalid RandomChoice weights")?;
        Ok(Self {
            transforms,
            weights,
        })
    }
}

impl Transform for RandomChoice {
    fn forward_with(&self, sample: Sample, dispatcher: &Dispatcher) -> Result<Sample> {
        let index = with_rng(|rng| self.weights.sample(rng));
        trace!(index, "RandomChoice picked transform");
        self.transforms[index].forward_with(sample, dispatcher)
    }
}

// ============================================================================
// RandomOrder
// ============================================================================

/// Applies all of its transforms in a random order.
pub struct RandomOrder {
    transforms: Vec<BoxedTransform>,
}

impl RandomOrder {
    pub fn new(transforms: Vec<BoxedTransform>) -> Self {
        Self { transforms }
    }
}

impl Transform for RandomOrder {
    fn forward_with(&self, sample: Sample, dispatcher: &Dispatcher) -> Result<Sample> {
        let mut order: Vec<usize> = (0..self.transforms.len()).collect();
        with_rng(|rng| order.shuffle(rng));
        run_all(order.iter().map(|&i| &self.transforms[i]), sample, dispatcher)
    }
}
