//! Identity and user-supplied transforms.

use super::core::{Transform, TransformNode};
use crate::datapoints::{Kind, Value};
use crate::dispatch::Dispatcher;
use crate::params::Params;
use crate::sample::Sample;
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// Returns its input unchanged.
#[derive(Debug, Clone, Default)]
pub struct Identity;

impl Transform for Identity {
    fn forward_with(&self, sample: Sample, _: &Dispatcher) -> Result<Sample> {
        Ok(sample)
    }
}

type LambdaFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Applies a closure to every leaf of the given kinds.
///
/// # Example
/// ```ignore
/// let scale = Lambda::new(vec![Kind::Tensor], |v| match v {
///     Value::Tensor(t) => Ok(t.mapv(|x| x * 2.0).into_shared().into()),
///     other => Ok(other),
/// });
/// ```
#[derive(Clone)]
pub struct Lambda {
    kinds: Vec<Kind>,
    f: LambdaFn,
}

impl Lambda {
    pub fn new<F>(kinds: Vec<Kind>, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self { kinds, f: Arc::new(f) }
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lambda").field("kinds", &self.kinds).finish()
    }
}

impl TransformNode for Lambda {
    fn transformed_kinds(&self) -> &[Kind] {
        &self.kinds
    }

    fn transform(&self, value: Value, _: &Params, _: &Dispatcher) -> Result<Value> {
        (self.f)(value)
    }
}
