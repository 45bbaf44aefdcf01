use crate::datapoints::{
    BoundingBoxes, Datapoint, EncodedImage, Image, Label, Mask, OneHotLabel, Tensor, Value, Video,
};
use anyhow::{anyhow, bail, Result};
use image::DynamicImage;
use std::collections::BTreeMap;

/// The `Sample` enum represents a single data example in a vision pipeline.
///
/// A sample is an arbitrary nesting of mappings and sequences whose leaves are
/// [`Value`]s: typed datapoints that transforms act on, and pass-through
/// values (strings, numbers, plain metadata) that they leave alone.
///
/// Mappings are keyed by feature name and iterate in sorted key order, which
/// is also the order used when flattening (see [`crate::tree`]).
///
/// # Examples:
/// - A classification sample: `{"image": Image[3, 224, 224], "label": Label[]}`
/// - A detection sample: `{"image": Image, "boxes": BoundingBoxes[N, 4], "labels": Label[N]}`
/// - A bare image: `Leaf(Image)`
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Leaf(Value),
    Seq(Vec<Sample>),
    Map(BTreeMap<String, Sample>),
}

impl Default for Sample {
    fn default() -> Self {
        Sample::Map(BTreeMap::new())
    }
}

impl Sample {
    /// Creates an empty mapping sample.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mapping sample from a single `(feature_name, value)` pair.
    ///
    /// Chain with [`with_feature`](Self::with_feature) to add more features.
    pub fn from_single(name: impl Into<String>, value: impl Into<Sample>) -> Self {
        Sample::Map(BTreeMap::from([(name.into(), value.into())]))
    }

    /// Adds or overwrites a feature.
    ///
    /// A non-mapping sample is replaced by a mapping holding only the new feature.
    pub fn with_feature(self, name: impl Into<String>, value: impl Into<Sample>) -> Self {
        match self {
            Sample::Map(mut features) => {
                features.insert(name.into(), value.into());
                Sample::Map(features)
            }
            _ => Self::from_single(name, value),
        }
    }

    pub fn seq(items: impl IntoIterator<Item = Sample>) -> Self {
        Sample::Seq(items.into_iter().collect())
    }

    /// Returns the sub-sample stored under `feature`.
    pub fn get(&self, feature: &str) -> Result<&Sample> {
        match self {
            Sample::Map(features) => features
                .get(feature)
                .ok_or_else(|| anyhow!("Feature {} not found", feature)),
            _ => Err(anyhow!("Feature {} not found: sample is not a mapping", feature)),
        }
    }

    /// Returns the leaf value stored under `feature`.
    pub fn get_value(&self, feature: &str) -> Result<&Value> {
        match self.get(feature)? {
            Sample::Leaf(value) => Ok(value),
            _ => bail!("Feature {} is a container, not a value", feature),
        }
    }

    /// Returns an iterator over all feature names of a mapping sample.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        let keys = match self {
            Sample::Map(features) => Some(features.keys().map(String::as_str)),
            _ => None,
        };
        keys.into_iter().flatten()
    }

    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            Sample::Leaf(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_leaf(self) -> Result<Value> {
        match self {
            Sample::Leaf(value) => Ok(value),
            _ => bail!("Sample is a container, not a single value"),
        }
    }

    /// Borrows every leaf in flatten order.
    pub fn leaves(&self) -> Vec<&Value> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Value>) {
        match self {
            Sample::Leaf(value) => out.push(value),
            Sample::Seq(items) => items.iter().for_each(|s| s.collect_leaves(out)),
            Sample::Map(features) => features.values().for_each(|s| s.collect_leaves(out)),
        }
    }

    /// Merges two mapping samples. Duplicate feature names are an error.
    pub fn merge(self, other: Sample) -> Result<Sample> {
        match (self, other) {
            (Sample::Map(mut left), Sample::Map(right)) => {
                for (name, value) in right {
                    if left.contains_key(&name) {
                        bail!("Cannot merge samples: duplicate feature {}", name);
                    }
                    left.insert(name, value);
                }
                Ok(Sample::Map(left))
            }
            _ => bail!("Only mapping samples can be merged"),
        }
    }
}

impl From<Vec<Sample>> for Sample {
    fn from(items: Vec<Sample>) -> Self {
        Sample::Seq(items)
    }
}

impl From<BTreeMap<String, Sample>> for Sample {
    fn from(features: BTreeMap<String, Sample>) -> Self {
        Sample::Map(features)
    }
}

macro_rules! impl_leaf_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Sample {
                fn from(value: $ty) -> Self {
                    Sample::Leaf(Value::from(value))
                }
            }
        )*
    };
}

impl From<Value> for Sample {
    fn from(value: Value) -> Self {
        Sample::Leaf(value)
    }
}

impl_leaf_from!(
    Tensor,
    DynamicImage,
    EncodedImage,
    Datapoint,
    Image,
    Video,
    Mask,
    BoundingBoxes,
    Label,
    OneHotLabel,
    &str,
    String,
    i64,
    f64,
    bool,
);
