//! Flattening a sample tree into a list of leaves and rebuilding it.
//!
//! [`flatten`] walks the tree depth-first (sequence index order, mapping key
//! order) and moves every leaf into a flat `Vec<Value>`. The returned
//! [`TreeSpec`] is a structural template with one slot per leaf; [`rebuild`]
//! fills the slots back in the same order.
//!
//! ```text
//! {"boxes": B, "image": I, "meta": [s, n]}
//!        │ flatten
//!        ↓
//! leaves = [B, I, s, n]
//! spec   = Map[("boxes", Leaf), ("image", Leaf), ("meta", Seq[Leaf, Leaf])]
//! ```
//!
//! The walker only preserves structure; deciding which leaves a transform
//! touches is the transform's job.

use crate::datapoints::Value;
use crate::error::{VisionError, VisionResult};
use crate::sample::Sample;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeSpec {
    Leaf,
    Seq(Vec<TreeSpec>),
    Map(Vec<(String, TreeSpec)>),
}

impl TreeSpec {
    pub fn num_leaves(&self) -> usize {
        match self {
            TreeSpec::Leaf => 1,
            TreeSpec::Seq(items) => items.iter().map(TreeSpec::num_leaves).sum(),
            TreeSpec::Map(entries) => entries.iter().map(|(_, s)| s.num_leaves()).sum(),
        }
    }
}

/// Moves every leaf of `sample` into a flat list.
pub fn flatten(sample: Sample) -> (Vec<Value>, TreeSpec) {
    let mut leaves = Vec::new();
    let spec = flatten_into(sample, &mut leaves);
    (leaves, spec)
}

fn flatten_into(sample: Sample, leaves: &mut Vec<Value>) -> TreeSpec {
    match sample {
        Sample::Leaf(value) => {
            leaves.push(value);
            TreeSpec::Leaf
        }
        Sample::Seq(items) => TreeSpec::Seq(
            items
                .into_iter()
                .map(|item| flatten_into(item, leaves))
                .collect(),
        ),
        Sample::Map(features) => TreeSpec::Map(
            features
                .into_iter()
                .map(|(name, item)| (name, flatten_into(item, leaves)))
                .collect(),
        ),
    }
}

/// Rebuilds a sample with the structure of `spec` from `leaves`.
pub fn rebuild(leaves: Vec<Value>, spec: &TreeSpec) -> VisionResult<Sample> {
    let expected = spec.num_leaves();
    if leaves.len() != expected {
        return Err(VisionError::TreeMismatch {
            expected,
            actual: leaves.len(),
        });
    }
    let mut leaves = leaves.into_iter();
    Ok(rebuild_from(&mut leaves, spec))
}

fn rebuild_from(leaves: &mut std::vec::IntoIter<Value>, spec: &TreeSpec) -> Sample {
    match spec {
        // Lengths were checked up front.
        TreeSpec::Leaf => Sample::Leaf(leaves.next().unwrap_or(Value::None)),
        TreeSpec::Seq(items) => {
            Sample::Seq(items.iter().map(|s| rebuild_from(leaves, s)).collect())
        }
        TreeSpec::Map(entries) => Sample::Map(
            entries
                .iter()
                .map(|(name, s)| (name.clone(), rebuild_from(leaves, s)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}
