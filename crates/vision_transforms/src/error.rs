//! Error taxonomy shared by datapoints, the dispatcher and the transforms.
//!
//! Transforms and kernels return `anyhow::Result` so that pipelines can attach
//! context as errors travel outwards. The typed variants below stay reachable
//! through `anyhow::Error::downcast_ref::<VisionError>()`.

use crate::datapoints::Kind;
use thiserror::Error;

pub type VisionResult<T> = std::result::Result<T, VisionError>;

#[derive(Error, Debug)]
pub enum VisionError {
    /// Metadata is inconsistent with the payload shape.
    #[error("invalid {kind} value: {message}")]
    Validation { kind: Kind, message: String },

    /// No kernel (exact or fallback) for this operation and kind.
    #[error("no kernel registered for operation `{op}` on kind {kind}")]
    UnsupportedKind { op: String, kind: String },

    /// A kernel already exists for this (operation, kind) pair.
    #[error("kernel for operation `{op}` on kind {kind} is already registered")]
    Conflict { op: String, kind: Kind },

    /// The sample violates a structural precondition of a transform.
    #[error("{transform}: incompatible input: {message}")]
    IncompatibleInput {
        transform: &'static str,
        message: String,
    },

    /// A bounded parameter search ran out of attempts.
    #[error("{transform}: could not sample parameters: {message}")]
    Parameter {
        transform: &'static str,
        message: String,
    },

    #[error("no image or video found in the sample")]
    NoImageFound,

    #[error("failed to decode image")]
    Decode(#[source] image::ImageError),

    #[error("parameter `{name}`: {message}")]
    InvalidParam { name: String, message: String },

    #[error("rebuild expected {expected} leaves but got {actual}")]
    TreeMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl VisionError {
    pub(crate) fn validation(kind: Kind, message: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn incompatible(transform: &'static str, message: impl Into<String>) -> Self {
        Self::IncompatibleInput {
            transform,
            message: message.into(),
        }
    }

    pub(crate) fn parameter(transform: &'static str, message: impl Into<String>) -> Self {
        Self::Parameter {
            transform,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_param(name: &str, message: impl Into<String>) -> Self {
        Self::InvalidParam {
            name: name.to_string(),
            message: message.into(),
        }
    }
}
