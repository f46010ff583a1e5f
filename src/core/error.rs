//! Error types for Separa.
//!
//! Uses thiserror for structured errors with context. Two families exist:
//! - Precondition violations (malformed intervals, empty stage lists,
//!   unaddressable storage). These are programming errors and are never
//!   repaired or coerced.
//! - Runtime failures raised by a stage (type mismatches, stage-internal
//!   faults). These propagate unchanged through a [`StageChain`].
//!
//! [`StageChain`]: crate::execution::chain::StageChain

use crate::core::interval::Interval;
use crate::core::types::ElementKind;
use thiserror::Error;

/// Top-level error type for Separa.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvolutionError {
    #[error("Type mismatch: cannot process a {source_kind} source into a {target_kind} target")]
    TypeMismatch {
        source_kind: ElementKind,
        target_kind: ElementKind,
    },

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Dimension mismatch: expected {expected} dimensions, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Axis {axis} is out of range for a {dimensions}-dimensional interval")]
    AxisOutOfRange { axis: usize, dimensions: usize },

    #[error("Stage list is empty")]
    EmptyPipeline,

    #[error("Storage overflow: {elements} elements cannot be addressed")]
    StorageOverflow { elements: u128 },

    #[error("Source does not cover the required interval {required}")]
    SourceOutOfBounds { required: Interval },

    #[error("Interval {requested} is not contained in {available}")]
    OutOfBounds {
        requested: Interval,
        available: Interval,
    },

    #[error("Invalid kernel: {0}")]
    InvalidKernel(String),

    #[error("Data length {got} does not match interval size {expected}")]
    LengthMismatch { expected: u128, got: usize },

    #[error("Stage '{stage}' failed: {error}")]
    StageFailed { stage: String, error: String },
}

impl ConvolutionError {
    /// Check if this error is a programming error rather than a runtime failure.
    ///
    /// Precondition violations are reported at the point of detection; the
    /// engine never attempts to recover from them.
    pub fn is_precondition_violation(&self) -> bool {
        !matches!(
            self,
            ConvolutionError::TypeMismatch { .. } | ConvolutionError::StageFailed { .. }
        )
    }

    /// Wrap an arbitrary stage-internal failure.
    pub fn stage_failed(stage: impl Into<String>, error: impl ToString) -> Self {
        ConvolutionError::StageFailed {
            stage: stage.into(),
            error: error.to_string(),
        }
    }
}

/// Result type alias for Separa operations.
pub type ConvolutionResult<T> = Result<T, ConvolutionError>;
