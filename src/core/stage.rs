//! The Stage trait and the worker pool handle.
//!
//! A stage is one transformation step of a pipeline. It has a two-part
//! contract: propagation (which source interval and element kind it needs to
//! produce a requested target) and processing (reading the source and
//! writing the whole target). [`StageChain`] composes stages and is itself a
//! stage.
//!
//! [`StageChain`]: crate::execution::chain::StageChain

use crate::core::error::{ConvolutionError, ConvolutionResult};
use crate::core::img::NativeElement;
use crate::core::interval::Interval;
use crate::core::types::{Argb, ElementKind};
use crate::core::view::{Source, Target};
use std::sync::Arc;

/// Handle to the concurrent execution facility a stage may use internally.
///
/// The engine never creates, sizes, or shuts down a pool; it only forwards
/// the handle it was given.
pub type WorkerPool = Arc<rayon::ThreadPool>;

/// Trait implemented by every pipeline element.
pub trait Stage: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Smallest source interval needed to produce `target`.
    ///
    /// Must be monotonic: a larger target never yields a smaller source
    /// interval along any axis.
    fn required_source_interval(&self, target: &Interval) -> ConvolutionResult<Interval>;

    /// Element kind this stage wants its source expressed in, given the kind
    /// it must produce. Stages without a preference return `target`.
    fn preferred_source_kind(&self, target: ElementKind) -> ElementKind {
        target
    }

    /// Read from `source` and write every position of `target`.
    ///
    /// Reads stay inside `required_source_interval(target.interval())`. On
    /// failure the contents of `target` are unspecified.
    fn process(&self, source: &Source<'_>, target: &mut Target<'_>) -> ConvolutionResult<()>;

    /// Store a worker pool the stage may use internally. Without one the
    /// stage runs on the calling thread.
    fn bind_worker_pool(&mut self, pool: WorkerPool);
}

/// Copies its source into its target unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Stage for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn required_source_interval(&self, target: &Interval) -> ConvolutionResult<Interval> {
        Ok(target.clone())
    }

    fn process(&self, source: &Source<'_>, target: &mut Target<'_>) -> ConvolutionResult<()> {
        if source.kind() != target.kind() {
            return Err(ConvolutionError::TypeMismatch {
                source_kind: source.kind(),
                target_kind: target.kind(),
            });
        }
        if !source.covers(target.interval()) {
            return Err(ConvolutionError::SourceOutOfBounds {
                required: target.interval().clone(),
            });
        }

        match target.kind() {
            ElementKind::Float64 => copy_samples::<f64>(source, target),
            ElementKind::Float32 => copy_samples::<f32>(source, target),
            ElementKind::Argb => copy_samples::<Argb>(source, target),
        }
    }

    fn bind_worker_pool(&mut self, _pool: WorkerPool) {}
}

fn copy_samples<T: NativeElement>(source: &Source<'_>, target: &mut Target<'_>) -> ConvolutionResult<()> {
    let mismatch = || ConvolutionError::TypeMismatch {
        source_kind: source.kind(),
        target_kind: T::KIND,
    };
    let reader = source.typed::<T>().ok_or_else(mismatch)?;
    let interval = target.interval().clone();
    let img = target.typed_mut::<T>().ok_or_else(mismatch)?;

    for position in interval.positions() {
        img.set(&position, reader.sample(&position))?;
    }
    Ok(())
}
