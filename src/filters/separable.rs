//! Separable convolution.
//!
//! An N-D kernel that is the outer product of N 1-D kernels is applied as N
//! [`LineConvolution`] stages, axis 0 first, composed into a [`StageChain`].
//! The full N-D kernel is never materialized.

use crate::core::error::ConvolutionResult;
use crate::core::stage::{Stage, WorkerPool};
use crate::core::types::ElementKind;
use crate::core::view::{Source, Target};
use crate::execution::allocator::StorageConfig;
use crate::execution::chain::{ChainOptions, StageChain};
use crate::filters::kernel::Kernel1D;
use crate::filters::line::LineConvolution;
use std::sync::Arc;

/// Builder for separable convolution chains.
#[derive(Debug, Clone)]
pub struct SeparableConvolution {
    kernels: Vec<Kernel1D>,
    working_kind: Option<ElementKind>,
    storage: StorageConfig,
    options: ChainOptions,
    pool: Option<WorkerPool>,
}

impl SeparableConvolution {
    /// One kernel per axis, `kernels[d]` applied along axis `d`.
    pub fn new(kernels: Vec<Kernel1D>) -> Self {
        Self {
            kernels,
            working_kind: None,
            storage: StorageConfig::default(),
            options: ChainOptions::default(),
            pool: None,
        }
    }

    /// Run intermediate passes in `kind`, e.g. `Float64` for a `Float32` target.
    pub fn with_working_kind(mut self, kind: ElementKind) -> Self {
        self.working_kind = Some(kind);
        self
    }

    /// Storage configuration for intermediate buffers.
    pub fn with_storage_config(mut self, config: StorageConfig) -> Self {
        self.storage = config;
        self
    }

    /// Enable/disable intermediate buffer recycling.
    pub fn with_buffer_reuse(mut self, reuse: bool) -> Self {
        self.options = self.options.with_buffer_reuse(reuse);
        self
    }

    /// Worker pool handed to every line stage.
    pub fn with_worker_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Kernels in axis order.
    pub fn kernels(&self) -> &[Kernel1D] {
        &self.kernels
    }

    /// Compose the line stages.
    ///
    /// Fails with `EmptyPipeline` when no kernels were given.
    pub fn build(&self) -> ConvolutionResult<StageChain> {
        let stages = self
            .kernels
            .iter()
            .enumerate()
            .map(|(axis, kernel)| {
                let stage = LineConvolution::new(kernel.clone(), axis);
                let stage = match self.working_kind {
                    Some(kind) => stage.with_working_kind(kind),
                    None => stage,
                };
                Box::new(stage) as Box<dyn Stage>
            })
            .collect();

        let mut chain = StageChain::new(stages)?
            .with_storage_config(self.storage)
            .with_options(self.options);
        if let Some(pool) = &self.pool {
            chain.bind_worker_pool(Arc::clone(pool));
        }
        Ok(chain)
    }
}

/// Single-axis convolution stage.
pub fn convolution_1d(kernel: Kernel1D, axis: usize) -> LineConvolution {
    LineConvolution::new(kernel, axis)
}

/// Chain convolving axis `d` with `kernels[d]`.
pub fn convolution(kernels: &[Kernel1D]) -> ConvolutionResult<StageChain> {
    SeparableConvolution::new(kernels.to_vec()).build()
}

/// Convolve `source` with `kernels` into `target`.
///
/// `source` must cover the target grown by every kernel's support, usually
/// through [`Source::extend_zero`] or [`Source::extend_border`].
pub fn convolve(kernels: &[Kernel1D], source: &Source<'_>, target: &mut Target<'_>) -> ConvolutionResult<()> {
    convolution(kernels)?.process(source, target)
}

/// Gaussian chain with one standard deviation per axis.
pub fn gauss(sigmas: &[f64]) -> ConvolutionResult<StageChain> {
    convolution(&Kernel1D::gauss_per_axis(sigmas)?)
}

/// Gaussian blur of `source` into `target`.
pub fn gauss_convolve(sigmas: &[f64], source: &Source<'_>, target: &mut Target<'_>) -> ConvolutionResult<()> {
    gauss(sigmas)?.process(source, target)
}
