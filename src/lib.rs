//! # Separa - Staged Separable Convolution
//!
//! Separa runs chains of numeric stages over N-dimensional images. Its main
//! client is separable convolution: an N-D kernel that factors into N 1-D
//! kernels is applied one axis at a time, so the full N-D kernel is never
//! built.
//!
//! ## Features
//!
//! - **Stage Chains**: Compose any stages into one stage that plans its own input
//! - **Backward Planning**: Required source region and element kind per stage boundary
//! - **Buffer Recycling**: Intermediate storage is reused when a freed buffer fits
//! - **Large Regions**: Storage switches to a cell layout past the dense addressing ceiling
//! - **Parallel Lines**: Line stages use a bound rayon pool when one is given
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use separa::prelude::*;
//!
//! let region = Interval::from_dimensions(&[640, 480])?;
//! let input: ImgBuffer = Img::<f32>::new_dense(region.clone())?.into();
//! let mut output: ImgBuffer = Img::<f32>::new_dense(region)?.into();
//!
//! let blur = SeparableConvolution::new(Kernel1D::gauss_per_axis(&[2.0, 2.0])?)
//!     .with_working_kind(ElementKind::Float64)
//!     .build()?;
//! blur.process(&Source::extend_border(&input), &mut Target::new(&mut output))?;
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Intervals, element kinds, storage, views, the `Stage` trait, errors
//! - [`execution`]: Storage allocation and the `StageChain` composer
//! - [`filters`]: Kernels, the single-axis stage, and the separable builder
//!
//! ## Custom Stages
//!
//! Implement [`Stage`](crate::core::stage::Stage) and put the stage in a
//! [`StageChain`](crate::execution::chain::StageChain):
//!
//! ```rust,ignore
//! use separa::prelude::*;
//!
//! struct Shift(i64);
//!
//! impl Stage for Shift {
//!     fn required_source_interval(&self, target: &Interval) -> ConvolutionResult<Interval> {
//!         target.translate(&vec![-self.0; target.num_dimensions()])
//!     }
//!
//!     fn process(&self, source: &Source<'_>, target: &mut Target<'_>) -> ConvolutionResult<()> {
//!         // Read from `source`, write every position of `target`...
//!         Ok(())
//!     }
//!
//!     fn bind_worker_pool(&mut self, _pool: WorkerPool) {}
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod execution;
pub mod filters;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use separa::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::img::{Img, ImgBuffer, NativeElement, StorageLayout};
    pub use crate::core::interval::Interval;
    pub use crate::core::types::{Argb, ElementKind};

    // Stages and views
    pub use crate::core::stage::{Passthrough, Stage, WorkerPool};
    pub use crate::core::view::{Extension, Source, Target};

    // Errors
    pub use crate::core::error::{ConvolutionError, ConvolutionResult};

    // Execution
    pub use crate::execution::allocator::{Allocate, StorageAllocator, StorageConfig};
    pub use crate::execution::chain::{ChainOptions, ChainStats, StageChain, StageRequirement};

    // Filters
    pub use crate::filters::kernel::Kernel1D;
    pub use crate::filters::line::LineConvolution;
    pub use crate::filters::separable::{
        convolution, convolution_1d, convolve, gauss, gauss_convolve, SeparableConvolution,
    };
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "separa");
    }

    #[test]
    fn test_prelude_chain() {
        let chain = StageChain::new(vec![
            Box::new(Passthrough) as Box<dyn Stage>,
            Box::new(convolution_1d(Kernel1D::symmetric(&[1.0]).unwrap(), 0)),
        ])
        .unwrap();

        let region = Interval::from_dimensions(&[3]).unwrap();
        let input: ImgBuffer = Img::from_vec(region.clone(), vec![1.0f64, 2.0, 3.0]).unwrap().into();
        let mut output: ImgBuffer = Img::<f64>::new_dense(region).unwrap().into();

        let stats = chain
            .execute(&Source::new(&input), &mut Target::new(&mut output))
            .unwrap();
        assert_eq!(stats.allocations, 1);
        assert_eq!(output.as_img::<f64>().unwrap().to_vec(), vec![1.0, 2.0, 3.0]);
    }
}
