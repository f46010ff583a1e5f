//! Filter module.
//!
//! Contains 1-D kernels, the single-axis convolution stage, and the
//! separable convolution builder.

pub mod kernel;
pub mod line;
pub mod separable;

pub use kernel::Kernel1D;
pub use line::LineConvolution;
pub use separable::{convolution, convolution_1d, convolve, gauss, gauss_convolve, SeparableConvolution};
