//! One-dimensional convolution kernels.

use crate::core::error::{ConvolutionError, ConvolutionResult};

/// Largest half size [`Kernel1D::gauss`] will build.
pub const MAX_GAUSS_HALF_SIZE: usize = 1 << 20;

/// A 1-D kernel with the index of its origin sample.
///
/// Offsets run from [`Kernel1D::min`] to [`Kernel1D::max`]; the sample at
/// index `center` sits at offset zero. The center may lie outside the
/// kernel, which shifts the whole support to one side of the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel1D {
    values: Vec<f64>,
    center: i64,
}

impl Kernel1D {
    /// Kernel with explicit `center` index.
    ///
    /// Fails when either end offset does not fit in an `i64`.
    pub fn asymmetric(values: impl Into<Vec<f64>>, center: i64) -> ConvolutionResult<Self> {
        let values = values.into();
        if values.is_empty() {
            return Err(ConvolutionError::InvalidKernel("kernel has no values".to_string()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ConvolutionError::InvalidKernel("kernel values must be finite".to_string()));
        }

        let last = i64::try_from(values.len() - 1).ok();
        let offsets_fit = center.checked_neg().is_some() && last.and_then(|l| l.checked_sub(center)).is_some();
        if !offsets_fit {
            return Err(ConvolutionError::InvalidKernel(format!(
                "center {} puts the kernel offsets out of range",
                center
            )));
        }
        Ok(Self { values, center })
    }

    /// Kernel centered on its middle sample, rounding down for even lengths.
    pub fn central_asymmetric(values: impl Into<Vec<f64>>) -> ConvolutionResult<Self> {
        let values = values.into();
        let center = values.len().saturating_sub(1) / 2;
        Self::asymmetric(values, center as i64)
    }

    /// Symmetric kernel from its half, `half[0]` being the center value.
    ///
    /// `[3, 2, 1]` yields `[1, 2, 3, 2, 1]` centered on index 2.
    pub fn symmetric(half: &[f64]) -> ConvolutionResult<Self> {
        if half.is_empty() {
            return Err(ConvolutionError::InvalidKernel("half kernel has no values".to_string()));
        }
        let values: Vec<f64> = half.iter().rev().chain(half.iter().skip(1)).copied().collect();
        Self::asymmetric(values, half.len() as i64 - 1)
    }

    /// Normalized Gaussian kernel with standard deviation `sigma`.
    ///
    /// The half kernel holds `max(2, floor(3σ + 0.5) + 1)` samples, at most
    /// [`MAX_GAUSS_HALF_SIZE`].
    pub fn gauss(sigma: f64) -> ConvolutionResult<Self> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(ConvolutionError::InvalidKernel(format!(
                "sigma must be positive and finite, got {}",
                sigma
            )));
        }
        Self::symmetric(&half_gauss(sigma)?)
    }

    /// One [`Kernel1D::asymmetric`] per axis.
    pub fn asymmetric_per_axis(kernels: &[(Vec<f64>, i64)]) -> ConvolutionResult<Vec<Self>> {
        kernels
            .iter()
            .map(|(values, center)| Self::asymmetric(values.clone(), *center))
            .collect()
    }

    /// One [`Kernel1D::central_asymmetric`] per axis.
    pub fn central_asymmetric_per_axis(kernels: &[Vec<f64>]) -> ConvolutionResult<Vec<Self>> {
        kernels.iter().map(|values| Self::central_asymmetric(values.clone())).collect()
    }

    /// One [`Kernel1D::symmetric`] per axis.
    pub fn symmetric_per_axis(halves: &[Vec<f64>]) -> ConvolutionResult<Vec<Self>> {
        halves.iter().map(|half| Self::symmetric(half)).collect()
    }

    /// One [`Kernel1D::gauss`] per axis.
    pub fn gauss_per_axis(sigmas: &[f64]) -> ConvolutionResult<Vec<Self>> {
        sigmas.iter().map(|&sigma| Self::gauss(sigma)).collect()
    }

    /// Kernel values, lowest offset first.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Index of the sample at offset zero.
    pub fn center(&self) -> i64 {
        self.center
    }

    /// Number of kernel values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`; constructors reject empty kernels.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Lowest offset covered by the kernel.
    pub fn min(&self) -> i64 {
        -self.center
    }

    /// Highest offset covered by the kernel.
    pub fn max(&self) -> i64 {
        self.values.len() as i64 - 1 - self.center
    }
}

/// Half of a normalized Gaussian, center sample first.
fn half_gauss(sigma: f64) -> ConvolutionResult<Vec<f64>> {
    let too_large = || {
        ConvolutionError::InvalidKernel(format!(
            "sigma {} needs more than {} samples per half kernel",
            sigma, MAX_GAUSS_HALF_SIZE
        ))
    };
    let radius = (3.0 * sigma + 0.5).floor();
    if radius >= MAX_GAUSS_HALF_SIZE as f64 {
        return Err(too_large());
    }
    let size = (radius as usize).checked_add(1).ok_or_else(too_large)?.max(2);
    let two_sq_sigma = 2.0 * sigma * sigma;

    let mut half: Vec<f64> = (0..size)
        .map(|x| {
            let x = x as f64;
            (-(x * x) / two_sq_sigma).exp()
        })
        .collect();

    // Every sample but the center appears twice in the full kernel.
    let sum = half[0] + 2.0 * half[1..].iter().sum::<f64>();
    for value in &mut half {
        *value /= sum;
    }
    Ok(half)
}
