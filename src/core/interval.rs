//! Axis-aligned integer regions in N-dimensional space.
//!
//! An [`Interval`] stores an inclusive minimum and maximum per axis. It is an
//! immutable value type: every operation returns a new interval. Element
//! counts are accumulated in `u128` so that no realistic region can overflow
//! the count before it is compared against an addressing ceiling.

use crate::core::error::{ConvolutionError, ConvolutionResult};
use std::fmt;

/// Axis-aligned box with inclusive bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    min: Vec<i64>,
    max: Vec<i64>,
}

impl Interval {
    /// Create an interval from its per-axis minimum and maximum (inclusive).
    ///
    /// Fails if the two corners differ in dimensionality, if there are no
    /// axes at all, or if `min > max` along any axis.
    pub fn new(min: impl Into<Vec<i64>>, max: impl Into<Vec<i64>>) -> ConvolutionResult<Self> {
        let min = min.into();
        let max = max.into();

        if min.len() != max.len() {
            return Err(ConvolutionError::DimensionMismatch {
                expected: min.len(),
                got: max.len(),
            });
        }
        if min.is_empty() {
            return Err(ConvolutionError::InvalidInterval(
                "an interval needs at least one axis".to_string(),
            ));
        }
        if let Some(axis) = (0..min.len()).find(|&d| min[d] > max[d]) {
            return Err(ConvolutionError::InvalidInterval(format!(
                "min {} exceeds max {} on axis {}",
                min[axis], max[axis], axis
            )));
        }

        Ok(Self { min, max })
    }

    /// Create an interval with origin at zero and the given extent per axis.
    pub fn from_dimensions(dimensions: &[u64]) -> ConvolutionResult<Self> {
        Self::from_min_size(vec![0; dimensions.len()], dimensions)
    }

    /// Create an interval from its minimum corner and per-axis extent.
    pub fn from_min_size(min: impl Into<Vec<i64>>, size: &[u64]) -> ConvolutionResult<Self> {
        let min = min.into();
        if min.len() != size.len() {
            return Err(ConvolutionError::DimensionMismatch {
                expected: min.len(),
                got: size.len(),
            });
        }

        let max = min
            .iter()
            .zip(size)
            .map(|(&lo, &extent)| {
                if extent == 0 {
                    return Err(ConvolutionError::InvalidInterval(
                        "zero extent along an axis".to_string(),
                    ));
                }
                i64::try_from(extent - 1)
                    .ok()
                    .and_then(|span| lo.checked_add(span))
                    .ok_or_else(|| {
                        ConvolutionError::InvalidInterval(format!(
                            "extent {} from {} overflows",
                            extent, lo
                        ))
                    })
            })
            .collect::<ConvolutionResult<Vec<_>>>()?;

        Self::new(min, max)
    }

    /// Number of axes.
    pub fn num_dimensions(&self) -> usize {
        self.min.len()
    }

    /// Minimum corner.
    pub fn min(&self) -> &[i64] {
        &self.min
    }

    /// Maximum corner (inclusive).
    pub fn max(&self) -> &[i64] {
        &self.max
    }

    /// Minimum along `axis`. Panics if `axis` is out of range.
    pub fn min_at(&self, axis: usize) -> i64 {
        self.min[axis]
    }

    /// Maximum along `axis`. Panics if `axis` is out of range.
    pub fn max_at(&self, axis: usize) -> i64 {
        self.max[axis]
    }

    /// Extent along `axis`. Panics if `axis` is out of range.
    pub fn dimension(&self, axis: usize) -> u64 {
        let span = i128::from(self.max[axis]) - i128::from(self.min[axis]) + 1;
        u64::try_from(span).unwrap_or(u64::MAX)
    }

    /// Extent along every axis.
    pub fn dimensions(&self) -> Vec<u64> {
        (0..self.num_dimensions()).map(|d| self.dimension(d)).collect()
    }

    /// Total number of elements, saturating at `u128::MAX`.
    pub fn num_elements(&self) -> u128 {
        (0..self.num_dimensions()).fold(1u128, |count, d| {
            count.saturating_mul(u128::from(self.dimension(d)))
        })
    }

    /// `true` iff `other` lies entirely inside `self`.
    ///
    /// Intervals of different dimensionality never contain each other.
    pub fn contains(&self, other: &Interval) -> bool {
        self.num_dimensions() == other.num_dimensions()
            && (0..self.num_dimensions())
                .all(|d| self.min[d] <= other.min[d] && other.max[d] <= self.max[d])
    }

    /// `true` iff `position` lies inside `self`.
    pub fn contains_position(&self, position: &[i64]) -> bool {
        position.len() == self.num_dimensions()
            && position
                .iter()
                .enumerate()
                .all(|(d, &p)| self.min[d] <= p && p <= self.max[d])
    }

    /// Shift the interval by `offset`.
    pub fn translate(&self, offset: &[i64]) -> ConvolutionResult<Self> {
        self.check_dimensions(offset.len())?;
        let shift = |corner: &[i64]| {
            corner
                .iter()
                .zip(offset)
                .map(|(&c, &o)| {
                    c.checked_add(o).ok_or_else(|| {
                        ConvolutionError::InvalidInterval(format!("translating {} by {} overflows", c, o))
                    })
                })
                .collect::<ConvolutionResult<Vec<_>>>()
        };
        Self::new(shift(&self.min)?, shift(&self.max)?)
    }

    /// Move the minimum of `axis` down by `below` and the maximum up by `above`.
    pub fn grow_axis(&self, axis: usize, below: i64, above: i64) -> ConvolutionResult<Self> {
        self.check_axis(axis)?;
        let overflow = || ConvolutionError::InvalidInterval(format!("growing axis {} overflows", axis));

        let mut min = self.min.clone();
        let mut max = self.max.clone();
        min[axis] = min[axis].checked_sub(below).ok_or_else(overflow)?;
        max[axis] = max[axis].checked_add(above).ok_or_else(overflow)?;
        Self::new(min, max)
    }

    /// Replace the bounds of `axis`.
    pub fn with_axis(&self, axis: usize, min: i64, max: i64) -> ConvolutionResult<Self> {
        self.check_axis(axis)?;
        let mut lower = self.min.clone();
        let mut upper = self.max.clone();
        lower[axis] = min;
        upper[axis] = max;
        Self::new(lower, upper)
    }

    /// Iterate every position in flat order (axis 0 varies fastest).
    pub fn positions(&self) -> Positions<'_> {
        Positions {
            interval: self,
            next: Some(self.min.clone()),
        }
    }

    pub(crate) fn check_dimensions(&self, got: usize) -> ConvolutionResult<()> {
        if got == self.num_dimensions() {
            Ok(())
        } else {
            Err(ConvolutionError::DimensionMismatch {
                expected: self.num_dimensions(),
                got,
            })
        }
    }

    pub(crate) fn check_axis(&self, axis: usize) -> ConvolutionResult<()> {
        if axis < self.num_dimensions() {
            Ok(())
        } else {
            Err(ConvolutionError::AxisOutOfRange {
                axis,
                dimensions: self.num_dimensions(),
            })
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}..={:?}", self.min, self.max)
    }
}

/// Iterator over the positions of an [`Interval`].
#[derive(Debug, Clone)]
pub struct Positions<'a> {
    interval: &'a Interval,
    next: Option<Vec<i64>>,
}

impl Iterator for Positions<'_> {
    type Item = Vec<i64>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;

        let mut following = current.clone();
        for d in 0..following.len() {
            if following[d] < self.interval.max[d] {
                following[d] += 1;
                self.next = Some(following);
                return Some(current);
            }
            following[d] = self.interval.min[d];
        }

        // Wrapped on every axis: `current` was the last position.
        Some(current)
    }
}
