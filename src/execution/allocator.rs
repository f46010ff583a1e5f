//! Storage allocation for intermediate pipeline buffers.
//!
//! A region whose element count fits under the dense addressing ceiling gets
//! a single flat block. Larger regions are split into cubic cells whose
//! element count (times the kind's storage multiplier) stays under the same
//! ceiling. Either way the returned storage is positioned at the region's
//! minimum corner.

use crate::core::error::{ConvolutionError, ConvolutionResult};
use crate::core::img::{Img, ImgBuffer, NativeElement, StorageLayout};
use crate::core::interval::Interval;
use crate::core::types::{Argb, ElementKind};
use log::debug;
use serde::{Deserialize, Serialize};

/// Largest element count a dense block may hold by default.
///
/// Matches the index range of a signed 32-bit array.
pub const DEFAULT_MAX_DENSE_ELEMENTS: u64 = i32::MAX as u64;

/// Configuration for storage allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Addressing ceiling of a single linear block, in elements.
    pub max_dense_elements: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_dense_elements: DEFAULT_MAX_DENSE_ELEMENTS,
        }
    }
}

impl StorageConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dense addressing ceiling.
    pub fn with_max_dense_elements(mut self, max: u64) -> Self {
        self.max_dense_elements = max.max(1);
        self
    }
}

/// Creates storage for a region and element kind.
///
/// Alternative allocators may be plugged into a [`StageChain`] as long as
/// they return storage covering exactly the requested interval.
///
/// [`StageChain`]: crate::execution::chain::StageChain
pub trait Allocate: Send + Sync {
    /// Allocate zeroed storage positioned at `interval`.
    fn create(&self, interval: &Interval, kind: ElementKind) -> ConvolutionResult<ImgBuffer>;
}

/// Default allocator choosing between dense and cell layouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageAllocator {
    config: StorageConfig,
}

impl StorageAllocator {
    /// Create an allocator with the given configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Layout that [`StorageAllocator::create_img`] would use.
    pub fn layout_for(&self, interval: &Interval, kind: ElementKind) -> StorageLayout {
        let ceiling = self.config.max_dense_elements;
        if interval.num_elements() <= u128::from(ceiling) {
            return StorageLayout::Dense;
        }

        let per_cell = (ceiling / kind.storage_multiplier()).max(1);
        StorageLayout::Cells {
            cell_extent: integer_root(per_cell, interval.num_dimensions()),
        }
    }

    /// Allocate zeroed storage of a statically known sample type.
    pub fn create_img<T: NativeElement>(&self, interval: &Interval) -> ConvolutionResult<Img<T>> {
        match self.layout_for(interval, T::KIND) {
            StorageLayout::Dense => Img::new_dense(interval.clone()),
            StorageLayout::Cells { cell_extent } => {
                debug!(
                    "Allocating {} {} elements over {} in cells of extent {}",
                    interval.num_elements(),
                    T::KIND,
                    interval,
                    cell_extent
                );
                Img::new_cells(interval.clone(), cell_extent)
            }
        }
    }
}

impl Allocate for StorageAllocator {
    fn create(&self, interval: &Interval, kind: ElementKind) -> ConvolutionResult<ImgBuffer> {
        if interval.num_elements() > usize::MAX as u128 {
            return Err(ConvolutionError::StorageOverflow {
                elements: interval.num_elements(),
            });
        }

        Ok(match kind {
            ElementKind::Float64 => self.create_img::<f64>(interval)?.into(),
            ElementKind::Float32 => self.create_img::<f32>(interval)?.into(),
            ElementKind::Argb => self.create_img::<Argb>(interval)?.into(),
        })
    }
}

/// Largest `r >= 1` with `r^n <= value`.
fn integer_root(value: u64, n: usize) -> usize {
    let fits = |r: u64| {
        (0..n)
            .try_fold(1u64, |acc, _| acc.checked_mul(r))
            .is_some_and(|power| power <= value)
    };

    // Floating point seeds the search; the loops correct rounding either way.
    let mut root = (value as f64).powf(1.0 / n as f64) as u64;
    while root > 1 && !fits(root) {
        root -= 1;
    }
    while root.checked_add(1).is_some_and(fits) {
        root += 1;
    }
    usize::try_from(root.max(1)).unwrap_or(usize::MAX)
}
