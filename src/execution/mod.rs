//! Execution module.
//!
//! Composes stages into chains and allocates the intermediate storage they
//! run through.

pub mod allocator;
pub mod chain;

pub use allocator::{Allocate, StorageAllocator, StorageConfig, DEFAULT_MAX_DENSE_ELEMENTS};
pub use chain::{ChainOptions, ChainStats, StageChain, StageRequirement};
