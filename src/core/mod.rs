//! Core types and traits for the Separa pipeline engine.
//!
//! This module contains the foundational types every stage works with:
//! - Region algebra ([`Interval`])
//! - Element kinds and packed color samples
//! - Typed storage and the read/write views handed to stages
//! - The [`Stage`] contract
//! - Error types

pub mod error;
pub mod img;
pub mod interval;
pub mod stage;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use error::{ConvolutionError, ConvolutionResult};
pub use img::{Img, ImgBuffer, NativeElement, StorageLayout};
pub use interval::Interval;
pub use stage::{Passthrough, Stage, WorkerPool};
pub use types::{Argb, ElementKind};
pub use view::{Extension, Source, Target, TypedSource};
