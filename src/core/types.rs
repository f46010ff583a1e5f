//! Element representations stored in pipeline buffers.
//!
//! The set of representations is closed: every buffer holds exactly one
//! [`ElementKind`], and two buffers are storage-compatible only when their
//! kinds are equal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric storage kind of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// 64-bit floating point sample
    Float64,
    /// 32-bit floating point sample
    Float32,
    /// 32-bit packed alpha/red/green/blue color
    Argb,
}

impl ElementKind {
    /// Number of storage entities one element occupies.
    ///
    /// The chunked layout divides its addressing ceiling by this value when
    /// sizing cells.
    pub fn storage_multiplier(&self) -> u64 {
        match self {
            ElementKind::Float64 | ElementKind::Float32 | ElementKind::Argb => 1,
        }
    }

    /// Size in bytes of one element.
    pub fn bytes_per_element(&self) -> usize {
        match self {
            ElementKind::Float64 => 8,
            ElementKind::Float32 | ElementKind::Argb => 4,
        }
    }

    /// Whether this kind holds a single real value.
    pub fn is_real(&self) -> bool {
        matches!(self, ElementKind::Float64 | ElementKind::Float32)
    }

    /// Get the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            ElementKind::Float64 => "float64",
            ElementKind::Float32 => "float32",
            ElementKind::Argb => "argb",
        }
    }

    /// Get all kinds.
    pub fn all() -> &'static [ElementKind] {
        &[ElementKind::Float64, ElementKind::Float32, ElementKind::Argb]
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Packed 32-bit color, `0xAARRGGBB`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Argb(pub u32);

impl Argb {
    /// Pack four 8-bit channels.
    pub fn from_channels(alpha: u8, red: u8, green: u8, blue: u8) -> Self {
        Self(
            (u32::from(alpha) << 24)
                | (u32::from(red) << 16)
                | (u32::from(green) << 8)
                | u32::from(blue),
        )
    }

    /// Channels in `[alpha, red, green, blue]` order.
    pub fn channels(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Alpha channel.
    pub fn alpha(&self) -> u8 {
        self.channels()[0]
    }

    /// Red channel.
    pub fn red(&self) -> u8 {
        self.channels()[1]
    }

    /// Green channel.
    pub fn green(&self) -> u8 {
        self.channels()[2]
    }

    /// Blue channel.
    pub fn blue(&self) -> u8 {
        self.channels()[3]
    }
}

impl From<[u8; 4]> for Argb {
    fn from(channels: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(channels))
    }
}
