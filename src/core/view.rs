//! Read and write views handed to [`Stage::process`].
//!
//! A [`Source`] is a read-only window onto an [`ImgBuffer`]. It may be
//! unbounded (reads outside the buffer are answered by its [`Extension`]) or
//! restricted to an interval. A [`Target`] is a writable sub-interval of an
//! [`ImgBuffer`]; a stage writes exactly the target interval.
//!
//! [`Stage::process`]: crate::core::stage::Stage::process

use crate::core::error::{ConvolutionError, ConvolutionResult};
use crate::core::img::{Img, ImgBuffer, NativeElement};
use crate::core::interval::Interval;
use crate::core::types::ElementKind;
use serde::{Deserialize, Serialize};

/// Out-of-bounds strategy of a [`Source`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extension {
    /// Reads must stay inside the buffer.
    #[default]
    None,
    /// Reads outside the buffer yield zero.
    Zero,
    /// Reads outside the buffer yield the nearest edge sample.
    Border,
}

/// Read-only view onto an [`ImgBuffer`].
#[derive(Debug, Clone)]
pub struct Source<'a> {
    buffer: &'a ImgBuffer,
    bounds: Option<Interval>,
    extension: Extension,
}

impl<'a> Source<'a> {
    /// View whose reads must stay inside `buffer`.
    pub fn new(buffer: &'a ImgBuffer) -> Self {
        Self::with_extension(buffer, Extension::None)
    }

    /// Unbounded view reading zero outside `buffer`.
    pub fn extend_zero(buffer: &'a ImgBuffer) -> Self {
        Self::with_extension(buffer, Extension::Zero)
    }

    /// Unbounded view clamping reads to the border of `buffer`.
    pub fn extend_border(buffer: &'a ImgBuffer) -> Self {
        Self::with_extension(buffer, Extension::Border)
    }

    /// View with an explicit out-of-bounds strategy.
    pub fn with_extension(buffer: &'a ImgBuffer, extension: Extension) -> Self {
        Self {
            buffer,
            bounds: None,
            extension,
        }
    }

    /// Same view, bounded to `interval`.
    pub fn restrict(&self, interval: &Interval) -> Self {
        Self {
            buffer: self.buffer,
            bounds: Some(interval.clone()),
            extension: self.extension,
        }
    }

    /// Element kind of the underlying buffer.
    pub fn kind(&self) -> ElementKind {
        self.buffer.kind()
    }

    /// Bounds set by [`Source::restrict`], if any.
    pub fn bounds(&self) -> Option<&Interval> {
        self.bounds.as_ref()
    }

    /// Out-of-bounds strategy.
    pub fn extension(&self) -> Extension {
        self.extension
    }

    /// Underlying storage, ignoring bounds and extension.
    pub fn buffer(&self) -> &'a ImgBuffer {
        self.buffer
    }

    /// Whether every position of `required` can be read from this view.
    pub fn covers(&self, required: &Interval) -> bool {
        let within_bounds = self.bounds.as_ref().map_or(true, |bounds| bounds.contains(required));
        let readable = match self.extension {
            Extension::None => self.buffer.interval().contains(required),
            Extension::Zero | Extension::Border => {
                self.buffer.interval().num_dimensions() == required.num_dimensions()
            }
        };
        within_bounds && readable
    }

    /// Typed reader, if the buffer holds samples of type `T`.
    pub fn typed<T: NativeElement>(&self) -> Option<TypedSource<'a, T>> {
        Some(TypedSource {
            img: self.buffer.as_img::<T>()?,
            extension: self.extension,
        })
    }
}

/// Reader over a typed image honoring an [`Extension`].
#[derive(Debug, Clone, Copy)]
pub struct TypedSource<'a, T> {
    img: &'a Img<T>,
    extension: Extension,
}

impl<T: NativeElement> TypedSource<'_, T> {
    /// Sample at `position`, applying the extension outside the image.
    ///
    /// With [`Extension::None`] an outside read yields zero; callers are
    /// expected to check [`Source::covers`] first.
    pub fn sample(&self, position: &[i64]) -> T {
        if let Some(value) = self.img.get(position) {
            return value;
        }
        match self.extension {
            Extension::None | Extension::Zero => T::default(),
            Extension::Border => {
                let interval = self.img.interval();
                let clamped: Vec<i64> = position
                    .iter()
                    .enumerate()
                    .map(|(d, &p)| p.clamp(interval.min_at(d), interval.max_at(d)))
                    .collect();
                self.img.get(&clamped).unwrap_or_default()
            }
        }
    }

    /// Read `out.len()` samples starting at `start`, stepping along `axis`.
    pub fn read_line(&self, start: &[i64], axis: usize, out: &mut [T]) {
        let mut position = start.to_vec();
        for (offset, slot) in out.iter_mut().enumerate() {
            position[axis] = start[axis] + offset as i64;
            *slot = self.sample(&position);
        }
    }
}

/// Writable window onto an [`ImgBuffer`].
#[derive(Debug)]
pub struct Target<'a> {
    buffer: &'a mut ImgBuffer,
    interval: Interval,
}

impl<'a> Target<'a> {
    /// Window covering the whole buffer.
    pub fn new(buffer: &'a mut ImgBuffer) -> Self {
        let interval = buffer.interval().clone();
        Self { buffer, interval }
    }

    /// Window covering `interval`, which must lie inside the buffer.
    pub fn restricted(buffer: &'a mut ImgBuffer, interval: Interval) -> ConvolutionResult<Self> {
        if !buffer.interval().contains(&interval) {
            return Err(ConvolutionError::OutOfBounds {
                requested: interval,
                available: buffer.interval().clone(),
            });
        }
        Ok(Self { buffer, interval })
    }

    /// Element kind of the underlying buffer.
    pub fn kind(&self) -> ElementKind {
        self.buffer.kind()
    }

    /// Interval this window writes.
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Typed writer, if the buffer holds samples of type `T`.
    pub fn typed_mut<T: NativeElement>(&mut self) -> Option<&mut Img<T>> {
        self.buffer.as_img_mut::<T>()
    }

    /// Read access to the underlying buffer.
    pub fn buffer(&self) -> &ImgBuffer {
        self.buffer
    }
}
