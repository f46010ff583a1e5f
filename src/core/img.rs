//! Typed sample storage positioned in N-dimensional space.
//!
//! An [`Img`] always addresses its samples by absolute position: the
//! minimum corner of its interval is the storage origin, so callers never
//! re-derive offsets. Two layouts exist:
//! - dense: one flat block, axis 0 varying fastest
//! - cells: the interval is split into cubic cells of a fixed extent, each
//!   cell its own flat block (border cells are clipped)
//!
//! [`ImgBuffer`] erases the sample type behind the [`ElementKind`] tag so a
//! pipeline can carry buffers of different kinds between stages.

use crate::core::error::{ConvolutionError, ConvolutionResult};
use crate::core::interval::Interval;
use crate::core::types::{Argb, ElementKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A statically known sample type with a matching [`ElementKind`].
pub trait NativeElement: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Tag of this sample type.
    const KIND: ElementKind;

    /// Erase the sample type.
    fn into_buffer(img: Img<Self>) -> ImgBuffer;

    /// Recover the typed image if `buffer` holds this sample type.
    fn from_buffer(buffer: &ImgBuffer) -> Option<&Img<Self>>;

    /// Mutable form of [`NativeElement::from_buffer`].
    fn from_buffer_mut(buffer: &mut ImgBuffer) -> Option<&mut Img<Self>>;
}

macro_rules! native_element {
    ($ty:ty, $variant:ident) => {
        impl NativeElement for $ty {
            const KIND: ElementKind = ElementKind::$variant;

            fn into_buffer(img: Img<Self>) -> ImgBuffer {
                ImgBuffer::$variant(img)
            }

            fn from_buffer(buffer: &ImgBuffer) -> Option<&Img<Self>> {
                match buffer {
                    ImgBuffer::$variant(img) => Some(img),
                    _ => None,
                }
            }

            fn from_buffer_mut(buffer: &mut ImgBuffer) -> Option<&mut Img<Self>> {
                match buffer {
                    ImgBuffer::$variant(img) => Some(img),
                    _ => None,
                }
            }
        }
    };
}

native_element!(f64, Float64);
native_element!(f32, Float32);
native_element!(Argb, Argb);

/// Physical layout of an [`Img`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum StorageLayout {
    /// Single linearly addressed block.
    Dense,
    /// Cubic cells of `cell_extent` samples per axis.
    Cells { cell_extent: usize },
}

/// One flat block of samples.
#[derive(Debug, Clone)]
struct Block<T> {
    strides: Vec<usize>,
    data: Vec<T>,
}

impl<T: NativeElement> Block<T> {
    fn zeroed(dims: &[usize]) -> ConvolutionResult<Self> {
        let len = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| ConvolutionError::StorageOverflow {
                elements: dims.iter().fold(1u128, |acc, &d| acc.saturating_mul(d as u128)),
            })?;
        Ok(Self {
            strides: strides_for(dims),
            data: vec![T::default(); len],
        })
    }
}

fn strides_for(dims: &[usize]) -> Vec<usize> {
    dims.iter()
        .scan(1usize, |stride, &d| {
            let current = *stride;
            *stride = stride.saturating_mul(d);
            Some(current)
        })
        .collect()
}

fn to_usize_dims(interval: &Interval) -> ConvolutionResult<Vec<usize>> {
    interval
        .dimensions()
        .into_iter()
        .map(|d| {
            usize::try_from(d).map_err(|_| ConvolutionError::StorageOverflow {
                elements: interval.num_elements(),
            })
        })
        .collect()
}

/// Sample storage over an [`Interval`].
#[derive(Debug, Clone)]
pub struct Img<T> {
    interval: Interval,
    cell_extent: Option<usize>,
    grid_strides: Vec<usize>,
    blocks: Vec<Block<T>>,
}

impl<T: NativeElement> Img<T> {
    /// Allocate zeroed dense storage.
    pub fn new_dense(interval: Interval) -> ConvolutionResult<Self> {
        let dims = to_usize_dims(&interval)?;
        let block = Block::zeroed(&dims)?;
        Ok(Self {
            grid_strides: vec![0; dims.len()],
            interval,
            cell_extent: None,
            blocks: vec![block],
        })
    }

    /// Allocate zeroed cell storage with `cell_extent` samples per cell axis.
    pub fn new_cells(interval: Interval, cell_extent: usize) -> ConvolutionResult<Self> {
        if cell_extent == 0 {
            return Err(ConvolutionError::InvalidInterval(
                "cell extent must be positive".to_string(),
            ));
        }

        let dims = to_usize_dims(&interval)?;
        let grid: Vec<u64> = dims
            .iter()
            .map(|&d| d.div_ceil(cell_extent) as u64)
            .collect();
        let grid_interval = Interval::from_dimensions(&grid)?;
        let grid_dims = to_usize_dims(&grid_interval)?;

        let blocks = grid_interval
            .positions()
            .map(|cell| {
                let block_dims: Vec<usize> = cell
                    .iter()
                    .zip(&dims)
                    .map(|(&g, &d)| (d - g as usize * cell_extent).min(cell_extent))
                    .collect();
                Block::zeroed(&block_dims)
            })
            .collect::<ConvolutionResult<Vec<_>>>()?;

        Ok(Self {
            interval,
            cell_extent: Some(cell_extent),
            grid_strides: strides_for(&grid_dims),
            blocks,
        })
    }

    /// Wrap `data` (flat order, axis 0 fastest) as dense storage.
    pub fn from_vec(interval: Interval, data: Vec<T>) -> ConvolutionResult<Self> {
        let expected = interval.num_elements();
        if expected != data.len() as u128 {
            return Err(ConvolutionError::LengthMismatch {
                expected,
                got: data.len(),
            });
        }
        let dims = to_usize_dims(&interval)?;
        Ok(Self {
            grid_strides: vec![0; dims.len()],
            interval,
            cell_extent: None,
            blocks: vec![Block {
                strides: strides_for(&dims),
                data,
            }],
        })
    }

    /// Build dense storage by evaluating `f` at every position.
    pub fn from_fn(interval: Interval, mut f: impl FnMut(&[i64]) -> T) -> ConvolutionResult<Self> {
        let data = interval.positions().map(|position| f(&position)).collect();
        Self::from_vec(interval, data)
    }

    /// Interval covered by this storage.
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Element kind of the samples.
    pub fn kind(&self) -> ElementKind {
        T::KIND
    }

    /// Physical layout.
    pub fn layout(&self) -> StorageLayout {
        match self.cell_extent {
            None => StorageLayout::Dense,
            Some(cell_extent) => StorageLayout::Cells { cell_extent },
        }
    }

    /// Sample at `position`, or `None` outside the interval.
    pub fn get(&self, position: &[i64]) -> Option<T> {
        let (block, offset) = self.locate(position)?;
        Some(self.blocks[block].data[offset])
    }

    /// Mutable sample at `position`, or `None` outside the interval.
    pub fn get_mut(&mut self, position: &[i64]) -> Option<&mut T> {
        let (block, offset) = self.locate(position)?;
        Some(&mut self.blocks[block].data[offset])
    }

    /// Write `value` at `position`.
    ///
    /// Fails with `OutOfBounds` when `position` lies outside the interval.
    pub fn set(&mut self, position: &[i64], value: T) -> ConvolutionResult<()> {
        match self.get_mut(position) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ConvolutionError::OutOfBounds {
                requested: Interval::new(position.to_vec(), position.to_vec())?,
                available: self.interval.clone(),
            }),
        }
    }

    /// Set every sample to `value`.
    pub fn fill(&mut self, value: T) {
        for block in &mut self.blocks {
            block.data.fill(value);
        }
    }

    /// All samples in flat order (axis 0 fastest), independent of layout.
    pub fn to_vec(&self) -> Vec<T> {
        self.interval
            .positions()
            .filter_map(|position| self.get(&position))
            .collect()
    }

    fn locate(&self, position: &[i64]) -> Option<(usize, usize)> {
        if !self.interval.contains_position(position) {
            return None;
        }
        let local = position
            .iter()
            .zip(self.interval.min())
            .map(|(&p, &m)| (p - m) as usize);

        match self.cell_extent {
            None => {
                let offset = local.zip(&self.blocks[0].strides).map(|(l, &s)| l * s).sum();
                Some((0, offset))
            }
            Some(extent) => {
                let cell: usize = local
                    .clone()
                    .zip(&self.grid_strides)
                    .map(|(l, &s)| (l / extent) * s)
                    .sum();
                let block = &self.blocks[cell];
                let offset = local.zip(&block.strides).map(|(l, &s)| (l % extent) * s).sum();
                Some((cell, offset))
            }
        }
    }
}

/// Storage whose sample type is known only through its [`ElementKind`].
#[derive(Debug, Clone)]
pub enum ImgBuffer {
    /// 64-bit float samples.
    Float64(Img<f64>),
    /// 32-bit float samples.
    Float32(Img<f32>),
    /// Packed color samples.
    Argb(Img<Argb>),
}

impl ImgBuffer {
    /// Element kind of the samples.
    pub fn kind(&self) -> ElementKind {
        match self {
            ImgBuffer::Float64(_) => ElementKind::Float64,
            ImgBuffer::Float32(_) => ElementKind::Float32,
            ImgBuffer::Argb(_) => ElementKind::Argb,
        }
    }

    /// Interval covered by the storage.
    pub fn interval(&self) -> &Interval {
        match self {
            ImgBuffer::Float64(img) => img.interval(),
            ImgBuffer::Float32(img) => img.interval(),
            ImgBuffer::Argb(img) => img.interval(),
        }
    }

    /// Physical layout.
    pub fn layout(&self) -> StorageLayout {
        match self {
            ImgBuffer::Float64(img) => img.layout(),
            ImgBuffer::Float32(img) => img.layout(),
            ImgBuffer::Argb(img) => img.layout(),
        }
    }

    /// Real value at `position` for real kinds.
    pub fn get_real(&self, position: &[i64]) -> Option<f64> {
        match self {
            ImgBuffer::Float64(img) => img.get(position),
            ImgBuffer::Float32(img) => img.get(position).map(f64::from),
            ImgBuffer::Argb(_) => None,
        }
    }

    /// Color at `position` for [`ElementKind::Argb`] storage.
    pub fn get_argb(&self, position: &[i64]) -> Option<Argb> {
        match self {
            ImgBuffer::Argb(img) => img.get(position),
            _ => None,
        }
    }

    /// Typed access.
    pub fn as_img<T: NativeElement>(&self) -> Option<&Img<T>> {
        T::from_buffer(self)
    }

    /// Mutable typed access.
    pub fn as_img_mut<T: NativeElement>(&mut self) -> Option<&mut Img<T>> {
        T::from_buffer_mut(self)
    }
}

impl<T: NativeElement> From<Img<T>> for ImgBuffer {
    fn from(img: Img<T>) -> Self {
        T::into_buffer(img)
    }
}
