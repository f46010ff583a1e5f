//! Convolution along a single axis.
//!
//! [`LineConvolution`] is the stage a separable filter is built from. It
//! walks every line of the target parallel to its axis, reads the matching
//! source line widened by the kernel support, and accumulates in `f64`.
//! Real kinds mix freely; packed [`Argb`] samples are convolved per channel
//! and rounded back into `0..=255`.

use crate::core::error::{ConvolutionError, ConvolutionResult};
use crate::core::img::{Img, NativeElement};
use crate::core::interval::Interval;
use crate::core::stage::{Stage, WorkerPool};
use crate::core::types::{Argb, ElementKind};
use crate::core::view::{Source, Target, TypedSource};
use crate::filters::kernel::Kernel1D;
use rayon::prelude::*;

/// Sample type that can be split into `f64` channels and rebuilt from them.
trait Convolvable: NativeElement {
    const CHANNELS: usize;

    fn split(self, out: &mut [f64]);

    fn merge(channels: &[f64]) -> Self;
}

impl Convolvable for f64 {
    const CHANNELS: usize = 1;

    fn split(self, out: &mut [f64]) {
        out[0] = self;
    }

    fn merge(channels: &[f64]) -> Self {
        channels[0]
    }
}

impl Convolvable for f32 {
    const CHANNELS: usize = 1;

    fn split(self, out: &mut [f64]) {
        out[0] = f64::from(self);
    }

    fn merge(channels: &[f64]) -> Self {
        channels[0] as f32
    }
}

impl Convolvable for Argb {
    const CHANNELS: usize = 4;

    fn split(self, out: &mut [f64]) {
        for (slot, channel) in out.iter_mut().zip(self.channels()) {
            *slot = f64::from(channel);
        }
    }

    fn merge(channels: &[f64]) -> Self {
        let mut packed = [0u8; 4];
        for (byte, value) in packed.iter_mut().zip(channels) {
            *byte = value.round().clamp(0.0, 255.0) as u8;
        }
        Argb::from(packed)
    }
}

/// Convolves along one axis with a [`Kernel1D`].
///
/// `out[p] = Σ_k kernel[k] · in[p − (k − center)]` along `axis`.
#[derive(Debug, Clone)]
pub struct LineConvolution {
    kernel: Kernel1D,
    axis: usize,
    working_kind: Option<ElementKind>,
    pool: Option<WorkerPool>,
}

impl LineConvolution {
    /// Create a stage convolving along `axis`.
    pub fn new(kernel: Kernel1D, axis: usize) -> Self {
        Self {
            kernel,
            axis,
            working_kind: None,
            pool: None,
        }
    }

    /// Ask for real sources in `kind` instead of the target's kind.
    pub fn with_working_kind(mut self, kind: ElementKind) -> Self {
        self.working_kind = Some(kind);
        self
    }

    /// Kernel applied along the axis.
    pub fn kernel(&self) -> &Kernel1D {
        &self.kernel
    }

    /// Axis the kernel runs along.
    pub fn axis(&self) -> usize {
        self.axis
    }

    fn convolve<S: Convolvable, T: Convolvable>(
        &self,
        source: &Source<'_>,
        target: &mut Target<'_>,
    ) -> ConvolutionResult<()> {
        let mismatch = || ConvolutionError::TypeMismatch {
            source_kind: source.kind(),
            target_kind: T::KIND,
        };
        let reader = source.typed::<S>().ok_or_else(mismatch)?;

        let interval = target.interval().clone();
        let axis = self.axis;
        let line_len = interval.dimension(axis) as usize;
        let first = interval.min_at(axis);
        let starts: Vec<Vec<i64>> = interval.with_axis(axis, first, first)?.positions().collect();

        let compute = |start: &Vec<i64>| self.convolve_line::<S, T>(&reader, start, line_len);
        let lines: Vec<Vec<T>> = match &self.pool {
            Some(pool) => pool.install(|| starts.par_iter().map(compute).collect()),
            None => starts.iter().map(compute).collect(),
        };

        let img = target.typed_mut::<T>().ok_or_else(mismatch)?;
        for (start, line) in starts.iter().zip(lines) {
            store_line(img, start, axis, line)?;
        }
        Ok(())
    }

    /// Convolve the target line beginning at `start`.
    fn convolve_line<S: Convolvable, T: Convolvable>(
        &self,
        reader: &TypedSource<'_, S>,
        start: &[i64],
        line_len: usize,
    ) -> Vec<T> {
        debug_assert_eq!(S::CHANNELS, T::CHANNELS);
        let weights = self.kernel.values();
        let taps = weights.len();
        let channels = S::CHANNELS;

        let mut source_start = start.to_vec();
        source_start[self.axis] -= self.kernel.max();
        let mut samples = vec![S::default(); line_len + taps - 1];
        reader.read_line(&source_start, self.axis, &mut samples);

        let mut input = vec![0.0; samples.len() * channels];
        for (sample, slot) in samples.into_iter().zip(input.chunks_exact_mut(channels)) {
            sample.split(slot);
        }

        let mut acc = vec![0.0; channels];
        (0..line_len)
            .map(|x| {
                acc.iter_mut().for_each(|a| *a = 0.0);
                for (k, &weight) in weights.iter().enumerate() {
                    let at = (x + taps - 1 - k) * channels;
                    for (a, &value) in acc.iter_mut().zip(&input[at..at + channels]) {
                        *a += weight * value;
                    }
                }
                T::merge(&acc)
            })
            .collect()
    }
}

/// Write `line` into `img` starting at `start`, stepping along `axis`.
fn store_line<T: NativeElement>(img: &mut Img<T>, start: &[i64], axis: usize, line: Vec<T>) -> ConvolutionResult<()> {
    let mut position = start.to_vec();
    for (offset, value) in line.into_iter().enumerate() {
        position[axis] = start[axis] + offset as i64;
        img.set(&position, value)?;
    }
    Ok(())
}

impl Stage for LineConvolution {
    fn name(&self) -> &str {
        "line_convolution"
    }

    fn required_source_interval(&self, target: &Interval) -> ConvolutionResult<Interval> {
        target.check_axis(self.axis)?;
        target.grow_axis(self.axis, self.kernel.max(), -self.kernel.min())
    }

    fn preferred_source_kind(&self, target: ElementKind) -> ElementKind {
        match self.working_kind {
            Some(kind) if kind.is_real() && target.is_real() => kind,
            _ => target,
        }
    }

    fn process(&self, source: &Source<'_>, target: &mut Target<'_>) -> ConvolutionResult<()> {
        let required = self.required_source_interval(target.interval())?;
        if !source.covers(&required) {
            return Err(ConvolutionError::SourceOutOfBounds { required });
        }

        match (source.kind(), target.kind()) {
            (ElementKind::Float64, ElementKind::Float64) => self.convolve::<f64, f64>(source, target),
            (ElementKind::Float64, ElementKind::Float32) => self.convolve::<f64, f32>(source, target),
            (ElementKind::Float32, ElementKind::Float64) => self.convolve::<f32, f64>(source, target),
            (ElementKind::Float32, ElementKind::Float32) => self.convolve::<f32, f32>(source, target),
            (ElementKind::Argb, ElementKind::Argb) => self.convolve::<Argb, Argb>(source, target),
            (source_kind, target_kind) => Err(ConvolutionError::TypeMismatch {
                source_kind,
                target_kind,
            }),
        }
    }

    fn bind_worker_pool(&mut self, pool: WorkerPool) {
        self.pool = Some(pool);
    }
}
