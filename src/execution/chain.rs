//! Composition of stages into a single stage.
//!
//! A [`StageChain`] runs its stages strictly in order. Before running it
//! propagates the requested target backward through the stages, producing
//! one [`StageRequirement`] per stage boundary. It then executes forward:
//! the last stage writes straight into the caller's target, every other
//! stage writes into an intermediate buffer that is either freshly allocated
//! or recycled from two stages back.
//!
//! Recycling looks exactly one buffer back: the buffer consumed by the
//! previous stage. The caller's source is never a candidate.

use crate::core::error::{ConvolutionError, ConvolutionResult};
use crate::core::img::ImgBuffer;
use crate::core::interval::Interval;
use crate::core::stage::{Stage, WorkerPool};
use crate::core::types::ElementKind;
use crate::core::view::{Source, Target};
use crate::execution::allocator::{Allocate, StorageAllocator, StorageConfig};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Execution options for a [`StageChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainOptions {
    /// Whether intermediate buffers may be recycled within one call.
    pub reuse_buffers: bool,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            reuse_buffers: true,
        }
    }
}

impl ChainOptions {
    /// Create a new options builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable buffer recycling.
    pub fn with_buffer_reuse(mut self, reuse: bool) -> Self {
        self.reuse_buffers = reuse;
        self
    }
}

/// Element kind and interval needed at one stage boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRequirement {
    /// Element kind at this boundary.
    pub kind: ElementKind,
    /// Region needed at this boundary.
    pub interval: Interval,
}

/// Buffer bookkeeping of one [`StageChain::execute`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainStats {
    /// Intermediate buffers allocated fresh.
    pub allocations: usize,
    /// Intermediate buffers recycled from an earlier stage.
    pub reused: usize,
}

/// Intermediate output owned by the chain during one call.
struct Intermediate {
    buffer: ImgBuffer,
    interval: Interval,
}

impl Intermediate {
    fn source(&self) -> Source<'_> {
        Source::new(&self.buffer).restrict(&self.interval)
    }
}

/// Ordered list of stages exposed as one stage.
pub struct StageChain {
    stages: Vec<Box<dyn Stage>>,
    allocator: Arc<dyn Allocate>,
    options: ChainOptions,
}

impl StageChain {
    /// Compose `stages`, run first to last.
    ///
    /// Fails with [`ConvolutionError::EmptyPipeline`] if `stages` is empty.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> ConvolutionResult<Self> {
        if stages.is_empty() {
            return Err(ConvolutionError::EmptyPipeline);
        }
        Ok(Self {
            stages,
            allocator: Arc::new(StorageAllocator::default()),
            options: ChainOptions::default(),
        })
    }

    /// Use `allocator` for intermediate buffers.
    pub fn with_allocator(mut self, allocator: Arc<dyn Allocate>) -> Self {
        self.allocator = allocator;
        self
    }

    /// Use the default allocator with `config`.
    pub fn with_storage_config(self, config: StorageConfig) -> Self {
        self.with_allocator(Arc::new(StorageAllocator::new(config)))
    }

    /// Set execution options.
    pub fn with_options(mut self, options: ChainOptions) -> Self {
        self.options = options;
        self
    }

    /// Get the execution options.
    pub fn options(&self) -> &ChainOptions {
        &self.options
    }

    /// Stages in execution order.
    pub fn stages(&self) -> &[Box<dyn Stage>] {
        &self.stages
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always `false`; a chain holds at least one stage.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Requirements at every stage boundary for producing `interval` in `kind`.
    ///
    /// Index 0 is what the chain needs from its source, the last index is
    /// the requested `(kind, interval)`. The result always holds
    /// `len() + 1` entries.
    pub fn plan(&self, kind: ElementKind, interval: &Interval) -> ConvolutionResult<Vec<StageRequirement>> {
        let requested = StageRequirement {
            kind,
            interval: interval.clone(),
        };

        let mut plan = self
            .stages
            .iter()
            .rev()
            .try_fold(vec![requested], |mut plan, stage| {
                let downstream = &plan[plan.len() - 1];
                let upstream = StageRequirement {
                    kind: stage.preferred_source_kind(downstream.kind),
                    interval: stage.required_source_interval(&downstream.interval)?,
                };
                plan.push(upstream);
                Ok::<_, ConvolutionError>(plan)
            })?;

        plan.reverse();
        Ok(plan)
    }

    /// Run every stage from `source` into `target` and report buffer usage.
    pub fn execute(&self, source: &Source<'_>, target: &mut Target<'_>) -> ConvolutionResult<ChainStats> {
        let plan = self.plan(target.kind(), target.interval())?;
        debug!(
            "Running {} stages into {} target {}",
            self.stages.len(),
            target.kind(),
            target.interval()
        );

        let external = source.restrict(&plan[0].interval);
        let last = self.stages.len() - 1;
        let mut stats = ChainStats::default();
        let mut current: Option<Intermediate> = None;
        let mut available: Option<ImgBuffer> = None;

        for (i, stage) in self.stages.iter().enumerate() {
            let produced = {
                let stage_source = match &current {
                    Some(intermediate) => intermediate.source(),
                    None => external.clone(),
                };

                if i == last {
                    trace!("Stage {} ({}) writes the final target", i, stage.name());
                    stage.process(&stage_source, target)?;
                    None
                } else {
                    let needed = &plan[i + 1];
                    let mut buffer = match self.take_reusable(available.take(), needed) {
                        Some(buffer) => {
                            trace!("Stage {} ({}) reuses a {} buffer", i, stage.name(), buffer.interval());
                            stats.reused += 1;
                            buffer
                        }
                        None => {
                            trace!("Stage {} ({}) allocates {} {}", i, stage.name(), needed.kind, needed.interval);
                            stats.allocations += 1;
                            self.allocator.create(&needed.interval, needed.kind)?
                        }
                    };

                    let mut view = Target::restricted(&mut buffer, needed.interval.clone())?;
                    stage.process(&stage_source, &mut view)?;
                    Some(Intermediate {
                        buffer,
                        interval: needed.interval.clone(),
                    })
                }
            };

            // The buffer this stage consumed is free from here on.
            available = current.take().map(|consumed| consumed.buffer);
            current = produced;
        }

        Ok(stats)
    }

    fn take_reusable(&self, candidate: Option<ImgBuffer>, needed: &StageRequirement) -> Option<ImgBuffer> {
        if !self.options.reuse_buffers {
            return None;
        }
        candidate.filter(|buffer| buffer.kind() == needed.kind && buffer.interval().contains(&needed.interval))
    }
}

impl Stage for StageChain {
    fn name(&self) -> &str {
        "stage_chain"
    }

    fn required_source_interval(&self, target: &Interval) -> ConvolutionResult<Interval> {
        self.stages
            .iter()
            .rev()
            .try_fold(target.clone(), |interval, stage| stage.required_source_interval(&interval))
    }

    fn preferred_source_kind(&self, target: ElementKind) -> ElementKind {
        self.stages
            .iter()
            .rev()
            .fold(target, |kind, stage| stage.preferred_source_kind(kind))
    }

    fn process(&self, source: &Source<'_>, target: &mut Target<'_>) -> ConvolutionResult<()> {
        self.execute(source, target).map(|_| ())
    }

    fn bind_worker_pool(&mut self, pool: WorkerPool) {
        for stage in &mut self.stages {
            stage.bind_worker_pool(Arc::clone(&pool));
        }
    }
}

impl fmt::Debug for StageChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageChain")
            .field("stages", &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("allocator", &"<allocator>")
            .field("options", &self.options)
            .finish()
    }
}
