// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame refinement state machine.
//!
//! The [`RenderStepScheduler`] owns the cursor `(finished_layer,
//! current_prog)` and the [`EffortEstimator`]. Each frame it turns a work
//! budget into exactly one bounded fill:
//!
//! ```text
//!   finished == N ──► Terminal: render layer N-1 in full ──► (N-1, 0)
//!        │
//!   finished == N-1, prog == 0, some layer fits the budget
//!        └──► FastForward: render the finest fitting layer f in full ──► (f, 0)
//!
//!   otherwise, l = finished - 1:
//!        prog == 0 ──► copy layer l+1 into l
//!        fill columns [prog, prog + lines) through the stencil
//!        prog == width(l) ──► (l, 0)
//!
//!   finished == 0 ──► Idle
//! ```
//!
//! `lines = min(width - prog, max(min_lines, budget * line_factor / height))`.
//! A stencil-masked column of height `h` writes `h / pitch` pixels, so that
//! is the work it is charged for; full renders are charged their area.

use crate::backend::{ImageLayout, RenderBackend, RenderMode, ScanlineFill};
use crate::estimator::{EffortEstimator, EstimatorConfig};
use crate::layer::{InterlaceConfig, LayerIndex, LayerPyramid};
use crate::params::FractalUniforms;
use crate::timing::{Measurement, TimingInstrument};

/// What a soft (navigation) invalidation does to the estimator history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SoftInvalidationPolicy {
    /// Keep the history; throughput rarely changes with a small pan.
    #[default]
    KeepHistory,
    /// Drop the history, as a hard invalidation does.
    ClearHistory,
}

/// Configuration for the [`RenderStepScheduler`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerConfig {
    /// Estimator tuning.
    pub estimator: EstimatorConfig,
    /// Interlace pitch and line budget conversion.
    pub interlace: InterlaceConfig,
    /// History handling on soft invalidation.
    pub soft_invalidation: SoftInvalidationPolicy,
}

impl SchedulerConfig {
    /// Default tuning.
    pub const DEFAULT: Self = Self {
        estimator: EstimatorConfig::DEFAULT,
        interlace: InterlaceConfig::DEFAULT,
        soft_invalidation: SoftInvalidationPolicy::KeepHistory,
    };
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The refinement cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScheduleState {
    /// Finest complete layer; `layer_count` when nothing is complete.
    pub finished_layer: u32,
    /// Columns of layer `finished_layer - 1` filled so far.
    pub current_prog: u32,
}

impl ScheduleState {
    /// Nothing rendered.
    #[must_use]
    pub const fn restart(layer_count: u32) -> Self {
        Self {
            finished_layer: layer_count,
            current_prog: 0,
        }
    }

    /// Whether the finest layer is complete.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.finished_layer == 0
    }
}

/// Which branch of the state machine a step took.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// Rendered the terminal layer in full.
    Terminal,
    /// Rendered a whole refining layer that fit the budget.
    FastForward,
    /// Filled a column range through the stencil.
    Refine,
    /// Nothing left to do.
    Idle,
}

/// Per-frame inputs to [`RenderStepScheduler::step`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepInput {
    /// Timing slot of this frame.
    pub slot: usize,
    /// Work budget from the estimator.
    pub budget: u64,
    /// Parameters for the per-pixel stage.
    pub uniforms: FractalUniforms,
}

/// What a step did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    /// Branch taken.
    pub kind: StepKind,
    /// Layer filled, if any.
    pub layer: Option<LayerIndex>,
    /// Pipeline variant of the fill, if any.
    pub mode: Option<RenderMode>,
    /// First column filled.
    pub first_column: u32,
    /// Columns filled.
    pub lines: u32,
    /// Work charged for the fill.
    pub work: u64,
    /// Whether the layer was seeded from the coarser one first.
    pub copied: bool,
    /// Whether the filled layer is now complete.
    pub completed: bool,
    /// Cursor after the step.
    pub state: ScheduleState,
}

impl StepOutcome {
    fn idle(state: ScheduleState) -> Self {
        Self {
            kind: StepKind::Idle,
            layer: None,
            mode: None,
            first_column: 0,
            lines: 0,
            work: 0,
            copied: false,
            completed: false,
            state,
        }
    }
}

/// Drives progressive refinement of a [`LayerPyramid`].
#[derive(Clone, Debug)]
pub struct RenderStepScheduler {
    config: SchedulerConfig,
    state: ScheduleState,
    estimator: EffortEstimator,
    layer_count: u32,
    /// Target of the fast-forward since the last restart; the refining
    /// layers between it and the terminal layer are never rendered.
    fast_forwarded: Option<LayerIndex>,
}

impl RenderStepScheduler {
    /// Creates a scheduler for a pyramid of `layer_count` layers.
    #[must_use]
    pub fn new(config: SchedulerConfig, layer_count: u32) -> Self {
        Self {
            config,
            state: ScheduleState::restart(layer_count),
            estimator: EffortEstimator::new(config.estimator),
            layer_count,
            fast_forwarded: None,
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current cursor.
    #[must_use]
    pub fn state(&self) -> ScheduleState {
        self.state
    }

    /// Layers in the pyramid this scheduler drives.
    #[must_use]
    pub fn layer_count(&self) -> u32 {
        self.layer_count
    }

    /// The effort model.
    #[must_use]
    pub fn estimator(&self) -> &EffortEstimator {
        &self.estimator
    }

    /// Layer the schedule fast-forwarded to since the last restart, if any.
    #[must_use]
    pub fn fast_forwarded(&self) -> Option<LayerIndex> {
        self.fast_forwarded
    }

    /// Share of the work between the last restart and idle that is done,
    /// in `[0, 1]`.
    ///
    /// Full renders count their area and refinement counts `height / pitch`
    /// per column, as fills are charged. Layers skipped by a fast-forward
    /// count for nothing.
    #[must_use]
    pub fn progress(&self, pyramid: &LayerPyramid) -> f64 {
        let n = self.layer_count;
        let pitch = u64::from(self.config.interlace.pitch.max(1));
        let skipped_above = self.fast_forwarded.map(LayerIndex::get);
        let weight = |l: u32| {
            let area = pyramid.layer(LayerIndex(l)).extent.area();
            match skipped_above {
                _ if l == n - 1 => area,
                Some(f) if l == f => area,
                Some(f) if l > f => 0,
                _ => area / pitch,
            }
        };
        let total: u64 = (0..n).map(weight).sum();
        let ScheduleState {
            finished_layer,
            current_prog,
        } = self.state;
        let mut done: u64 = (finished_layer..n).map(weight).sum();
        if finished_layer > 0 && finished_layer < n {
            let height = pyramid.layer(LayerIndex(finished_layer - 1)).extent.height;
            done += u64::from(current_prog) * u64::from(height) / pitch;
        }
        if total == 0 {
            0.0
        } else {
            done as f64 / total as f64
        }
    }

    /// Feeds a fill timing to the estimator. Returns whether it was kept.
    pub fn observe(&mut self, measurement: &Measurement, weight: f64) -> bool {
        self.estimator
            .push(measurement.seconds, measurement.work, weight)
    }

    /// Work that fits in `seconds`.
    #[must_use]
    pub fn budget(&self, seconds: f64) -> u64 {
        self.estimator.predict_work(seconds)
    }

    /// Restarts refinement. History is kept or dropped per
    /// [`SchedulerConfig::soft_invalidation`].
    pub fn invalidate(&mut self) {
        self.state = ScheduleState::restart(self.layer_count);
        self.fast_forwarded = None;
        if self.config.soft_invalidation == SoftInvalidationPolicy::ClearHistory {
            self.estimator.reset();
        }
    }

    /// Restarts refinement and drops the estimator history.
    pub fn hard_invalidate(&mut self) {
        self.state = ScheduleState::restart(self.layer_count);
        self.fast_forwarded = None;
        self.estimator.reset();
    }

    /// Adopts a rebuilt pyramid and restarts refinement.
    pub fn rebuild(&mut self, layer_count: u32) {
        self.layer_count = layer_count;
        self.state = ScheduleState::restart(layer_count);
        self.fast_forwarded = None;
    }

    /// Runs one step: at most one copy and one fill.
    ///
    /// # Panics
    ///
    /// Panics if `pyramid` does not have [`layer_count`](Self::layer_count)
    /// layers.
    pub fn step<B: RenderBackend + ?Sized>(
        &mut self,
        pyramid: &mut LayerPyramid,
        backend: &mut B,
        timing: &mut TimingInstrument,
        input: &StepInput,
    ) -> StepOutcome {
        let n = pyramid.layer_count();
        assert_eq!(n, self.layer_count, "pyramid does not match the scheduler");
        let ScheduleState {
            finished_layer,
            current_prog,
        } = self.state;

        let outcome = if finished_layer == 0 {
            StepOutcome::idle(self.state)
        } else if finished_layer == n {
            self.render_full(pyramid, backend, timing, input, n - 1, StepKind::Terminal)
        } else {
            let fast_forward = if finished_layer == n - 1 && current_prog == 0 {
                self.fast_forward_target(pyramid, input.budget)
            } else {
                None
            };
            match fast_forward {
                Some(l) => {
                    self.fast_forwarded = Some(LayerIndex(l));
                    self.render_full(pyramid, backend, timing, input, l, StepKind::FastForward)
                }
                None => self.refine(pyramid, backend, timing, input, finished_layer - 1),
            }
        };
        debug_assert!(self.state_is_consistent(pyramid), "{:?}", self.state);
        outcome
    }

    /// Finest refining layer such that it and every coarser refining layer
    /// fit `budget` in full.
    fn fast_forward_target(&self, pyramid: &LayerPyramid, budget: u64) -> Option<u32> {
        let mut target = None;
        for l in (0..self.layer_count - 1).rev() {
            let extent = pyramid.layer(LayerIndex(l)).extent;
            if budget / u64::from(extent.height) >= u64::from(extent.width) {
                target = Some(l);
            } else {
                break;
            }
        }
        target
    }

    fn render_full<B: RenderBackend + ?Sized>(
        &mut self,
        pyramid: &mut LayerPyramid,
        backend: &mut B,
        timing: &mut TimingInstrument,
        input: &StepInput,
        layer: u32,
        kind: StepKind,
    ) -> StepOutcome {
        let index = LayerIndex(layer);
        let extent = pyramid.layer(index).extent;
        let work = extent.area();
        fill(pyramid, backend, timing, input, index, 0, extent.width, RenderMode::Simple, work);
        self.state = ScheduleState {
            finished_layer: layer,
            current_prog: 0,
        };
        StepOutcome {
            kind,
            layer: Some(index),
            mode: Some(RenderMode::Simple),
            first_column: 0,
            lines: extent.width,
            work,
            copied: false,
            completed: true,
            state: self.state,
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "line count is clamped to the layer width, a u32"
    )]
    fn refine<B: RenderBackend + ?Sized>(
        &mut self,
        pyramid: &mut LayerPyramid,
        backend: &mut B,
        timing: &mut TimingInstrument,
        input: &StepInput,
        layer: u32,
    ) -> StepOutcome {
        let index = LayerIndex(layer);
        let extent = pyramid.layer(index).extent;
        let prog = self.state.current_prog;
        debug_assert!(prog < extent.width, "cursor {prog} past width {}", extent.width);

        let copied = prog == 0;
        if copied {
            copy_coarser(pyramid, backend, index);
        }

        let InterlaceConfig {
            pitch,
            line_factor,
            min_lines,
        } = self.config.interlace;
        let by_budget = input.budget.saturating_mul(line_factor) / u64::from(extent.height);
        let remaining = extent.width - prog;
        let lines = by_budget.max(u64::from(min_lines)).min(u64::from(remaining)) as u32;
        let work = u64::from(lines) * u64::from(extent.height) / u64::from(pitch.max(1));

        fill(pyramid, backend, timing, input, index, prog, lines, RenderMode::StencilRead, work);

        let completed = prog + lines == extent.width;
        self.state = if completed {
            ScheduleState {
                finished_layer: layer,
                current_prog: 0,
            }
        } else {
            ScheduleState {
                finished_layer: layer + 1,
                current_prog: prog + lines,
            }
        };
        StepOutcome {
            kind: StepKind::Refine,
            layer: Some(index),
            mode: Some(RenderMode::StencilRead),
            first_column: prog,
            lines,
            work,
            copied,
            completed,
            state: self.state,
        }
    }

    fn state_is_consistent(&self, pyramid: &LayerPyramid) -> bool {
        let ScheduleState {
            finished_layer,
            current_prog,
        } = self.state;
        if finished_layer > self.layer_count {
            return false;
        }
        if finished_layer == 0 || finished_layer == self.layer_count {
            return current_prog == 0;
        }
        current_prog < pyramid.layer(LayerIndex(finished_layer - 1)).extent.width
    }
}

fn copy_coarser<B: RenderBackend + ?Sized>(
    pyramid: &mut LayerPyramid,
    backend: &mut B,
    dst: LayerIndex,
) {
    let src = dst.coarser();
    pyramid.transition(backend, src, ImageLayout::TransferSrc);
    pyramid.transition(backend, dst, ImageLayout::TransferDst);
    backend.copy_layer(src, dst);
    pyramid.transition(backend, src, ImageLayout::ShaderRead);
}

fn fill<B: RenderBackend + ?Sized>(
    pyramid: &mut LayerPyramid,
    backend: &mut B,
    timing: &mut TimingInstrument,
    input: &StepInput,
    layer: LayerIndex,
    first_column: u32,
    columns: u32,
    mode: RenderMode,
    work: u64,
) {
    let desc = *pyramid.layer(layer);
    pyramid.transition(backend, layer, ImageLayout::ColorAttachment);
    timing.begin(backend, input.slot, work);
    backend.submit_scanline_fill(&ScanlineFill {
        layer,
        extent: desc.extent,
        first_column,
        columns,
        mode,
        placement: desc.placement,
        uniforms: input.uniforms,
    });
    timing.end(backend, input.slot);
    pyramid.transition(backend, layer, ImageLayout::ShaderRead);
}
