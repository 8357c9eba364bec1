// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The frame driver.
//!
//! [`ProgressiveRenderer`] owns everything that persists across frames: the
//! fractal parameters, the pyramid, the scheduler (with its estimator) and
//! the timing slots. One call to [`frame`](ProgressiveRenderer::frame) per
//! presented frame does, in order:
//!
//! 1. apply all queued [`ControlEvent`]s, invalidating at most once;
//! 2. collect the measurement recorded `depth` frames ago in this slot;
//! 3. predict the work budget for the fill-time target;
//! 4. run one scheduler step.
//!
//! [`select_presentation`](ProgressiveRenderer::select_presentation) then
//! names the layer the compositor should sample.
//!
//! A failed [`resize`](ProgressiveRenderer::resize) leaves the renderer
//! *lost*: its layers are released, so both calls fail with
//! [`RendererError::Lost`] until a later resize succeeds.

use core::fmt;

use crate::backend::RenderBackend;
use crate::events::{ControlEvent, Invalidation};
use crate::layer::{
    Extent, InterlaceConfigError, LayerIndex, LayerPyramid, PyramidConfig, PyramidError,
    StencilMaskInitializer,
};
use crate::params::{FractalParams, FractalUniforms};
use crate::present::{self, Presentation};
use crate::scheduler::{RenderStepScheduler, SchedulerConfig, StepInput, StepOutcome};
use crate::timing::{Collected, TimingInstrument};
use crate::trace::{
    BudgetEvent, FrameStartEvent, InvalidationCause, InvalidationEvent, PresentationEvent,
    PresetFieldSkippedEvent, PresetRejectedEvent, SampleFate, SlowFillEvent, StepEvent,
    TimingSampleEvent, Tracer,
};

/// Renderer configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererConfig {
    /// Pyramid construction.
    pub pyramid: PyramidConfig,
    /// Scheduler, estimator and interlace tuning.
    pub scheduler: SchedulerConfig,
    /// Frames in flight; one timing slot each.
    pub pipeline_depth: usize,
    /// Render target is the viewport times this factor per axis.
    pub supersampling: u32,
    /// GPU time each frame's fill should take, in seconds.
    pub fill_target: f64,
    /// Difficulty weight attached to every measurement.
    pub difficulty_weight: f64,
    /// Fills slower than this (seconds) are traced as slow.
    pub slow_fill_seconds: f64,
}

impl RendererConfig {
    /// Desktop GPUs: 2x supersampling, 20 ms fills.
    #[must_use]
    pub const fn desktop() -> Self {
        Self {
            pyramid: PyramidConfig::new(PyramidConfig::DEFAULT_MIN_AREA),
            scheduler: SchedulerConfig::DEFAULT,
            pipeline_depth: 2,
            supersampling: 2,
            fill_target: 1.0 / 50.0,
            difficulty_weight: 1.0,
            slow_fill_seconds: 0.05,
        }
    }

    /// Integrated or battery-powered GPUs: no supersampling, 8 ms fills.
    #[must_use]
    pub const fn low_power() -> Self {
        Self {
            pyramid: PyramidConfig::new(PyramidConfig::DEFAULT_MIN_AREA),
            scheduler: SchedulerConfig::DEFAULT,
            pipeline_depth: 3,
            supersampling: 1,
            fill_target: 1.0 / 120.0,
            difficulty_weight: 1.0,
            slow_fill_seconds: 0.05,
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::desktop()
    }
}

/// Failure creating or driving a renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererError {
    /// The interlace config is inconsistent.
    Config(InterlaceConfigError),
    /// The pyramid could not be built.
    Pyramid(PyramidError),
    /// A resize failed after releasing the layers; resize again to recover.
    Lost,
}

impl fmt::Display for RendererError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid interlace config: {e}"),
            Self::Pyramid(e) => write!(f, "pyramid construction failed: {e}"),
            Self::Lost => f.write_str("layers lost in a failed resize"),
        }
    }
}

impl core::error::Error for RendererError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Pyramid(e) => Some(e),
            Self::Lost => None,
        }
    }
}

impl From<InterlaceConfigError> for RendererError {
    fn from(e: InterlaceConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<PyramidError> for RendererError {
    fn from(e: PyramidError) -> Self {
        Self::Pyramid(e)
    }
}

/// Progress snapshot for UIs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressMetrics {
    /// Share of the work between the last restart and idle that is done,
    /// in `[0, 1]`; see [`RenderStepScheduler::progress`].
    pub progress_fraction: f64,
    /// Column cursor in the layer being refined.
    pub current_prog: u32,
    /// Finest complete layer; `layer_count` when none.
    pub finished_layer: u32,
    /// Layers in the pyramid.
    pub layer_count: u32,
    /// Last work budget; 0 once the finest layer is complete.
    pub target_effort: u64,
    /// GPU seconds of the last accepted measurement.
    pub last_frame_time: f64,
    /// Render target extent (viewport times supersampling).
    pub extent: Extent,
}

/// What one [`ProgressiveRenderer::frame`] call did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    /// Frame counter.
    pub frame_index: u64,
    /// Invalidation applied from this frame's events.
    pub invalidation: Invalidation,
    /// Timing slot result.
    pub collected: Collected,
    /// Work budget handed to the scheduler.
    pub budget: u64,
    /// Scheduler step.
    pub step: StepOutcome,
}

/// Owns the progressive rendering state of one output.
#[derive(Clone, Debug)]
pub struct ProgressiveRenderer {
    config: RendererConfig,
    viewport: Extent,
    params: FractalParams,
    pyramid: LayerPyramid,
    scheduler: RenderStepScheduler,
    timing: TimingInstrument,
    frame_index: u64,
    last_budget: u64,
    last_frame_time: f64,
    lost: bool,
}

impl ProgressiveRenderer {
    /// Validates `config`, builds the pyramid for `viewport` and paints the
    /// stencil masks (blocking).
    pub fn new<B: RenderBackend + ?Sized>(
        config: RendererConfig,
        viewport: Extent,
        backend: &mut B,
    ) -> Result<Self, RendererError> {
        config.scheduler.interlace.validate()?;
        let pyramid = Self::build_pyramid(&config, viewport, backend)?;
        let scheduler = RenderStepScheduler::new(config.scheduler, pyramid.layer_count());
        Ok(Self {
            config,
            viewport,
            params: FractalParams::DEFAULT,
            pyramid,
            scheduler,
            timing: TimingInstrument::new(config.pipeline_depth),
            frame_index: 0,
            last_budget: 0,
            last_frame_time: 0.0,
            lost: false,
        })
    }

    fn build_pyramid<B: RenderBackend + ?Sized>(
        config: &RendererConfig,
        viewport: Extent,
        backend: &mut B,
    ) -> Result<LayerPyramid, PyramidError> {
        let target = viewport.scaled(config.supersampling.max(1));
        let pyramid = LayerPyramid::build(target, &config.pyramid, backend)?;
        StencilMaskInitializer::new(&config.scheduler.interlace).initialize(&pyramid, backend);
        Ok(pyramid)
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Current fractal parameters.
    #[must_use]
    pub fn params(&self) -> &FractalParams {
        &self.params
    }

    /// Viewport the pyramid was built for.
    #[must_use]
    pub fn viewport(&self) -> Extent {
        self.viewport
    }

    /// The pyramid.
    #[must_use]
    pub fn pyramid(&self) -> &LayerPyramid {
        &self.pyramid
    }

    /// The scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &RenderStepScheduler {
        &self.scheduler
    }

    /// Frames run so far.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Whether a failed resize released the layers.
    #[must_use]
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Rebuilds the pyramid for a new viewport.
    ///
    /// Zero-area viewports, and unchanged ones while not lost, are ignored
    /// (`Ok(false)`). On error the old layers are already released and the
    /// renderer is [lost](Self::is_lost) until a resize succeeds.
    pub fn resize<B: RenderBackend + ?Sized>(
        &mut self,
        viewport: Extent,
        backend: &mut B,
        tracer: &mut Tracer<'_>,
    ) -> Result<bool, PyramidError> {
        if viewport.is_empty() || (viewport == self.viewport && !self.lost) {
            return Ok(false);
        }
        backend.wait_idle();
        backend.release_layers();
        self.lost = true;
        self.pyramid = Self::build_pyramid(&self.config, viewport, backend)?;
        self.lost = false;
        self.viewport = viewport;
        self.scheduler.rebuild(self.pyramid.layer_count());
        self.timing.invalidate();
        tracer.invalidation(&InvalidationEvent {
            frame_index: self.frame_index,
            invalidation: Invalidation::Hard,
            cause: InvalidationCause::Resize,
        });
        Ok(true)
    }

    /// Restarts refinement (soft).
    pub fn invalidate(&mut self, tracer: &mut Tracer<'_>) {
        self.restart(Invalidation::Soft, InvalidationCause::Explicit, tracer);
    }

    /// Restarts refinement and drops the estimator history.
    pub fn hard_invalidate(&mut self, tracer: &mut Tracer<'_>) {
        self.restart(Invalidation::Hard, InvalidationCause::Explicit, tracer);
    }

    fn restart(
        &mut self,
        invalidation: Invalidation,
        cause: InvalidationCause,
        tracer: &mut Tracer<'_>,
    ) {
        match invalidation {
            Invalidation::None => return,
            Invalidation::Soft => self.scheduler.invalidate(),
            Invalidation::Hard => self.scheduler.hard_invalidate(),
        }
        self.timing.invalidate();
        tracer.invalidation(&InvalidationEvent {
            frame_index: self.frame_index,
            invalidation,
            cause,
        });
    }

    /// Applies queued control events and invalidates once for all of them.
    pub fn apply_events<I>(&mut self, events: I, tracer: &mut Tracer<'_>) -> Invalidation
    where
        I: IntoIterator<Item = ControlEvent>,
    {
        let mut invalidation = Invalidation::None;
        for event in events {
            if event.is_noop() {
                continue;
            }
            match event {
                ControlEvent::Navigate { pan, zoom_ticks } => {
                    self.params.navigation.pan(pan, self.viewport);
                    self.params.navigation.scroll(zoom_ticks);
                    invalidation = invalidation.merge(Invalidation::Soft);
                }
                ControlEvent::Preset(payload) => match self.params.apply_preset(&payload) {
                    Ok(report) => {
                        for &field in &report.skipped {
                            tracer.preset_field_skipped(&PresetFieldSkippedEvent {
                                frame_index: self.frame_index,
                                field,
                            });
                        }
                        invalidation = invalidation.merge(Invalidation::Hard);
                    }
                    Err(error) => tracer.preset_rejected(&PresetRejectedEvent {
                        frame_index: self.frame_index,
                        error,
                    }),
                },
            }
        }
        let cause = if invalidation == Invalidation::Hard {
            InvalidationCause::Preset
        } else {
            InvalidationCause::Navigation
        };
        self.restart(invalidation, cause, tracer);
        invalidation
    }

    /// Runs one frame in timing `slot`.
    ///
    /// Fails with [`RendererError::Lost`], recording nothing and dropping
    /// `events`, while the renderer is lost.
    pub fn frame<B, I>(
        &mut self,
        backend: &mut B,
        slot: usize,
        events: I,
        tracer: &mut Tracer<'_>,
    ) -> Result<FrameReport, RendererError>
    where
        B: RenderBackend + ?Sized,
        I: IntoIterator<Item = ControlEvent>,
    {
        if self.lost {
            return Err(RendererError::Lost);
        }
        let frame_index = self.frame_index;
        let before = self.scheduler.state();
        #[expect(
            clippy::cast_possible_truncation,
            reason = "timing slots are bounded by the pipeline depth"
        )]
        let slot_u32 = slot as u32;
        tracer.frame_start(&FrameStartEvent {
            frame_index,
            slot: slot_u32,
            layer_count: self.pyramid.layer_count(),
            finished_layer: before.finished_layer,
            current_prog: before.current_prog,
        });

        let invalidation = self.apply_events(events, tracer);

        let collected = self.timing.collect(backend, slot);
        self.record_sample(collected, slot_u32, tracer);

        let budget = self.scheduler.budget(self.config.fill_target);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "estimator capacity is small"
        )]
        let samples = self.scheduler.estimator().len() as u32;
        tracer.budget(&BudgetEvent {
            frame_index,
            target_seconds: self.config.fill_target,
            budget,
            samples,
        });

        let input = StepInput {
            slot,
            budget,
            uniforms: FractalUniforms::new(&self.params, self.pyramid.target()),
        };
        let step = self
            .scheduler
            .step(&mut self.pyramid, backend, &mut self.timing, &input);
        self.last_budget = budget;
        tracer.step(&StepEvent {
            frame_index,
            kind: step.kind,
            layer: step.layer.map(LayerIndex::get),
            mode: step.mode,
            first_column: step.first_column,
            lines: step.lines,
            work: step.work,
            finished_layer: step.state.finished_layer,
            current_prog: step.state.current_prog,
        });

        self.frame_index += 1;
        Ok(FrameReport {
            frame_index,
            invalidation,
            collected,
            budget,
            step,
        })
    }

    fn record_sample(&mut self, collected: Collected, slot: u32, tracer: &mut Tracer<'_>) {
        let frame_index = self.frame_index;
        let (m, fate) = match collected {
            Collected::Idle | Collected::Pending => return,
            Collected::Lost { work } => {
                tracer.timing_sample(&TimingSampleEvent {
                    frame_index,
                    slot,
                    seconds: 0.0,
                    work,
                    fate: SampleFate::Lost,
                });
                return;
            }
            Collected::Stale(m) => (m, SampleFate::Stale),
            Collected::Ready(m) => {
                self.scheduler.observe(&m, self.config.difficulty_weight);
                self.last_frame_time = m.seconds;
                (m, SampleFate::Accepted)
            }
        };
        tracer.timing_sample(&TimingSampleEvent {
            frame_index,
            slot,
            seconds: m.seconds,
            work: m.work,
            fate,
        });
        if fate == SampleFate::Accepted && m.seconds > self.config.slow_fill_seconds {
            let rate = m.work as f64 / m.seconds;
            tracer.slow_fill(&SlowFillEvent {
                frame_index,
                seconds: m.seconds,
                work: m.work,
                rate,
            });
        }
    }

    /// Picks the layer to display and makes it readable.
    ///
    /// Fails with [`RendererError::Lost`] while the renderer is lost.
    pub fn select_presentation<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        tracer: &mut Tracer<'_>,
    ) -> Result<Presentation, RendererError> {
        if self.lost {
            return Err(RendererError::Lost);
        }
        let shown = present::prepare(self.scheduler.state(), &mut self.pyramid, backend);
        tracer.presentation(&PresentationEvent {
            frame_index: self.frame_index.saturating_sub(1),
            layer: shown.layer.get(),
        });
        Ok(shown)
    }

    /// Progress snapshot.
    #[must_use]
    pub fn progress_metrics(&self) -> ProgressMetrics {
        let state = self.scheduler.state();
        ProgressMetrics {
            progress_fraction: self.scheduler.progress(&self.pyramid),
            current_prog: state.current_prog,
            finished_layer: state.finished_layer,
            layer_count: self.pyramid.layer_count(),
            target_effort: if state.is_idle() { 0 } else { self.last_budget },
            last_frame_time: self.last_frame_time,
            extent: self.pyramid.target(),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::vec::Vec;

    use kurbo::Vec2;

    use super::*;
    use crate::backend::testing::{Command, RecordingBackend};
    use crate::layer::InterlaceConfig;
    use crate::scheduler::{ScheduleState, StepKind};

    fn renderer(backend: &mut RecordingBackend) -> ProgressiveRenderer {
        ProgressiveRenderer::new(RendererConfig::desktop(), Extent::new(512, 512), backend).unwrap()
    }

    fn run(
        r: &mut ProgressiveRenderer,
        backend: &mut RecordingBackend,
        events: Vec<ControlEvent>,
    ) -> FrameReport {
        let slot = (r.frame_index() % 2) as usize;
        r.frame(backend, slot, events, &mut Tracer::none()).unwrap()
    }

    #[test]
    fn new_supersamples_and_paints_stencils() {
        let mut backend = RecordingBackend::new();
        let r = renderer(&mut backend);
        assert_eq!(r.pyramid().target(), Extent::new(1024, 1024));
        assert_eq!(r.pyramid().layer_count(), 12);
        let stencils = backend
            .commands
            .iter()
            .filter(|c| matches!(c, Command::Stencil(..)))
            .count();
        assert_eq!(stencils, 12);
        assert_eq!(backend.commands.last(), Some(&Command::WaitIdle));
    }

    #[test]
    fn invalid_interlace_config_is_rejected() {
        let mut backend = RecordingBackend::new();
        let mut config = RendererConfig::desktop();
        config.scheduler.interlace = InterlaceConfig {
            pitch: 2,
            line_factor: 4,
            min_lines: 2,
        };
        let err = ProgressiveRenderer::new(config, Extent::new(64, 64), &mut backend).unwrap_err();
        assert!(matches!(err, RendererError::Config(_)));
        assert!(backend.commands.is_empty());
    }

    #[test]
    fn empty_viewport_is_rejected() {
        let mut backend = RecordingBackend::new();
        let err = ProgressiveRenderer::new(RendererConfig::desktop(), Extent::new(0, 64), &mut backend)
            .unwrap_err();
        assert!(matches!(err, RendererError::Pyramid(PyramidError::EmptyExtent(_))));
    }

    #[test]
    fn measurements_feed_the_estimator_one_cycle_later() {
        let mut backend = RecordingBackend::new();
        let mut r = renderer(&mut backend);
        let first = run(&mut r, &mut backend, Vec::new());
        assert_eq!(first.step.kind, StepKind::Terminal);
        assert_eq!(first.budget, 1_000);
        assert_eq!(first.collected, Collected::Idle);
        let second = run(&mut r, &mut backend, Vec::new());
        assert_eq!(second.collected, Collected::Idle);
        let third = run(&mut r, &mut backend, Vec::new());
        assert!(matches!(third.collected, Collected::Ready(m) if m.work == 16 * 32));
        assert_eq!(r.scheduler().estimator().len(), 1);
        assert!(r.progress_metrics().last_frame_time > 0.0);
    }

    #[test]
    fn preset_is_a_hard_invalidation() {
        let mut backend = RecordingBackend::new();
        let mut r = renderer(&mut backend);
        for _ in 0..6 {
            run(&mut r, &mut backend, Vec::new());
        }
        assert!(!r.scheduler().estimator().is_empty());
        let report = run(
            &mut r,
            &mut backend,
            alloc::vec![ControlEvent::Preset(String::from(r#"{"iterations": 500}"#))],
        );
        assert_eq!(report.invalidation, Invalidation::Hard);
        assert_eq!(report.step.kind, StepKind::Terminal);
        assert_eq!(r.params().iterations, 500);
        assert!(r.scheduler().estimator().is_empty());
    }

    #[test]
    fn navigation_is_soft_and_discards_in_flight_samples() {
        let mut backend = RecordingBackend::new();
        let mut r = renderer(&mut backend);
        for _ in 0..6 {
            run(&mut r, &mut backend, Vec::new());
        }
        let history = r.scheduler().estimator().len();
        let report = run(
            &mut r,
            &mut backend,
            alloc::vec![
                ControlEvent::Navigate {
                    pan: Vec2::new(10.0, 0.0),
                    zoom_ticks: 0.0,
                },
                ControlEvent::Navigate {
                    pan: Vec2::ZERO,
                    zoom_ticks: 5.0,
                },
            ],
        );
        assert_eq!(report.invalidation, Invalidation::Soft);
        assert_eq!(report.step.kind, StepKind::Terminal);
        // The sample collected this frame was opened before the pan.
        assert!(matches!(report.collected, Collected::Stale(_)));
        assert_eq!(r.scheduler().estimator().len(), history);
        assert!(r.params().navigation.zoom < 4.0);
    }

    #[test]
    fn rejected_preset_keeps_parameters_and_schedule() {
        let mut backend = RecordingBackend::new();
        let mut r = renderer(&mut backend);
        run(&mut r, &mut backend, Vec::new());
        let before = r.scheduler().state();
        let report = run(
            &mut r,
            &mut backend,
            alloc::vec![ControlEvent::Preset(String::from("not json"))],
        );
        assert_eq!(report.invalidation, Invalidation::None);
        assert_ne!(report.step.kind, StepKind::Terminal);
        assert_eq!(*r.params(), FractalParams::DEFAULT);
        assert!(r.scheduler().state().finished_layer <= before.finished_layer);
    }

    #[test]
    fn explicit_invalidation_restarts_the_cursor() {
        let mut backend = RecordingBackend::new();
        let mut r = renderer(&mut backend);
        for _ in 0..5 {
            run(&mut r, &mut backend, Vec::new());
        }
        let history = r.scheduler().estimator().len();
        r.invalidate(&mut Tracer::none());
        assert_eq!(r.scheduler().state(), ScheduleState::restart(12));
        assert_eq!(r.scheduler().estimator().len(), history);
        r.hard_invalidate(&mut Tracer::none());
        assert!(r.scheduler().estimator().is_empty());
        assert_eq!(run(&mut r, &mut backend, Vec::new()).step.kind, StepKind::Terminal);
    }

    #[test]
    fn resize_rebuilds_only_on_change() {
        let mut backend = RecordingBackend::new();
        let mut r = renderer(&mut backend);
        run(&mut r, &mut backend, Vec::new());
        let mut tracer = Tracer::none();
        assert_eq!(r.resize(Extent::new(512, 512), &mut backend, &mut tracer), Ok(false));
        assert_eq!(r.resize(Extent::new(0, 512), &mut backend, &mut tracer), Ok(false));
        backend.commands.clear();
        assert_eq!(r.resize(Extent::new(256, 256), &mut backend, &mut tracer), Ok(true));
        assert_eq!(backend.commands[..2], [Command::WaitIdle, Command::Release]);
        assert_eq!(r.pyramid().target(), Extent::new(512, 512));
        assert_eq!(r.scheduler().layer_count(), r.pyramid().layer_count());
        assert_eq!(run(&mut r, &mut backend, Vec::new()).step.kind, StepKind::Terminal);
    }

    #[test]
    fn failed_resize_refuses_frames_until_rebuilt() {
        let mut backend = RecordingBackend::new();
        let mut r = renderer(&mut backend);
        run(&mut r, &mut backend, Vec::new());
        let mut tracer = Tracer::none();
        backend.fail_allocation_at = Some(3);
        let err = r.resize(Extent::new(300, 200), &mut backend, &mut tracer);
        assert!(matches!(err, Err(PyramidError::ResourceExhausted { .. })));
        assert!(r.is_lost());

        backend.commands.clear();
        let frame = r.frame(&mut backend, 0, Vec::new(), &mut tracer);
        assert_eq!(frame.unwrap_err(), RendererError::Lost);
        let shown = r.select_presentation(&mut backend, &mut tracer);
        assert_eq!(shown.unwrap_err(), RendererError::Lost);
        assert!(backend.commands.is_empty());

        // The old size is no longer a no-op: its layers are gone.
        backend.fail_allocation_at = None;
        assert_eq!(r.resize(Extent::new(512, 512), &mut backend, &mut tracer), Ok(true));
        assert!(!r.is_lost());
        assert_eq!(r.pyramid().target(), Extent::new(1024, 1024));
        assert_eq!(run(&mut r, &mut backend, Vec::new()).step.kind, StepKind::Terminal);
        assert!(r.select_presentation(&mut backend, &mut tracer).is_ok());
    }

    #[test]
    fn progress_ignores_layers_skipped_by_fast_forward() {
        let mut backend = RecordingBackend::new();
        let mut config = RendererConfig::desktop();
        config.scheduler.estimator.min_work = 50_000;
        let mut r = ProgressiveRenderer::new(config, Extent::new(512, 512), &mut backend).unwrap();
        run(&mut r, &mut backend, Vec::new());
        let report = run(&mut r, &mut backend, Vec::new());
        // 128x256 is the finest layer whose coarser chain fits 50_000.
        assert_eq!(report.step.kind, StepKind::FastForward);
        assert_eq!(report.step.layer, Some(LayerIndex(5)));
        let done = 16 * 32 + 128 * 256;
        let refined: u64 = [1024 * 1024, 512 * 1024, 512 * 512, 256 * 512, 256 * 256]
            .into_iter()
            .sum();
        let total = (done + refined / 2) as f64;
        assert_eq!(r.progress_metrics().progress_fraction, done as f64 / total);
    }

    #[test]
    fn runs_to_completion_and_reports_progress() {
        let mut backend = RecordingBackend::new();
        let mut r = renderer(&mut backend);
        assert_eq!(r.progress_metrics().progress_fraction, 0.0);
        let mut last = 0.0;
        for _ in 0..10_000 {
            let report = run(&mut r, &mut backend, Vec::new());
            let m = r.progress_metrics();
            assert!(m.progress_fraction >= last);
            last = m.progress_fraction;
            if report.step.kind == StepKind::Idle {
                break;
            }
        }
        let m = r.progress_metrics();
        assert_eq!(m.finished_layer, 0);
        assert_eq!(m.progress_fraction, 1.0);
        assert_eq!(m.target_effort, 0);
        assert_eq!(m.layer_count, 12);
    }

    #[test]
    fn presentation_follows_the_cursor() {
        let mut backend = RecordingBackend::new();
        let mut r = renderer(&mut backend);
        let mut tracer = Tracer::none();
        let shown = r.select_presentation(&mut backend, &mut tracer).unwrap();
        assert_eq!(shown.layer, LayerIndex(11));
        run(&mut r, &mut backend, Vec::new());
        let shown = r.select_presentation(&mut backend, &mut tracer).unwrap();
        assert_eq!(shown.layer, LayerIndex(11));
        for _ in 0..200 {
            run(&mut r, &mut backend, Vec::new());
        }
        let shown = r.select_presentation(&mut backend, &mut tracer).unwrap();
        let state = r.scheduler().state();
        assert_eq!(shown.layer, present::select_layer(state, 12));
    }

    #[cfg(feature = "trace")]
    #[test]
    fn rejected_preset_is_traced() {
        use crate::trace::TraceSink;

        #[derive(Default)]
        struct Sink {
            rejected: u32,
            skipped: u32,
            steps: u32,
        }
        impl TraceSink for Sink {
            fn on_preset_rejected(&mut self, _: &PresetRejectedEvent) {
                self.rejected += 1;
            }
            fn on_preset_field_skipped(&mut self, _: &PresetFieldSkippedEvent) {
                self.skipped += 1;
            }
            fn on_step(&mut self, _: &StepEvent) {
                self.steps += 1;
            }
        }

        let mut backend = RecordingBackend::new();
        let mut r = renderer(&mut backend);
        let mut sink = Sink::default();
        let events = alloc::vec![
            ControlEvent::Preset(String::from("[]")),
            ControlEvent::Preset(String::from(r#"{"radius": true}"#)),
        ];
        r.frame(&mut backend, 0, events, &mut Tracer::new(&mut sink)).unwrap();
        assert_eq!((sink.rejected, sink.skipped, sink.steps), (1, 1, 1));
    }
}
