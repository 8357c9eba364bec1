// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the progressive frame loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! renderer calls at each stage of a frame. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! All events are `Copy` so sinks can buffer them without allocation.
//!
//! # Crate features
//!
//! - `trace` — enables the `Tracer` method bodies (one branch per call).

use crate::backend::RenderMode;
use crate::events::Invalidation;
use crate::params::{PresetError, PresetField};
use crate::scheduler::StepKind;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Why the schedule was invalidated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvalidationCause {
    /// Pan or zoom changed.
    Navigation,
    /// A preset replaced the fractal parameters.
    Preset,
    /// The output extent changed and the pyramid was rebuilt.
    Resize,
    /// The host called `invalidate` / `hard_invalidate` directly.
    Explicit,
}

/// What happened to a timing measurement collected this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleFate {
    /// Pushed to the estimator.
    Accepted,
    /// Started before the latest invalidation; discarded.
    Stale,
    /// The backend could not produce the timestamps; discarded.
    Lost,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted at the top of every frame, before events are applied.
#[derive(Clone, Copy, Debug)]
pub struct FrameStartEvent {
    /// Monotonic frame counter.
    pub frame_index: u64,
    /// Timing slot used by this frame.
    pub slot: u32,
    /// Number of layers in the pyramid.
    pub layer_count: u32,
    /// Scheduler cursor before the step.
    pub finished_layer: u32,
    /// Column cursor before the step.
    pub current_prog: u32,
}

/// Emitted when the schedule is reset.
#[derive(Clone, Copy, Debug)]
pub struct InvalidationEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Strength of the invalidation.
    pub invalidation: Invalidation,
    /// What triggered it.
    pub cause: InvalidationCause,
}

/// Emitted when a timing slot yields a measurement.
#[derive(Clone, Copy, Debug)]
pub struct TimingSampleEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Slot that produced the measurement.
    pub slot: u32,
    /// Measured GPU time in seconds (0 for lost samples).
    pub seconds: f64,
    /// Work units submitted in the measured interval.
    pub work: u64,
    /// Whether the sample reached the estimator.
    pub fate: SampleFate,
}

/// Emitted after the estimator predicts this frame's budget.
#[derive(Clone, Copy, Debug)]
pub struct BudgetEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Fill-time target in seconds.
    pub target_seconds: f64,
    /// Clamped work budget handed to the scheduler.
    pub budget: u64,
    /// Samples in the estimator history.
    pub samples: u32,
}

/// Emitted after each scheduler step.
#[derive(Clone, Copy, Debug)]
pub struct StepEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// State-machine branch taken.
    pub kind: StepKind,
    /// Layer that received the fill, if any.
    pub layer: Option<u32>,
    /// Pipeline variant of the fill, if any.
    pub mode: Option<RenderMode>,
    /// First column filled.
    pub first_column: u32,
    /// Number of columns filled.
    pub lines: u32,
    /// Normalized work submitted.
    pub work: u64,
    /// Scheduler cursor after the step.
    pub finished_layer: u32,
    /// Column cursor after the step.
    pub current_prog: u32,
}

/// Emitted when a layer is chosen for display.
#[derive(Clone, Copy, Debug)]
pub struct PresentationEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Displayed layer.
    pub layer: u32,
}

/// Emitted when a measured fill exceeds the slow-fill threshold.
#[derive(Clone, Copy, Debug)]
pub struct SlowFillEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Measured GPU time in seconds.
    pub seconds: f64,
    /// Work units in the slow fill.
    pub work: u64,
    /// Achieved rate in work units per second.
    pub rate: f64,
}

/// Emitted when a preset payload is rejected as a whole.
#[derive(Clone, Copy, Debug)]
pub struct PresetRejectedEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Why the payload was rejected.
    pub error: PresetError,
}

/// Emitted when a single preset field has the wrong type and is skipped.
#[derive(Clone, Copy, Debug)]
pub struct PresetFieldSkippedEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// The skipped field.
    pub field: PresetField,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the frame loop.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called at the start of a frame.
    fn on_frame_start(&mut self, e: &FrameStartEvent) {
        _ = e;
    }

    /// Called when the schedule is invalidated.
    fn on_invalidation(&mut self, e: &InvalidationEvent) {
        _ = e;
    }

    /// Called when a timing measurement is collected.
    fn on_timing_sample(&mut self, e: &TimingSampleEvent) {
        _ = e;
    }

    /// Called when the frame's work budget is known.
    fn on_budget(&mut self, e: &BudgetEvent) {
        _ = e;
    }

    /// Called after the scheduler step.
    fn on_step(&mut self, e: &StepEvent) {
        _ = e;
    }

    /// Called when a layer is selected for presentation.
    fn on_presentation(&mut self, e: &PresentationEvent) {
        _ = e;
    }

    /// Called for fills slower than the slow-fill threshold.
    fn on_slow_fill(&mut self, e: &SlowFillEvent) {
        _ = e;
    }

    /// Called when a preset payload is rejected.
    fn on_preset_rejected(&mut self, e: &PresetRejectedEvent) {
        _ = e;
    }

    /// Called when a preset field is skipped.
    fn on_preset_field_skipped(&mut self, e: &PresetFieldSkippedEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($(#[$doc:meta] $name:ident => $method:ident($ty:ty);)*) => {
        $(
            #[$doc]
            #[inline]
            pub fn $name(&mut self, e: &$ty) {
                #[cfg(feature = "trace")]
                if let Some(s) = &mut self.sink {
                    s.$method(e);
                }
                #[cfg(not(feature = "trace"))]
                {
                    _ = e;
                }
            }
        )*
    };
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    dispatch! {
        /// Emits a [`FrameStartEvent`].
        frame_start => on_frame_start(FrameStartEvent);
        /// Emits an [`InvalidationEvent`].
        invalidation => on_invalidation(InvalidationEvent);
        /// Emits a [`TimingSampleEvent`].
        timing_sample => on_timing_sample(TimingSampleEvent);
        /// Emits a [`BudgetEvent`].
        budget => on_budget(BudgetEvent);
        /// Emits a [`StepEvent`].
        step => on_step(StepEvent);
        /// Emits a [`PresentationEvent`].
        presentation => on_presentation(PresentationEvent);
        /// Emits a [`SlowFillEvent`].
        slow_fill => on_slow_fill(SlowFillEvent);
        /// Emits a [`PresetRejectedEvent`].
        preset_rejected => on_preset_rejected(PresetRejectedEvent);
        /// Emits a [`PresetFieldSkippedEvent`].
        preset_field_skipped => on_preset_field_skipped(PresetFieldSkippedEvent);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_step() -> StepEvent {
        StepEvent {
            frame_index: 42,
            kind: StepKind::Refine,
            layer: Some(3),
            mode: Some(RenderMode::StencilRead),
            first_column: 10,
            lines: 6,
            work: 96,
            finished_layer: 4,
            current_prog: 16,
        }
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_step(&sample_step());
        sink.on_budget(&BudgetEvent {
            frame_index: 0,
            target_seconds: 0.02,
            budget: 1000,
            samples: 0,
        });
        sink.on_preset_rejected(&PresetRejectedEvent {
            frame_index: 0,
            error: PresetError::NotAnObject,
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.step(&sample_step());
        tracer.presentation(&PresentationEvent {
            frame_index: 1,
            layer: 0,
        });
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            steps: Vec<u64>,
        }
        impl TraceSink for RecordingSink {
            fn on_step(&mut self, e: &StepEvent) {
                self.steps.push(e.frame_index);
            }
        }

        let mut sink = RecordingSink { steps: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        tracer.step(&sample_step());
        // Unhandled events fall through to the default no-op.
        tracer.frame_start(&FrameStartEvent {
            frame_index: 43,
            slot: 1,
            layer_count: 12,
            finished_layer: 4,
            current_prog: 16,
        });
        drop(tracer);
        assert_eq!(sink.steps, &[42]);
    }
}
