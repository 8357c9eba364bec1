// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Durations
//! print in milliseconds and work counts with K/M/G suffixes.

use std::io::Write;

use interlace_core::backend::RenderMode;
use interlace_core::scheduler::StepKind;
use interlace_core::trace::{
    BudgetEvent, FrameStartEvent, InvalidationEvent, PresentationEvent, PresetFieldSkippedEvent,
    PresetRejectedEvent, SampleFate, SlowFillEvent, StepEvent, TimingSampleEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    /// Suppresses frame-start and budget lines.
    quiet: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self::with_writer(writer)
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            quiet: false,
        }
    }

    /// Only print steps, invalidations and diagnostics.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// `1234567` → `"1.23M"`.
#[must_use]
pub fn format_big(n: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1_000_000_000, "G"), (1_000_000, "M"), (1_000, "K")];
    for (scale, suffix) in UNITS {
        if n >= scale {
            return format!("{:.2}{suffix}", n as f64 / scale as f64);
        }
    }
    n.to_string()
}

fn ms(seconds: f64) -> f64 {
    seconds * 1e3
}

fn kind_name(kind: StepKind) -> &'static str {
    match kind {
        StepKind::Terminal => "terminal",
        StepKind::FastForward => "fast-forward",
        StepKind::Refine => "refine",
        StepKind::Idle => "idle",
    }
}

fn mode_name(mode: Option<RenderMode>) -> &'static str {
    match mode {
        None => "-",
        Some(RenderMode::Simple) => "simple",
        Some(RenderMode::StencilWrite) => "stencil-write",
        Some(RenderMode::StencilRead) => "stencil-read",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_frame_start(&mut self, e: &FrameStartEvent) {
        if self.quiet {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[frame] {} slot={} finished={}/{} prog={}",
            e.frame_index, e.slot, e.finished_layer, e.layer_count, e.current_prog,
        );
    }

    fn on_invalidation(&mut self, e: &InvalidationEvent) {
        let _ = writeln!(
            self.writer,
            "[invalidate] frame={} {:?} cause={:?}",
            e.frame_index, e.invalidation, e.cause,
        );
    }

    fn on_timing_sample(&mut self, e: &TimingSampleEvent) {
        let fate = match e.fate {
            SampleFate::Accepted => "ok",
            SampleFate::Stale => "STALE",
            SampleFate::Lost => "LOST",
        };
        let _ = writeln!(
            self.writer,
            "[sample] frame={} slot={} {:.3}ms work={} {fate}",
            e.frame_index,
            e.slot,
            ms(e.seconds),
            format_big(e.work),
        );
    }

    fn on_budget(&mut self, e: &BudgetEvent) {
        if self.quiet {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[budget] frame={} target={:.1}ms budget={} samples={}",
            e.frame_index,
            ms(e.target_seconds),
            format_big(e.budget),
            e.samples,
        );
    }

    fn on_step(&mut self, e: &StepEvent) {
        let layer = e.layer.map_or_else(|| String::from("-"), |l| l.to_string());
        let _ = writeln!(
            self.writer,
            "[step] frame={} {} layer={layer} mode={} cols={}+{} work={} -> finished={} prog={}",
            e.frame_index,
            kind_name(e.kind),
            mode_name(e.mode),
            e.first_column,
            e.lines,
            format_big(e.work),
            e.finished_layer,
            e.current_prog,
        );
    }

    fn on_presentation(&mut self, e: &PresentationEvent) {
        if self.quiet {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[present] frame={} layer={}",
            e.frame_index, e.layer,
        );
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "rate is only displayed"
    )]
    fn on_slow_fill(&mut self, e: &SlowFillEvent) {
        let _ = writeln!(
            self.writer,
            "[SLOW] frame={} {:.1}ms work={} rate={}/s",
            e.frame_index,
            ms(e.seconds),
            format_big(e.work),
            format_big(e.rate as u64),
        );
    }

    fn on_preset_rejected(&mut self, e: &PresetRejectedEvent) {
        let _ = writeln!(
            self.writer,
            "[preset] frame={} rejected: {}",
            e.frame_index, e.error,
        );
    }

    fn on_preset_field_skipped(&mut self, e: &PresetFieldSkippedEvent) {
        let _ = writeln!(
            self.writer,
            "[preset] frame={} skipped {:?}",
            e.frame_index,
            e.field.key(),
        );
    }
}
