// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scripted runs against the simulator.
//!
//! A [`Scenario`] builds a [`ProgressiveRenderer`] on a fresh
//! [`SimulatedBackend`], feeds it scripted [`ControlEvent`]s at fixed frame
//! numbers and runs frames until the schedule is idle (plus `depth` frames
//! to drain in-flight timings) or `max_frames` is reached.

use alloc::string::String;
use alloc::vec::Vec;

use interlace_core::events::ControlEvent;
use interlace_core::layer::Extent;
use interlace_core::renderer::{ProgressiveRenderer, RendererConfig, RendererError};
use interlace_core::scheduler::StepKind;
use interlace_core::timing::Collected;
use interlace_core::trace::Tracer;

use crate::PathologyToggles;
use crate::budget::{BudgetReport, BudgetSample, FrameBudgetTracker};
use crate::sim::{SimConfig, SimulatedBackend};

/// Fills kept in the budget window.
pub const BUDGET_WINDOW: usize = 64;

/// A scripted run.
#[derive(Clone, Debug)]
pub struct Scenario {
    /// Output size.
    pub viewport: Extent,
    /// Renderer tuning.
    pub config: RendererConfig,
    /// Simulated device.
    pub sim: SimConfig,
    /// Pathologies active from the first frame.
    pub toggles: PathologyToggles,
    /// Hard stop.
    pub max_frames: u64,
    /// `(frame, event)` pairs; events for the same frame apply in order.
    pub script: Vec<(u64, ControlEvent)>,
}

impl Scenario {
    /// A small viewport on a slow device, so refinement spans many frames.
    #[must_use]
    pub fn small() -> Self {
        Self {
            viewport: Extent::new(320, 240),
            config: RendererConfig {
                supersampling: 1,
                ..RendererConfig::desktop()
            },
            sim: SimConfig {
                pixels_per_second: 1.0e6,
                ..SimConfig::DEFAULT
            },
            toggles: PathologyToggles::default(),
            max_frames: 2_000,
            script: Vec::new(),
        }
    }

    /// Runs the scenario.
    ///
    /// Fails only if the renderer cannot be created; nothing here resizes,
    /// so it is never lost.
    pub fn run(&self, tracer: &mut Tracer<'_>) -> Result<ScenarioOutcome, RendererError> {
        let mut backend = SimulatedBackend::new(self.sim);
        backend.toggles = self.toggles;
        let mut renderer = ProgressiveRenderer::new(self.config, self.viewport, &mut backend)?;

        let depth = self.config.pipeline_depth.max(1) as u64;
        let script_end = self.script.iter().map(|&(at, _)| at).max();
        let target_ms = self.config.fill_target * 1e3;
        let mut tracker = FrameBudgetTracker::<BUDGET_WINDOW>::new();
        let mut out = Counters::default();

        let mut frames = 0;
        while frames < self.max_frames {
            let frame = frames;
            #[expect(
                clippy::cast_possible_truncation,
                reason = "remainder is below the pipeline depth, a usize"
            )]
            let slot = (frame % depth) as usize;
            let events = self
                .script
                .iter()
                .filter(|&&(at, _)| at == frame)
                .map(|(_, e)| e.clone());
            let report = renderer.frame(&mut backend, slot, events, tracer)?;
            frames += 1;

            match report.collected {
                Collected::Ready(m) => {
                    out.accepted += 1;
                    tracker.observe(BudgetSample {
                        fill_ms: m.seconds * 1e3,
                        target_ms,
                    });
                }
                Collected::Stale(_) => out.stale += 1,
                Collected::Lost { .. } => out.lost += 1,
                Collected::Idle | Collected::Pending => {}
            }
            match report.step.kind {
                StepKind::Terminal => out.terminal_steps += 1,
                StepKind::Idle => {}
                StepKind::FastForward | StepKind::Refine => {
                    out.max_budget = out.max_budget.max(report.budget);
                }
            }

            let shown = renderer.select_presentation(&mut backend, tracer)?;
            out.presented_holes += backend.coverage(shown.layer).empty;

            match out.converged_at {
                Some(at) if frame >= at + depth => break,
                Some(_) => {}
                None => {
                    if report.step.kind == StepKind::Idle
                        && script_end.is_none_or(|end| frame >= end)
                    {
                        out.converged_at = Some(frame);
                    }
                }
            }
        }

        Ok(ScenarioOutcome {
            frames,
            converged_at: out.converged_at,
            report: tracker.report(),
            sparkline: tracker.sparkline_ascii(2.0),
            accepted: out.accepted,
            stale: out.stale,
            lost: out.lost,
            terminal_steps: out.terminal_steps,
            max_budget: out.max_budget,
            presented_holes: out.presented_holes,
            renderer,
            backend,
        })
    }
}

#[derive(Default)]
struct Counters {
    converged_at: Option<u64>,
    accepted: u32,
    stale: u32,
    lost: u32,
    terminal_steps: u32,
    max_budget: u64,
    presented_holes: u64,
}

/// Result of [`Scenario::run`].
#[derive(Debug)]
pub struct ScenarioOutcome {
    /// Frames run.
    pub frames: u64,
    /// First frame whose step was idle after the script finished.
    pub converged_at: Option<u64>,
    /// Budget adherence of accepted measurements.
    pub report: BudgetReport,
    /// Fill-ratio sparkline of the last [`BUDGET_WINDOW`] measurements.
    pub sparkline: String,
    /// Measurements fed to the estimator.
    pub accepted: u32,
    /// Measurements dropped as stale.
    pub stale: u32,
    /// Queries the backend lost.
    pub lost: u32,
    /// Terminal-layer fills (one per restart).
    pub terminal_steps: u32,
    /// Largest budget handed to a refining step.
    pub max_budget: u64,
    /// Unwritten pixels summed over every presented layer.
    pub presented_holes: u64,
    /// The renderer after the last frame.
    pub renderer: ProgressiveRenderer,
    /// The simulator after the last frame.
    pub backend: SimulatedBackend,
}

#[cfg(test)]
mod tests {
    use interlace_core::backend::AllocError;
    use interlace_core::layer::PyramidError;

    use super::*;
    use crate::budget::BudgetGrade;

    fn run(scenario: &Scenario) -> ScenarioOutcome {
        scenario.run(&mut Tracer::none()).unwrap()
    }

    #[test]
    fn clean_run_converges_without_holes() {
        let out = run(&Scenario::small());
        assert!(out.converged_at.is_some());
        assert!(out.renderer.scheduler().state().is_idle());
        assert_eq!(out.presented_holes, 0);
        assert_eq!(out.backend.stats().layout_violations, 0);
        assert_eq!(out.terminal_steps, 1);
        assert_eq!(out.stale, 0);
        assert_eq!(out.report.grade, BudgetGrade::A);
        // 20 ms at 1e6 px/s minus the 20 us fill overhead.
        let expected = 19_980.0;
        assert!(
            (out.max_budget as f64 - expected).abs() < expected * 0.1,
            "budget {}",
            out.max_budget
        );
        assert_eq!(out.renderer.progress_metrics().progress_fraction, 1.0);
        let finest = out.renderer.pyramid().layers()[0].index;
        assert_eq!(out.backend.coverage(finest).empty, 0);
    }

    #[test]
    fn preset_restarts_from_the_terminal_layer() {
        let mut scenario = Scenario::small();
        scenario.script.push((
            3,
            ControlEvent::Preset(String::from(r#"{"iterations": 500}"#)),
        ));
        let out = run(&scenario);
        assert_eq!(out.terminal_steps, 2);
        assert!(out.stale >= 1);
        assert_eq!(out.renderer.params().iterations, 500);
        assert!(out.converged_at.is_some_and(|at| at > 3));
        assert_eq!(out.presented_holes, 0);
    }

    #[test]
    fn out_of_memory_is_reported() {
        let mut scenario = Scenario::small();
        scenario.sim.memory_budget = Some(320 * 240 * 8);
        let err = scenario.run(&mut Tracer::none()).unwrap_err();
        assert!(matches!(
            err,
            RendererError::Pyramid(PyramidError::ResourceExhausted {
                cause: AllocError::OutOfDeviceMemory,
                ..
            })
        ));
    }

    #[test]
    fn lost_timestamps_still_converge() {
        let mut scenario = Scenario::small();
        scenario.toggles.lost_timestamps = true;
        let out = run(&scenario);
        assert!(out.converged_at.is_some());
        assert!(out.lost > 0);
        assert!(out.accepted > 0);
        assert_eq!(out.presented_holes, 0);
    }

    #[test]
    fn stalls_degrade_the_grade() {
        let clean = run(&Scenario::small());
        let mut scenario = Scenario::small();
        scenario.toggles.gpu_stall = true;
        scenario.sim.stall_every = 3;
        let stalled = run(&scenario);
        assert!(stalled.backend.stats().stalls > 0);
        assert!(stalled.report.overruns > 0);
        assert!(stalled.report.grade > clean.report.grade);
        assert!(stalled.converged_at.is_some());
    }

    #[test]
    fn unanswered_queries_fall_back_to_minimum_work() {
        let mut scenario = Scenario::small();
        scenario.sim.timestamp_latency = 1;
        let out = run(&scenario);
        // Every query is overwritten before its second poll while refining.
        assert_eq!(out.max_budget, 1_000);
        assert!(out.converged_at.is_some());
        assert_eq!(out.presented_holes, 0);
    }

    #[test]
    fn sparkline_tracks_the_window() {
        let out = run(&Scenario::small());
        assert_eq!(out.sparkline.len(), BUDGET_WINDOW);
    }
}
