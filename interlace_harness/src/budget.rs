// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fill-time budget grading.

use alloc::string::String;

/// A fill counts as an overrun when it takes longer than this multiple of
/// the target.
pub const OVERRUN_FACTOR: f64 = 1.5;

/// One measured fill, fed into [`FrameBudgetTracker::observe`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BudgetSample {
    /// Measured GPU time of the fill, in ms.
    pub fill_ms: f64,
    /// Fill-time target the budget was predicted for, in ms.
    pub target_ms: f64,
}

/// Letter grade for budget adherence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BudgetGrade {
    /// Essentially no overruns.
    A,
    /// Occasional overruns.
    B,
    /// Frequent overruns.
    C,
    /// The budget is not being held.
    D,
}

impl BudgetGrade {
    /// Returns a short label for HUD rendering.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Aggregated report returned by [`FrameBudgetTracker::observe`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BudgetReport {
    /// Current grade.
    pub grade: BudgetGrade,
    /// Overruns per 1000 observed fills.
    pub overrun_rate_per_1000: f64,
    /// Mean of `fill / target` over the window.
    pub utilization: f64,
    /// Total fills observed.
    pub total_samples: u64,
    /// Total overruns observed.
    pub overruns: u64,
}

/// Rolling tracker with a fixed-size window of fill ratios.
#[derive(Debug)]
pub struct FrameBudgetTracker<const N: usize> {
    ratios: [f64; N],
    cursor: usize,
    filled: usize,
    total_samples: u64,
    overruns: u64,
}

impl<const N: usize> Default for FrameBudgetTracker<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameBudgetTracker<N> {
    /// Creates an empty tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ratios: [0.0; N],
            cursor: 0,
            filled: 0,
            total_samples: 0,
            overruns: 0,
        }
    }

    /// Observes one fill and returns an updated report.
    pub fn observe(&mut self, sample: BudgetSample) -> BudgetReport {
        let ratio = if sample.target_ms > 0.0 {
            sample.fill_ms / sample.target_ms
        } else {
            0.0
        };
        self.total_samples = self.total_samples.saturating_add(1);
        if ratio > OVERRUN_FACTOR {
            self.overruns = self.overruns.saturating_add(1);
        }
        if N > 0 {
            self.ratios[self.cursor % N] = ratio;
            self.cursor = (self.cursor + 1) % N;
            self.filled = (self.filled + 1).min(N);
        }
        self.report()
    }

    /// Report for the samples seen so far.
    #[must_use]
    pub fn report(&self) -> BudgetReport {
        let overrun_rate = if self.total_samples == 0 {
            0.0
        } else {
            self.overruns as f64 * 1000.0 / self.total_samples as f64
        };
        let utilization = if self.filled == 0 {
            0.0
        } else {
            self.window().iter().sum::<f64>() / self.filled as f64
        };
        BudgetReport {
            grade: grade_for(overrun_rate),
            overrun_rate_per_1000: overrun_rate,
            utilization,
            total_samples: self.total_samples,
            overruns: self.overruns,
        }
    }

    fn window(&self) -> &[f64] {
        &self.ratios[..self.filled]
    }

    /// Returns the window's fill ratios oldest→newest; unfilled entries are
    /// zero.
    #[must_use]
    pub fn ratios(&self) -> [f64; N] {
        let mut out = [0.0; N];
        let start = if self.filled < N { 0 } else { self.cursor };
        for (i, slot) in out.iter_mut().enumerate().take(self.filled) {
            *slot = self.ratios[(start + i) % N];
        }
        out
    }

    /// Returns an ASCII sparkline over [`ratios`](Self::ratios), scaled so
    /// `max_ratio` is the tallest glyph.
    #[must_use]
    pub fn sparkline_ascii(&self, max_ratio: f64) -> String {
        const LEVELS: &[u8] = b" .:-=+*#%@";
        let mut out = String::with_capacity(N);
        for r in self.ratios() {
            let t = if max_ratio > 0.0 {
                (r / max_ratio).clamp(0.0, 1.0)
            } else {
                0.0
            };
            #[expect(
                clippy::cast_possible_truncation,
                reason = "index is clamped to ASCII level count"
            )]
            let level = (t * (LEVELS.len() as f64 - 1.0) + 0.5) as usize;
            out.push(LEVELS[level] as char);
        }
        out
    }
}

fn grade_for(overrun_rate_per_1000: f64) -> BudgetGrade {
    if overrun_rate_per_1000 < 5.0 {
        BudgetGrade::A
    } else if overrun_rate_per_1000 < 20.0 {
        BudgetGrade::B
    } else if overrun_rate_per_1000 < 60.0 {
        BudgetGrade::C
    } else {
        BudgetGrade::D
    }
}
