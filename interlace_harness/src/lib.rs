// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulation and grading for progressive rendering.
//!
//! - [`sim::SimulatedBackend`] implements
//!   [`RenderBackend`](interlace_core::backend::RenderBackend) in software:
//!   synthetic fill throughput, timestamp latency, an allocation budget and a
//!   per-pixel map of where every pixel's value came from.
//! - [`budget::FrameBudgetTracker`] grades how well fills stay inside the
//!   fill-time target.
//! - [`scenario::Scenario`] drives a
//!   [`ProgressiveRenderer`](interlace_core::renderer::ProgressiveRenderer)
//!   against the simulator with scripted control events.

#![no_std]

extern crate alloc;

pub mod budget;
pub mod scenario;
pub mod sim;

/// Runtime pathology toggles for stress tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathologyToggles {
    /// Every few fills the GPU stalls for a long time.
    pub gpu_stall: bool,
    /// Measured spans are randomly stretched or shrunk.
    pub timer_jitter: bool,
    /// Some finished timestamp queries are reported lost.
    pub lost_timestamps: bool,
}
