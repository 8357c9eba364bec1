// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adaptive progressive rendering under a frame-time budget.
//!
//! `interlace_core` schedules an expensive per-pixel image (a fractal field)
//! so that every frame stays within a GPU time slice while the picture
//! converges from a tiny preview to full resolution. It is `no_std`
//! compatible (with `alloc`) and knows nothing about a concrete graphics
//! API: all GPU work goes through the [`RenderBackend`](backend::RenderBackend)
//! trait.
//!
//! # Architecture
//!
//! ```text
//!   ControlEvents ──► ProgressiveRenderer::apply_events() ──► Invalidation
//!                                 │
//!                                 ▼
//!   TimingInstrument::collect() ──► Measurement ──► EffortEstimator
//!                                                        │
//!                 ┌──────────────────────────────────────┘
//!                 ▼
//!   predict_work(fill target) ──► RenderStepScheduler::step()
//!                                        │  (copy + fill, timestamps)
//!                                        ▼
//!   present::select_layer() ──► Presentation ──► compositor
//! ```
//!
//! **[`layer`]** — The layer pyramid: each layer halves one axis of its
//! finer neighbor. Terminal layer, placements and interlace stencil bars.
//!
//! **[`estimator`]** — Rolling regression from measured fill time to work
//! done, predicting how much work fits a time slice.
//!
//! **[`scheduler`]** — Per-frame state machine over `(finished_layer,
//! current_prog)`: terminal render, fast-forward, interlaced refinement.
//!
//! **[`timing`]** — Multi-buffered GPU timestamp capture with one-cycle
//! latency and invalidation epochs.
//!
//! **[`present`]** — Which layer is safe to show.
//!
//! **[`renderer`]** — [`ProgressiveRenderer`](renderer::ProgressiveRenderer),
//! the context object that owns all of the above and runs one frame.
//!
//! **[`params`]** / **[`events`]** — Navigation and preset state, the
//! control events that change it, and the GPU uniform block.
//!
//! **[`pacer`]** — Fixed-rate frame pacing for hosts without a display
//! link.
//!
//! **[`backend`]** — The [`RenderBackend`](backend::RenderBackend) trait.
//!
//! **[`time`]** — Backend timestamps and timebase conversion.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) trait and event types for
//! frame-loop instrumentation, with zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies and
//!   the cross-thread control-event channel.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod backend;
pub mod estimator;
pub mod events;
pub mod layer;
pub mod pacer;
pub mod params;
pub mod present;
pub mod renderer;
pub mod scheduler;
pub mod time;
pub mod timing;
pub mod trace;
