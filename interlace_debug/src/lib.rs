// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, and Chrome trace export for interlace
//! diagnostics.
//!
//! This crate provides [`TraceSink`](interlace_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`] — human-readable one-line-per-event output.
//! - [`recorder::RecorderSink`] — compact binary recording with
//!   [`recorder::decode`] for playback.
//! - [`chrome::export`] — writes Chrome Trace Event Format JSON from
//!   recorded bytes, laying frames out on a fixed-interval timeline.
//! - [`tee::Tee`] — forwards every event to two sinks.

pub mod chrome;
pub mod pretty;
pub mod recorder;
pub mod tee;
