// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pipelined GPU timing capture.
//!
//! Each in-flight frame owns one timing slot. The fill recorded in frame
//! `n` is bracketed by begin/end timestamps in slot `n mod depth`; when the
//! same slot comes around again (frame `n + depth`) its result is polled
//! without blocking and, if ready, turned into a [`Measurement`] for the
//! estimator.
//!
//! ```text
//!   frame n        frame n+1        frame n+depth
//!   begin(s)                        collect(s) ──► Measurement
//!   fill                            begin(s)
//!   end(s)                          fill ...
//! ```
//!
//! Every slot remembers the invalidation epoch it was opened in. A sample
//! that arrives after an invalidation describes work for parameters that
//! are gone and is reported as [`Collected::Stale`] instead.

use alloc::vec::Vec;

use crate::backend::{RenderBackend, TimestampPoll};

/// A completed fill timing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    /// GPU time between the timestamps.
    pub seconds: f64,
    /// Work units recorded between them.
    pub work: u64,
}

/// Result of [`TimingInstrument::collect`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Collected {
    /// Nothing was recorded in this slot.
    Idle,
    /// Recorded, but the GPU has not finished it yet.
    Pending,
    /// Finished, but opened before the latest invalidation.
    Stale(Measurement),
    /// The backend lost the query.
    Lost {
        /// Work the query covered.
        work: u64,
    },
    /// A valid measurement.
    Ready(Measurement),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Idle,
    Open { work: u64, epoch: u64 },
    Submitted { work: u64, epoch: u64 },
}

/// Multi-buffered timestamp bookkeeping, one slot per pipelined frame.
#[derive(Clone, Debug)]
pub struct TimingInstrument {
    slots: Vec<Slot>,
    epoch: u64,
    overwritten: u64,
}

impl TimingInstrument {
    /// Creates an instrument with `depth` slots (at least one).
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            slots: alloc::vec![Slot::Idle; depth.max(1)],
            epoch: 0,
            overwritten: 0,
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Current invalidation epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Measurements discarded because their slot was reused before they
    /// were collected.
    #[must_use]
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }

    /// Marks every in-flight measurement as stale.
    pub fn invalidate(&mut self) {
        self.epoch += 1;
    }

    fn index(&self, slot: usize) -> usize {
        slot % self.slots.len()
    }

    /// Writes the begin timestamp for `work` units about to be recorded.
    pub fn begin<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, slot: usize, work: u64) {
        let i = self.index(slot);
        if self.slots[i] != Slot::Idle {
            self.overwritten += 1;
        }
        self.slots[i] = Slot::Open {
            work,
            epoch: self.epoch,
        };
        backend.begin_timestamp(i);
    }

    /// Writes the end timestamp.
    pub fn end<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, slot: usize) {
        let i = self.index(slot);
        if let Slot::Open { work, epoch } = self.slots[i] {
            self.slots[i] = Slot::Submitted { work, epoch };
            backend.end_timestamp(i);
        } else {
            debug_assert!(false, "end without begin on timing slot {i}");
        }
    }

    /// Polls `slot` without blocking.
    pub fn collect<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, slot: usize) -> Collected {
        let i = self.index(slot);
        let Slot::Submitted { work, epoch } = self.slots[i] else {
            return Collected::Idle;
        };
        match backend.poll_timestamp(i) {
            TimestampPoll::NotReady => Collected::Pending,
            TimestampPoll::Lost => {
                self.slots[i] = Slot::Idle;
                Collected::Lost { work }
            }
            TimestampPoll::Ready { begin, end } => {
                self.slots[i] = Slot::Idle;
                let seconds = end.saturating_span_since(begin).to_seconds(backend.timebase());
                let m = Measurement { seconds, work };
                if epoch == self.epoch {
                    Collected::Ready(m)
                } else {
                    Collected::Stale(m)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::RecordingBackend;
    use crate::backend::{RenderMode, ScanlineFill};
    use crate::layer::{Extent, LayerIndex, Placement};
    use crate::params::{FractalParams, FractalUniforms};

    fn fill(backend: &mut RecordingBackend, columns: u32, height: u32) {
        use crate::backend::RenderBackend;
        let extent = Extent::new(columns, height);
        backend.submit_scanline_fill(&ScanlineFill {
            layer: LayerIndex(0),
            extent,
            first_column: 0,
            columns,
            mode: RenderMode::Simple,
            placement: Placement::IDENTITY,
            uniforms: FractalUniforms::new(&FractalParams::DEFAULT, extent),
        });
    }

    #[test]
    fn measurement_arrives_on_slot_reuse() {
        let mut backend = RecordingBackend::new();
        backend.nanos_per_pixel = 100;
        let mut timing = TimingInstrument::new(2);

        assert_eq!(timing.collect(&mut backend, 0), Collected::Idle);
        timing.begin(&mut backend, 0, 5_000);
        fill(&mut backend, 50, 100);
        timing.end(&mut backend, 0);

        match timing.collect(&mut backend, 0) {
            Collected::Ready(m) => {
                assert_eq!(m.work, 5_000);
                assert!((m.seconds - 5_000.0 * 100e-9).abs() < 1e-12, "{m:?}");
            }
            other => panic!("expected a measurement, got {other:?}"),
        }
        // Consumed.
        assert_eq!(timing.collect(&mut backend, 0), Collected::Idle);
    }

    #[test]
    fn pending_slot_is_skipped_and_kept() {
        let mut backend = RecordingBackend::new();
        let mut timing = TimingInstrument::new(2);
        timing.begin(&mut backend, 1, 10);
        timing.end(&mut backend, 1);
        backend.hold_timestamps = true;
        assert_eq!(timing.collect(&mut backend, 1), Collected::Pending);
        backend.hold_timestamps = false;
        assert!(matches!(timing.collect(&mut backend, 1), Collected::Ready(_)));
    }

    #[test]
    fn invalidation_discards_in_flight_samples() {
        let mut backend = RecordingBackend::new();
        let mut timing = TimingInstrument::new(2);
        timing.begin(&mut backend, 0, 10);
        fill(&mut backend, 1, 10);
        timing.end(&mut backend, 0);
        timing.invalidate();
        assert!(matches!(timing.collect(&mut backend, 0), Collected::Stale(_)));

        // Samples opened after the invalidation are fine.
        timing.begin(&mut backend, 0, 10);
        timing.end(&mut backend, 0);
        assert!(matches!(timing.collect(&mut backend, 0), Collected::Ready(_)));
    }

    #[test]
    fn reused_slot_counts_overwrite() {
        let mut backend = RecordingBackend::new();
        let mut timing = TimingInstrument::new(1);
        timing.begin(&mut backend, 0, 10);
        timing.end(&mut backend, 0);
        timing.begin(&mut backend, 0, 20);
        timing.end(&mut backend, 0);
        assert_eq!(timing.overwritten(), 1);
        match timing.collect(&mut backend, 0) {
            Collected::Ready(m) => assert_eq!(m.work, 20),
            other => panic!("expected a measurement, got {other:?}"),
        }
    }

    #[test]
    fn slots_wrap_and_zero_depth_is_promoted() {
        let timing = TimingInstrument::new(0);
        assert_eq!(timing.depth(), 1);
        let timing = TimingInstrument::new(3);
        assert_eq!(timing.index(7), 1);
    }
}
