// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-rate frame pacing.
//!
//! Hosts without a display-link callback drive the renderer from a loop
//! that sleeps until the next deadline. [`FramePacer`] hands out
//! [`FrameTick`]s at a fixed interval and assigns each frame its timing
//! slot.

use core::time::Duration;

/// One frame opportunity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameTick {
    /// Monotonic frame counter.
    pub frame_index: u64,
    /// Timing slot, `frame_index mod pipeline_depth`.
    pub slot: usize,
    /// Time (since the pacer started) this frame should start by.
    pub deadline: Duration,
}

/// Produces evenly spaced frame deadlines.
#[derive(Clone, Copy, Debug)]
pub struct FramePacer {
    interval: Duration,
    pipeline_depth: usize,
    frame_index: u64,
    next_deadline: Duration,
}

impl FramePacer {
    /// Slightly faster than 60 Hz so a vsync-locked present never waits a
    /// whole extra refresh.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 61);

    /// Default fill-time target in seconds (1/50 s).
    pub const DEFAULT_FILL_TARGET: f64 = 1.0 / 50.0;

    /// Creates a pacer starting at time zero.
    #[must_use]
    pub fn new(interval: Duration, pipeline_depth: usize) -> Self {
        Self {
            interval,
            pipeline_depth: pipeline_depth.max(1),
            frame_index: 0,
            next_deadline: Duration::ZERO,
        }
    }

    /// Frame interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of timing slots cycled through.
    #[must_use]
    pub fn pipeline_depth(&self) -> usize {
        self.pipeline_depth
    }

    /// Issues the next tick and advances the deadline by one interval.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "remainder is below pipeline_depth, a usize"
    )]
    pub fn next_tick(&mut self) -> FrameTick {
        let tick = FrameTick {
            frame_index: self.frame_index,
            slot: (self.frame_index % self.pipeline_depth as u64) as usize,
            deadline: self.next_deadline,
        };
        self.frame_index += 1;
        self.next_deadline += self.interval;
        tick
    }

    /// How long to sleep at `now` before the next tick is due.
    #[must_use]
    pub fn wait_time(&self, now: Duration) -> Duration {
        self.next_deadline.saturating_sub(now)
    }

    /// Drops missed deadlines after a stall longer than one interval, so
    /// the loop does not burst to catch up. Returns the number skipped.
    pub fn resync(&mut self, now: Duration) -> u32 {
        let mut skipped = 0;
        while now > self.next_deadline + self.interval {
            self.next_deadline += self.interval;
            skipped += 1;
        }
        skipped
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_cycle_through_pipeline_depth() {
        let mut pacer = FramePacer::new(Duration::from_millis(10), 3);
        let slots: [usize; 7] = core::array::from_fn(|_| pacer.next_tick().slot);
        assert_eq!(slots, [0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn deadlines_advance_by_interval() {
        let mut pacer = FramePacer::new(Duration::from_millis(10), 2);
        assert_eq!(pacer.next_tick().deadline, Duration::ZERO);
        let t = pacer.next_tick();
        assert_eq!(t.frame_index, 1);
        assert_eq!(t.deadline, Duration::from_millis(10));
        assert_eq!(pacer.wait_time(Duration::from_millis(12)), Duration::from_millis(8));
        assert_eq!(pacer.wait_time(Duration::from_millis(30)), Duration::ZERO);
    }

    #[test]
    fn resync_skips_missed_frames() {
        let mut pacer = FramePacer::new(Duration::from_millis(10), 2);
        pacer.next_tick();
        // Next deadline is 10ms; stalled until 55ms.
        assert_eq!(pacer.resync(Duration::from_millis(55)), 4);
        assert_eq!(pacer.next_tick().deadline, Duration::from_millis(50));
        assert_eq!(pacer.resync(Duration::from_millis(61)), 0);
    }

    #[test]
    fn default_runs_slightly_above_sixty_hertz() {
        let pacer = FramePacer::default();
        assert_eq!(pacer.interval(), Duration::from_nanos(16_393_442));
        assert_eq!(pacer.pipeline_depth(), 2);
    }
}
