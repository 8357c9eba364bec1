// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fan-out to two sinks.

use interlace_core::trace::{
    BudgetEvent, FrameStartEvent, InvalidationEvent, PresentationEvent, PresetFieldSkippedEvent,
    PresetRejectedEvent, SlowFillEvent, StepEvent, TimingSampleEvent, TraceSink,
};

/// Forwards every event to `A`, then `B`.
#[derive(Debug, Default)]
pub struct Tee<A, B> {
    /// First sink.
    pub first: A,
    /// Second sink.
    pub second: B,
}

impl<A: TraceSink, B: TraceSink> Tee<A, B> {
    /// Pairs two sinks.
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

macro_rules! forward {
    ($($method:ident($ty:ty);)*) => {
        $(
            fn $method(&mut self, e: &$ty) {
                self.first.$method(e);
                self.second.$method(e);
            }
        )*
    };
}

impl<A: TraceSink, B: TraceSink> TraceSink for Tee<A, B> {
    forward! {
        on_frame_start(FrameStartEvent);
        on_invalidation(InvalidationEvent);
        on_timing_sample(TimingSampleEvent);
        on_budget(BudgetEvent);
        on_step(StepEvent);
        on_presentation(PresentationEvent);
        on_slow_fill(SlowFillEvent);
        on_preset_rejected(PresetRejectedEvent);
        on_preset_field_skipped(PresetFieldSkippedEvent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{RecorderSink, decode};

    #[test]
    fn both_sinks_see_every_event() {
        let mut tee = Tee::new(RecorderSink::new(), RecorderSink::new());
        tee.on_presentation(&PresentationEvent {
            frame_index: 2,
            layer: 7,
        });
        tee.on_frame_start(&FrameStartEvent {
            frame_index: 3,
            slot: 1,
            layer_count: 8,
            finished_layer: 7,
            current_prog: 0,
        });
        assert_eq!(tee.first.as_bytes(), tee.second.as_bytes());
        assert_eq!(decode(tee.first.as_bytes()).count(), 2);
    }
}
