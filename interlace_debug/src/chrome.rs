// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Recorded events carry frame indices, not wall-clock times, so frames are
//! laid out back to back at a fixed interval. GPU fills appear on their own
//! track with their measured duration, placed at the frame that collected
//! them; budget, schedule position and presented layer become counters.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};
use std::time::Duration;

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

const TID_FRAME: u32 = 0;
const TID_STEP: u32 = 1;
const TID_GPU: u32 = 2;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Frame `n` starts at `n * frame_interval`.
pub fn export(bytes: &[u8], frame_interval: Duration, writer: &mut dyn Write) -> io::Result<()> {
    let interval_us = frame_interval.as_nanos() as f64 / 1e3;
    let ts = |frame_index: u64| frame_index as f64 * interval_us;
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::FrameStart(e) => {
                events.push(json!({
                    "ph": "X",
                    "name": "Frame",
                    "cat": "Frame",
                    "ts": ts(e.frame_index),
                    "dur": interval_us,
                    "pid": 0,
                    "tid": TID_FRAME,
                    "args": {
                        "frame_index": e.frame_index,
                        "slot": e.slot,
                        "layer_count": e.layer_count,
                    }
                }));
            }
            RecordedEvent::Invalidation(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("Invalidate {:?}", e.invalidation),
                    "cat": "Control",
                    "ts": ts(e.frame_index),
                    "pid": 0,
                    "tid": TID_FRAME,
                    "s": "g",
                    "args": {
                        "frame_index": e.frame_index,
                        "cause": format!("{:?}", e.cause),
                    }
                }));
            }
            RecordedEvent::TimingSample(e) => {
                events.push(json!({
                    "ph": "X",
                    "name": "Fill",
                    "cat": "Gpu",
                    "ts": ts(e.frame_index),
                    "dur": e.seconds * 1e6,
                    "pid": 0,
                    "tid": TID_GPU,
                    "args": {
                        "frame_index": e.frame_index,
                        "slot": e.slot,
                        "work": e.work,
                        "fate": format!("{:?}", e.fate),
                    }
                }));
            }
            RecordedEvent::Budget(e) => {
                events.push(json!({
                    "ph": "C",
                    "name": "budget",
                    "ts": ts(e.frame_index),
                    "pid": 0,
                    "args": {
                        "work": e.budget,
                        "samples": e.samples,
                    }
                }));
            }
            RecordedEvent::Step(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.kind),
                    "cat": "Schedule",
                    "ts": ts(e.frame_index),
                    "pid": 0,
                    "tid": TID_STEP,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "layer": e.layer,
                        "mode": e.mode.map(|m| format!("{m:?}")),
                        "first_column": e.first_column,
                        "lines": e.lines,
                        "work": e.work,
                    }
                }));
                events.push(json!({
                    "ph": "C",
                    "name": "schedule",
                    "ts": ts(e.frame_index),
                    "pid": 0,
                    "args": {
                        "finished_layer": e.finished_layer,
                        "current_prog": e.current_prog,
                    }
                }));
            }
            RecordedEvent::Presentation(e) => {
                events.push(json!({
                    "ph": "C",
                    "name": "presented layer",
                    "ts": ts(e.frame_index),
                    "pid": 0,
                    "args": {
                        "layer": e.layer,
                    }
                }));
            }
            RecordedEvent::SlowFill(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "SlowFill",
                    "cat": "Gpu",
                    "ts": ts(e.frame_index),
                    "pid": 0,
                    "tid": TID_GPU,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "ms": e.seconds * 1e3,
                        "work": e.work,
                        "rate": e.rate,
                    }
                }));
            }
            RecordedEvent::PresetRejected(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "PresetRejected",
                    "cat": "Control",
                    "ts": ts(e.frame_index),
                    "pid": 0,
                    "tid": TID_FRAME,
                    "s": "p",
                    "args": {
                        "frame_index": e.frame_index,
                        "error": e.error.to_string(),
                    }
                }));
            }
            RecordedEvent::PresetFieldSkipped(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "PresetFieldSkipped",
                    "cat": "Control",
                    "ts": ts(e.frame_index),
                    "pid": 0,
                    "tid": TID_FRAME,
                    "s": "p",
                    "args": {
                        "frame_index": e.frame_index,
                        "field": e.field.key(),
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use interlace_core::backend::RenderMode;
    use interlace_core::scheduler::StepKind;
    use interlace_core::trace::{
        FrameStartEvent, SampleFate, StepEvent, TimingSampleEvent, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_frame_start(&FrameStartEvent {
            frame_index: 2,
            slot: 0,
            layer_count: 12,
            finished_layer: 11,
            current_prog: 0,
        });
        rec.on_timing_sample(&TimingSampleEvent {
            frame_index: 2,
            slot: 0,
            seconds: 0.25,
            work: 1_000,
            fate: SampleFate::Accepted,
        });
        rec.on_step(&StepEvent {
            frame_index: 2,
            kind: StepKind::Refine,
            layer: Some(10),
            mode: Some(RenderMode::StencilRead),
            first_column: 0,
            lines: 8,
            work: 128,
            finished_layer: 11,
            current_prog: 8,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), Duration::from_millis(10), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        // Step expands to an instant plus a counter.
        assert_eq!(parsed.len(), 4);

        assert_eq!(parsed[0]["ph"], "X");
        assert_eq!(parsed[0]["name"], "Frame");
        assert_eq!(parsed[0]["ts"], 20_000.0);
        assert_eq!(parsed[0]["dur"], 10_000.0);

        assert_eq!(parsed[1]["name"], "Fill");
        assert_eq!(parsed[1]["tid"], TID_GPU);
        assert_eq!(parsed[1]["dur"], 250_000.0);

        assert_eq!(parsed[2]["ph"], "i");
        assert_eq!(parsed[2]["name"], "Refine");
        assert_eq!(parsed[2]["args"]["mode"], "StencilRead");

        assert_eq!(parsed[3]["ph"], "C");
        assert_eq!(parsed[3]["args"]["current_prog"], 8);
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], Duration::from_millis(16), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
