// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as tagged little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`]. Decoding stops at the first unknown
//! tag or truncated record.

use interlace_core::backend::RenderMode;
use interlace_core::events::Invalidation;
use interlace_core::params::{PresetError, PresetField};
use interlace_core::scheduler::StepKind;
use interlace_core::trace::{
    BudgetEvent, FrameStartEvent, InvalidationCause, InvalidationEvent, PresentationEvent,
    PresetFieldSkippedEvent, PresetRejectedEvent, SampleFate, SlowFillEvent, StepEvent,
    TimingSampleEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_FRAME_START: u8 = 1;
const TAG_INVALIDATION: u8 = 2;
const TAG_TIMING_SAMPLE: u8 = 3;
const TAG_BUDGET: u8 = 4;
const TAG_STEP: u8 = 5;
const TAG_PRESENTATION: u8 = 6;
const TAG_SLOW_FILL: u8 = 7;
const TAG_PRESET_REJECTED: u8 = 8;
const TAG_PRESET_FIELD_SKIPPED: u8 = 9;

// ---------------------------------------------------------------------------
// Enum codes
// ---------------------------------------------------------------------------

fn invalidation_code(v: Invalidation) -> u8 {
    match v {
        Invalidation::None => 0,
        Invalidation::Soft => 1,
        Invalidation::Hard => 2,
    }
}

fn invalidation_from(code: u8) -> Option<Invalidation> {
    Some(match code {
        0 => Invalidation::None,
        1 => Invalidation::Soft,
        2 => Invalidation::Hard,
        _ => return None,
    })
}

fn cause_code(v: InvalidationCause) -> u8 {
    match v {
        InvalidationCause::Navigation => 0,
        InvalidationCause::Preset => 1,
        InvalidationCause::Resize => 2,
        InvalidationCause::Explicit => 3,
    }
}

fn cause_from(code: u8) -> Option<InvalidationCause> {
    Some(match code {
        0 => InvalidationCause::Navigation,
        1 => InvalidationCause::Preset,
        2 => InvalidationCause::Resize,
        3 => InvalidationCause::Explicit,
        _ => return None,
    })
}

fn fate_code(v: SampleFate) -> u8 {
    match v {
        SampleFate::Accepted => 0,
        SampleFate::Stale => 1,
        SampleFate::Lost => 2,
    }
}

fn fate_from(code: u8) -> Option<SampleFate> {
    Some(match code {
        0 => SampleFate::Accepted,
        1 => SampleFate::Stale,
        2 => SampleFate::Lost,
        _ => return None,
    })
}

fn kind_code(v: StepKind) -> u8 {
    match v {
        StepKind::Terminal => 0,
        StepKind::FastForward => 1,
        StepKind::Refine => 2,
        StepKind::Idle => 3,
    }
}

fn kind_from(code: u8) -> Option<StepKind> {
    Some(match code {
        0 => StepKind::Terminal,
        1 => StepKind::FastForward,
        2 => StepKind::Refine,
        3 => StepKind::Idle,
        _ => return None,
    })
}

/// `0` is "no mode".
fn mode_code(v: Option<RenderMode>) -> u8 {
    match v {
        None => 0,
        Some(RenderMode::Simple) => 1,
        Some(RenderMode::StencilWrite) => 2,
        Some(RenderMode::StencilRead) => 3,
    }
}

fn mode_from(code: u8) -> Option<Option<RenderMode>> {
    Some(match code {
        0 => None,
        1 => Some(RenderMode::Simple),
        2 => Some(RenderMode::StencilWrite),
        3 => Some(RenderMode::StencilRead),
        _ => return None,
    })
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "there are eleven preset fields"
)]
fn field_code(v: PresetField) -> u8 {
    PresetField::ALL.iter().position(|&f| f == v).unwrap_or(0) as u8
}

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    fn write_option_u32(&mut self, v: Option<u32>) {
        self.write_u8(u8::from(v.is_some()));
        self.write_u32(v.unwrap_or(0));
    }
}

impl TraceSink for RecorderSink {
    fn on_frame_start(&mut self, e: &FrameStartEvent) {
        self.write_u8(TAG_FRAME_START);
        self.write_u64(e.frame_index);
        self.write_u32(e.slot);
        self.write_u32(e.layer_count);
        self.write_u32(e.finished_layer);
        self.write_u32(e.current_prog);
    }

    fn on_invalidation(&mut self, e: &InvalidationEvent) {
        self.write_u8(TAG_INVALIDATION);
        self.write_u64(e.frame_index);
        self.write_u8(invalidation_code(e.invalidation));
        self.write_u8(cause_code(e.cause));
    }

    fn on_timing_sample(&mut self, e: &TimingSampleEvent) {
        self.write_u8(TAG_TIMING_SAMPLE);
        self.write_u64(e.frame_index);
        self.write_u32(e.slot);
        self.write_f64(e.seconds);
        self.write_u64(e.work);
        self.write_u8(fate_code(e.fate));
    }

    fn on_budget(&mut self, e: &BudgetEvent) {
        self.write_u8(TAG_BUDGET);
        self.write_u64(e.frame_index);
        self.write_f64(e.target_seconds);
        self.write_u64(e.budget);
        self.write_u32(e.samples);
    }

    fn on_step(&mut self, e: &StepEvent) {
        self.write_u8(TAG_STEP);
        self.write_u64(e.frame_index);
        self.write_u8(kind_code(e.kind));
        self.write_option_u32(e.layer);
        self.write_u8(mode_code(e.mode));
        self.write_u32(e.first_column);
        self.write_u32(e.lines);
        self.write_u64(e.work);
        self.write_u32(e.finished_layer);
        self.write_u32(e.current_prog);
    }

    fn on_presentation(&mut self, e: &PresentationEvent) {
        self.write_u8(TAG_PRESENTATION);
        self.write_u64(e.frame_index);
        self.write_u32(e.layer);
    }

    fn on_slow_fill(&mut self, e: &SlowFillEvent) {
        self.write_u8(TAG_SLOW_FILL);
        self.write_u64(e.frame_index);
        self.write_f64(e.seconds);
        self.write_u64(e.work);
        self.write_f64(e.rate);
    }

    fn on_preset_rejected(&mut self, e: &PresetRejectedEvent) {
        self.write_u8(TAG_PRESET_REJECTED);
        self.write_u64(e.frame_index);
        match e.error {
            PresetError::NotAnObject => {
                self.write_u8(0);
                self.write_u64(0);
                self.write_u64(0);
            }
            PresetError::Malformed { line, column } => {
                self.write_u8(1);
                self.write_u64(line as u64);
                self.write_u64(column as u64);
            }
        }
    }

    fn on_preset_field_skipped(&mut self, e: &PresetFieldSkippedEvent) {
        self.write_u8(TAG_PRESET_FIELD_SKIPPED);
        self.write_u64(e.frame_index);
        self.write_u8(field_code(e.field));
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`FrameStartEvent`].
    FrameStart(FrameStartEvent),
    /// An [`InvalidationEvent`].
    Invalidation(InvalidationEvent),
    /// A [`TimingSampleEvent`].
    TimingSample(TimingSampleEvent),
    /// A [`BudgetEvent`].
    Budget(BudgetEvent),
    /// A [`StepEvent`].
    Step(StepEvent),
    /// A [`PresentationEvent`].
    Presentation(PresentationEvent),
    /// A [`SlowFillEvent`].
    SlowFill(SlowFillEvent),
    /// A [`PresetRejectedEvent`].
    PresetRejected(PresetRejectedEvent),
    /// A [`PresetFieldSkippedEvent`].
    PresetFieldSkipped(PresetFieldSkippedEvent),
}

impl RecordedEvent {
    /// Frame the event belongs to.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        match self {
            Self::FrameStart(e) => e.frame_index,
            Self::Invalidation(e) => e.frame_index,
            Self::TimingSample(e) => e.frame_index,
            Self::Budget(e) => e.frame_index,
            Self::Step(e) => e.frame_index,
            Self::Presentation(e) => e.frame_index,
            Self::SlowFill(e) => e.frame_index,
            Self::PresetRejected(e) => e.frame_index,
            Self::PresetFieldSkipped(e) => e.frame_index,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_f64(&mut self) -> Option<f64> {
        self.read_u64().map(f64::from_bits)
    }

    fn read_option_u32(&mut self) -> Option<Option<u32>> {
        let present = self.read_u8()?;
        let v = self.read_u32()?;
        Some((present != 0).then_some(v))
    }

    fn read_usize(&mut self) -> Option<usize> {
        self.read_u64()?.try_into().ok()
    }

    fn decode_frame_start(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameStart(FrameStartEvent {
            frame_index: self.read_u64()?,
            slot: self.read_u32()?,
            layer_count: self.read_u32()?,
            finished_layer: self.read_u32()?,
            current_prog: self.read_u32()?,
        }))
    }

    fn decode_invalidation(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Invalidation(InvalidationEvent {
            frame_index: self.read_u64()?,
            invalidation: invalidation_from(self.read_u8()?)?,
            cause: cause_from(self.read_u8()?)?,
        }))
    }

    fn decode_timing_sample(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TimingSample(TimingSampleEvent {
            frame_index: self.read_u64()?,
            slot: self.read_u32()?,
            seconds: self.read_f64()?,
            work: self.read_u64()?,
            fate: fate_from(self.read_u8()?)?,
        }))
    }

    fn decode_budget(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Budget(BudgetEvent {
            frame_index: self.read_u64()?,
            target_seconds: self.read_f64()?,
            budget: self.read_u64()?,
            samples: self.read_u32()?,
        }))
    }

    fn decode_step(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Step(StepEvent {
            frame_index: self.read_u64()?,
            kind: kind_from(self.read_u8()?)?,
            layer: self.read_option_u32()?,
            mode: mode_from(self.read_u8()?)?,
            first_column: self.read_u32()?,
            lines: self.read_u32()?,
            work: self.read_u64()?,
            finished_layer: self.read_u32()?,
            current_prog: self.read_u32()?,
        }))
    }

    fn decode_presentation(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Presentation(PresentationEvent {
            frame_index: self.read_u64()?,
            layer: self.read_u32()?,
        }))
    }

    fn decode_slow_fill(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SlowFill(SlowFillEvent {
            frame_index: self.read_u64()?,
            seconds: self.read_f64()?,
            work: self.read_u64()?,
            rate: self.read_f64()?,
        }))
    }

    fn decode_preset_rejected(&mut self) -> Option<RecordedEvent> {
        let frame_index = self.read_u64()?;
        let kind = self.read_u8()?;
        let line = self.read_usize()?;
        let column = self.read_usize()?;
        let error = match kind {
            0 => PresetError::NotAnObject,
            1 => PresetError::Malformed { line, column },
            _ => return None,
        };
        Some(RecordedEvent::PresetRejected(PresetRejectedEvent {
            frame_index,
            error,
        }))
    }

    fn decode_preset_field_skipped(&mut self) -> Option<RecordedEvent> {
        let frame_index = self.read_u64()?;
        let field = *PresetField::ALL.get(usize::from(self.read_u8()?))?;
        Some(RecordedEvent::PresetFieldSkipped(PresetFieldSkippedEvent {
            frame_index,
            field,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_FRAME_START => self.decode_frame_start(),
            TAG_INVALIDATION => self.decode_invalidation(),
            TAG_TIMING_SAMPLE => self.decode_timing_sample(),
            TAG_BUDGET => self.decode_budget(),
            TAG_STEP => self.decode_step(),
            TAG_PRESENTATION => self.decode_presentation(),
            TAG_SLOW_FILL => self.decode_slow_fill(),
            TAG_PRESET_REJECTED => self.decode_preset_rejected(),
            TAG_PRESET_FIELD_SKIPPED => self.decode_preset_field_skipped(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn refine_step() -> StepEvent {
        StepEvent {
            frame_index: 9,
            kind: StepKind::Refine,
            layer: Some(4),
            mode: Some(RenderMode::StencilRead),
            first_column: 12,
            lines: 30,
            work: 7_680,
            finished_layer: 5,
            current_prog: 42,
        }
    }

    #[test]
    fn step_fields_survive_recording() {
        let mut rec = RecorderSink::new();
        let orig = refine_step();
        rec.on_step(&orig);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::Step(e) => {
                assert_eq!(e.kind, orig.kind);
                assert_eq!(e.layer, orig.layer);
                assert_eq!(e.mode, orig.mode);
                assert_eq!((e.first_column, e.lines), (12, 30));
                assert_eq!(e.work, orig.work);
                assert_eq!((e.finished_layer, e.current_prog), (5, 42));
            }
            other => panic!("expected Step, got {other:?}"),
        }
    }

    #[test]
    fn idle_step_has_no_layer_or_mode() {
        let mut rec = RecorderSink::new();
        rec.on_step(&StepEvent {
            kind: StepKind::Idle,
            layer: None,
            mode: None,
            lines: 0,
            work: 0,
            ..refine_step()
        });
        match decode(rec.as_bytes()).next() {
            Some(RecordedEvent::Step(e)) => {
                assert_eq!(e.kind, StepKind::Idle);
                assert_eq!(e.layer, None);
                assert_eq!(e.mode, None);
            }
            other => panic!("expected Step, got {other:?}"),
        }
    }

    #[test]
    fn floats_are_bit_exact() {
        let mut rec = RecorderSink::new();
        rec.on_timing_sample(&TimingSampleEvent {
            frame_index: 3,
            slot: 1,
            seconds: 0.016_666_7,
            work: 250_000,
            fate: SampleFate::Stale,
        });
        rec.on_budget(&BudgetEvent {
            frame_index: 3,
            target_seconds: 1.0 / 50.0,
            budget: 300_000,
            samples: 17,
        });
        let events: Vec<_> = decode(rec.as_bytes()).collect();
        match &events[..] {
            [RecordedEvent::TimingSample(s), RecordedEvent::Budget(b)] => {
                assert_eq!(s.seconds.to_bits(), 0.016_666_7_f64.to_bits());
                assert_eq!(s.fate, SampleFate::Stale);
                assert_eq!(b.target_seconds, 1.0 / 50.0);
                assert_eq!(b.samples, 17);
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn preset_diagnostics_round_trip() {
        let mut rec = RecorderSink::new();
        rec.on_preset_rejected(&PresetRejectedEvent {
            frame_index: 1,
            error: PresetError::Malformed { line: 2, column: 7 },
        });
        rec.on_preset_rejected(&PresetRejectedEvent {
            frame_index: 1,
            error: PresetError::NotAnObject,
        });
        rec.on_preset_field_skipped(&PresetFieldSkippedEvent {
            frame_index: 1,
            field: PresetField::Gamma,
        });
        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[0],
            RecordedEvent::PresetRejected(PresetRejectedEvent {
                error: PresetError::Malformed { line: 2, column: 7 },
                ..
            })
        ));
        assert!(matches!(
            events[1],
            RecordedEvent::PresetRejected(PresetRejectedEvent {
                error: PresetError::NotAnObject,
                ..
            })
        ));
        assert!(matches!(
            events[2],
            RecordedEvent::PresetFieldSkipped(PresetFieldSkippedEvent {
                field: PresetField::Gamma,
                ..
            })
        ));
    }

    #[test]
    fn mixed_frame_keeps_order() {
        let mut rec = RecorderSink::new();
        rec.on_frame_start(&FrameStartEvent {
            frame_index: 9,
            slot: 1,
            layer_count: 12,
            finished_layer: 5,
            current_prog: 12,
        });
        rec.on_invalidation(&InvalidationEvent {
            frame_index: 9,
            invalidation: Invalidation::Soft,
            cause: InvalidationCause::Navigation,
        });
        rec.on_step(&refine_step());
        rec.on_presentation(&PresentationEvent {
            frame_index: 9,
            layer: 5,
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], RecordedEvent::FrameStart(_)));
        assert!(matches!(events[1], RecordedEvent::Invalidation(_)));
        assert!(matches!(events[2], RecordedEvent::Step(_)));
        assert!(matches!(events[3], RecordedEvent::Presentation(_)));
        assert!(events.iter().all(|e| e.frame_index() == 9));
    }

    #[test]
    fn truncated_record_stops_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_presentation(&PresentationEvent {
            frame_index: 1,
            layer: 2,
        });
        rec.on_step(&refine_step());
        let bytes = rec.into_bytes();
        let events: Vec<_> = decode(&bytes[..bytes.len() - 3]).collect();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }
}
