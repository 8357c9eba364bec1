// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for graphics integrations.
//!
//! `interlace_core` never records GPU commands itself. A *backend* owns the
//! device, the per-layer images and stencils, the pipelines for each
//! [`RenderMode`], and a pool of timestamp queries. The scheduler drives it
//! through [`RenderBackend`]:
//!
//! - **Layers** — [`allocate_layer`](RenderBackend::allocate_layer) once per
//!   pyramid level, [`release_layers`](RenderBackend::release_layers) when the
//!   pyramid is dropped or rebuilt.
//! - **Stencil setup** — [`paint_stencil`](RenderBackend::paint_stencil) per
//!   layer, followed by a blocking [`wait_idle`](RenderBackend::wait_idle).
//! - **Fills** — [`submit_scanline_fill`](RenderBackend::submit_scanline_fill)
//!   runs the per-pixel stage over a column range of one layer;
//!   [`copy_layer`](RenderBackend::copy_layer) seeds a layer with a scaled
//!   blit of the next coarser one.
//! - **Timing** — begin/end timestamps bracket each fill in a per-frame slot
//!   and are polled (never awaited) one pipelined frame later.
//! - **Synchronization** — [`layout_transition`](RenderBackend::layout_transition)
//!   is issued whenever a layer image changes role.
//!
//! # Frame loop pseudocode
//!
//! ```rust,ignore
//! fn on_frame(tick: FrameTick) {
//!     let _guard = target.lock();
//!     let events = control.drain();
//!     let report = renderer.frame(&mut backend, tick.slot, events, &mut tracer)?;
//!     let shown = renderer.select_presentation(&mut backend, &mut tracer)?;
//!     compositor.draw(shown.layer, shown.placement);
//!     backend.submit();
//! }
//! ```

use core::fmt;

use crate::layer::{Extent, LayerDesc, LayerIndex, Placement, StencilPattern};
use crate::params::FractalUniforms;
use crate::time::{Timebase, Timestamp};

/// Pipeline variant used for a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// No stencil test; every pixel in range is computed.
    Simple,
    /// Writes the stencil reference; used only for mask setup.
    StencilWrite,
    /// Computes only pixels whose stencil matches the reference.
    StencilRead,
}

/// Layout (usage state) of a layer image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents undefined; the initial state.
    Undefined,
    /// Target of a fill.
    ColorAttachment,
    /// Source of a copy.
    TransferSrc,
    /// Destination of a copy.
    TransferDst,
    /// Readable by the compositor.
    ShaderRead,
}

/// One bounded fill of a column range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanlineFill {
    /// Target layer.
    pub layer: LayerIndex,
    /// Extent of the target layer.
    pub extent: Extent,
    /// First column of the scissor.
    pub first_column: u32,
    /// Number of columns in the scissor.
    pub columns: u32,
    /// Pipeline variant.
    pub mode: RenderMode,
    /// World-space placement of the layer.
    pub placement: Placement,
    /// Per-pixel stage parameters.
    pub uniforms: FractalUniforms,
}

/// Result of polling a timestamp slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimestampPoll {
    /// Both timestamps are available.
    Ready {
        /// Written before the fill.
        begin: Timestamp,
        /// Written after the fill.
        end: Timestamp,
    },
    /// The GPU has not reached the end timestamp yet.
    NotReady,
    /// The query failed or was reset; the measurement will never arrive.
    Lost,
}

/// Why a layer could not be allocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// Device memory exhausted.
    OutOfDeviceMemory,
    /// Host memory exhausted.
    OutOfHostMemory,
    /// The extent or format is not supported by the device.
    Unsupported,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OutOfDeviceMemory => "out of device memory",
            Self::OutOfHostMemory => "out of host memory",
            Self::Unsupported => "unsupported image extent or format",
        })
    }
}

impl core::error::Error for AllocError {}

/// Executes the commands issued by the scheduler.
///
/// Implementations record into whatever command buffer is current for the
/// frame; only [`wait_idle`](Self::wait_idle) blocks.
pub trait RenderBackend {
    /// Allocates the image and stencil for one layer.
    fn allocate_layer(&mut self, desc: &LayerDesc) -> Result<(), AllocError>;

    /// Frees every allocated layer.
    fn release_layers(&mut self);

    /// Paints a layer's stencil mask with the `mode` pipeline, always
    /// [`RenderMode::StencilWrite`] from the mask initializer.
    fn paint_stencil(&mut self, layer: LayerIndex, mode: RenderMode, pattern: &StencilPattern);

    /// Blocks until all submitted work has finished.
    fn wait_idle(&mut self);

    /// Records a fill.
    fn submit_scanline_fill(&mut self, fill: &ScanlineFill);

    /// Records a scaled blit of `src` over all of `dst`.
    fn copy_layer(&mut self, src: LayerIndex, dst: LayerIndex);

    /// Writes the begin timestamp of `slot`, resetting its previous result.
    fn begin_timestamp(&mut self, slot: usize);

    /// Writes the end timestamp of `slot`.
    fn end_timestamp(&mut self, slot: usize);

    /// Polls `slot` without blocking.
    fn poll_timestamp(&mut self, slot: usize) -> TimestampPoll;

    /// Records a layout barrier for a layer image.
    fn layout_transition(&mut self, layer: LayerIndex, from: ImageLayout, to: ImageLayout);

    /// Tick period of the timestamps.
    fn timebase(&self) -> Timebase;
}

#[cfg(test)]
pub(crate) mod testing {
    //! A backend that records every call and fakes timestamps.

    use alloc::vec::Vec;

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum Command {
        Allocate(LayerIndex, Extent),
        Release,
        Stencil(LayerIndex, RenderMode, StencilPattern),
        WaitIdle,
        Fill(ScanlineFill),
        Copy(LayerIndex, LayerIndex),
        Begin(usize),
        End(usize),
        Transition(LayerIndex, ImageLayout, ImageLayout),
    }

    #[derive(Debug)]
    pub(crate) struct RecordingBackend {
        pub(crate) commands: Vec<Command>,
        /// Fail the allocation of this layer index.
        pub(crate) fail_allocation_at: Option<u32>,
        /// Nanoseconds of fake GPU time per computed pixel.
        pub(crate) nanos_per_pixel: u64,
        /// Report `NotReady` for every poll.
        pub(crate) hold_timestamps: bool,
        clock: u64,
        slots: Vec<(Option<Timestamp>, Option<Timestamp>)>,
    }

    impl RecordingBackend {
        pub(crate) fn new() -> Self {
            Self {
                commands: Vec::new(),
                fail_allocation_at: None,
                nanos_per_pixel: 10,
                hold_timestamps: false,
                clock: 0,
                slots: Vec::new(),
            }
        }

        pub(crate) fn fills(&self) -> Vec<ScanlineFill> {
            self.commands
                .iter()
                .filter_map(|c| match c {
                    Command::Fill(f) => Some(*f),
                    _ => None,
                })
                .collect()
        }

        fn slot(&mut self, slot: usize) -> &mut (Option<Timestamp>, Option<Timestamp>) {
            if self.slots.len() <= slot {
                self.slots.resize(slot + 1, (None, None));
            }
            &mut self.slots[slot]
        }
    }

    impl RenderBackend for RecordingBackend {
        fn allocate_layer(&mut self, desc: &LayerDesc) -> Result<(), AllocError> {
            if self.fail_allocation_at == Some(desc.index.get()) {
                return Err(AllocError::OutOfDeviceMemory);
            }
            self.commands.push(Command::Allocate(desc.index, desc.extent));
            Ok(())
        }

        fn release_layers(&mut self) {
            self.commands.push(Command::Release);
        }

        fn paint_stencil(&mut self, layer: LayerIndex, mode: RenderMode, pattern: &StencilPattern) {
            self.commands.push(Command::Stencil(layer, mode, *pattern));
        }

        fn wait_idle(&mut self) {
            self.commands.push(Command::WaitIdle);
        }

        fn submit_scanline_fill(&mut self, fill: &ScanlineFill) {
            let pixels = u64::from(fill.columns) * u64::from(fill.extent.height);
            self.clock += pixels * self.nanos_per_pixel;
            self.commands.push(Command::Fill(*fill));
        }

        fn copy_layer(&mut self, src: LayerIndex, dst: LayerIndex) {
            self.commands.push(Command::Copy(src, dst));
        }

        fn begin_timestamp(&mut self, slot: usize) {
            let now = Timestamp(self.clock);
            *self.slot(slot) = (Some(now), None);
            self.commands.push(Command::Begin(slot));
        }

        fn end_timestamp(&mut self, slot: usize) {
            let now = Timestamp(self.clock);
            self.slot(slot).1 = Some(now);
            self.commands.push(Command::End(slot));
        }

        fn poll_timestamp(&mut self, slot: usize) -> TimestampPoll {
            if self.hold_timestamps {
                return TimestampPoll::NotReady;
            }
            match *self.slot(slot) {
                (Some(begin), Some(end)) => {
                    *self.slot(slot) = (None, None);
                    TimestampPoll::Ready { begin, end }
                }
                (Some(_), None) => TimestampPoll::NotReady,
                _ => TimestampPoll::Lost,
            }
        }

        fn layout_transition(&mut self, layer: LayerIndex, from: ImageLayout, to: ImageLayout) {
            self.commands.push(Command::Transition(layer, from, to));
        }

        fn timebase(&self) -> Timebase {
            Timebase::NANOS
        }
    }
}
