// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A software GPU.
//!
//! [`SimulatedBackend`] executes the backend contract against plain memory.
//! Fills cost `overhead + computed_pixels / throughput` of simulated GPU
//! time, and timestamps read that clock, so the estimator sees a perfectly
//! linear device unless a [`PathologyToggles`] switch says otherwise.
//!
//! Every pixel remembers where its value came from ([`PixelSource`]), which
//! lets tests assert that a presented layer never shows unwritten pixels.
//! Layout barriers are checked against the usage each command needs;
//! mismatches are counted in [`SimStats::layout_violations`].

use alloc::vec;
use alloc::vec::Vec;

use interlace_core::backend::{
    AllocError, ImageLayout, RenderBackend, RenderMode, ScanlineFill, TimestampPoll,
};
use interlace_core::layer::{Extent, LayerDesc, LayerIndex, StencilPattern};
use interlace_core::time::{Timebase, Timestamp};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::PathologyToggles;

/// Simulated device characteristics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimConfig {
    /// Computed pixels per second of GPU time.
    pub pixels_per_second: f64,
    /// Fixed GPU cost of every fill, in nanoseconds.
    pub fill_overhead_nanos: u64,
    /// Polls a finished query answers `NotReady` before it becomes ready.
    pub timestamp_latency: u32,
    /// Nanoseconds per timestamp tick.
    pub timestamp_period_nanos: f32,
    /// Device memory available for layers, in bytes. `None` is unlimited.
    pub memory_budget: Option<u64>,
    /// Bytes per layer pixel (color plus depth-stencil).
    pub bytes_per_pixel: u64,
    /// With [`PathologyToggles::gpu_stall`], every this many fills stalls.
    pub stall_every: u32,
    /// Length of a stall, in nanoseconds.
    pub stall_nanos: u64,
    /// With [`PathologyToggles::timer_jitter`], spans vary by up to this
    /// fraction either way.
    pub jitter: f64,
    /// With [`PathologyToggles::lost_timestamps`], every this many ready
    /// queries is lost instead.
    pub lose_every: u32,
    /// Seed of the jitter generator; equal seeds give equal runs.
    pub seed: u64,
}

impl SimConfig {
    /// A mid-range discrete GPU.
    pub const DEFAULT: Self = Self {
        pixels_per_second: 1.0e8,
        fill_overhead_nanos: 20_000,
        timestamp_latency: 0,
        timestamp_period_nanos: 1.0,
        memory_budget: None,
        bytes_per_pixel: 8,
        stall_every: 10,
        stall_nanos: 60_000_000,
        jitter: 0.25,
        lose_every: 3,
        seed: 0x9E37_79B9_7F4A_7C15,
    };
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Where a pixel's current value came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelSource {
    /// Never written.
    #[default]
    Empty,
    /// Upsampled from a coarser layer.
    Copied,
    /// Computed by a fill.
    Computed,
}

/// Pixel counts per [`PixelSource`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Coverage {
    /// Never written.
    pub empty: u64,
    /// Copied from a coarser layer.
    pub copied: u64,
    /// Computed.
    pub computed: u64,
}

/// Command counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Successful layer allocations.
    pub allocations: u32,
    /// Failed layer allocations.
    pub failed_allocations: u32,
    /// `release_layers` calls.
    pub releases: u32,
    /// Stencil masks painted.
    pub stencil_paints: u32,
    /// `wait_idle` calls.
    pub wait_idles: u32,
    /// Fills recorded.
    pub fills: u64,
    /// Copies recorded.
    pub copies: u64,
    /// Layout barriers recorded.
    pub transitions: u64,
    /// Pixels computed by all fills.
    pub computed_pixels: u64,
    /// Commands issued against a layer in the wrong layout, a missing layer,
    /// or a barrier whose `from` did not match.
    pub layout_violations: u32,
    /// Injected stalls.
    pub stalls: u32,
    /// Queries reported lost.
    pub lost_queries: u32,
}

#[derive(Clone, Debug)]
struct SimLayer {
    extent: Extent,
    layout: ImageLayout,
    stencil: Vec<bool>,
    pixels: Vec<PixelSource>,
}

impl SimLayer {
    fn new(extent: Extent) -> Self {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "simulated layers fit in memory"
        )]
        let n = extent.area() as usize;
        Self {
            extent,
            layout: ImageLayout::Undefined,
            stencil: vec![false; n],
            pixels: vec![PixelSource::Empty; n],
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.extent.width as usize + x as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Query {
    #[default]
    Reset,
    Begun {
        begin: u64,
    },
    Ended {
        begin: u64,
        end: u64,
        waited: u32,
    },
}

/// Software implementation of [`RenderBackend`].
#[derive(Clone, Debug)]
pub struct SimulatedBackend {
    config: SimConfig,
    timebase: Timebase,
    /// Active pathologies; may be flipped between frames.
    pub toggles: PathologyToggles,
    layers: Vec<Option<SimLayer>>,
    queries: Vec<Query>,
    clock_nanos: u64,
    allocated_bytes: u64,
    ready_polls: u32,
    rng: SmallRng,
    stats: SimStats,
}

impl SimulatedBackend {
    /// Creates a backend with no pathologies.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            timebase: Timebase::from_period_nanos(config.timestamp_period_nanos),
            toggles: PathologyToggles::default(),
            layers: Vec::new(),
            queries: Vec::new(),
            clock_nanos: 0,
            allocated_bytes: 0,
            ready_polls: 0,
            rng: SmallRng::seed_from_u64(config.seed),
            stats: SimStats::default(),
        }
    }

    /// Device characteristics.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Command counters.
    #[must_use]
    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Simulated GPU time consumed so far.
    #[must_use]
    pub fn gpu_nanos(&self) -> u64 {
        self.clock_nanos
    }

    /// Bytes held by allocated layers.
    #[must_use]
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }

    /// Number of allocated layers.
    #[must_use]
    pub fn allocated_layers(&self) -> usize {
        self.layers.iter().flatten().count()
    }

    /// Per-pixel sources of `layer`, row-major.
    #[must_use]
    pub fn sources(&self, layer: LayerIndex) -> Option<&[PixelSource]> {
        self.layer(layer).map(|l| l.pixels.as_slice())
    }

    /// Pixel counts per source for `layer`.
    #[must_use]
    pub fn coverage(&self, layer: LayerIndex) -> Coverage {
        let mut c = Coverage::default();
        for p in self.sources(layer).unwrap_or_default() {
            match p {
                PixelSource::Empty => c.empty += 1,
                PixelSource::Copied => c.copied += 1,
                PixelSource::Computed => c.computed += 1,
            }
        }
        c
    }

    /// Current layout of `layer` as the device sees it.
    #[must_use]
    pub fn layout(&self, layer: LayerIndex) -> Option<ImageLayout> {
        self.layer(layer).map(|l| l.layout)
    }

    fn layer(&self, layer: LayerIndex) -> Option<&SimLayer> {
        self.layers.get(layer.as_usize())?.as_ref()
    }

    fn layer_mut(&mut self, layer: LayerIndex) -> Option<&mut SimLayer> {
        self.layers.get_mut(layer.as_usize())?.as_mut()
    }

    fn query(&mut self, slot: usize) -> &mut Query {
        if slot >= self.queries.len() {
            self.queries.resize(slot + 1, Query::Reset);
        }
        &mut self.queries[slot]
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "jittered spans are non-negative and far below u64::MAX"
    )]
    fn jittered(&mut self, begin: u64, end: u64) -> u64 {
        if !self.toggles.timer_jitter {
            return end;
        }
        let span = end.saturating_sub(begin) as f64;
        let factor = 1.0 + self.config.jitter * (2.0 * self.rng.random::<f64>() - 1.0);
        begin + (span * factor.max(0.0)) as u64
    }
}

impl RenderBackend for SimulatedBackend {
    fn allocate_layer(&mut self, desc: &LayerDesc) -> Result<(), AllocError> {
        let bytes = desc.extent.area() * self.config.bytes_per_pixel;
        if let Some(budget) = self.config.memory_budget
            && self.allocated_bytes + bytes > budget
        {
            self.stats.failed_allocations += 1;
            return Err(AllocError::OutOfDeviceMemory);
        }
        let i = desc.index.as_usize();
        if i >= self.layers.len() {
            self.layers.resize(i + 1, None);
        }
        if let Some(old) = self.layers[i].replace(SimLayer::new(desc.extent)) {
            self.allocated_bytes -= old.extent.area() * self.config.bytes_per_pixel;
        }
        self.allocated_bytes += bytes;
        self.stats.allocations += 1;
        Ok(())
    }

    fn release_layers(&mut self) {
        self.layers.clear();
        self.allocated_bytes = 0;
        self.stats.releases += 1;
    }

    fn paint_stencil(&mut self, layer: LayerIndex, mode: RenderMode, pattern: &StencilPattern) {
        if mode != RenderMode::StencilWrite {
            self.stats.layout_violations += 1;
            return;
        }
        let Some(l) = self.layer_mut(layer) else {
            self.stats.layout_violations += 1;
            return;
        };
        if pattern.extent() != l.extent {
            self.stats.layout_violations += 1;
            return;
        }
        for y in 0..l.extent.height {
            for x in 0..l.extent.width {
                let i = l.index(x, y);
                l.stencil[i] = pattern.covers(x, y);
            }
        }
        self.stats.stencil_paints += 1;
    }

    fn wait_idle(&mut self) {
        self.stats.wait_idles += 1;
    }

    fn submit_scanline_fill(&mut self, fill: &ScanlineFill) {
        self.stats.fills += 1;
        let Some(l) = self.layer_mut(fill.layer) else {
            self.stats.layout_violations += 1;
            return;
        };
        // The stencil-write pipeline is for mask setup only.
        let mut violation = l.layout != ImageLayout::ColorAttachment
            || l.extent != fill.extent
            || fill.mode == RenderMode::StencilWrite;
        let end = fill.first_column.saturating_add(fill.columns);
        if end > l.extent.width {
            violation = true;
        }
        let mut computed = 0_u64;
        for y in 0..l.extent.height {
            for x in fill.first_column..end.min(l.extent.width) {
                let i = l.index(x, y);
                if fill.mode == RenderMode::StencilRead && !l.stencil[i] {
                    continue;
                }
                l.pixels[i] = PixelSource::Computed;
                computed += 1;
            }
        }
        if violation {
            self.stats.layout_violations += 1;
        }
        self.stats.computed_pixels += computed;

        #[expect(
            clippy::cast_possible_truncation,
            reason = "fill durations are far below u64::MAX nanoseconds"
        )]
        let compute_nanos = (computed as f64 * 1e9 / self.config.pixels_per_second) as u64;
        self.clock_nanos += self.config.fill_overhead_nanos + compute_nanos;
        let every = u64::from(self.config.stall_every.max(1));
        if self.toggles.gpu_stall && self.stats.fills % every == 0 {
            self.clock_nanos += self.config.stall_nanos;
            self.stats.stalls += 1;
        }
    }

    fn copy_layer(&mut self, src: LayerIndex, dst: LayerIndex) {
        self.stats.copies += 1;
        let Some((src_extent, src_pixels, src_layout)) = self
            .layer(src)
            .map(|l| (l.extent, l.pixels.clone(), l.layout))
        else {
            self.stats.layout_violations += 1;
            return;
        };
        let Some(d) = self.layer_mut(dst) else {
            self.stats.layout_violations += 1;
            return;
        };
        let violation =
            src_layout != ImageLayout::TransferSrc || d.layout != ImageLayout::TransferDst;
        let (dw, dh) = (u64::from(d.extent.width), u64::from(d.extent.height));
        let (sw, sh) = (u64::from(src_extent.width), u64::from(src_extent.height));
        for y in 0..d.extent.height {
            for x in 0..d.extent.width {
                let sx = u64::from(x) * sw / dw;
                let sy = u64::from(y) * sh / dh;
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "source index is within the source layer"
                )]
                let si = (sy * sw + sx) as usize;
                let i = d.index(x, y);
                d.pixels[i] = match src_pixels[si] {
                    PixelSource::Empty => PixelSource::Empty,
                    PixelSource::Copied | PixelSource::Computed => PixelSource::Copied,
                };
            }
        }
        if violation {
            self.stats.layout_violations += 1;
        }
    }

    fn begin_timestamp(&mut self, slot: usize) {
        let begin = self.clock_nanos;
        *self.query(slot) = Query::Begun { begin };
    }

    fn end_timestamp(&mut self, slot: usize) {
        let end = self.clock_nanos;
        let q = self.query(slot);
        if let Query::Begun { begin } = *q {
            *q = Query::Ended {
                begin,
                end,
                waited: 0,
            };
        }
    }

    fn poll_timestamp(&mut self, slot: usize) -> TimestampPoll {
        let latency = self.config.timestamp_latency;
        let q = self.query(slot);
        match *q {
            Query::Reset => TimestampPoll::Lost,
            Query::Begun { .. } => TimestampPoll::NotReady,
            Query::Ended { begin, end, waited } if waited < latency => {
                *q = Query::Ended {
                    begin,
                    end,
                    waited: waited + 1,
                };
                TimestampPoll::NotReady
            }
            Query::Ended { begin, end, .. } => {
                *q = Query::Reset;
                self.ready_polls += 1;
                if self.toggles.lost_timestamps
                    && self.ready_polls % self.config.lose_every.max(1) == 0
                {
                    self.stats.lost_queries += 1;
                    return TimestampPoll::Lost;
                }
                let end = self.jittered(begin, end);
                TimestampPoll::Ready {
                    begin: Timestamp(self.timebase.nanos_to_ticks(begin)),
                    end: Timestamp(self.timebase.nanos_to_ticks(end)),
                }
            }
        }
    }

    fn layout_transition(&mut self, layer: LayerIndex, from: ImageLayout, to: ImageLayout) {
        self.stats.transitions += 1;
        let Some(l) = self.layer_mut(layer) else {
            self.stats.layout_violations += 1;
            return;
        };
        let mismatch = l.layout != from;
        l.layout = to;
        if mismatch {
            self.stats.layout_violations += 1;
        }
    }

    fn timebase(&self) -> Timebase {
        self.timebase
    }
}
