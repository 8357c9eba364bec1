// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interlaced stencil masks.
//!
//! Every refining layer carries a stencil of one-pixel bars spaced by the
//! interlace pitch. A fill with [`RenderMode::StencilRead`] only writes the
//! barred pixels; the rest of the layer keeps what the coarser layer's copy
//! left there. The terminal layer's mask covers everything.
//!
//! ```text
//!   Horizontal (columns)       Vertical (rows)
//!   █ █ █ █ █                  █████████
//!   █ █ █ █ █
//!   █ █ █ █ █                  █████████
//! ```
//!
//! [`RenderMode::StencilRead`]: crate::backend::RenderMode::StencilRead

use core::fmt;

use super::id::{Axis, Extent};
use super::pyramid::{LayerDesc, LayerPyramid};
use crate::backend::{RenderBackend, RenderMode};

/// Interlace tuning shared by the stencil masks and the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterlaceConfig {
    /// Spacing between stencil bars in pixels.
    pub pitch: u32,
    /// Multiplier converting a work budget into a line count. Must equal
    /// `pitch`, since a masked column only costs `height / pitch` work.
    pub line_factor: u64,
    /// Fewest columns a refining step fills.
    pub min_lines: u32,
}

impl InterlaceConfig {
    /// Two-pixel bars, two lines minimum.
    pub const DEFAULT: Self = Self {
        pitch: 2,
        line_factor: 2,
        min_lines: 2,
    };

    /// Checks the config for internal consistency.
    pub fn validate(&self) -> Result<(), InterlaceConfigError> {
        if self.pitch == 0 {
            return Err(InterlaceConfigError::ZeroPitch);
        }
        if self.line_factor != u64::from(self.pitch) {
            return Err(InterlaceConfigError::LineFactorMismatch {
                line_factor: self.line_factor,
                pitch: self.pitch,
            });
        }
        if self.min_lines < self.pitch {
            return Err(InterlaceConfigError::TooFewMinLines {
                min_lines: self.min_lines,
                pitch: self.pitch,
            });
        }
        Ok(())
    }
}

impl Default for InterlaceConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// An inconsistent [`InterlaceConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterlaceConfigError {
    /// `pitch` is zero.
    ZeroPitch,
    /// `line_factor` differs from `pitch`.
    LineFactorMismatch {
        /// Configured factor.
        line_factor: u64,
        /// Configured pitch.
        pitch: u32,
    },
    /// `min_lines` is below `pitch`, so a step could miss a bar.
    TooFewMinLines {
        /// Configured minimum.
        min_lines: u32,
        /// Configured pitch.
        pitch: u32,
    },
}

impl fmt::Display for InterlaceConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroPitch => f.write_str("interlace pitch must be at least 1"),
            Self::LineFactorMismatch { line_factor, pitch } => write!(
                f,
                "line factor {line_factor} does not match interlace pitch {pitch}"
            ),
            Self::TooFewMinLines { min_lines, pitch } => write!(
                f,
                "minimum line count {min_lines} is below interlace pitch {pitch}"
            ),
        }
    }
}

impl core::error::Error for InterlaceConfigError {}

/// The stencil mask painted into one layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StencilPattern {
    /// Every pixel passes.
    FullCover {
        /// Layer extent.
        extent: Extent,
    },
    /// One-pixel bars every `pitch` pixels along `axis`, starting at 0.
    Bars {
        /// Layer extent.
        extent: Extent,
        /// Axis the bars step along.
        axis: Axis,
        /// Bar spacing.
        pitch: u32,
    },
}

impl StencilPattern {
    /// The pattern for `layer` at the given pitch.
    #[must_use]
    pub fn for_layer(layer: &LayerDesc, pitch: u32) -> Self {
        match layer.interlace_axis {
            Some(axis) => Self::Bars {
                extent: layer.extent,
                axis,
                pitch: pitch.max(1),
            },
            None => Self::FullCover {
                extent: layer.extent,
            },
        }
    }

    /// Extent the pattern was made for.
    #[must_use]
    pub fn extent(&self) -> Extent {
        match *self {
            Self::FullCover { extent } | Self::Bars { extent, .. } => extent,
        }
    }

    /// Number of bars painted; 1 for a full cover.
    #[must_use]
    pub fn bar_count(&self) -> u32 {
        match *self {
            Self::FullCover { .. } => 1,
            Self::Bars {
                extent,
                axis,
                pitch,
            } => extent.along(axis).div_ceil(pitch),
        }
    }

    /// Whether the pixel at `(x, y)` passes the mask.
    #[must_use]
    pub fn covers(&self, x: u32, y: u32) -> bool {
        let extent = self.extent();
        if x >= extent.width || y >= extent.height {
            return false;
        }
        match *self {
            Self::FullCover { .. } => true,
            Self::Bars { axis, pitch, .. } => {
                let along = match axis {
                    Axis::Horizontal => x,
                    Axis::Vertical => y,
                };
                along % pitch == 0
            }
        }
    }

    /// Pixels that pass the mask.
    #[must_use]
    pub fn covered_pixels(&self) -> u64 {
        match *self {
            Self::FullCover { extent } => extent.area(),
            Self::Bars { extent, axis, .. } => {
                u64::from(self.bar_count()) * u64::from(extent.along(axis.flip()))
            }
        }
    }
}

/// One-time pass painting every layer's stencil.
#[derive(Clone, Copy, Debug)]
pub struct StencilMaskInitializer {
    pitch: u32,
}

impl StencilMaskInitializer {
    /// Creates an initializer for the configured pitch.
    #[must_use]
    pub fn new(config: &InterlaceConfig) -> Self {
        Self {
            pitch: config.pitch,
        }
    }

    /// Paints all masks and blocks until the backend is idle.
    pub fn initialize<B: RenderBackend + ?Sized>(&self, pyramid: &LayerPyramid, backend: &mut B) {
        for layer in pyramid.layers() {
            let pattern = StencilPattern::for_layer(layer, self.pitch);
            backend.paint_stencil(layer.index, RenderMode::StencilWrite, &pattern);
        }
        backend.wait_idle();
    }
}
