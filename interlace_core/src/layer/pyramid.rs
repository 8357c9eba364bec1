// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Multi-resolution layer pyramid.

use alloc::vec::Vec;
use core::fmt;

use kurbo::{Affine, Vec2};

use super::id::{Axis, Extent, LayerIndex};
use crate::backend::{AllocError, ImageLayout, RenderBackend};

/// Pyramid construction parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PyramidConfig {
    /// Halving stops once a layer's area is at or below this many pixels.
    pub min_area: u64,
}

impl PyramidConfig {
    /// Default minimum area for the terminal layer.
    pub const DEFAULT_MIN_AREA: u64 = 1000;

    /// Creates a config with the given terminal area threshold.
    #[must_use]
    pub const fn new(min_area: u64) -> Self {
        Self { min_area }
    }
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_AREA)
    }
}

/// How a layer is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerRole {
    /// Filled incrementally through an interlaced stencil mask.
    Refining,
    /// The coarsest layer; always rendered in full and unmasked.
    Terminal,
}

/// Maps a layer's image onto the world-space region shared by every layer.
///
/// The model transform is `scale(scale) * translate(offset.x, -offset.y)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Translation in normalized target units.
    pub offset: Vec2,
    /// Per-axis scale compensating for truncated odd sizes.
    pub scale: Vec2,
}

impl Placement {
    /// No offset, unit scale.
    pub const IDENTITY: Self = Self {
        offset: Vec2::ZERO,
        scale: Vec2::new(1.0, 1.0),
    };

    /// Placement of a layer whose top-left pixel sits at `origin` (in target
    /// pixels) after dropping `cutoff` remainder pixels per axis.
    #[must_use]
    pub fn anchored(target: Extent, origin: [u32; 2], cutoff: [u32; 2]) -> Self {
        let w = f64::from(target.width);
        let h = f64::from(target.height);
        let aspect_x = (h / w).max(1.0);
        let aspect_y = (w / h).max(1.0);
        let d = w.max(h);
        let [x, y] = origin.map(f64::from);
        let [cx, cy] = cutoff.map(f64::from);
        Self {
            offset: Vec2::new((x - cx) / d, (y - cy) / d),
            scale: Vec2::new(aspect_x * d / (d - cx), aspect_y * d / (d - cy)),
        }
    }

    /// The 2D model transform.
    #[must_use]
    pub fn to_affine(self) -> Affine {
        Affine::scale_non_uniform(self.scale.x, self.scale.y)
            * Affine::translate(Vec2::new(self.offset.x, -self.offset.y))
    }

    /// Column-major 4x4 model matrix for a vertex stage.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "GPU uniforms are single precision"
    )]
    pub fn model_matrix(self) -> [f32; 16] {
        let [a, b, c, d, e, f] = self.to_affine().as_coeffs().map(|v| v as f32);
        [
            a, b, 0.0, 0.0, //
            c, d, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            e, f, 0.0, 1.0,
        ]
    }
}

/// Geometry and role of one pyramid level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerDesc {
    /// Position in the pyramid.
    pub index: LayerIndex,
    /// Pixel size of the layer's image and stencil.
    pub extent: Extent,
    /// World-space placement.
    pub placement: Placement,
    /// Refining or terminal.
    pub role: LayerRole,
    /// Axis halved to produce the next coarser layer, which is also the axis
    /// the stencil bars step along (`Horizontal` selects columns). `None` for
    /// the terminal layer.
    pub interlace_axis: Option<Axis>,
    /// Accumulated pixel offset of previous halvings.
    pub origin: [u32; 2],
    /// Accumulated odd-size remainder per axis.
    pub cutoff: [u32; 2],
}

/// Failure building a pyramid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PyramidError {
    /// The target has zero width or height.
    EmptyExtent(Extent),
    /// The backend could not allocate a layer.
    ResourceExhausted {
        /// Layer that failed.
        layer: LayerIndex,
        /// Its requested extent.
        extent: Extent,
        /// Backend reason.
        cause: AllocError,
    },
}

impl fmt::Display for PyramidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyExtent(extent) => write!(f, "cannot build a pyramid for empty extent {extent}"),
            Self::ResourceExhausted {
                layer,
                extent,
                cause,
            } => write!(
                f,
                "failed to allocate layer {} ({extent}): {cause}",
                layer.get()
            ),
        }
    }
}

impl core::error::Error for PyramidError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::EmptyExtent(_) => None,
            Self::ResourceExhausted { cause, .. } => Some(cause),
        }
    }
}

/// Computes the layer descriptors for `target`, finest first.
///
/// Each step emits a layer, stops once its area is at most
/// [`PyramidConfig::min_area`], and otherwise halves the next axis (width
/// first, then alternating). An axis already one pixel long is not halved;
/// the other axis is used instead.
pub fn plan_layers(target: Extent, config: &PyramidConfig) -> Result<Vec<LayerDesc>, PyramidError> {
    if target.is_empty() {
        return Err(PyramidError::EmptyExtent(target));
    }
    let mut layers = Vec::new();
    let mut extent = target;
    let mut origin = [0_u32; 2];
    let mut cutoff = [0_u32; 2];
    let mut pitch = [1_u32; 2];
    let mut next_axis = Axis::Horizontal;

    loop {
        let halve = if extent.area() <= config.min_area {
            None
        } else if extent.along(next_axis) > 1 {
            Some(next_axis)
        } else if extent.along(next_axis.flip()) > 1 {
            Some(next_axis.flip())
        } else {
            None
        };

        #[expect(
            clippy::cast_possible_truncation,
            reason = "a pyramid has at most 64 levels"
        )]
        let index = LayerIndex(layers.len() as u32);
        layers.push(LayerDesc {
            index,
            extent,
            placement: Placement::anchored(target, origin, cutoff),
            role: if halve.is_some() {
                LayerRole::Refining
            } else {
                LayerRole::Terminal
            },
            interlace_axis: halve,
            origin,
            cutoff,
        });

        let Some(axis) = halve else {
            break;
        };
        let i = match axis {
            Axis::Horizontal => 0,
            Axis::Vertical => 1,
        };
        let len = extent.along(axis);
        if len % 2 == 1 {
            cutoff[i] += pitch[i];
        }
        origin[i] += pitch[i];
        pitch[i] *= 2;
        match axis {
            Axis::Horizontal => extent.width = len / 2,
            Axis::Vertical => extent.height = len / 2,
        }
        next_axis = axis.flip();
    }
    Ok(layers)
}

/// The allocated pyramid: layer descriptors plus each image's current layout.
#[derive(Clone, Debug)]
pub struct LayerPyramid {
    target: Extent,
    layers: Vec<LayerDesc>,
    layouts: Vec<ImageLayout>,
}

impl LayerPyramid {
    /// Plans a pyramid without touching a backend.
    pub fn plan(target: Extent, config: &PyramidConfig) -> Result<Self, PyramidError> {
        let layers = plan_layers(target, config)?;
        let layouts = alloc::vec![ImageLayout::Undefined; layers.len()];
        Ok(Self {
            target,
            layers,
            layouts,
        })
    }

    /// Plans a pyramid and allocates every layer on `backend`.
    ///
    /// On allocation failure everything allocated so far is released and
    /// [`PyramidError::ResourceExhausted`] is returned.
    pub fn build<B: RenderBackend + ?Sized>(
        target: Extent,
        config: &PyramidConfig,
        backend: &mut B,
    ) -> Result<Self, PyramidError> {
        let pyramid = Self::plan(target, config)?;
        for desc in &pyramid.layers {
            if let Err(cause) = backend.allocate_layer(desc) {
                backend.release_layers();
                return Err(PyramidError::ResourceExhausted {
                    layer: desc.index,
                    extent: desc.extent,
                    cause,
                });
            }
        }
        Ok(pyramid)
    }

    /// Extent the pyramid was built for.
    #[must_use]
    pub fn target(&self) -> Extent {
        self.target
    }

    /// Number of layers, at least 1.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "a pyramid has at most 64 levels"
    )]
    pub fn layer_count(&self) -> u32 {
        self.layers.len() as u32
    }

    /// All layers, finest first.
    #[must_use]
    pub fn layers(&self) -> &[LayerDesc] {
        &self.layers
    }

    /// Descriptor of `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn layer(&self, index: LayerIndex) -> &LayerDesc {
        &self.layers[index.as_usize()]
    }

    /// The coarsest layer.
    #[must_use]
    pub fn terminal(&self) -> &LayerDesc {
        &self.layers[self.layers.len() - 1]
    }

    /// Current layout of a layer image.
    #[must_use]
    pub fn layout(&self, index: LayerIndex) -> ImageLayout {
        self.layouts[index.as_usize()]
    }

    /// Moves a layer image to `to`, issuing a backend barrier only when the
    /// layout actually changes.
    pub fn transition<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        index: LayerIndex,
        to: ImageLayout,
    ) {
        let slot = &mut self.layouts[index.as_usize()];
        if *slot != to {
            backend.layout_transition(index, *slot, to);
            *slot = to;
        }
    }
}
