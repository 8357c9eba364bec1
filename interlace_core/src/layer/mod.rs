// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer pyramid data model.
//!
//! The pyramid holds the image at several resolutions, finest first. Each
//! level halves one axis of the level before it (width first, then
//! alternating), down to a *terminal* level small enough to render in full
//! every frame. Each layer has:
//!
//! - An identity ([`LayerIndex`]): 0 is the finest level.
//! - An [`Extent`] and a [`Placement`] that anchors its image in the shared
//!   world-space region despite odd-size truncation.
//! - A [`LayerRole`]: refining layers are filled through an interlaced
//!   [`StencilPattern`], the terminal layer is never masked.
//!
//! Whether a layer is empty, in progress or complete is not stored here;
//! it follows from the scheduler cursor.

mod id;
mod pyramid;
mod stencil;

pub use id::{Axis, Extent, LayerIndex};
pub use pyramid::{LayerDesc, LayerPyramid, LayerRole, Placement, PyramidConfig, PyramidError, plan_layers};
pub use stencil::{InterlaceConfig, InterlaceConfigError, StencilMaskInitializer, StencilPattern};
