// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Choosing the layer to display.
//!
//! The finest complete layer is always safe to show. The one exception is a
//! layer mid-refinement: it was seeded from its coarser neighbor by a full
//! copy before the first partial fill, so it is never worse than the
//! complete layer and already carries some finer columns.

use crate::backend::{ImageLayout, RenderBackend};
use crate::layer::{Extent, LayerIndex, LayerPyramid, Placement};
use crate::scheduler::ScheduleState;

/// The layer handed to the compositor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Presentation {
    /// Layer to sample.
    pub layer: LayerIndex,
    /// Its pixel extent.
    pub extent: Extent,
    /// Its world-space placement.
    pub placement: Placement,
}

/// Index of the layer to display for `state` in a pyramid of `layer_count`
/// layers.
#[must_use]
pub fn select_layer(state: ScheduleState, layer_count: u32) -> LayerIndex {
    let ScheduleState {
        finished_layer,
        current_prog,
    } = state;
    let terminal = layer_count - 1;
    let mut shown = finished_layer.min(terminal);
    if current_prog > 0 && finished_layer > 0 && finished_layer < terminal {
        shown = finished_layer - 1;
    }
    LayerIndex(shown)
}

/// Selects the display layer and makes sure it is readable.
pub fn prepare<B: RenderBackend + ?Sized>(
    state: ScheduleState,
    pyramid: &mut LayerPyramid,
    backend: &mut B,
) -> Presentation {
    let layer = select_layer(state, pyramid.layer_count());
    pyramid.transition(backend, layer, ImageLayout::ShaderRead);
    assert_eq!(
        pyramid.layout(layer),
        ImageLayout::ShaderRead,
        "presented layer must be readable"
    );
    let desc = pyramid.layer(layer);
    Presentation {
        layer,
        extent: desc.extent,
        placement: desc.placement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{Command, RecordingBackend};
    use crate::layer::PyramidConfig;

    fn state(finished_layer: u32, current_prog: u32) -> ScheduleState {
        ScheduleState {
            finished_layer,
            current_prog,
        }
    }

    #[test]
    fn nothing_rendered_shows_terminal() {
        assert_eq!(select_layer(state(12, 0), 12), LayerIndex(11));
    }

    #[test]
    fn complete_layer_is_shown() {
        assert_eq!(select_layer(state(11, 0), 12), LayerIndex(11));
        assert_eq!(select_layer(state(5, 0), 12), LayerIndex(5));
        assert_eq!(select_layer(state(0, 0), 12), LayerIndex(0));
    }

    #[test]
    fn partially_refined_layer_is_shown() {
        assert_eq!(select_layer(state(5, 40), 12), LayerIndex(4));
        assert_eq!(select_layer(state(1, 2), 12), LayerIndex(0));
    }

    #[test]
    fn terminal_refinement_in_progress_shows_terminal() {
        // The first refining layer stays hidden until it is complete.
        assert_eq!(select_layer(state(11, 6), 12), LayerIndex(11));
    }

    #[test]
    fn single_layer_pyramid() {
        assert_eq!(select_layer(state(1, 0), 1), LayerIndex(0));
        assert_eq!(select_layer(state(0, 0), 1), LayerIndex(0));
    }

    #[test]
    fn prepare_transitions_to_shader_read() {
        let mut backend = RecordingBackend::new();
        let mut pyramid =
            LayerPyramid::build(Extent::new(64, 64), &PyramidConfig::default(), &mut backend)
                .unwrap();
        backend.commands.clear();
        let shown = prepare(state(pyramid.layer_count(), 0), &mut pyramid, &mut backend);
        let terminal = pyramid.terminal().index;
        assert_eq!(shown.layer, terminal);
        assert_eq!(shown.extent, pyramid.terminal().extent);
        assert_eq!(
            backend.commands,
            [Command::Transition(terminal, ImageLayout::Undefined, ImageLayout::ShaderRead)]
        );
        // Already readable: no second barrier.
        prepare(state(pyramid.layer_count(), 0), &mut pyramid, &mut backend);
        assert_eq!(backend.commands.len(), 1);
    }
}
