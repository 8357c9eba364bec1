// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fractal parameters, navigation and preset payloads.
//!
//! [`FractalParams`] is the external state the image depends on. Pan and
//! zoom change [`Navigation`] (a soft invalidation); a preset payload replaces
//! the shading parameters wholesale (a hard invalidation). The per-pixel
//! stage sees the parameters as a [`FractalUniforms`] block.

use alloc::vec::Vec;
use core::fmt;

use bytemuck::{Pod, Zeroable};
use kurbo::{Point, Vec2};
use serde_json::Value;

use crate::layer::Extent;

/// Position and scale of the view in fractal space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Navigation {
    /// Horizontal center.
    pub x: f64,
    /// Vertical center.
    pub y: f64,
    /// Width of the view in fractal units.
    pub zoom: f64,
}

impl Navigation {
    /// Centered at the origin, 4 units wide.
    pub const DEFAULT: Self = Self {
        x: 0.0,
        y: 0.0,
        zoom: 4.0,
    };

    /// Scroll ticks per `e`-fold of zoom.
    pub const ZOOM_TICKS: f64 = 25.0;

    /// Top-left corner handed to the per-pixel stage.
    #[must_use]
    pub fn origin(&self) -> Point {
        Point::new(-self.x - self.zoom / 2.0, self.y - self.zoom / 2.0)
    }

    /// Pans by a pixel delta measured in a `viewport`-sized window.
    pub fn pan(&mut self, delta: Vec2, viewport: Extent) {
        if viewport.is_empty() {
            return;
        }
        let w = f64::from(viewport.width);
        let h = f64::from(viewport.height);
        let aspect_x = (h / w).max(1.0);
        let aspect_y = (w / h).max(1.0);
        self.x += delta.x * self.zoom / (w * aspect_x);
        self.y -= delta.y * self.zoom / (h * aspect_y);
    }

    /// Zooms by scroll ticks; positive ticks zoom in.
    pub fn scroll(&mut self, ticks: f64) {
        let de = ticks / Self::ZOOM_TICKS;
        if de > 0.0 {
            self.zoom /= 1.0 + de;
        } else if de < 0.0 {
            self.zoom *= 1.0 - de;
        }
    }
}

impl Default for Navigation {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A named preset key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PresetField {
    /// `x`
    X,
    /// `y`
    Y,
    /// `zoom`
    Zoom,
    /// `iterations`
    Iterations,
    /// `iGamma`
    Gamma,
    /// `play`
    Play,
    /// `shift`
    Shift,
    /// `contrast`
    Contrast,
    /// `phase`
    Phase,
    /// `radius`
    Radius,
    /// `smoothing`
    Smoothing,
}

impl PresetField {
    /// Every field, in payload order.
    pub const ALL: [Self; 11] = [
        Self::X,
        Self::Y,
        Self::Zoom,
        Self::Iterations,
        Self::Gamma,
        Self::Play,
        Self::Shift,
        Self::Contrast,
        Self::Phase,
        Self::Radius,
        Self::Smoothing,
    ];

    /// JSON key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Zoom => "zoom",
            Self::Iterations => "iterations",
            Self::Gamma => "iGamma",
            Self::Play => "play",
            Self::Shift => "shift",
            Self::Contrast => "contrast",
            Self::Phase => "phase",
            Self::Radius => "radius",
            Self::Smoothing => "smoothing",
        }
    }
}

/// A preset payload that could not be applied at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresetError {
    /// Not valid JSON.
    Malformed {
        /// 1-based line of the syntax error.
        line: usize,
        /// 1-based column of the syntax error.
        column: usize,
    },
    /// Valid JSON, but not an object.
    NotAnObject,
}

impl From<serde_json::Error> for PresetError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed {
            line: e.line(),
            column: e.column(),
        }
    }
}

impl fmt::Display for PresetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { line, column } => {
                write!(f, "malformed preset JSON at line {line}, column {column}")
            }
            Self::NotAnObject => f.write_str("preset payload is not a JSON object"),
        }
    }
}

impl core::error::Error for PresetError {}

/// What [`FractalParams::apply_preset`] changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PresetReport {
    /// Fields present and applied.
    pub applied: u32,
    /// Fields present but of the wrong type or out of range.
    pub skipped: Vec<PresetField>,
}

/// Everything the per-pixel stage depends on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractalParams {
    /// View position and scale.
    pub navigation: Navigation,
    /// Escape-time iteration limit.
    pub iterations: u32,
    /// Gamma applied to the iteration count.
    pub gamma: f32,
    /// Palette animation offset.
    pub play: f32,
    /// Palette shift.
    pub shift: f32,
    /// Palette contrast.
    pub contrast: f32,
    /// Palette phase.
    pub phase: f32,
    /// Escape radius.
    pub radius: f32,
    /// Smooth-coloring blend.
    pub smoothing: f32,
}

impl FractalParams {
    /// Startup parameters.
    pub const DEFAULT: Self = Self {
        navigation: Navigation::DEFAULT,
        iterations: 100,
        gamma: 0.7,
        play: 0.0,
        shift: 0.0,
        contrast: 3.0,
        phase: 1.0,
        radius: 4.0,
        smoothing: 1.0,
    };

    /// Applies a JSON preset payload.
    ///
    /// Unknown keys are ignored and missing keys keep their value. A known
    /// key whose value is not a number (or numeric string) is skipped and
    /// listed in the report. If the payload is not a JSON object nothing
    /// changes.
    pub fn apply_preset(&mut self, payload: &str) -> Result<PresetReport, PresetError> {
        let value: Value = serde_json::from_str(payload)?;
        let Value::Object(map) = value else {
            return Err(PresetError::NotAnObject);
        };
        let mut report = PresetReport::default();
        for field in PresetField::ALL {
            let Some(raw) = map.get(field.key()) else {
                continue;
            };
            if numeric(raw).is_some_and(|n| self.set(field, n)) {
                report.applied += 1;
            } else {
                report.skipped.push(field);
            }
        }
        Ok(report)
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "shading parameters are single precision; iterations are range-checked"
    )]
    fn set(&mut self, field: PresetField, n: f64) -> bool {
        if !n.is_finite() {
            return false;
        }
        match field {
            PresetField::X => self.navigation.x = n,
            PresetField::Y => self.navigation.y = n,
            PresetField::Zoom => {
                if n <= 0.0 {
                    return false;
                }
                self.navigation.zoom = n;
            }
            PresetField::Iterations => {
                if !(0.0..=f64::from(u32::MAX)).contains(&n) {
                    return false;
                }
                self.iterations = libm::round(n) as u32;
            }
            PresetField::Gamma => self.gamma = n as f32,
            PresetField::Play => self.play = n as f32,
            PresetField::Shift => self.shift = n as f32,
            PresetField::Contrast => self.contrast = n as f32,
            PresetField::Phase => self.phase = n as f32,
            PresetField::Radius => self.radius = n as f32,
            PresetField::Smoothing => self.smoothing = n as f32,
        }
        true
    }
}

impl Default for FractalParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Uniform block for the per-pixel stage (`std140`-compatible, 64 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FractalUniforms {
    /// Top-left corner in fractal space.
    pub origin: [f32; 2],
    /// View width in fractal units.
    pub zoom: f32,
    /// Iteration limit.
    pub iterations: u32,
    /// Output size in pixels.
    pub viewport: [f32; 2],
    /// Gamma.
    pub gamma: f32,
    /// Palette animation offset.
    pub play: f32,
    /// Palette shift.
    pub shift: f32,
    /// Palette contrast.
    pub contrast: f32,
    /// Palette phase.
    pub phase: f32,
    /// Escape radius.
    pub radius: f32,
    /// Smooth-coloring blend.
    pub smoothing: f32,
    _pad: [f32; 3],
}

impl FractalUniforms {
    /// Packs `params` for a `viewport`-sized target.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "GPU uniforms are single precision"
    )]
    pub fn new(params: &FractalParams, viewport: Extent) -> Self {
        let origin = params.navigation.origin();
        Self {
            origin: [origin.x as f32, origin.y as f32],
            zoom: params.navigation.zoom as f32,
            iterations: params.iterations,
            viewport: [viewport.width as f32, viewport.height as f32],
            gamma: params.gamma,
            play: params.play,
            shift: params.shift,
            contrast: params.contrast,
            phase: params.phase,
            radius: params.radius,
            smoothing: params.smoothing,
            _pad: [0.0; 3],
        }
    }
}
