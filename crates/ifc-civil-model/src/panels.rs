// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control panel fields
//!
//! Grid and minimap settings are plain records edited live by the options
//! panel. The only validation is the widget range of each numeric field.

use crate::Rgb;
use serde::{Deserialize, Serialize};

/// Range and step of a numeric widget
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NumberField {
    pub label: &'static str,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl NumberField {
    pub const fn new(label: &'static str, min: f32, max: f32, step: f32) -> Self {
        Self {
            label,
            min,
            max,
            step,
        }
    }

    /// Clamp into range, snapping to the step grid anchored at `min`
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        let steps = ((value - self.min) / self.step).round();
        let snapped = self.min + steps * self.step;
        // Round away float noise from repeated steps
        let snapped = (snapped * 1000.0).round() / 1000.0;
        snapped.clamp(self.min, self.max)
    }

    pub fn increment(&self, value: f32) -> f32 {
        self.clamp(value + self.step)
    }

    pub fn decrement(&self, value: f32) -> f32 {
        self.clamp(value - self.step)
    }
}

pub const GRID_PRIMARY_SIZE: NumberField = NumberField::new("Primary size", 0.0, 10.0, 0.1);
pub const GRID_SECONDARY_SIZE: NumberField = NumberField::new("Secondary size", 0.0, 20.0, 0.1);
pub const MINIMAP_ZOOM: NumberField = NumberField::new("Zoom", 0.01, 0.5, 0.01);
pub const MINIMAP_FRONT_OFFSET: NumberField = NumberField::new("Front offset", 0.0, 5.0, 1.0);
pub const MINIMAP_SIZE_X: NumberField = NumberField::new("Size X", 100.0, 500.0, 10.0);
pub const MINIMAP_SIZE_Y: NumberField = NumberField::new("Size Y", 100.0, 500.0, 10.0);

/// Colors offered by the grid color swatches
pub const GRID_COLOR_PRESETS: [&str; 5] = ["#bbbbbb", "#666666", "#ffffff", "#4a90d9", "#2e7d32"];

/// Reference grid settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub visible: bool,
    pub color: Rgb,
    pub primary_size: f32,
    pub secondary_size: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            visible: true,
            color: Rgb::new(0xbb as f32 / 255.0, 0xbb as f32 / 255.0, 0xbb as f32 / 255.0),
            primary_size: 1.0,
            secondary_size: 10.0,
        }
    }
}

/// Minimap settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimapConfig {
    pub enabled: bool,
    pub visible: bool,
    pub lock_rotation: bool,
    pub zoom: f32,
    pub front_offset: f32,
    pub size_x: f32,
    pub size_y: f32,
}

impl Default for MinimapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            visible: true,
            lock_rotation: true,
            zoom: 0.05,
            front_offset: 0.0,
            size_x: 350.0,
            size_y: 150.0,
        }
    }
}

/// One edit made through the options panel
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlChange {
    GridVisible(bool),
    GridColor(Rgb),
    GridPrimarySize(f32),
    GridSecondarySize(f32),
    MinimapEnabled(bool),
    MinimapVisible(bool),
    MinimapLockRotation(bool),
    MinimapZoom(f32),
    MinimapFrontOffset(f32),
    MinimapSizeX(f32),
    MinimapSizeY(f32),
}

impl ControlChange {
    /// Apply to the live settings, clamping numbers to their widget range
    pub fn apply(self, grid: &mut GridConfig, minimap: &mut MinimapConfig) {
        match self {
            ControlChange::GridVisible(v) => grid.visible = v,
            ControlChange::GridColor(c) => grid.color = c,
            ControlChange::GridPrimarySize(v) => grid.primary_size = GRID_PRIMARY_SIZE.clamp(v),
            ControlChange::GridSecondarySize(v) => {
                grid.secondary_size = GRID_SECONDARY_SIZE.clamp(v)
            }
            ControlChange::MinimapEnabled(v) => minimap.enabled = v,
            ControlChange::MinimapVisible(v) => minimap.visible = v,
            ControlChange::MinimapLockRotation(v) => minimap.lock_rotation = v,
            ControlChange::MinimapZoom(v) => minimap.zoom = MINIMAP_ZOOM.clamp(v),
            ControlChange::MinimapFrontOffset(v) => {
                minimap.front_offset = MINIMAP_FRONT_OFFSET.clamp(v)
            }
            ControlChange::MinimapSizeX(v) => minimap.size_x = MINIMAP_SIZE_X.clamp(v),
            ControlChange::MinimapSizeY(v) => minimap.size_y = MINIMAP_SIZE_Y.clamp(v),
        }
    }
}
