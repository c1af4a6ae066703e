//! Bevy UI for the IFC-Civil viewer
//!
//! Pure Bevy UI implementation - works on both web and native.

mod layout;
mod panels;
mod styles;
mod toolbar;

pub use layout::*;
pub use panels::{
    widget_change, ControlChanged, NumberControl, PanelWidget, PanelsPlugin, ToggleControl,
};
pub use styles::*;
pub use toolbar::{civil_button_text, ButtonAction, ToolbarButton, ToolbarPlugin};

use bevy::prelude::*;

/// Main UI plugin - combines all UI components
pub struct CivilUiPlugin;

impl Plugin for CivilUiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<UiState>()
            .add_plugins((LayoutPlugin, ToolbarPlugin, PanelsPlugin));
    }
}

/// Global UI state
#[derive(Resource)]
pub struct UiState {
    /// Options panel shown (menu toggle)
    pub show_options: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self { show_options: true }
    }
}
