//! UI styling constants and helpers

use bevy::prelude::*;
use ifc_civil_model::Rgb;

/// Color palette for the UI
pub struct UiColors;

impl UiColors {
    // Background colors
    pub const PANEL_BG: Color = Color::srgba(0.15, 0.15, 0.15, 0.95);
    pub const TOOLBAR_BG: Color = Color::srgba(0.12, 0.12, 0.12, 0.98);
    pub const BUTTON_BG: Color = Color::srgba(0.25, 0.25, 0.25, 1.0);
    pub const BUTTON_HOVER: Color = Color::srgba(0.35, 0.35, 0.35, 1.0);
    pub const BUTTON_ACTIVE: Color = Color::srgba(0.2, 0.5, 0.8, 1.0);

    // Text colors
    pub const TEXT_PRIMARY: Color = Color::srgba(0.9, 0.9, 0.9, 1.0);
    pub const TEXT_SECONDARY: Color = Color::srgba(0.6, 0.6, 0.6, 1.0);
    pub const TEXT_ACCENT: Color = Color::srgba(0.4, 0.7, 1.0, 1.0);

    pub const BORDER: Color = Color::srgba(0.3, 0.3, 0.3, 1.0);
}

/// Common sizes
pub struct UiSizes;

impl UiSizes {
    pub const TOOLBAR_HEIGHT: f32 = 48.0;
    pub const PANEL_WIDTH: f32 = 260.0;
    pub const BUTTON_SIZE: f32 = 36.0;
    pub const STEP_BUTTON_SIZE: f32 = 24.0;
    pub const SWATCH_SIZE: f32 = 22.0;
    pub const PADDING: f32 = 8.0;
    pub const PADDING_SM: f32 = 4.0;
    pub const BORDER_RADIUS: f32 = 4.0;
    pub const FONT_SIZE: f32 = 14.0;
    pub const FONT_SIZE_SM: f32 = 12.0;
    pub const FONT_SIZE_LG: f32 = 16.0;
}

/// Label text in the given size and color
pub fn label(text: impl Into<String>, size: f32, color: Color) -> impl Bundle {
    (
        Text::new(text),
        TextFont {
            font_size: size,
            ..default()
        },
        TextColor(color),
    )
}

/// Small square button used by steppers
pub fn step_button_style() -> Node {
    Node {
        width: Val::Px(UiSizes::STEP_BUTTON_SIZE),
        height: Val::Px(UiSizes::STEP_BUTTON_SIZE),
        justify_content: JustifyContent::Center,
        align_items: AlignItems::Center,
        margin: UiRect::horizontal(Val::Px(2.0)),
        border_radius: BorderRadius::all(Val::Px(UiSizes::BORDER_RADIUS)),
        ..default()
    }
}

/// One labelled row of the options panel
pub fn row_style() -> Node {
    Node {
        width: Val::Percent(100.0),
        flex_direction: FlexDirection::Row,
        align_items: AlignItems::Center,
        justify_content: JustifyContent::SpaceBetween,
        margin: UiRect::vertical(Val::Px(UiSizes::PADDING_SM)),
        ..default()
    }
}

pub fn to_color(rgb: Rgb) -> Color {
    Color::srgb(rgb.r, rgb.g, rgb.b)
}
