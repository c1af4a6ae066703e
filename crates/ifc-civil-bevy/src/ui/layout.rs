//! Main UI layout - toolbar and options panel over the 3D view

use super::styles::{UiColors, UiSizes};
use crate::scene::SceneOverlay;
use bevy::prelude::*;

pub struct LayoutPlugin;

impl Plugin for LayoutPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, (setup_ui_camera, setup_layout).chain());
    }
}

/// Marker for the UI camera
#[derive(Component)]
pub struct UiOnlyCamera;

/// Dedicated 2D camera for UI rendering, drawn after every 3D view
fn setup_ui_camera(mut commands: Commands) {
    crate::log("[UI] Setting up UI camera");
    commands.spawn((
        Camera2d,
        Camera {
            // After main (0), minimap (2) and civil views (3, 4)
            order: 10,
            // Don't clear - preserve 3D render underneath
            clear_color: ClearColorConfig::None,
            ..default()
        },
        UiOnlyCamera,
        IsDefaultUiCamera,
    ));
}

/// Marker for the root UI node
#[derive(Component)]
pub struct UiRoot;

/// Marker for the toolbar container
#[derive(Component)]
pub struct ToolbarContainer;

/// Marker for the options panel
#[derive(Component)]
pub struct OptionsPanel;

pub fn setup_layout(mut commands: Commands) {
    // Root container - full screen, transparent to show 3D behind
    commands
        .spawn((
            UiRoot,
            SceneOverlay,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                ..default()
            },
            BackgroundColor(Color::NONE),
        ))
        .with_children(|parent| {
            parent.spawn((
                ToolbarContainer,
                Node {
                    width: Val::Percent(100.0),
                    height: Val::Px(UiSizes::TOOLBAR_HEIGHT),
                    flex_direction: FlexDirection::Row,
                    align_items: AlignItems::Center,
                    padding: UiRect::horizontal(Val::Px(UiSizes::PADDING)),
                    ..default()
                },
                BackgroundColor(UiColors::TOOLBAR_BG),
                Interaction::default(),
            ));
        });

    // Floating on the right, under the toolbar
    commands.spawn((
        OptionsPanel,
        SceneOverlay,
        Name::new("options-panel"),
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(UiSizes::TOOLBAR_HEIGHT + UiSizes::PADDING),
            right: Val::Px(UiSizes::PADDING),
            width: Val::Px(UiSizes::PANEL_WIDTH),
            flex_direction: FlexDirection::Column,
            padding: UiRect::all(Val::Px(UiSizes::PADDING)),
            border: UiRect::all(Val::Px(1.0)),
            border_radius: BorderRadius::all(Val::Px(UiSizes::BORDER_RADIUS * 2.0)),
            ..default()
        },
        BackgroundColor(UiColors::PANEL_BG),
        BorderColor::all(UiColors::BORDER),
        Interaction::default(),
    ));
}
