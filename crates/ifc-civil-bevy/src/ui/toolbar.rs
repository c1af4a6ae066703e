//! Toolbar: loader buttons, civil view toggle, status and menu toggle

use bevy::ecs::hierarchy::ChildSpawnerCommands;
use bevy::prelude::*;

use super::layout::{OptionsPanel, ToolbarContainer};
use super::styles::{label, UiColors, UiSizes};
use super::UiState;
use crate::civil::{CivilState, ToggleCivilView};
use crate::loader::{DisposeRequest, ExportRequest, OpenFileDialogRequest};
use crate::ViewerStatus;

pub struct ToolbarPlugin;

impl Plugin for ToolbarPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_toolbar.after(super::layout::setup_layout))
            .add_systems(
                Update,
                (button_interaction, update_status_text, update_civil_label),
            );
    }
}

/// Marker for toolbar buttons
#[derive(Component)]
pub struct ToolbarButton {
    pub action: ButtonAction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    LoadIfc,
    ExportFragments,
    DisposeFragments,
    ToggleCivil,
    ToggleMenu,
}

/// Status bar text
#[derive(Component)]
pub struct StatusText;

/// Text of the civil toggle
#[derive(Component)]
pub struct CivilButtonLabel;

fn setup_toolbar(mut commands: Commands, toolbar_query: Query<Entity, With<ToolbarContainer>>) {
    let Ok(toolbar_entity) = toolbar_query.single() else {
        return;
    };

    commands.entity(toolbar_entity).with_children(|toolbar| {
        // Loader
        spawn_button(toolbar, "Load IFC File", ButtonAction::LoadIfc);
        spawn_button(toolbar, "Export fragments", ButtonAction::ExportFragments);
        spawn_button(toolbar, "Dispose fragments", ButtonAction::DisposeFragments);
        spawn_separator(toolbar);

        spawn_button(toolbar, "Civil", ButtonAction::ToggleCivil);

        // Spacer
        toolbar.spawn(Node {
            flex_grow: 1.0,
            ..default()
        });

        toolbar.spawn((
            StatusText,
            label("IFC-Civil Viewer", UiSizes::FONT_SIZE, UiColors::TEXT_SECONDARY),
            Node {
                margin: UiRect::horizontal(Val::Px(UiSizes::PADDING)),
                ..default()
            },
        ));
        spawn_button(toolbar, "Menu", ButtonAction::ToggleMenu);
    });
}

fn spawn_button(parent: &mut ChildSpawnerCommands, text: &str, action: ButtonAction) {
    parent
        .spawn((
            ToolbarButton { action },
            Button,
            Node {
                height: Val::Px(UiSizes::BUTTON_SIZE),
                padding: UiRect::horizontal(Val::Px(12.0)),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                margin: UiRect::horizontal(Val::Px(2.0)),
                border_radius: BorderRadius::all(Val::Px(UiSizes::BORDER_RADIUS)),
                ..default()
            },
            BackgroundColor(UiColors::BUTTON_BG),
        ))
        .with_children(|btn: &mut ChildSpawnerCommands| {
            let mut caption = btn.spawn(label(text, UiSizes::FONT_SIZE_SM, UiColors::TEXT_PRIMARY));
            if action == ButtonAction::ToggleCivil {
                caption.insert(CivilButtonLabel);
            }
        });
}

fn spawn_separator(parent: &mut ChildSpawnerCommands) {
    parent.spawn((
        Node {
            width: Val::Px(1.0),
            height: Val::Px(24.0),
            margin: UiRect::horizontal(Val::Px(8.0)),
            ..default()
        },
        BackgroundColor(UiColors::BORDER),
    ));
}

#[allow(clippy::too_many_arguments)]
fn button_interaction(
    mut query: Query<(&Interaction, &mut BackgroundColor, &ToolbarButton), Changed<Interaction>>,
    mut ui_state: ResMut<UiState>,
    mut options_panel: Query<&mut Node, With<OptionsPanel>>,
    mut open_dialog_events: MessageWriter<OpenFileDialogRequest>,
    mut export_events: MessageWriter<ExportRequest>,
    mut dispose_events: MessageWriter<DisposeRequest>,
    mut civil_events: MessageWriter<ToggleCivilView>,
) {
    for (interaction, mut bg_color, button) in query.iter_mut() {
        match *interaction {
            Interaction::Pressed => {
                *bg_color = BackgroundColor(UiColors::BUTTON_ACTIVE);

                match button.action {
                    ButtonAction::LoadIfc => {
                        crate::log_info("[UI] Requesting file dialog...");
                        open_dialog_events.write(OpenFileDialogRequest);
                    }
                    ButtonAction::ExportFragments => {
                        export_events.write(ExportRequest);
                    }
                    ButtonAction::DisposeFragments => {
                        dispose_events.write(DisposeRequest);
                    }
                    ButtonAction::ToggleCivil => {
                        crate::log("[UI] Toggle civil view");
                        civil_events.write(ToggleCivilView);
                    }
                    ButtonAction::ToggleMenu => {
                        ui_state.show_options = !ui_state.show_options;
                        if let Ok(mut node) = options_panel.single_mut() {
                            node.display = if ui_state.show_options {
                                Display::Flex
                            } else {
                                Display::None
                            };
                        }
                    }
                }
            }
            Interaction::Hovered => {
                *bg_color = BackgroundColor(UiColors::BUTTON_HOVER);
            }
            Interaction::None => {
                *bg_color = BackgroundColor(UiColors::BUTTON_BG);
            }
        }
    }
}

fn update_status_text(status: Res<ViewerStatus>, mut texts: Query<&mut Text, With<StatusText>>) {
    if !status.is_changed() || status.message.is_empty() {
        return;
    }
    for mut text in texts.iter_mut() {
        text.0 = status.message.clone();
    }
}

/// Toolbar text for each civil view state
pub fn civil_button_text(state: CivilState) -> &'static str {
    match state {
        CivilState::Inactive => "Civil",
        CivilState::Loading => "Civil (loading)",
        CivilState::Ready => "Close civil",
        CivilState::Failed => "Civil (failed)",
    }
}

fn update_civil_label(
    state: Res<State<CivilState>>,
    mut labels: Query<&mut Text, With<CivilButtonLabel>>,
) {
    if !state.is_changed() {
        return;
    }
    for mut text in labels.iter_mut() {
        text.0 = civil_button_text(*state.get()).to_string();
    }
}
