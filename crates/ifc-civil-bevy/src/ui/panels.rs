//! Options panel: grid and minimap controls
//!
//! Every widget edits one field of [`GridSettings`] or [`MinimapSettings`]
//! through a [`ControlChanged`] message; changes apply on the next frame and
//! labels follow the live values.

use bevy::ecs::hierarchy::ChildSpawnerCommands;
use bevy::prelude::*;
use ifc_civil_model::{
    ControlChange, GridConfig, MinimapConfig, NumberField, Rgb, GRID_COLOR_PRESETS,
    GRID_PRIMARY_SIZE, GRID_SECONDARY_SIZE, MINIMAP_FRONT_OFFSET, MINIMAP_SIZE_X, MINIMAP_SIZE_Y,
    MINIMAP_ZOOM,
};

use super::layout::OptionsPanel;
use super::styles::{label, row_style, step_button_style, to_color, UiColors, UiSizes};
use crate::{GridSettings, MinimapSettings};

pub struct PanelsPlugin;

impl Plugin for PanelsPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<ControlChanged>()
            .add_systems(Startup, setup_options_panel.after(super::layout::setup_layout))
            .add_systems(
                Update,
                (panel_widget_interaction, apply_control_changes, refresh_value_labels).chain(),
            );
    }
}

/// An edit made through the options panel
#[derive(Message, Clone, Copy, Debug)]
pub struct ControlChanged(pub ControlChange);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleControl {
    GridVisible,
    MinimapEnabled,
    MinimapVisible,
    MinimapLockRotation,
}

impl ToggleControl {
    pub fn value(self, grid: &GridConfig, minimap: &MinimapConfig) -> bool {
        match self {
            ToggleControl::GridVisible => grid.visible,
            ToggleControl::MinimapEnabled => minimap.enabled,
            ToggleControl::MinimapVisible => minimap.visible,
            ToggleControl::MinimapLockRotation => minimap.lock_rotation,
        }
    }

    fn change(self, value: bool) -> ControlChange {
        match self {
            ToggleControl::GridVisible => ControlChange::GridVisible(value),
            ToggleControl::MinimapEnabled => ControlChange::MinimapEnabled(value),
            ToggleControl::MinimapVisible => ControlChange::MinimapVisible(value),
            ToggleControl::MinimapLockRotation => ControlChange::MinimapLockRotation(value),
        }
    }

    fn label(self) -> &'static str {
        match self {
            ToggleControl::GridVisible => "Visible",
            ToggleControl::MinimapEnabled => "Enabled",
            ToggleControl::MinimapVisible => "Visible",
            ToggleControl::MinimapLockRotation => "Lock rotation",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumberControl {
    GridPrimarySize,
    GridSecondarySize,
    MinimapZoom,
    MinimapFrontOffset,
    MinimapSizeX,
    MinimapSizeY,
}

impl NumberControl {
    pub fn field(self) -> NumberField {
        match self {
            NumberControl::GridPrimarySize => GRID_PRIMARY_SIZE,
            NumberControl::GridSecondarySize => GRID_SECONDARY_SIZE,
            NumberControl::MinimapZoom => MINIMAP_ZOOM,
            NumberControl::MinimapFrontOffset => MINIMAP_FRONT_OFFSET,
            NumberControl::MinimapSizeX => MINIMAP_SIZE_X,
            NumberControl::MinimapSizeY => MINIMAP_SIZE_Y,
        }
    }

    pub fn value(self, grid: &GridConfig, minimap: &MinimapConfig) -> f32 {
        match self {
            NumberControl::GridPrimarySize => grid.primary_size,
            NumberControl::GridSecondarySize => grid.secondary_size,
            NumberControl::MinimapZoom => minimap.zoom,
            NumberControl::MinimapFrontOffset => minimap.front_offset,
            NumberControl::MinimapSizeX => minimap.size_x,
            NumberControl::MinimapSizeY => minimap.size_y,
        }
    }

    fn change(self, value: f32) -> ControlChange {
        match self {
            NumberControl::GridPrimarySize => ControlChange::GridPrimarySize(value),
            NumberControl::GridSecondarySize => ControlChange::GridSecondarySize(value),
            NumberControl::MinimapZoom => ControlChange::MinimapZoom(value),
            NumberControl::MinimapFrontOffset => ControlChange::MinimapFrontOffset(value),
            NumberControl::MinimapSizeX => ControlChange::MinimapSizeX(value),
            NumberControl::MinimapSizeY => ControlChange::MinimapSizeY(value),
        }
    }

    /// Value formatted with as many decimals as the step needs
    pub fn format(self, value: f32) -> String {
        let step = self.field().step;
        if step >= 1.0 {
            format!("{:.0}", value)
        } else if step >= 0.1 {
            format!("{:.1}", value)
        } else {
            format!("{:.2}", value)
        }
    }
}

/// What pressing a panel button does
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub enum PanelWidget {
    Toggle(ToggleControl),
    Increment(NumberControl),
    Decrement(NumberControl),
    Swatch(Rgb),
}

/// Text showing a live value
#[derive(Component, Clone, Copy, Debug)]
pub enum ValueLabel {
    Toggle(ToggleControl),
    Number(NumberControl),
}

/// The change a press on `widget` makes to the current settings
pub fn widget_change(widget: PanelWidget, grid: &GridConfig, minimap: &MinimapConfig) -> ControlChange {
    match widget {
        PanelWidget::Toggle(control) => control.change(!control.value(grid, minimap)),
        PanelWidget::Increment(control) => {
            control.change(control.field().increment(control.value(grid, minimap)))
        }
        PanelWidget::Decrement(control) => {
            control.change(control.field().decrement(control.value(grid, minimap)))
        }
        PanelWidget::Swatch(color) => ControlChange::GridColor(color),
    }
}

fn setup_options_panel(
    mut commands: Commands,
    panel_query: Query<Entity, With<OptionsPanel>>,
    grid: Res<GridSettings>,
    minimap: Res<MinimapSettings>,
) {
    let Ok(panel) = panel_query.single() else {
        return;
    };

    commands.entity(panel).with_children(|panel| {
        panel.spawn(label("Controls", UiSizes::FONT_SIZE_LG, UiColors::TEXT_PRIMARY));

        spawn_section_title(panel, "Grid Controls");
        spawn_toggle_row(panel, ToggleControl::GridVisible, &grid, &minimap);
        spawn_swatch_row(panel);
        spawn_number_row(panel, NumberControl::GridPrimarySize, &grid, &minimap);
        spawn_number_row(panel, NumberControl::GridSecondarySize, &grid, &minimap);

        spawn_section_title(panel, "Minimap Controls");
        for control in [
            ToggleControl::MinimapEnabled,
            ToggleControl::MinimapVisible,
            ToggleControl::MinimapLockRotation,
        ] {
            spawn_toggle_row(panel, control, &grid, &minimap);
        }
        for control in [
            NumberControl::MinimapZoom,
            NumberControl::MinimapFrontOffset,
            NumberControl::MinimapSizeX,
            NumberControl::MinimapSizeY,
        ] {
            spawn_number_row(panel, control, &grid, &minimap);
        }
    });
}

fn spawn_section_title(parent: &mut ChildSpawnerCommands, title: &str) {
    parent.spawn((
        label(title, UiSizes::FONT_SIZE, UiColors::TEXT_ACCENT),
        Node {
            margin: UiRect::top(Val::Px(UiSizes::PADDING)),
            ..default()
        },
    ));
}

fn spawn_widget_button(parent: &mut ChildSpawnerCommands, widget: PanelWidget, text: &str) {
    parent
        .spawn((widget, Button, step_button_style(), BackgroundColor(UiColors::BUTTON_BG)))
        .with_children(|btn| {
            btn.spawn(label(text, UiSizes::FONT_SIZE_SM, UiColors::TEXT_PRIMARY));
        });
}

fn spawn_toggle_row(
    parent: &mut ChildSpawnerCommands,
    control: ToggleControl,
    grid: &GridConfig,
    minimap: &MinimapConfig,
) {
    parent.spawn(row_style()).with_children(|row| {
        row.spawn(label(control.label(), UiSizes::FONT_SIZE_SM, UiColors::TEXT_SECONDARY));
        row.spawn((
            PanelWidget::Toggle(control),
            Button,
            Node {
                width: Val::Px(48.0),
                ..step_button_style()
            },
            BackgroundColor(UiColors::BUTTON_BG),
        ))
        .with_children(|btn| {
            btn.spawn((
                ValueLabel::Toggle(control),
                label(
                    on_off(control.value(grid, minimap)),
                    UiSizes::FONT_SIZE_SM,
                    UiColors::TEXT_PRIMARY,
                ),
            ));
        });
    });
}

fn spawn_number_row(
    parent: &mut ChildSpawnerCommands,
    control: NumberControl,
    grid: &GridConfig,
    minimap: &MinimapConfig,
) {
    parent.spawn(row_style()).with_children(|row| {
        row.spawn(label(control.field().label, UiSizes::FONT_SIZE_SM, UiColors::TEXT_SECONDARY));
        row.spawn(Node {
            flex_direction: FlexDirection::Row,
            align_items: AlignItems::Center,
            ..default()
        })
        .with_children(|stepper| {
            spawn_widget_button(stepper, PanelWidget::Decrement(control), "-");
            stepper.spawn((
                ValueLabel::Number(control),
                label(
                    control.format(control.value(grid, minimap)),
                    UiSizes::FONT_SIZE_SM,
                    UiColors::TEXT_PRIMARY,
                ),
                Node {
                    min_width: Val::Px(40.0),
                    ..default()
                },
            ));
            spawn_widget_button(stepper, PanelWidget::Increment(control), "+");
        });
    });
}

fn spawn_swatch_row(parent: &mut ChildSpawnerCommands) {
    parent.spawn(row_style()).with_children(|row| {
        row.spawn(label("Color", UiSizes::FONT_SIZE_SM, UiColors::TEXT_SECONDARY));
        row.spawn(Node {
            flex_direction: FlexDirection::Row,
            ..default()
        })
        .with_children(|swatches| {
            for color in GRID_COLOR_PRESETS.iter().filter_map(|hex| Rgb::from_hex(hex)) {
                swatches.spawn((
                    PanelWidget::Swatch(color),
                    Button,
                    Node {
                        width: Val::Px(UiSizes::SWATCH_SIZE),
                        height: Val::Px(UiSizes::SWATCH_SIZE),
                        margin: UiRect::horizontal(Val::Px(2.0)),
                        border: UiRect::all(Val::Px(1.0)),
                        border_radius: BorderRadius::all(Val::Px(UiSizes::BORDER_RADIUS)),
                        ..default()
                    },
                    BackgroundColor(to_color(color)),
                    BorderColor::all(UiColors::BORDER),
                ));
            }
        });
    });
}

fn on_off(value: bool) -> &'static str {
    if value {
        "On"
    } else {
        "Off"
    }
}

fn panel_widget_interaction(
    mut query: Query<(&Interaction, &PanelWidget, &mut BackgroundColor), Changed<Interaction>>,
    grid: Res<GridSettings>,
    minimap: Res<MinimapSettings>,
    mut changes: MessageWriter<ControlChanged>,
) {
    for (interaction, widget, mut bg_color) in query.iter_mut() {
        // Swatches keep their own color
        let swatch = matches!(widget, PanelWidget::Swatch(_));
        match *interaction {
            Interaction::Pressed => {
                let change = widget_change(*widget, &grid, &minimap);
                crate::log(&format!("[UI] {:?}", change));
                changes.write(ControlChanged(change));
                if !swatch {
                    *bg_color = BackgroundColor(UiColors::BUTTON_ACTIVE);
                }
            }
            Interaction::Hovered if !swatch => {
                *bg_color = BackgroundColor(UiColors::BUTTON_HOVER);
            }
            Interaction::None if !swatch => {
                *bg_color = BackgroundColor(UiColors::BUTTON_BG);
            }
            _ => {}
        }
    }
}

fn apply_control_changes(
    mut changes: MessageReader<ControlChanged>,
    mut grid: ResMut<GridSettings>,
    mut minimap: ResMut<MinimapSettings>,
) {
    for ControlChanged(change) in changes.read() {
        change.apply(&mut grid, &mut minimap);
    }
}

fn refresh_value_labels(
    grid: Res<GridSettings>,
    minimap: Res<MinimapSettings>,
    mut labels: Query<(&ValueLabel, &mut Text)>,
) {
    if !grid.is_changed() && !minimap.is_changed() {
        return;
    }
    for (value, mut text) in labels.iter_mut() {
        text.0 = match *value {
            ValueLabel::Toggle(control) => on_off(control.value(&grid, &minimap)).to_string(),
            ValueLabel::Number(control) => control.format(control.value(&grid, &minimap)),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_current_value() {
        let grid = GridConfig::default();
        let minimap = MinimapConfig::default();
        assert_eq!(
            widget_change(PanelWidget::Toggle(ToggleControl::GridVisible), &grid, &minimap),
            ControlChange::GridVisible(false)
        );
        assert_eq!(
            widget_change(
                PanelWidget::Toggle(ToggleControl::MinimapLockRotation),
                &grid,
                &minimap
            ),
            ControlChange::MinimapLockRotation(false)
        );
    }

    #[test]
    fn test_steppers_stay_in_range() {
        let grid = GridConfig::default();
        let mut minimap = MinimapConfig::default();
        assert_eq!(
            widget_change(PanelWidget::Increment(NumberControl::MinimapSizeX), &grid, &minimap),
            ControlChange::MinimapSizeX(360.0)
        );

        minimap.size_y = 100.0;
        let change = widget_change(PanelWidget::Decrement(NumberControl::MinimapSizeY), &grid, &minimap);
        assert_eq!(change, ControlChange::MinimapSizeY(100.0));

        let mut grid = grid;
        change.apply(&mut grid, &mut minimap);
        assert_eq!(minimap.size_y, 100.0);
    }

    #[test]
    fn test_swatch_sets_grid_color() {
        let white = Rgb::from_hex("#ffffff").unwrap();
        let change = widget_change(
            PanelWidget::Swatch(white),
            &GridConfig::default(),
            &MinimapConfig::default(),
        );
        assert_eq!(change, ControlChange::GridColor(white));
    }

    #[test]
    fn test_value_format_follows_step() {
        assert_eq!(NumberControl::MinimapZoom.format(0.05), "0.05");
        assert_eq!(NumberControl::GridPrimarySize.format(1.0), "1.0");
        assert_eq!(NumberControl::MinimapSizeX.format(350.0), "350");
    }
}
