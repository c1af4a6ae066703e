//! Minimap overlay
//!
//! A top-down orthographic camera rendered into a viewport anchored 20px
//! from the bottom-right corner, framed by a bordered UI node. Everything
//! about it follows [`MinimapSettings`] live: `visible` shows or hides the
//! overlay, `enabled` freezes or resumes following the main camera.

use crate::camera::CameraController;
use crate::scene::SceneOverlay;
use crate::MinimapSettings;
use bevy::camera::{ScalingMode, Viewport};
use bevy::prelude::*;
use ifc_civil_model::MinimapConfig;

pub struct MinimapPlugin;

impl Plugin for MinimapPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_minimap)
            .add_systems(Update, (update_minimap_frame, update_minimap_camera).chain());
    }
}

/// Distance of the overlay from the window's bottom and right edges
pub const MINIMAP_MARGIN: f32 = 20.0;
const MINIMAP_BORDER: f32 = 2.0;
/// Height above the target the minimap camera looks down from
const MINIMAP_ALTITUDE: f32 = 500.0;

#[derive(Component)]
pub struct MinimapCamera;

#[derive(Component)]
pub struct MinimapFrame;

/// World units visible vertically at a zoom level (larger zoom, closer view)
pub fn visible_height(zoom: f32) -> f32 {
    1.0 / zoom.max(0.001)
}

/// Physical viewport for the minimap inside a window of `window_size`
/// physical pixels, or `None` if it does not fit at all.
pub fn minimap_viewport(
    config: &MinimapConfig,
    window_size: UVec2,
    scale_factor: f32,
) -> Option<(UVec2, UVec2)> {
    let inset = MINIMAP_MARGIN + MINIMAP_BORDER;
    let width = ((config.size_x - 2.0 * MINIMAP_BORDER) * scale_factor).round();
    let height = ((config.size_y - 2.0 * MINIMAP_BORDER) * scale_factor).round();
    let right = (inset * scale_factor).round();
    let bottom = (inset * scale_factor).round();

    let x = window_size.x as f32 - right - width;
    let y = window_size.y as f32 - bottom - height;
    if width < 1.0 || height < 1.0 || x < 0.0 || y < 0.0 {
        return None;
    }
    Some((
        UVec2::new(x as u32, y as u32),
        UVec2::new(width as u32, height as u32),
    ))
}

fn spawn_minimap(mut commands: Commands, settings: Res<MinimapSettings>) {
    commands.spawn((
        MinimapCamera,
        Camera3d::default(),
        Camera {
            order: 2,
            is_active: settings.visible,
            clear_color: ClearColorConfig::Custom(Color::srgb(0.08, 0.08, 0.1)),
            ..default()
        },
        Projection::from(OrthographicProjection {
            scaling_mode: ScalingMode::FixedVertical {
                viewport_height: visible_height(settings.zoom),
            },
            near: 0.1,
            far: MINIMAP_ALTITUDE * 4.0,
            ..OrthographicProjection::default_3d()
        }),
        Transform::from_xyz(0.0, MINIMAP_ALTITUDE, 0.0).looking_at(Vec3::ZERO, Vec3::NEG_Z),
    ));

    commands.spawn((
        MinimapFrame,
        SceneOverlay,
        Name::new("minimap"),
        Node {
            position_type: PositionType::Absolute,
            right: Val::Px(MINIMAP_MARGIN),
            bottom: Val::Px(MINIMAP_MARGIN),
            width: Val::Px(settings.size_x),
            height: Val::Px(settings.size_y),
            border: UiRect::all(Val::Px(MINIMAP_BORDER)),
            border_radius: BorderRadius::all(Val::Px(12.0)),
            ..default()
        },
        BorderColor::all(Color::WHITE),
        BackgroundColor(Color::NONE),
        // Blocks main-camera input over the minimap
        Interaction::default(),
    ));
}

fn update_minimap_frame(
    settings: Res<MinimapSettings>,
    mut frames: Query<&mut Node, With<MinimapFrame>>,
) {
    if !settings.is_changed() {
        return;
    }
    for mut node in frames.iter_mut() {
        node.width = Val::Px(settings.size_x);
        node.height = Val::Px(settings.size_y);
        node.display = if settings.visible {
            Display::Flex
        } else {
            Display::None
        };
    }
}

fn update_minimap_camera(
    settings: Res<MinimapSettings>,
    controller: Res<CameraController>,
    windows: Query<&Window>,
    mut cameras: Query<(&mut Camera, &mut Projection, &mut Transform), With<MinimapCamera>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Ok((mut camera, mut projection, mut transform)) = cameras.single_mut() else {
        return;
    };

    let window_size = UVec2::new(window.physical_width(), window.physical_height());
    let viewport = minimap_viewport(&settings, window_size, window.scale_factor());
    let active = settings.visible && viewport.is_some();
    if camera.is_active != active {
        camera.is_active = active;
    }
    let Some((position, size)) = viewport else {
        return;
    };
    camera.viewport = Some(Viewport {
        physical_position: position,
        physical_size: size,
        ..default()
    });
    if !settings.enabled {
        return;
    }

    if let Projection::Orthographic(ortho) = projection.as_mut() {
        ortho.scaling_mode = ScalingMode::FixedVertical {
            viewport_height: visible_height(settings.zoom),
        };
    }

    // Heading of the main camera on the ground plane
    let forward = -Vec3::new(controller.azimuth.sin(), 0.0, controller.azimuth.cos());
    let center = controller.target + forward * settings.front_offset;
    let up = if settings.lock_rotation {
        Vec3::NEG_Z
    } else {
        forward
    };
    *transform = Transform::from_translation(center + Vec3::Y * MINIMAP_ALTITUDE)
        .looking_at(center, up);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn minimap_app(config: MinimapConfig) -> App {
        let mut app = App::new();
        app.insert_resource(MinimapSettings(config))
            .insert_resource(CameraController {
                target: Vec3::new(5.0, 0.0, -5.0),
                ..default()
            })
            .add_systems(Update, (update_minimap_frame, update_minimap_camera).chain());
        app.world_mut().spawn(Window::default());
        app.world_mut().spawn((
            MinimapCamera,
            Camera::default(),
            Projection::from(OrthographicProjection::default_3d()),
            Transform::from_xyz(1.0, 2.0, 3.0),
        ));
        app.world_mut().spawn((MinimapFrame, Node::default()));
        app
    }

    fn camera_state(app: &mut App) -> (bool, Vec3) {
        let (camera, transform) = app
            .world_mut()
            .query_filtered::<(&Camera, &Transform), With<MinimapCamera>>()
            .single(app.world())
            .unwrap();
        (camera.is_active, transform.translation)
    }

    fn frame_display(app: &mut App) -> Display {
        app.world_mut()
            .query_filtered::<&Node, With<MinimapFrame>>()
            .single(app.world())
            .unwrap()
            .display
    }

    #[test]
    fn test_disabled_minimap_stays_shown_but_frozen() {
        let mut app = minimap_app(MinimapConfig {
            enabled: false,
            ..default()
        });
        app.update();
        let (active, translation) = camera_state(&mut app);
        assert!(active);
        assert_eq!(translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(frame_display(&mut app), Display::Flex);

        app.world_mut().resource_mut::<MinimapSettings>().enabled = true;
        app.update();
        let (_, translation) = camera_state(&mut app);
        assert_relative_eq!(translation.y, MINIMAP_ALTITUDE);
        assert_relative_eq!(translation.x, 5.0);
    }

    #[test]
    fn test_hidden_minimap_deactivates_camera() {
        let mut app = minimap_app(MinimapConfig {
            visible: false,
            ..default()
        });
        app.update();
        let (active, _) = camera_state(&mut app);
        assert!(!active);
        assert_eq!(frame_display(&mut app), Display::None);
    }

    #[test]
    fn test_default_viewport_bottom_right() {
        let config = MinimapConfig::default();
        let (position, size) = minimap_viewport(&config, UVec2::new(1280, 720), 1.0).unwrap();
        assert_eq!(size, UVec2::new(346, 146));
        assert_eq!(position, UVec2::new(1280 - 22 - 346, 720 - 22 - 146));
    }

    #[test]
    fn test_viewport_scales_with_dpi() {
        let config = MinimapConfig::default();
        let (_, size) = minimap_viewport(&config, UVec2::new(2560, 1440), 2.0).unwrap();
        assert_eq!(size, UVec2::new(692, 292));
    }

    #[test]
    fn test_viewport_does_not_fit() {
        let config = MinimapConfig::default();
        assert!(minimap_viewport(&config, UVec2::new(200, 100), 1.0).is_none());
    }

    #[test]
    fn test_zoom_in_shows_less() {
        assert!(visible_height(0.5) < visible_height(0.05));
        assert_relative_eq!(visible_height(0.05), 20.0, epsilon = 1e-4);
    }
}
