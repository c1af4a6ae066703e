//! Main camera with orbit, pan and zoom controls
//!
//! The controller keeps the camera on a sphere around `target` and eases
//! towards animation targets. It is also the [`CameraControls`] the civil
//! relay frames highlighted curves with.

use crate::{log, ViewerSettings};
use bevy::ecs::message::MessageReader;
use bevy::input::mouse::{MouseMotion, MouseWheel};
use bevy::prelude::*;
use ifc_civil_model::{BoundingSphere, CameraControls};

/// System set for camera input (for ordering)
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CameraInputSet;

/// Camera controller plugin
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraController>()
            .add_systems(Startup, setup_camera)
            .add_systems(
                Update,
                (camera_input_system, camera_keyboard_system, camera_update_system)
                    .chain()
                    .in_set(CameraInputSet),
            );
    }
}

/// What a left drag does
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CameraMode {
    #[default]
    Orbit,
    Pan,
}

/// Camera controller resource
#[derive(Resource)]
pub struct CameraController {
    pub mode: CameraMode,
    /// Point the camera orbits around
    pub target: Vec3,
    pub distance: f32,
    /// Horizontal angle, radians
    pub azimuth: f32,
    /// Vertical angle, radians
    pub elevation: f32,
    /// Smoothing factor (0.0 = instant, 1.0 = never moves)
    pub damping: f32,
    /// Orbit inertia
    pub angular_velocity: Vec2,
    pub animation_target: Option<CameraAnimationTarget>,
    /// Field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub orbit_sensitivity: f32,
    pub pan_sensitivity: f32,
    pub zoom_sensitivity: f32,
    pub is_dragging: bool,
    /// Drag started with the middle button (always pans)
    pub drag_pans: bool,
    /// Eye and target restored by `home`
    pub home: (Vec3, Vec3),
}

impl Default for CameraController {
    fn default() -> Self {
        let mut controller = Self {
            mode: CameraMode::Orbit,
            target: Vec3::ZERO,
            distance: 10.0,
            azimuth: 0.0,
            elevation: 0.0,
            damping: 0.85,
            angular_velocity: Vec2::ZERO,
            animation_target: None,
            fov: 45.0,
            near: 0.1,
            far: 10_000.0,
            orbit_sensitivity: 0.005,
            pan_sensitivity: 0.01,
            zoom_sensitivity: 0.1,
            is_dragging: false,
            drag_pans: false,
            home: (Vec3::splat(5.0), Vec3::ZERO),
        };
        controller.look_at(Vec3::splat(5.0), Vec3::ZERO);
        controller
    }
}

impl CameraController {
    /// Get camera position from spherical coordinates
    pub fn get_position(&self) -> Vec3 {
        let x = self.distance * self.elevation.cos() * self.azimuth.sin();
        let y = self.distance * self.elevation.sin();
        let z = self.distance * self.elevation.cos() * self.azimuth.cos();
        self.target + Vec3::new(x, y, z)
    }

    /// Place the camera at `eye` looking at `target`, without animation
    pub fn look_at(&mut self, eye: Vec3, target: Vec3) {
        let offset = eye - target;
        let distance = offset.length();
        self.target = target;
        if distance < f32::EPSILON {
            return;
        }
        self.distance = distance;
        self.azimuth = offset.x.atan2(offset.z);
        self.elevation = (offset.y / distance).clamp(-1.0, 1.0).asin();
        self.animation_target = None;
        self.angular_velocity = Vec2::ZERO;
    }

    /// Animate back to the configured start view
    pub fn go_home(&mut self) {
        let (eye, target) = self.home;
        let offset = eye - target;
        let distance = offset.length().max(self.near);
        self.animate_to(
            offset.x.atan2(offset.z),
            (offset.y / distance).clamp(-1.0, 1.0).asin(),
            distance,
            target,
        );
    }

    /// Distance at which a sphere of `radius` fills the view
    pub fn distance_for_radius(&self, radius: f32) -> f32 {
        let half_fov = (self.fov.to_radians() / 2.0).sin();
        (radius / half_fov).max(self.near * 10.0)
    }

    /// Frame an axis-aligned box
    pub fn fit_bounds(&mut self, min: Vec3, max: Vec3) {
        let center = (min + max) * 0.5;
        let radius = (max - min).length() * 0.5;
        let distance = self.distance_for_radius(radius);
        self.animate_to(self.azimuth, self.elevation, distance, center);
    }

    fn animate_to(&mut self, azimuth: f32, elevation: f32, distance: f32, target: Vec3) {
        self.animation_target = Some(CameraAnimationTarget {
            azimuth,
            elevation,
            distance,
            target,
            duration: 0.5,
            elapsed: 0.0,
        });
        self.angular_velocity = Vec2::ZERO;
    }

    pub fn is_animating(&self) -> bool {
        self.animation_target.is_some()
    }
}

impl CameraControls for CameraController {
    fn fit_to_sphere(&mut self, sphere: &BoundingSphere, animate: bool) {
        let center = Vec3::new(
            sphere.center.x as f32,
            sphere.center.y as f32,
            sphere.center.z as f32,
        );
        let distance = self.distance_for_radius(sphere.radius as f32);
        if animate {
            self.animate_to(self.azimuth, self.elevation, distance, center);
        } else {
            self.target = center;
            self.distance = distance;
        }
        log(&format!(
            "[Camera] Fit sphere at {:?} r={:.2}",
            center, sphere.radius
        ));
    }
}

/// Animation target for smooth camera transitions
#[derive(Clone, Debug)]
pub struct CameraAnimationTarget {
    pub azimuth: f32,
    pub elevation: f32,
    pub distance: f32,
    pub target: Vec3,
    pub duration: f32,
    pub elapsed: f32,
}

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Spawn the 3D camera at the configured eye/target
fn setup_camera(
    mut commands: Commands,
    mut controller: ResMut<CameraController>,
    settings: Res<ViewerSettings>,
) {
    use bevy::render::view::Msaa;

    let eye = Vec3::from_array(settings.camera_eye);
    let target = Vec3::from_array(settings.camera_target);
    controller.look_at(eye, target);
    controller.home = (eye, target);

    commands.spawn((
        Camera3d::default(),
        Transform::from_translation(controller.get_position()).looking_at(target, Vec3::Y),
        Projection::Perspective(PerspectiveProjection {
            fov: controller.fov.to_radians(),
            near: controller.near,
            far: controller.far,
            ..default()
        }),
        MainCamera,
        Msaa::Sample4,
    ));
}

/// Mouse input: left drag orbits (or pans in pan mode), middle drag pans,
/// wheel zooms. Ignored while the pointer is over UI.
fn camera_input_system(
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut mouse_wheel: MessageReader<MouseWheel>,
    mut controller: ResMut<CameraController>,
    ui_interactions: Query<&Interaction, With<Node>>,
) {
    let mouse_over_ui = ui_interactions
        .iter()
        .any(|interaction| matches!(interaction, Interaction::Hovered | Interaction::Pressed));

    if !mouse_over_ui {
        if mouse_button.just_pressed(MouseButton::Left) {
            controller.is_dragging = true;
            controller.drag_pans = false;
        } else if mouse_button.just_pressed(MouseButton::Middle) {
            controller.is_dragging = true;
            controller.drag_pans = true;
        }
    }
    if mouse_button.just_released(MouseButton::Left) || mouse_button.just_released(MouseButton::Middle)
    {
        controller.is_dragging = false;
    }

    if controller.is_dragging {
        let pans = controller.drag_pans || controller.mode == CameraMode::Pan;
        for ev in mouse_motion.read() {
            if ev.delta == Vec2::ZERO {
                continue;
            }
            // Any manual drag cancels a running fly-to
            controller.animation_target = None;
            if pans {
                let right = Vec3::new(controller.azimuth.cos(), 0.0, -controller.azimuth.sin());
                let scale = controller.pan_sensitivity * controller.distance * 0.1;
                let pan = -right * ev.delta.x * scale + Vec3::Y * ev.delta.y * scale;
                controller.target += pan;
            } else {
                controller.azimuth -= ev.delta.x * controller.orbit_sensitivity;
                controller.elevation += ev.delta.y * controller.orbit_sensitivity;
                controller.elevation = controller.elevation.clamp(-1.5, 1.5);
                controller.angular_velocity = ev.delta * controller.orbit_sensitivity;
            }
        }
    } else {
        mouse_motion.clear();
        let damping = controller.damping;
        controller.angular_velocity *= damping;
        if controller.angular_velocity.length() > 0.0001 {
            controller.azimuth -= controller.angular_velocity.x;
            controller.elevation += controller.angular_velocity.y;
            controller.elevation = controller.elevation.clamp(-1.5, 1.5);
        }
    }

    if mouse_over_ui {
        mouse_wheel.clear();
        return;
    }
    for ev in mouse_wheel.read() {
        let zoom_delta = ev.y.clamp(-3.0, 3.0) * controller.zoom_sensitivity;
        let (near, far) = (controller.near, controller.far);
        controller.distance = (controller.distance * (1.0 - zoom_delta)).clamp(near * 2.0, far * 0.5);
    }
}

/// Keyboard shortcuts: H home, P toggles orbit/pan
fn camera_keyboard_system(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut controller: ResMut<CameraController>,
) {
    if keyboard.just_pressed(KeyCode::KeyH) {
        controller.go_home();
    }
    if keyboard.just_pressed(KeyCode::KeyP) {
        controller.mode = match controller.mode {
            CameraMode::Orbit => CameraMode::Pan,
            CameraMode::Pan => CameraMode::Orbit,
        };
        log(&format!("[Camera] Mode {:?}", controller.mode));
    }
}

/// Advance animations and move the camera entity
fn camera_update_system(
    mut controller: ResMut<CameraController>,
    mut camera: Query<&mut Transform, With<MainCamera>>,
    time: Res<Time>,
) {
    let dt = time.delta_secs();

    if let Some(mut anim) = controller.animation_target.take() {
        anim.elapsed += dt;
        let t = (anim.elapsed / anim.duration).min(1.0);
        // Ease out cubic
        let t = 1.0 - (1.0 - t).powi(3);

        controller.azimuth = lerp(controller.azimuth, anim.azimuth, t);
        controller.elevation = lerp(controller.elevation, anim.elevation, t);
        controller.distance = lerp(controller.distance, anim.distance, t);
        controller.target = controller.target.lerp(anim.target, t);

        if anim.elapsed < anim.duration {
            controller.animation_target = Some(anim);
        }
    }

    if let Ok(mut transform) = camera.single_mut() {
        let position = controller.get_position();
        transform.translation = transform
            .translation
            .lerp(position, 1.0 - controller.damping.powi(2));
        transform.look_at(controller.target, Vec3::Y);
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
