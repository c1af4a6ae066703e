//! Area measurement input
//!
//! Double-click places a vertex on whatever fragment is under the cursor
//! (the ground plane otherwise), right-click closes the polygon, Delete or
//! Backspace clears every measurement. Handlers only run while the
//! [`MeasureInput`] scope resource exists.

use crate::camera::MainCamera;
use crate::{log, Fragments, ViewerStatus};
use bevy::prelude::*;
use ifc_civil_model::{AreaMeasurement, FragmentsManager};
use nalgebra::{Point3, Vector3};

pub struct MeasurePlugin;

impl Plugin for MeasurePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (measure_input_system, draw_measurements)
                .chain()
                .run_if(resource_exists::<MeasureInput>),
        );
    }
}

/// Two clicks closer than this (seconds) make a double-click
const DOUBLE_CLICK_SECS: f64 = 0.35;
/// ...and no farther apart than this (logical pixels)
const DOUBLE_CLICK_SLOP: f32 = 6.0;

/// Input scope of the area measurement tool
#[derive(Resource, Default)]
pub struct MeasureInput {
    pub measurement: AreaMeasurement,
    last_click: Option<(f64, Vec2)>,
}

impl MeasureInput {
    /// Register a left click; true if it completes a double-click
    pub fn register_click(&mut self, now: f64, position: Vec2) -> bool {
        match self.last_click.take() {
            Some((t, p)) if now - t <= DOUBLE_CLICK_SECS && p.distance(position) <= DOUBLE_CLICK_SLOP => {
                true
            }
            _ => {
                self.last_click = Some((now, position));
                false
            }
        }
    }
}

/// First surface hit along a ray: nearest fragment, else the ground plane
pub fn pick_point(fragments: &FragmentsManager, origin: Vec3, direction: Vec3) -> Option<Vec3> {
    let o = Point3::new(origin.x as f64, origin.y as f64, origin.z as f64);
    let d = Vector3::new(direction.x as f64, direction.y as f64, direction.z as f64);

    let nearest = fragments
        .groups()
        .flat_map(|(_, group)| group.fragments.iter())
        .filter_map(|fragment| fragment.geometry.raycast(&o, &d))
        .min_by(|a, b| a.total_cmp(b));
    if let Some(t) = nearest {
        return Some(origin + direction * t as f32);
    }

    // Ground plane y = 0
    if direction.y.abs() < 1e-6 {
        return None;
    }
    let t = -origin.y / direction.y;
    (t > 0.0).then(|| origin + direction * t)
}

fn measure_input_system(
    mouse: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    windows: Query<&Window>,
    cameras: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    ui_interactions: Query<&Interaction, With<Node>>,
    fragments: Res<Fragments>,
    mut input: ResMut<MeasureInput>,
    mut status: ResMut<ViewerStatus>,
) {
    if keyboard.just_pressed(KeyCode::Delete) || keyboard.just_pressed(KeyCode::Backspace) {
        input.measurement.delete_all();
        status.set("Measurements cleared");
        return;
    }

    let over_ui = ui_interactions
        .iter()
        .any(|i| matches!(i, Interaction::Hovered | Interaction::Pressed));
    if over_ui {
        return;
    }

    if mouse.just_pressed(MouseButton::Right) {
        if let Some(area) = input.measurement.end_creation() {
            status.set(format!("Area: {:.2} m²", area));
        }
        return;
    }

    if !mouse.just_pressed(MouseButton::Left) {
        return;
    }
    let Ok(window) = windows.single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };
    if !input.register_click(time.elapsed_secs_f64(), cursor) {
        return;
    }

    let Ok((camera, camera_transform)) = cameras.single() else {
        return;
    };
    let Ok(ray) = camera.viewport_to_world(camera_transform, cursor) else {
        return;
    };
    if let Some(point) = pick_point(&fragments, ray.origin, *ray.direction) {
        log(&format!("[Measure] Vertex at {:?}", point));
        input
            .measurement
            .create(Point3::new(point.x as f64, point.y as f64, point.z as f64));
    }
}

fn draw_measurements(mut gizmos: Gizmos, input: Res<MeasureInput>) {
    let to_vec3 = |p: &Point3<f64>| Vec3::new(p.x as f32, p.y as f32, p.z as f32);
    let in_progress = Color::srgb(1.0, 0.8, 0.2);
    let finished = Color::srgb(0.2, 0.8, 1.0);

    let current: Vec<Vec3> = input.measurement.current().iter().map(to_vec3).collect();
    for p in &current {
        gizmos.sphere(Isometry3d::from_translation(*p), 0.08, in_progress);
    }
    if current.len() > 1 {
        gizmos.linestrip(current.iter().copied(), in_progress);
    }

    for polygon in input.measurement.polygons() {
        let points: Vec<Vec3> = polygon.points.iter().map(to_vec3).collect();
        gizmos.linestrip(points.iter().chain(points.first()).copied(), finished);
    }
}
