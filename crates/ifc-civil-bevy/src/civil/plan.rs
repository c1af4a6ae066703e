//! Plan view
//!
//! Top-down orthographic camera over the drawn horizontal curves, shown in
//! the left overlay. Pointer moves become hover markers, clicks highlight
//! the curve and commit a select marker, Escape hides the select marker.

use crate::civil::{
    overlay_viewport, to_vec3, CivilSession, CivilView, Navigator3dState, PlanEventMessage,
    PlanGizmos, PLAN_LAYER, PLAN_OVERLAY_LEFT,
};
use bevy::camera::visibility::RenderLayers;
use bevy::camera::{ScalingMode, Viewport};
use bevy::prelude::*;
use ifc_civil_model::{Highlight, MarkerHidden, MarkerType, PlanEvent, PlanHit, PlanLayout};
use nalgebra::Point3;

const PLAN_ALTITUDE: f32 = 500.0;
/// Pointer distance to a curve, in logical pixels, that still counts as on it
const PICK_TOLERANCE_PX: f32 = 8.0;
/// Empty border around the fitted curves
const PLAN_MARGIN: f32 = 1.15;

#[derive(Component)]
pub struct PlanCamera;

/// Pointer state of the plan view
#[derive(Default)]
pub(crate) struct PlanPointer {
    last_cursor: Option<Vec2>,
    hovering: bool,
}

/// Center and visible height that fit the plan bounds into a viewport
pub fn fit_plan(bounds: (Point3<f64>, Point3<f64>), aspect: f32) -> (Vec3, f32) {
    let (min, max) = bounds;
    let center = Vec3::new(((min.x + max.x) * 0.5) as f32, 0.0, ((min.z + max.z) * 0.5) as f32);
    let width = (max.x - min.x) as f32;
    let depth = (max.z - min.z) as f32;
    let height = depth.max(width / aspect.max(0.01)).max(1.0) * PLAN_MARGIN;
    (center, height)
}

/// Events for one pointer update over the plan
pub fn pointer_events(hit: Option<&PlanHit>, hovering: bool, clicked: bool) -> Vec<PlanEvent> {
    let mut events = Vec::new();
    match hit {
        Some(hit) => {
            events.push(PlanLayout::marker_event(hit, MarkerType::Hover));
            if clicked {
                events.push(PlanEvent::Highlight(Highlight {
                    curve: hit.curve.clone(),
                }));
                events.push(PlanLayout::marker_event(hit, MarkerType::Select));
            }
        }
        None if hovering => events.push(PlanEvent::MarkerHidden(MarkerHidden {
            marker_type: MarkerType::Hover,
        })),
        None => {}
    }
    events
}

pub(crate) fn spawn_plan_camera(commands: &mut Commands, plan: &PlanLayout) {
    let (center, height) = plan
        .bounds()
        .map(|bounds| fit_plan(bounds, 1.5))
        .unwrap_or((Vec3::ZERO, 50.0));
    commands.spawn((
        PlanCamera,
        CivilView,
        Camera3d::default(),
        Camera {
            order: 3,
            is_active: false,
            clear_color: ClearColorConfig::Custom(Color::srgb(0.12, 0.12, 0.14)),
            ..default()
        },
        Projection::from(OrthographicProjection {
            scaling_mode: ScalingMode::FixedVertical {
                viewport_height: height,
            },
            near: 0.1,
            far: PLAN_ALTITUDE * 4.0,
            ..OrthographicProjection::default_3d()
        }),
        Transform::from_translation(center + Vec3::Y * PLAN_ALTITUDE)
            .looking_at(center, Vec3::NEG_Z),
        RenderLayers::layer(PLAN_LAYER),
    ));
}

/// Keep the plan camera on its overlay and fitted to the curves
pub(crate) fn update_plan_camera(
    session: Res<CivilSession>,
    windows: Query<&Window>,
    mut cameras: Query<(&mut Camera, &mut Projection, &mut Transform), With<PlanCamera>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Ok((mut camera, mut projection, mut transform)) = cameras.single_mut() else {
        return;
    };
    let window_size = UVec2::new(window.physical_width(), window.physical_height());
    let Some((position, size)) =
        overlay_viewport(PLAN_OVERLAY_LEFT, window_size, window.scale_factor())
    else {
        camera.is_active = false;
        return;
    };
    camera.is_active = true;
    camera.viewport = Some(Viewport {
        physical_position: position,
        physical_size: size,
        ..default()
    });

    let Some(bounds) = session.plan.bounds() else {
        return;
    };
    let (center, height) = fit_plan(bounds, size.x as f32 / size.y as f32);
    if let Projection::Orthographic(ortho) = projection.as_mut() {
        ortho.scaling_mode = ScalingMode::FixedVertical {
            viewport_height: height,
        };
    }
    transform.translation = center + Vec3::Y * PLAN_ALTITUDE;
}

pub(crate) fn plan_pointer_system(
    mut pointer: Local<PlanPointer>,
    mouse: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    windows: Query<&Window>,
    cameras: Query<(&Camera, &GlobalTransform, &Projection), With<PlanCamera>>,
    session: Res<CivilSession>,
    mut events: MessageWriter<PlanEventMessage>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        events.write(PlanEventMessage(PlanEvent::MarkerHidden(MarkerHidden {
            marker_type: MarkerType::Select,
        })));
    }

    let Ok(window) = windows.single() else {
        return;
    };
    let Ok((camera, camera_transform, projection)) = cameras.single() else {
        return;
    };
    let Some(rect) = camera.logical_viewport_rect() else {
        return;
    };
    let cursor = window.cursor_position().filter(|c| rect.contains(*c));
    let clicked = cursor.is_some() && mouse.just_pressed(MouseButton::Left);
    if cursor == pointer.last_cursor && !clicked {
        return;
    }
    pointer.last_cursor = cursor;

    let hit = cursor.and_then(|cursor| {
        let ray = camera
            .viewport_to_world(camera_transform, cursor - rect.min)
            .ok()?;
        let Projection::Orthographic(ortho) = projection else {
            return None;
        };
        let world_per_px = ortho.area.height() / rect.height().max(1.0);
        session.plan.locate(
            ray.origin.x as f64,
            ray.origin.z as f64,
            (PICK_TOLERANCE_PX * world_per_px) as f64,
        )
    });

    let batch = pointer_events(hit.as_ref(), pointer.hovering, clicked);
    pointer.hovering = hit.is_some();
    for event in batch {
        events.write(PlanEventMessage(event));
    }
}

/// Horizontal curves and the markers, projected on the ground
pub(crate) fn draw_plan(
    mut gizmos: Gizmos<PlanGizmos>,
    session: Res<CivilSession>,
    nav3d: Res<Navigator3dState>,
) {
    for alignment in session.plan.alignments() {
        for curve in &alignment.horizontal {
            let color = if nav3d.selected() == Some(curve.mesh) {
                Color::srgb(0.2, 1.0, 0.4)
            } else {
                Color::WHITE
            };
            gizmos.linestrip(curve.points.iter().map(to_vec3), color);
        }
    }

    let flat = |p: Vec3| Vec3::new(p.x, 0.0, p.z);
    if let Some(p) = nav3d.marker(MarkerType::Hover) {
        gizmos.circle(
            Isometry3d::new(flat(p), Quat::from_rotation_x(std::f32::consts::FRAC_PI_2)),
            0.8,
            Color::srgb(1.0, 1.0, 0.3),
        );
    }
    if let Some(p) = nav3d.marker(MarkerType::Select) {
        gizmos.sphere(Isometry3d::from_translation(flat(p)), 1.0, Color::srgb(1.0, 0.2, 0.2));
    }
}
