//! Cross-section view
//!
//! A station picked on the plan becomes a cutting plane through the point,
//! normal to the alignment. The section edges of every clip style are drawn
//! on the section gizmo layer and looked at by an orthographic camera in
//! the right overlay.

use crate::civil::{
    overlay_viewport, to_vec3, CivilSession, CivilView, CrossSectionGizmos, Navigator3dState,
    SECTION_LAYER, SECTION_OVERLAY_LEFT,
};
use crate::{log, Fragments, SectionEdges};
use bevy::camera::visibility::RenderLayers;
use bevy::camera::{ScalingMode, Viewport};
use bevy::prelude::*;
use ifc_civil_model::{Alignment, CrossSectionNavigator, MeshId, Plane, WorldId};
use nalgebra::{Point3, Vector3};
use std::sync::Arc;

/// Distance of the section camera from the station, along the alignment
const SECTION_CAMERA_DISTANCE: f32 = 50.0;
/// World units visible vertically in the section view
const SECTION_VIEW_HEIGHT: f32 = 12.0;

#[derive(Component)]
pub struct CrossSectionCamera;

/// Where the section is cut
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Station {
    pub point: Vec3,
    pub tangent: Vec3,
}

/// Cross-section navigator
#[derive(Resource, Default, Debug)]
pub struct CrossSectionState {
    bound: Option<(WorldId, WorldId)>,
    pending: Option<(MeshId, Point3<f64>)>,
    station: Option<Station>,
}

impl CrossSectionState {
    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn station(&self) -> Option<Station> {
        self.station
    }

    pub fn take_pending(&mut self) -> Option<(MeshId, Point3<f64>)> {
        self.pending.take()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl CrossSectionNavigator for CrossSectionState {
    fn bind(&mut self, plan: WorldId, world: WorldId) {
        self.bound = Some((plan, world));
    }

    fn set(&mut self, mesh: MeshId, point: Point3<f64>) {
        if self.bound.is_none() {
            log("[Section] Not bound, station ignored");
            return;
        }
        self.pending = Some((mesh, point));
    }
}

/// Cutting plane at `point` on the curve drawn with `mesh`, plus the
/// curve direction there
pub fn station_plane(
    alignments: &[Arc<Alignment>],
    mesh: MeshId,
    point: &Point3<f64>,
) -> Option<(Plane, Vector3<f64>)> {
    let curve = alignments.iter().find_map(|a| a.curve_by_mesh(mesh))?;
    let tangent = curve.tangent_at(point)?;
    Plane::new(*point, tangent).map(|plane| (plane, tangent))
}

pub(crate) fn spawn_section_camera(commands: &mut Commands) {
    commands.spawn((
        CrossSectionCamera,
        CivilView,
        Camera3d::default(),
        Camera {
            order: 4,
            is_active: false,
            clear_color: ClearColorConfig::Custom(Color::srgb(0.06, 0.06, 0.08)),
            ..default()
        },
        Projection::from(OrthographicProjection {
            scaling_mode: ScalingMode::FixedVertical {
                viewport_height: SECTION_VIEW_HEIGHT,
            },
            near: 0.1,
            far: SECTION_CAMERA_DISTANCE * 4.0,
            ..OrthographicProjection::default_3d()
        }),
        Transform::default(),
        RenderLayers::layer(SECTION_LAYER),
    ));
}

/// Turn the pending station into a plane and recompute the edges
pub(crate) fn update_cross_section(
    mut state: ResMut<CrossSectionState>,
    nav3d: Res<Navigator3dState>,
    fragments: Res<Fragments>,
    mut edges: ResMut<SectionEdges>,
) {
    if let Some((mesh, point)) = state.take_pending() {
        match station_plane(nav3d.alignments(), mesh, &point) {
            Some((plane, tangent)) => {
                edges.set_plane(plane);
                state.station = Some(Station {
                    point: to_vec3(&point),
                    tangent: Vec3::new(tangent.x as f32, tangent.y as f32, tangent.z as f32),
                });
            }
            None => log(&format!("[Section] No curve for mesh {:?}", mesh)),
        }
    }
    if edges.needs_update() {
        edges.compute_edges(&fragments);
        log(&format!(
            "[Section] {} styles cut",
            edges.edges().count()
        ));
    }
}

pub(crate) fn update_section_camera(
    state: Res<CrossSectionState>,
    windows: Query<&Window>,
    mut cameras: Query<(&mut Camera, &mut Transform), With<CrossSectionCamera>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Ok((mut camera, mut transform)) = cameras.single_mut() else {
        return;
    };
    let window_size = UVec2::new(window.physical_width(), window.physical_height());
    let viewport = overlay_viewport(SECTION_OVERLAY_LEFT, window_size, window.scale_factor());
    let Some((position, size)) = viewport else {
        camera.is_active = false;
        return;
    };
    camera.is_active = true;
    camera.viewport = Some(Viewport {
        physical_position: position,
        physical_size: size,
        ..default()
    });

    let Some(station) = state.station else {
        return;
    };
    // Look along the road, level with the horizon
    let mut heading = Vec3::new(station.tangent.x, 0.0, station.tangent.z);
    if heading.length_squared() < 1e-6 {
        heading = Vec3::X;
    }
    let heading = heading.normalize();
    *transform = Transform::from_translation(station.point - heading * SECTION_CAMERA_DISTANCE)
        .looking_at(station.point, Vec3::Y);
}

pub(crate) fn draw_section_edges(
    mut gizmos: Gizmos<CrossSectionGizmos>,
    edges: Res<SectionEdges>,
    session: Res<CivilSession>,
) {
    if !session.is_active() {
        return;
    }
    for (style, segments) in edges.edges() {
        let [r, g, b] = style.line.color.to_array();
        let color = Color::srgb(r, g, b);
        for [a, b] in segments {
            gizmos.line(to_vec3(a), to_vec3(b), color);
        }
    }
}
