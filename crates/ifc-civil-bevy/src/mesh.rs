//! Fragment rendering
//!
//! Every fragment of every loaded group becomes one Bevy mesh entity. The
//! registry carries a revision counter; meshes are rebuilt whenever it moves
//! (load, civil attach, remove, dispose).

use crate::camera::CameraController;
use crate::{log, Fragments};
use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use ifc_civil_model::{FragmentId, MeshGeometry, MeshId, ModelId};

/// Mesh plugin
pub struct MeshPlugin;

impl Plugin for MeshPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AutoFitState>()
            .init_resource::<SceneBounds>()
            .init_resource::<MeshSync>()
            .add_systems(Update, (sync_fragment_meshes, auto_fit_camera_system).chain());
    }
}

/// Auto-fit the camera once per non-empty scene
#[derive(Resource, Default)]
pub struct AutoFitState {
    pub has_fit: bool,
}

/// World-space bounds of everything loaded
#[derive(Resource, Default, Clone, Debug)]
pub struct SceneBounds {
    pub aabb: Option<(Vec3, Vec3)>,
}

/// Revision of the registry the spawned meshes reflect
#[derive(Resource, Default)]
struct MeshSync {
    revision: u64,
}

/// A spawned fragment mesh
#[derive(Component, Clone, Debug)]
pub struct FragmentMesh {
    pub model: ModelId,
    pub mesh: MeshId,
    pub fragment: FragmentId,
}

/// Convert fragment geometry to a Bevy mesh
pub fn to_bevy_mesh(geometry: &MeshGeometry) -> Mesh {
    let positions: Vec<[f32; 3]> = geometry
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();

    let normals: Vec<[f32; 3]> = if geometry.normals.len() == geometry.positions.len() {
        geometry
            .normals
            .chunks_exact(3)
            .map(|n| [n[0], n[1], n[2]])
            .collect()
    } else {
        compute_flat_normals(&positions, &geometry.indices)
    };

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_indices(Indices::U32(geometry.indices.clone()));
    mesh
}

/// Material for a fragment color; translucent colors blend
pub fn fragment_material(color: [f32; 4]) -> StandardMaterial {
    StandardMaterial {
        base_color: Color::srgba(color[0], color[1], color[2], color[3]),
        metallic: 0.0,
        perceptual_roughness: 0.6,
        reflectance: 0.3,
        double_sided: true,
        cull_mode: None,
        alpha_mode: if color[3] < 1.0 {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        },
        ..default()
    }
}

/// Axis-aligned bounds of a geometry in world space
pub fn geometry_bounds(geometry: &MeshGeometry) -> Option<(Vec3, Vec3)> {
    let (min, max) = geometry.bounds()?;
    Some((
        Vec3::new(min.x as f32, min.y as f32, min.z as f32),
        Vec3::new(max.x as f32, max.y as f32, max.z as f32),
    ))
}

/// Respawn fragment meshes when the registry changed
fn sync_fragment_meshes(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    fragments: Res<Fragments>,
    mut sync: ResMut<MeshSync>,
    mut bounds: ResMut<SceneBounds>,
    mut auto_fit: ResMut<AutoFitState>,
    existing: Query<Entity, With<FragmentMesh>>,
) {
    if fragments.revision() == sync.revision {
        return;
    }
    sync.revision = fragments.revision();

    for entity in existing.iter() {
        commands.entity(entity).despawn();
    }

    let mut scene_aabb: Option<(Vec3, Vec3)> = None;
    let mut spawned = 0usize;
    for (model, group) in fragments.groups() {
        for fragment in &group.fragments {
            if fragment.geometry.is_empty() {
                continue;
            }
            if let Some((min, max)) = geometry_bounds(&fragment.geometry) {
                scene_aabb = Some(match scene_aabb {
                    None => (min, max),
                    Some((a, b)) => (a.min(min), b.max(max)),
                });
            }
            commands.spawn((
                Mesh3d(meshes.add(to_bevy_mesh(&fragment.geometry))),
                MeshMaterial3d(materials.add(fragment_material(fragment.color))),
                Transform::default(),
                FragmentMesh {
                    model,
                    mesh: fragment.mesh,
                    fragment: fragment.id.clone(),
                },
            ));
            spawned += 1;
        }
    }

    log(&format!(
        "[Mesh] Revision {}: {} fragment meshes",
        sync.revision, spawned
    ));

    bounds.aabb = scene_aabb;
    if scene_aabb.is_none() {
        // Empty scene: fit again on the next load
        auto_fit.has_fit = false;
    }
}

/// Frame the scene the first time it has content
fn auto_fit_camera_system(
    bounds: Res<SceneBounds>,
    mut auto_fit: ResMut<AutoFitState>,
    mut controller: ResMut<CameraController>,
) {
    if auto_fit.has_fit {
        return;
    }
    let Some((min, max)) = bounds.aabb else {
        return;
    };
    log(&format!("[Mesh] Auto-fitting camera to {:?} .. {:?}", min, max));
    controller.fit_bounds(min, max);
    auto_fit.has_fit = true;
}

/// Default color for an IFC category
pub fn get_default_color(entity_type: &str) -> [f32; 4] {
    let upper = entity_type.to_uppercase();

    if upper.contains("WALL") {
        [0.92, 0.85, 0.75, 1.0]
    } else if upper.contains("SLAB") || upper.contains("PAVEMENT") {
        [0.75, 0.73, 0.70, 1.0]
    } else if upper.contains("ROOF") {
        [0.72, 0.55, 0.45, 1.0]
    } else if upper.contains("BEAM") || upper.contains("COLUMN") || upper.contains("MEMBER") {
        [0.60, 0.65, 0.72, 1.0]
    } else if upper.contains("DOOR") {
        [0.55, 0.35, 0.20, 1.0]
    } else if upper.contains("WINDOW") || upper.contains("CURTAINWALL") {
        // Glass
        [0.5, 0.7, 0.85, 0.35]
    } else if upper.contains("KERB") || upper.contains("RAILING") {
        [0.45, 0.45, 0.48, 1.0]
    } else if upper.contains("EARTHWORKS") || upper.contains("GEOGRAPHIC") {
        [0.55, 0.45, 0.30, 1.0]
    } else if upper.contains("SPACE") {
        [0.8, 0.85, 0.95, 0.12]
    } else if upper.contains("FOOTING") || upper.contains("PILE") {
        [0.62, 0.60, 0.58, 1.0]
    } else {
        [0.75, 0.72, 0.70, 1.0]
    }
}

/// Flat normals accumulated per vertex from triangle faces
pub fn compute_flat_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            continue;
        }
        let p0 = Vec3::from_array(positions[i0]);
        let face = (Vec3::from_array(positions[i1]) - p0).cross(Vec3::from_array(positions[i2]) - p0);
        for idx in [i0, i1, i2] {
            normals[idx] += face;
        }
    }

    normals
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}
