//! Alignments, markers and the highlighted curve in the main 3D view

use crate::civil::to_vec3;
use bevy::prelude::*;
use ifc_civil_model::{Alignment, MarkerType, MeshId, Navigator3d};
use rustc_hash::FxHashMap;
use std::sync::Arc;

const CURVE_COLOR: Color = Color::srgb(0.95, 0.55, 0.1);
const SELECTED_COLOR: Color = Color::srgb(0.2, 1.0, 0.4);

/// 3D navigator: what the relay drew into the shared world
#[derive(Resource, Default, Debug)]
pub struct Navigator3dState {
    alignments: Vec<Arc<Alignment>>,
    markers: FxHashMap<MarkerType, Vec3>,
    selected: Option<MeshId>,
}

impl Navigator3dState {
    pub fn alignments(&self) -> &[Arc<Alignment>] {
        &self.alignments
    }

    pub fn marker(&self, marker_type: MarkerType) -> Option<Vec3> {
        self.markers.get(&marker_type).copied()
    }

    pub fn selected(&self) -> Option<MeshId> {
        self.selected
    }

    pub fn clear(&mut self) {
        self.alignments.clear();
        self.markers.clear();
        self.selected = None;
    }
}

impl Navigator3d for Navigator3dState {
    fn draw(&mut self, alignments: &[Arc<Alignment>]) {
        self.alignments = alignments.to_vec();
    }

    fn set_marker(&mut self, alignment: &Arc<Alignment>, percentage: f64, marker_type: MarkerType) {
        match alignment.station_point(percentage) {
            Some(point) => {
                self.markers.insert(marker_type, to_vec3(&point));
            }
            None => {
                self.markers.remove(&marker_type);
            }
        }
    }

    fn hide_marker(&mut self, marker_type: MarkerType) {
        self.markers.remove(&marker_type);
    }

    fn select(&mut self, mesh: MeshId) {
        self.selected = Some(mesh);
    }
}

pub(crate) fn draw_navigator3d(mut gizmos: Gizmos, state: Res<Navigator3dState>) {
    for alignment in &state.alignments {
        for curve in &alignment.absolute {
            let color = if state.selected == Some(curve.mesh) {
                SELECTED_COLOR
            } else {
                CURVE_COLOR
            };
            gizmos.linestrip(curve.points.iter().map(to_vec3), color);
        }
    }

    if let Some(p) = state.marker(MarkerType::Hover) {
        gizmos.sphere(Isometry3d::from_translation(p), 0.3, Color::srgb(1.0, 1.0, 0.3));
    }
    if let Some(p) = state.marker(MarkerType::Select) {
        gizmos.sphere(Isometry3d::from_translation(p), 0.5, Color::srgb(1.0, 0.2, 0.2));
        gizmos.line(p, p + Vec3::Y * 3.0, Color::srgb(1.0, 0.2, 0.2));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_civil_model::demo_road;

    #[test]
    fn test_markers_follow_alignment() {
        let road = demo_road();
        let alignment = Arc::clone(&road.alignments[0]);
        let mut nav = Navigator3dState::default();
        nav.draw(&road.alignments);
        assert_eq!(nav.alignments().len(), 1);

        nav.set_marker(&alignment, 0.0, MarkerType::Hover);
        nav.set_marker(&alignment, 1.0, MarkerType::Select);
        let start = nav.marker(MarkerType::Hover).unwrap();
        let end = nav.marker(MarkerType::Select).unwrap();
        assert!(start.distance(end) > 1.0);

        nav.hide_marker(MarkerType::Hover);
        assert!(nav.marker(MarkerType::Hover).is_none());
        assert!(nav.marker(MarkerType::Select).is_some());
    }

    #[test]
    fn test_select_and_clear() {
        let mut nav = Navigator3dState::default();
        nav.select(MeshId(7));
        assert_eq!(nav.selected(), Some(MeshId(7)));
        nav.clear();
        assert!(nav.selected().is_none());
        assert!(nav.alignments().is_empty());
    }
}
