// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plan → 3D / cross-section relay
//!
//! Marker changes always move the 3D marker. Only `Select` markers reach the
//! cross-section navigator, once per event, at the 3D point of the plan
//! station. Highlights select the curve in 3D and frame it.
//!
//! The relay only acts while attached. Teardown detaches it so events queued
//! before the view went away are dropped instead of reaching stale
//! navigators.

use crate::{
    CameraControls, CrossSectionNavigator, Highlight, MarkerChange, MarkerType,
    Navigator3d, PlanEvent,
};

/// What the relay did with one event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Relay is detached
    Ignored,
    /// Forwarded to the 3D navigator only
    Marker3d,
    /// Forwarded to the 3D navigator and the cross-section navigator
    CrossSection,
    /// Curve highlighted (and framed if camera controls were given)
    Highlighted,
    /// Marker hidden in 3D
    Hidden,
    /// Referenced curve or station does not exist
    Skipped,
}

#[derive(Clone, Debug, Default)]
pub struct CrossSectionRelay {
    attached: bool,
}

impl CrossSectionRelay {
    pub fn attach(&mut self) {
        self.attached = true;
    }

    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Forward one plan event to the navigators
    pub fn handle(
        &mut self,
        event: &PlanEvent,
        nav3d: &mut dyn Navigator3d,
        cross: &mut dyn CrossSectionNavigator,
        camera: Option<&mut dyn CameraControls>,
    ) -> RelayOutcome {
        if !self.attached {
            return RelayOutcome::Ignored;
        }
        match event {
            PlanEvent::MarkerChange(change) => Self::marker_change(change, nav3d, cross),
            PlanEvent::Highlight(highlight) => Self::highlight(highlight, nav3d, camera),
            PlanEvent::MarkerHidden(hidden) => {
                nav3d.hide_marker(hidden.marker_type);
                RelayOutcome::Hidden
            }
        }
    }

    fn marker_change(
        change: &MarkerChange,
        nav3d: &mut dyn Navigator3d,
        cross: &mut dyn CrossSectionNavigator,
    ) -> RelayOutcome {
        nav3d.set_marker(&change.alignment, change.percentage, change.marker_type);
        if change.marker_type != MarkerType::Select {
            return RelayOutcome::Marker3d;
        }

        let Some(point) = change.alignment.station_point(change.percentage) else {
            log::debug!(
                "[Relay] Alignment {} has no vertices",
                change.alignment.name
            );
            return RelayOutcome::Skipped;
        };
        let Some(curve) = change.curve.absolute() else {
            log::debug!(
                "[Relay] Curve {} missing from alignment {}",
                change.curve.index,
                change.curve.alignment.name
            );
            return RelayOutcome::Skipped;
        };
        cross.set(curve.mesh, point);
        RelayOutcome::CrossSection
    }

    fn highlight(
        highlight: &Highlight,
        nav3d: &mut dyn Navigator3d,
        camera: Option<&mut dyn CameraControls>,
    ) -> RelayOutcome {
        let Some(curve) = highlight.curve.absolute() else {
            log::debug!("[Relay] Highlighted curve {} missing", highlight.curve.index);
            return RelayOutcome::Skipped;
        };
        nav3d.select(curve.mesh);
        if let (Some(camera), Some(sphere)) = (camera, curve.bounding_sphere()) {
            camera.fit_to_sphere(&sphere, true);
        }
        RelayOutcome::Highlighted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        demo_road, Alignment, BoundingSphere, CurveRef, CurveView, FragmentsManager, MarkerHidden,
        MeshId, PlanLayout, WorldId,
    };
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingNav3d {
        markers: Vec<(u32, f64, MarkerType)>,
        hidden: Vec<MarkerType>,
        selected: Vec<MeshId>,
    }

    impl Navigator3d for RecordingNav3d {
        fn draw(&mut self, _alignments: &[Arc<Alignment>]) {}

        fn set_marker(&mut self, alignment: &Arc<Alignment>, percentage: f64, marker_type: MarkerType) {
            self.markers.push((alignment.id, percentage, marker_type));
        }

        fn hide_marker(&mut self, marker_type: MarkerType) {
            self.hidden.push(marker_type);
        }

        fn select(&mut self, mesh: MeshId) {
            self.selected.push(mesh);
        }
    }

    #[derive(Default)]
    struct RecordingCross {
        sets: Vec<(MeshId, Point3<f64>)>,
    }

    impl CrossSectionNavigator for RecordingCross {
        fn bind(&mut self, _plan: WorldId, _world: WorldId) {}

        fn set(&mut self, mesh: MeshId, point: Point3<f64>) {
            self.sets.push((mesh, point));
        }
    }

    #[derive(Default)]
    struct RecordingCamera {
        fits: Vec<(BoundingSphere, bool)>,
    }

    impl CameraControls for RecordingCamera {
        fn fit_to_sphere(&mut self, sphere: &BoundingSphere, animate: bool) {
            self.fits.push((*sphere, animate));
        }
    }

    fn road_alignment() -> Arc<Alignment> {
        let mut fragments = FragmentsManager::default();
        let model = fragments.insert(demo_road());
        Arc::clone(&fragments.group(model).unwrap().alignments[0])
    }

    fn marker(alignment: &Arc<Alignment>, pct: f64, marker_type: MarkerType, index: usize) -> PlanEvent {
        PlanEvent::MarkerChange(MarkerChange {
            alignment: Arc::clone(alignment),
            percentage: pct,
            marker_type,
            curve: CurveRef {
                alignment: Arc::clone(alignment),
                index,
            },
        })
    }

    #[test]
    fn test_hover_never_reaches_cross_section() {
        let alignment = road_alignment();
        let mut relay = CrossSectionRelay::default();
        relay.attach();
        let (mut nav, mut cross) = (RecordingNav3d::default(), RecordingCross::default());

        let outcome = relay.handle(
            &marker(&alignment, 0.3, MarkerType::Hover, 0),
            &mut nav,
            &mut cross,
            None,
        );
        assert_eq!(outcome, RelayOutcome::Marker3d);
        assert_eq!(nav.markers, vec![(alignment.id, 0.3, MarkerType::Hover)]);
        assert!(cross.sets.is_empty());
    }

    #[test]
    fn test_select_reaches_cross_section_once() {
        let alignment = road_alignment();
        let mut relay = CrossSectionRelay::default();
        relay.attach();
        let (mut nav, mut cross) = (RecordingNav3d::default(), RecordingCross::default());

        relay.handle(
            &marker(&alignment, 0.25, MarkerType::Select, 1),
            &mut nav,
            &mut cross,
            None,
        );
        assert_eq!(nav.markers.len(), 1);
        assert_eq!(cross.sets.len(), 1);
        let (mesh, point) = cross.sets[0];
        assert_eq!(mesh, alignment.absolute[1].mesh);
        assert_eq!(point, alignment.station_point(0.25).unwrap());
    }

    #[test]
    fn test_missing_curve_skips_cross_section() {
        let alignment = road_alignment();
        let mut relay = CrossSectionRelay::default();
        relay.attach();
        let (mut nav, mut cross) = (RecordingNav3d::default(), RecordingCross::default());

        let outcome = relay.handle(
            &marker(&alignment, 0.5, MarkerType::Select, 99),
            &mut nav,
            &mut cross,
            None,
        );
        assert_eq!(outcome, RelayOutcome::Skipped);
        assert_eq!(nav.markers.len(), 1);
        assert!(cross.sets.is_empty());
    }

    #[test]
    fn test_highlight_selects_and_frames() {
        let alignment = road_alignment();
        let mut relay = CrossSectionRelay::default();
        relay.attach();
        let (mut nav, mut cross) = (RecordingNav3d::default(), RecordingCross::default());
        let mut camera = RecordingCamera::default();

        let event = PlanEvent::Highlight(Highlight {
            curve: CurveRef {
                alignment: Arc::clone(&alignment),
                index: 0,
            },
        });
        let outcome = relay.handle(&event, &mut nav, &mut cross, Some(&mut camera));
        assert_eq!(outcome, RelayOutcome::Highlighted);
        assert_eq!(nav.selected, vec![alignment.absolute[0].mesh]);
        assert_eq!(camera.fits.len(), 1);
        assert!(camera.fits[0].1);
        assert_eq!(
            camera.fits[0].0,
            alignment.absolute[0].bounding_sphere().unwrap()
        );

        // No camera controls: highlight still happens
        relay.handle(&event, &mut nav, &mut cross, None);
        assert_eq!(nav.selected.len(), 2);
    }

    #[test]
    fn test_marker_hidden() {
        let mut relay = CrossSectionRelay::default();
        relay.attach();
        let (mut nav, mut cross) = (RecordingNav3d::default(), RecordingCross::default());
        relay.handle(
            &PlanEvent::MarkerHidden(MarkerHidden {
                marker_type: MarkerType::Hover,
            }),
            &mut nav,
            &mut cross,
            None,
        );
        assert_eq!(nav.hidden, vec![MarkerType::Hover]);
    }

    #[test]
    fn test_detached_relay_ignores_events() {
        let alignment = road_alignment();
        let mut relay = CrossSectionRelay::default();
        relay.attach();
        relay.detach();
        let (mut nav, mut cross) = (RecordingNav3d::default(), RecordingCross::default());
        let outcome = relay.handle(
            &marker(&alignment, 0.5, MarkerType::Select, 0),
            &mut nav,
            &mut cross,
            None,
        );
        assert_eq!(outcome, RelayOutcome::Ignored);
        assert!(nav.markers.is_empty());
        assert!(cross.sets.is_empty());
    }

    #[test]
    fn test_road_select_at_half_is_midpoint() {
        let road = demo_road();
        let mut fragments = FragmentsManager::default();
        let model = fragments.load(&crate::encode_group(&road).unwrap()).unwrap();
        let group = fragments.group(model).unwrap();

        let mut plan = PlanLayout::default();
        plan.draw(group).unwrap();
        let alignment = &plan.alignments()[0];
        let mid = alignment.point_at(0.5, CurveView::Horizontal).unwrap();
        let hit = plan.locate(mid.x, mid.z, 0.01).unwrap();
        assert_relative_eq!(hit.percentage, 0.5, epsilon = 1e-9);

        let mut relay = CrossSectionRelay::default();
        relay.attach();
        let (mut nav, mut cross) = (RecordingNav3d::default(), RecordingCross::default());
        relay.handle(
            &PlanLayout::marker_event(&hit, MarkerType::Select),
            &mut nav,
            &mut cross,
            None,
        );

        // Demo road: 40 m along +X then 30 m along +Z, flat at road level
        let (mesh, point) = cross.sets[0];
        assert_eq!(mesh, alignment.absolute[0].mesh);
        assert_relative_eq!(point.x, 35.0, epsilon = 1e-9);
        assert_relative_eq!(point.y, crate::demo::ROAD_LEVEL, epsilon = 1e-9);
        assert_relative_eq!(point.z, 0.0, epsilon = 1e-9);
    }
}
