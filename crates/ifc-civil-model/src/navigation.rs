// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Navigator contracts and plan events
//!
//! The plan navigator emits [`PlanEvent`]s; the relay turns them into calls
//! on the 3D and cross-section navigators. Renderers implement the traits.

use crate::{Alignment, BoundingSphere, CurveView, FragmentGroup, MeshId, Result, ViewerError, WorldId};
use nalgebra::Point3;
use std::fmt;
use std::sync::Arc;

/// Kind of alignment marker
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerType {
    /// Committed station (click)
    Select,
    /// Transient station (pointer move)
    Hover,
}

impl MarkerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerType::Select => "select",
            MarkerType::Hover => "hover",
        }
    }

    pub fn parse(s: &str) -> Option<MarkerType> {
        match s {
            "select" => Some(MarkerType::Select),
            "hover" => Some(MarkerType::Hover),
            _ => None,
        }
    }
}

impl fmt::Display for MarkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A curve of an alignment, addressed by index
#[derive(Clone, Debug, PartialEq)]
pub struct CurveRef {
    pub alignment: Arc<Alignment>,
    pub index: usize,
}

impl CurveRef {
    /// The absolute (3D) curve at `index`, if it exists
    pub fn absolute(&self) -> Option<&crate::AlignmentCurve> {
        self.alignment.absolute.get(self.index)
    }
}

/// Marker moved on the plan view
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerChange {
    pub alignment: Arc<Alignment>,
    pub percentage: f64,
    pub marker_type: MarkerType,
    pub curve: CurveRef,
}

/// Curve highlighted on the plan view
#[derive(Clone, Debug, PartialEq)]
pub struct Highlight {
    pub curve: CurveRef,
}

/// Marker removed from the plan view
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerHidden {
    pub marker_type: MarkerType,
}

/// Everything the plan navigator emits
#[derive(Clone, Debug, PartialEq)]
pub enum PlanEvent {
    MarkerChange(MarkerChange),
    Highlight(Highlight),
    MarkerHidden(MarkerHidden),
}

/// Alignment markers and highlighting in the shared 3D world
pub trait Navigator3d {
    fn draw(&mut self, alignments: &[Arc<Alignment>]);
    fn set_marker(&mut self, alignment: &Arc<Alignment>, percentage: f64, marker_type: MarkerType);
    fn hide_marker(&mut self, marker_type: MarkerType);
    /// Highlight the curve drawn with `mesh`
    fn select(&mut self, mesh: MeshId);
}

/// Renders the cut at a station
pub trait CrossSectionNavigator {
    /// Bind to the plan context and the shared 3D world
    fn bind(&mut self, plan: WorldId, world: WorldId);
    fn set(&mut self, mesh: MeshId, point: Point3<f64>);
}

/// Camera that can frame a sphere
pub trait CameraControls {
    fn fit_to_sphere(&mut self, sphere: &BoundingSphere, animate: bool);
}

/// Hit returned by [`PlanLayout::locate`]
#[derive(Clone, Debug, PartialEq)]
pub struct PlanHit {
    pub curve: CurveRef,
    /// Position along the whole alignment, 0..1
    pub percentage: f64,
    /// Distance from the query point to the curve
    pub distance: f64,
}

/// Plan navigator model: the horizontal curves of a civil model
#[derive(Clone, Debug, Default)]
pub struct PlanLayout {
    alignments: Vec<Arc<Alignment>>,
    bounds: Option<(Point3<f64>, Point3<f64>)>,
}

impl PlanLayout {
    /// Draw the alignments of `group`. Fails if the group has none.
    pub fn draw(&mut self, group: &FragmentGroup) -> Result<()> {
        if !group.is_civil() {
            return Err(ViewerError::other(format!(
                "'{}' has no alignments to draw",
                group.name
            )));
        }
        self.alignments = group.alignments.clone();
        self.bounds = self
            .alignments
            .iter()
            .flat_map(|a| a.horizontal.iter())
            .flat_map(|c| c.points.iter())
            .fold(None, |acc: Option<(Point3<f64>, Point3<f64>)>, p| match acc {
                None => Some((*p, *p)),
                Some((min, max)) => Some((min.inf(p), max.sup(p))),
            });
        log::debug!(
            "[Plan] Drew {} alignments from '{}'",
            self.alignments.len(),
            group.name
        );
        Ok(())
    }

    pub fn alignments(&self) -> &[Arc<Alignment>] {
        &self.alignments
    }

    /// Ground-plane bounds of every drawn curve
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        self.bounds
    }

    /// Nearest curve to the ground point `(x, z)` within `tolerance`
    pub fn locate(&self, x: f64, z: f64, tolerance: f64) -> Option<PlanHit> {
        let query = Point3::new(x, 0.0, z);
        self.alignments
            .iter()
            .filter_map(|alignment| {
                let (index, percentage, distance) =
                    alignment.locate(&query, CurveView::Horizontal)?;
                Some(PlanHit {
                    curve: CurveRef {
                        alignment: Arc::clone(alignment),
                        index,
                    },
                    percentage,
                    distance,
                })
            })
            .filter(|hit| hit.distance <= tolerance)
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Build the marker event for a hit
    pub fn marker_event(hit: &PlanHit, marker_type: MarkerType) -> PlanEvent {
        PlanEvent::MarkerChange(MarkerChange {
            alignment: Arc::clone(&hit.curve.alignment),
            percentage: hit.percentage,
            marker_type,
            curve: hit.curve.clone(),
        })
    }

    pub fn clear(&mut self) {
        self.alignments.clear();
        self.bounds = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_road;
    use approx::assert_relative_eq;

    #[test]
    fn test_marker_type_names() {
        assert_eq!(MarkerType::parse("select"), Some(MarkerType::Select));
        assert_eq!(MarkerType::Hover.to_string(), "hover");
        assert_eq!(MarkerType::parse("drag"), None);
    }

    #[test]
    fn test_plan_draw_rejects_plain_models() {
        let mut plan = PlanLayout::default();
        assert!(plan.draw(&FragmentGroup::new("building")).is_err());
        assert!(plan.bounds().is_none());
    }

    #[test]
    fn test_plan_locate_on_road() {
        let road = demo_road();
        let mut plan = PlanLayout::default();
        plan.draw(&road).unwrap();

        let (min, max) = plan.bounds().unwrap();
        assert_eq!(min.y, 0.0);
        assert_eq!(max.y, 0.0);

        let start = road.alignments[0].horizontal[0].points[0];
        let hit = plan.locate(start.x, start.z + 0.5, 1.0).unwrap();
        assert_eq!(hit.curve.index, 0);
        assert_relative_eq!(hit.percentage, 0.0, epsilon = 1e-9);
        assert_relative_eq!(hit.distance, 0.5, epsilon = 1e-9);

        assert!(plan.locate(start.x, start.z + 50.0, 1.0).is_none());
    }
}
