// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Civil alignments
//!
//! An alignment is a chain of polyline curves. Each curve exists twice: in
//! absolute 3D coordinates (what the 3D and cross-section navigators see) and
//! projected onto the ground plane (what the plan navigator draws). Index `i`
//! refers to the same stretch of road in both views.
//!
//! Stations are addressed by a percentage of the total arc length of the
//! chosen view. Percentages outside `[0, 1]` are clamped here, not by callers.

use crate::{BoundingSphere, MeshId};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Which representation of the alignment to walk
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CurveView {
    /// 3D curves including elevation
    #[default]
    Absolute,
    /// Plan projection (y = 0)
    Horizontal,
}

/// One polyline stretch of an alignment
#[derive(Clone, Debug, PartialEq)]
pub struct AlignmentCurve {
    /// Position of this curve within the alignment
    pub index: usize,
    /// Polyline vertices (Y-up)
    pub points: Vec<Point3<f64>>,
    /// Mesh drawn for this curve
    pub mesh: MeshId,
}

impl AlignmentCurve {
    pub fn new(index: usize, points: Vec<Point3<f64>>, mesh: MeshId) -> Self {
        Self {
            index,
            points,
            mesh,
        }
    }

    /// Polyline length
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| nalgebra::distance(&w[0], &w[1]))
            .sum()
    }

    /// Bounding sphere of the curve, computed fresh on every call
    pub fn bounding_sphere(&self) -> Option<BoundingSphere> {
        BoundingSphere::from_points(self.points.iter())
    }

    /// Unit direction of the segment closest to `point`
    pub fn tangent_at(&self, point: &Point3<f64>) -> Option<Vector3<f64>> {
        self.points
            .windows(2)
            .filter(|w| nalgebra::distance(&w[0], &w[1]) > f64::EPSILON)
            .map(|w| {
                let (closest, _) = closest_on_segment(point, &w[0], &w[1]);
                (nalgebra::distance(point, &closest), (w[1] - w[0]).normalize())
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, dir)| dir)
    }

    /// Same curve flattened onto the ground plane
    fn projected(&self) -> AlignmentCurve {
        AlignmentCurve {
            index: self.index,
            points: self
                .points
                .iter()
                .map(|p| Point3::new(p.x, 0.0, p.z))
                .collect(),
            mesh: self.mesh,
        }
    }
}

/// Civil alignment made of consecutive curves
#[derive(Clone, Debug, PartialEq)]
pub struct Alignment {
    pub id: u32,
    pub name: String,
    pub absolute: Vec<AlignmentCurve>,
    pub horizontal: Vec<AlignmentCurve>,
}

impl Alignment {
    /// Build an alignment from its absolute curves; the plan view is derived.
    pub fn new(id: u32, name: impl Into<String>, absolute: Vec<AlignmentCurve>) -> Self {
        let horizontal = absolute.iter().map(AlignmentCurve::projected).collect();
        Self {
            id,
            name: name.into(),
            absolute,
            horizontal,
        }
    }

    pub fn curves(&self, view: CurveView) -> &[AlignmentCurve] {
        match view {
            CurveView::Absolute => &self.absolute,
            CurveView::Horizontal => &self.horizontal,
        }
    }

    /// Total arc length in the given view
    pub fn length(&self, view: CurveView) -> f64 {
        self.curves(view).iter().map(AlignmentCurve::length).sum()
    }

    /// Point at `percentage` of the arc length. `None` if the alignment has
    /// no vertices.
    pub fn point_at(&self, percentage: f64, view: CurveView) -> Option<Point3<f64>> {
        let curves = self.curves(view);
        let first = curves.iter().find_map(|c| c.points.first().copied())?;

        let percentage = if percentage.is_nan() {
            0.0
        } else {
            percentage.clamp(0.0, 1.0)
        };
        let total = self.length(view);
        if total <= f64::EPSILON {
            return Some(first);
        }

        let mut remaining = total * percentage;
        let mut last = first;
        for curve in curves {
            for w in curve.points.windows(2) {
                let seg = nalgebra::distance(&w[0], &w[1]);
                if remaining <= seg && seg > f64::EPSILON {
                    return Some(w[0] + (w[1] - w[0]) * (remaining / seg));
                }
                remaining -= seg;
                last = w[1];
            }
        }
        Some(last)
    }

    /// 3D point at a plan station.
    ///
    /// `percentage` is measured along the horizontal arc length, the way the
    /// plan view reports it. The point sits on the same segment and at the
    /// same segment parameter of the absolute curve, so a graded alignment
    /// does not drift from the plan cursor.
    pub fn station_point(&self, percentage: f64) -> Option<Point3<f64>> {
        let first = self.absolute.iter().find_map(|c| c.points.first().copied())?;
        let percentage = if percentage.is_nan() {
            0.0
        } else {
            percentage.clamp(0.0, 1.0)
        };
        let total = self.length(CurveView::Horizontal);
        if total <= f64::EPSILON {
            return Some(first);
        }

        let mut remaining = total * percentage;
        let mut last = first;
        for (plan, curve) in self.horizontal.iter().zip(&self.absolute) {
            for (k, w) in plan.points.windows(2).enumerate() {
                let Some(abs) = curve.points.get(k..k + 2) else {
                    continue;
                };
                let seg = nalgebra::distance(&w[0], &w[1]);
                if remaining <= seg && seg > f64::EPSILON {
                    return Some(abs[0] + (abs[1] - abs[0]) * (remaining / seg));
                }
                remaining -= seg;
                last = abs[1];
            }
        }
        Some(last)
    }

    /// Percentage of the total arc length at which `point` projects onto the
    /// given curve, plus the distance from `point` to that projection.
    pub fn locate(&self, point: &Point3<f64>, view: CurveView) -> Option<(usize, f64, f64)> {
        let total = self.length(view);
        let mut travelled = 0.0;
        let mut best: Option<(usize, f64, f64)> = None;

        for curve in self.curves(view) {
            for w in curve.points.windows(2) {
                let seg = nalgebra::distance(&w[0], &w[1]);
                let (closest, t) = closest_on_segment(point, &w[0], &w[1]);
                let dist = nalgebra::distance(point, &closest);
                if best.map(|(_, _, d)| dist < d).unwrap_or(true) {
                    let pct = if total > f64::EPSILON {
                        (travelled + seg * t) / total
                    } else {
                        0.0
                    };
                    best = Some((curve.index, pct, dist));
                }
                travelled += seg;
            }
        }
        best
    }

    /// Iterate over every mesh used by this alignment's absolute curves
    pub fn meshes(&self) -> impl Iterator<Item = MeshId> + '_ {
        self.absolute.iter().map(|c| c.mesh)
    }

    /// Find the absolute curve drawn with `mesh`
    pub fn curve_by_mesh(&self, mesh: MeshId) -> Option<&AlignmentCurve> {
        self.absolute.iter().find(|c| c.mesh == mesh)
    }
}

/// Closest point on segment `[a, b]` and its parameter in `[0, 1]`
fn closest_on_segment(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> (Point3<f64>, f64) {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= f64::EPSILON {
        return (*a, 0.0);
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (a + ab * t, t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_leg_alignment() -> Alignment {
        Alignment::new(
            1,
            "Axis",
            vec![
                AlignmentCurve::new(
                    0,
                    vec![Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 2.0, 0.0)],
                    MeshId(10),
                ),
                AlignmentCurve::new(
                    1,
                    vec![Point3::new(10.0, 2.0, 0.0), Point3::new(10.0, 2.0, 10.0)],
                    MeshId(11),
                ),
            ],
        )
    }

    #[test]
    fn test_horizontal_is_projection() {
        let alignment = two_leg_alignment();
        assert_eq!(alignment.horizontal.len(), 2);
        assert_eq!(alignment.horizontal[0].points[1], Point3::new(10.0, 0.0, 0.0));
        assert_eq!(alignment.horizontal[1].mesh, MeshId(11));
    }

    #[test]
    fn test_point_at_midpoint_horizontal() {
        let alignment = two_leg_alignment();
        let mid = alignment.point_at(0.5, CurveView::Horizontal).unwrap();
        assert_relative_eq!(mid.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(mid.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_point_at_clamps() {
        let alignment = two_leg_alignment();
        let start = alignment.point_at(-3.0, CurveView::Absolute).unwrap();
        let end = alignment.point_at(7.0, CurveView::Absolute).unwrap();
        assert_eq!(start, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(end, Point3::new(10.0, 2.0, 10.0));
    }

    #[test]
    fn test_point_at_empty_alignment() {
        let alignment = Alignment::new(2, "Empty", Vec::new());
        assert!(alignment.point_at(0.5, CurveView::Absolute).is_none());
    }

    #[test]
    fn test_locate_round_trips_point_at() {
        let alignment = two_leg_alignment();
        let p = alignment.point_at(0.8, CurveView::Horizontal).unwrap();
        let (index, pct, dist) = alignment.locate(&p, CurveView::Horizontal).unwrap();
        assert_eq!(index, 1);
        assert_relative_eq!(pct, 0.8, epsilon = 1e-9);
        assert!(dist < 1e-9);
    }

    #[test]
    fn test_station_point_follows_plan_on_grade() {
        let alignment = two_leg_alignment();
        // Half of the plan length is the end of the ramp, not part-way up it
        let station = alignment.station_point(0.5).unwrap();
        assert_relative_eq!(station.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(station.y, 2.0, epsilon = 1e-9);
        assert_relative_eq!(station.z, 0.0, epsilon = 1e-9);

        let plan = alignment.point_at(0.25, CurveView::Horizontal).unwrap();
        let station = alignment.station_point(0.25).unwrap();
        assert_relative_eq!(station.x, plan.x, epsilon = 1e-9);
        assert_relative_eq!(station.z, plan.z, epsilon = 1e-9);
        assert_relative_eq!(station.y, 1.0, epsilon = 1e-9);

        assert!(Alignment::new(2, "Empty", Vec::new())
            .station_point(0.5)
            .is_none());
    }

    #[test]
    fn test_tangent_at() {
        let alignment = two_leg_alignment();
        let tangent = alignment.absolute[1]
            .tangent_at(&Point3::new(10.0, 2.0, 5.0))
            .unwrap();
        assert_relative_eq!(tangent.z, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_curve_bounding_sphere() {
        let alignment = two_leg_alignment();
        let sphere = alignment.absolute[1].bounding_sphere().unwrap();
        assert_relative_eq!(sphere.center.z, 5.0, epsilon = 1e-9);
        assert_relative_eq!(sphere.radius, 5.0, epsilon = 1e-9);
    }
}
