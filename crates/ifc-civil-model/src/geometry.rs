// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh buffers and the cutting plane used by cross sections
//!
//! Positions are stored Y-up, already converted from IFC's Z-up frame by
//! whichever decoder produced them.

use crate::BoundingSphere;
use nalgebra::{Point3, Unit, Vector3};

/// Flattened triangle mesh
///
/// Shared behind `Arc` by fragments so the renderer and the clip-edge pass can
/// read the same buffers without cloning.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshGeometry {
    /// Vertex positions (flattened: [x0,y0,z0, x1,y1,z1, ...])
    pub positions: Vec<f32>,
    /// Vertex normals (flattened: [nx0,ny0,nz0, ...]), may be empty
    pub normals: Vec<f32>,
    /// Triangle indices
    pub indices: Vec<u32>,
}

impl MeshGeometry {
    /// Create new geometry from vectors (takes ownership, no clone)
    pub fn new(positions: Vec<f32>, normals: Vec<f32>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals,
            indices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Vertex `i` in double precision
    pub fn vertex(&self, i: usize) -> Option<Point3<f64>> {
        let base = i.checked_mul(3)?;
        let v = self.positions.get(base..base.checked_add(3)?)?;
        Some(Point3::new(v[0] as f64, v[1] as f64, v[2] as f64))
    }

    /// Iterate over all triangles as vertex triples, skipping bad indices
    pub fn triangles(&self) -> impl Iterator<Item = [Point3<f64>; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(move |tri| {
            Some([
                self.vertex(tri[0] as usize)?,
                self.vertex(tri[1] as usize)?,
                self.vertex(tri[2] as usize)?,
            ])
        })
    }

    /// Translate every vertex in place
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for v in self.positions.chunks_exact_mut(3) {
            v[0] += offset.x as f32;
            v[1] += offset.y as f32;
            v[2] += offset.z as f32;
        }
    }

    /// Axis-aligned bounds, `None` when empty
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let mut iter = (0..self.vertex_count()).filter_map(|i| self.vertex(i));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p))))
    }

    /// Bounding sphere computed from the current buffers (never cached)
    pub fn compute_bounding_sphere(&self) -> Option<BoundingSphere> {
        let points: Vec<Point3<f64>> =
            (0..self.vertex_count()).filter_map(|i| self.vertex(i)).collect();
        BoundingSphere::from_points(points.iter())
    }

    /// Segments where the mesh surface crosses `plane`
    pub fn section(&self, plane: &Plane) -> Vec<[Point3<f64>; 2]> {
        self.triangles()
            .filter_map(|tri| plane.intersect_triangle(&tri))
            .collect()
    }

    /// Distance along the ray to the nearest triangle hit (Moller-Trumbore).
    /// Triangles are hit from either side.
    pub fn raycast(&self, origin: &Point3<f64>, direction: &Vector3<f64>) -> Option<f64> {
        const EPS: f64 = 1e-12;
        self.triangles()
            .filter_map(|[a, b, c]| {
                let e1 = b - a;
                let e2 = c - a;
                let p = direction.cross(&e2);
                let det = e1.dot(&p);
                if det.abs() < EPS {
                    return None;
                }
                let inv = 1.0 / det;
                let s = origin - a;
                let u = s.dot(&p) * inv;
                if !(0.0..=1.0).contains(&u) {
                    return None;
                }
                let q = s.cross(&e1);
                let v = direction.dot(&q) * inv;
                if v < 0.0 || u + v > 1.0 {
                    return None;
                }
                let t = e2.dot(&q) * inv;
                (t > EPS).then_some(t)
            })
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Oriented cutting plane
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub origin: Point3<f64>,
    pub normal: Unit<Vector3<f64>>,
}

impl Plane {
    /// Plane through `origin` with the given normal. `None` for a zero normal.
    pub fn new(origin: Point3<f64>, normal: Vector3<f64>) -> Option<Self> {
        let normal = Unit::try_new(normal, 1e-12)?;
        Some(Self { origin, normal })
    }

    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&(p - self.origin))
    }

    /// Segment where a triangle crosses the plane.
    ///
    /// Triangles lying in the plane or touching it at a single vertex yield
    /// no segment.
    pub fn intersect_triangle(&self, tri: &[Point3<f64>; 3]) -> Option<[Point3<f64>; 2]> {
        const EPS: f64 = 1e-9;
        let d = [
            self.signed_distance(&tri[0]),
            self.signed_distance(&tri[1]),
            self.signed_distance(&tri[2]),
        ];

        let mut hits: Vec<Point3<f64>> = Vec::with_capacity(3);
        for i in 0..3 {
            let j = (i + 1) % 3;
            let (a, b) = (d[i], d[j]);
            if a.abs() < EPS {
                hits.push(tri[i]);
            } else if (a < 0.0 && b > EPS) || (a > 0.0 && b < -EPS) {
                let t = a / (a - b);
                hits.push(tri[i] + (tri[j] - tri[i]) * t);
            }
        }

        hits.dedup_by(|a, b| nalgebra::distance(a, b) < EPS);
        if hits.len() > 2 && nalgebra::distance(&hits[0], &hits[hits.len() - 1]) < EPS {
            hits.pop();
        }
        match hits.as_slice() {
            [a, b] => Some([*a, *b]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad() -> MeshGeometry {
        // Two triangles spanning x in [0,1], z in [0,1] at y = 0
        MeshGeometry::new(
            vec![
                0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, //
                1.0, 0.0, 1.0, //
                0.0, 0.0, 1.0,
            ],
            Vec::new(),
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn test_vertex_and_counts() {
        let quad = unit_quad();
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.triangle_count(), 2);
        assert_eq!(quad.vertex(2), Some(Point3::new(1.0, 0.0, 1.0)));
        assert_eq!(quad.vertex(4), None);
    }

    #[test]
    fn test_corrupt_index_near_usize_max() {
        let quad = unit_quad();
        // i * 3 fits but i * 3 + 3 does not
        assert_eq!(quad.vertex(usize::MAX / 3), None);
        assert_eq!(quad.vertex(usize::MAX), None);

        let broken = MeshGeometry::new(quad.positions.clone(), Vec::new(), vec![0, 1, u32::MAX]);
        assert_eq!(broken.triangles().count(), 0);
    }

    #[test]
    fn test_bounding_sphere_recomputed() {
        let mut quad = unit_quad();
        let before = quad.compute_bounding_sphere().unwrap();
        quad.translate(Vector3::new(10.0, 0.0, 0.0));
        let after = quad.compute_bounding_sphere().unwrap();
        assert!((after.center.x - before.center.x - 10.0).abs() < 1e-6);
        assert!((after.radius - before.radius).abs() < 1e-6);
    }

    #[test]
    fn test_section_through_quad() {
        let quad = unit_quad();
        let plane = Plane::new(Point3::new(0.5, 0.0, 0.0), Vector3::x()).unwrap();
        let segments = quad.section(&plane);
        assert!(!segments.is_empty());
        for [a, b] in &segments {
            assert!((a.x - 0.5).abs() < 1e-9);
            assert!((b.x - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_section_misses_plane() {
        let quad = unit_quad();
        let plane = Plane::new(Point3::new(5.0, 0.0, 0.0), Vector3::x()).unwrap();
        assert!(quad.section(&plane).is_empty());
    }

    #[test]
    fn test_raycast_hits_nearest() {
        let quad = unit_quad();
        let down = Vector3::new(0.0, -1.0, 0.0);
        let t = quad.raycast(&Point3::new(0.25, 3.0, 0.5), &down).unwrap();
        assert!((t - 3.0).abs() < 1e-9);
        // From below, still a hit
        assert!(quad.raycast(&Point3::new(0.5, -1.0, 0.5), &-down).is_some());
        // Outside the quad and pointing away
        assert!(quad.raycast(&Point3::new(2.0, 3.0, 0.5), &down).is_none());
        assert!(quad.raycast(&Point3::new(0.5, 3.0, 0.5), &-down).is_none());
    }

    #[test]
    fn test_zero_normal_rejected() {
        assert!(Plane::new(Point3::origin(), Vector3::zeros()).is_none());
    }
}
