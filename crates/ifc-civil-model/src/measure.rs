// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Area measurement
//!
//! Double-click adds a vertex to the polygon being drawn, right-click closes
//! it, Delete removes every measurement.

use nalgebra::{Point3, Vector3};

/// A closed polygon and its area
#[derive(Clone, Debug, PartialEq)]
pub struct AreaPolygon {
    pub points: Vec<Point3<f64>>,
    pub area: f64,
}

impl AreaPolygon {
    /// Vertex average, used to place the label
    pub fn centroid(&self) -> Point3<f64> {
        let sum = self
            .points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Point3::from(sum / self.points.len().max(1) as f64)
    }
}

#[derive(Clone, Debug)]
pub struct AreaMeasurement {
    pub enabled: bool,
    current: Vec<Point3<f64>>,
    finished: Vec<AreaPolygon>,
}

impl Default for AreaMeasurement {
    fn default() -> Self {
        Self {
            enabled: true,
            current: Vec::new(),
            finished: Vec::new(),
        }
    }
}

impl AreaMeasurement {
    /// Add a vertex to the polygon in progress
    pub fn create(&mut self, point: Point3<f64>) {
        if !self.enabled {
            return;
        }
        self.current.push(point);
    }

    /// Close the polygon in progress. Returns its area, or `None` (and
    /// discards the points) if fewer than three vertices were placed.
    pub fn end_creation(&mut self) -> Option<f64> {
        let points = std::mem::take(&mut self.current);
        if !self.enabled || points.len() < 3 {
            return None;
        }
        let area = polygon_area(&points);
        log::debug!("[Measure] Area {:.3} m² from {} points", area, points.len());
        self.finished.push(AreaPolygon { points, area });
        Some(area)
    }

    /// Remove every measurement, including the one in progress
    pub fn delete_all(&mut self) {
        self.current.clear();
        self.finished.clear();
    }

    pub fn current(&self) -> &[Point3<f64>] {
        &self.current
    }

    pub fn polygons(&self) -> &[AreaPolygon] {
        &self.finished
    }
}

/// Area of a planar polygon in 3D (Newell's method)
pub fn polygon_area(points: &[Point3<f64>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let normal = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .fold(Vector3::zeros(), |acc: Vector3<f64>, (a, b)| {
            acc + a.coords.cross(&b.coords)
        });
    normal.norm() * 0.5
}
