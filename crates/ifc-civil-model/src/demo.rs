// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Built-in demo road
//!
//! A flat two-leg road: 40 m along +X, then 30 m along +Z, with pavement,
//! kerbs and an earthworks fill body. Used by the civil view when no road
//! model URL is configured.

use crate::{
    Alignment, AlignmentCurve, Fragment, FragmentGroup, FragmentId, ItemId, MeshGeometry, MeshId,
    PropertyTable,
};
use nalgebra::{Point3, Vector3};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Elevation of the road surface
pub const ROAD_LEVEL: f64 = 2.0;

const PAVEMENT_HALF_WIDTH: f64 = 3.5;
const KERB_WIDTH: f64 = 0.3;
const FILL_HALF_WIDTH: f64 = 8.0;

struct Layer {
    category: &'static str,
    fragment: &'static str,
    color: [f32; 4],
    /// (lateral min, lateral max) pairs, left positive
    strips: &'static [(f64, f64)],
    /// (bottom, top) relative to road level
    depth: (f64, f64),
}

const LAYERS: [Layer; 3] = [
    Layer {
        category: "IFCPAVEMENT",
        fragment: "demo-road-pavement",
        color: [0.35, 0.35, 0.38, 1.0],
        strips: &[(-PAVEMENT_HALF_WIDTH, PAVEMENT_HALF_WIDTH)],
        depth: (-0.3, 0.0),
    },
    Layer {
        category: "IFCKERB",
        fragment: "demo-road-kerb",
        color: [0.75, 0.75, 0.72, 1.0],
        strips: &[
            (PAVEMENT_HALF_WIDTH, PAVEMENT_HALF_WIDTH + KERB_WIDTH),
            (-PAVEMENT_HALF_WIDTH - KERB_WIDTH, -PAVEMENT_HALF_WIDTH),
        ],
        depth: (-0.3, 0.15),
    },
    Layer {
        category: "IFCEARTHWORKSFILL",
        fragment: "demo-road-fill",
        color: [0.55, 0.45, 0.3, 1.0],
        strips: &[(-FILL_HALF_WIDTH, FILL_HALF_WIDTH)],
        depth: (-2.0, -0.3),
    },
];

/// Axis legs as polylines on the road surface
fn legs() -> Vec<Vec<Point3<f64>>> {
    vec![
        (0..=4)
            .map(|i| Point3::new(i as f64 * 10.0, ROAD_LEVEL, 0.0))
            .collect(),
        (0..=3)
            .map(|i| Point3::new(40.0, ROAD_LEVEL, i as f64 * 10.0))
            .collect(),
    ]
}

/// Build the demo road group, property table included
pub fn demo_road() -> FragmentGroup {
    let legs = legs();
    let mut group = FragmentGroup::new("demo-road.frag");
    let mut properties = PropertyTable::new();
    let mut next_item = 100u32;

    for layer in &LAYERS {
        let mut geometry = MeshGeometry::default();
        let mut items = BTreeMap::new();
        for (leg_index, leg) in legs.iter().enumerate() {
            let (Some(start), Some(end)) = (leg.first(), leg.last()) else {
                continue;
            };
            for &(l0, l1) in layer.strips {
                append_box(
                    &mut geometry,
                    start,
                    end,
                    (l0, l1),
                    (ROAD_LEVEL + layer.depth.0, ROAD_LEVEL + layer.depth.1),
                );
                let item = ItemId(next_item);
                next_item += 1;
                items.insert(item, layer.category.to_string());
                properties.insert(
                    item.0.to_string(),
                    json!({
                        "expressID": item.0,
                        "type": layer.category,
                        "Name": format!("{} leg {}", layer.category, leg_index + 1),
                    }),
                );
            }
        }
        group.fragments.push(Fragment::new(
            FragmentId::from(layer.fragment),
            Arc::new(geometry),
            items,
            layer.color,
        ));
    }

    let curves = legs
        .into_iter()
        .enumerate()
        .map(|(i, points)| AlignmentCurve::new(i, points, MeshId(0)))
        .collect();
    group
        .alignments
        .push(Arc::new(Alignment::new(1, "Demo Road Axis", curves)));
    properties.insert(
        "1".to_string(),
        json!({ "expressID": 1, "type": "IFCALIGNMENT", "Name": "Demo Road Axis" }),
    );

    group.set_local_properties(properties);
    group
}

/// Append a box spanning `start..end` along the axis, `lateral` across it and
/// `vertical` in height.
fn append_box(
    geometry: &mut MeshGeometry,
    start: &Point3<f64>,
    end: &Point3<f64>,
    lateral: (f64, f64),
    vertical: (f64, f64),
) {
    let axis = Vector3::new(end.x - start.x, 0.0, end.z - start.z);
    let Some(dir) = axis.try_normalize(1e-12) else {
        return;
    };
    let left = Vector3::new(-dir.z, 0.0, dir.x);

    let base = geometry.vertex_count() as u32;
    for p in [start, end] {
        for l in [lateral.0, lateral.1] {
            for y in [vertical.0, vertical.1] {
                let v = Point3::new(p.x, y, p.z) + left * l;
                geometry
                    .positions
                    .extend_from_slice(&[v.x as f32, v.y as f32, v.z as f32]);
            }
        }
    }

    // Corner index = end * 4 + side * 2 + level
    const QUADS: [[u32; 4]; 6] = [
        [0, 2, 6, 4],
        [1, 5, 7, 3],
        [0, 4, 5, 1],
        [2, 3, 7, 6],
        [0, 1, 3, 2],
        [4, 6, 7, 5],
    ];
    for [a, b, c, d] in QUADS {
        geometry
            .indices
            .extend_from_slice(&[base + a, base + b, base + c, base + a, base + c, base + d]);
    }
}
