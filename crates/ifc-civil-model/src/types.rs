// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identifiers and small value types shared across the crate

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Fragment identifier (uuid string, stable across export/import)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FragmentId(pub String);

impl FragmentId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        FragmentId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FragmentId {
    fn from(s: &str) -> Self {
        FragmentId(s.to_string())
    }
}

/// Item identifier inside a fragment (the IFC express id)
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Renderable mesh handle, unique within one [`crate::FragmentsManager`]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MeshId(pub u64);

/// Loaded model (fragment group) handle
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ModelId(pub u64);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model-{}", self.0)
    }
}

/// Rendering world handle (the shared 3D world, or the plan's 2D context)
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct WorldId(pub u32);

impl WorldId {
    /// The shared 3D world created by the scene bootstrapper
    pub const MAIN: WorldId = WorldId(0);
    /// The plan navigator's 2D context
    pub const PLAN: WorldId = WorldId(1);
}

/// Fragment id → item ids, ordered for deterministic iteration
pub type FragmentIdMap = BTreeMap<FragmentId, BTreeSet<ItemId>>;

/// Merge `other` into `target`, unioning item sets per fragment
pub fn merge_fragment_maps(target: &mut FragmentIdMap, other: &FragmentIdMap) {
    for (fragment, items) in other {
        target
            .entry(fragment.clone())
            .or_default()
            .extend(items.iter().copied());
    }
}

/// Linear RGB color in 0..1
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (leading `#` optional)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .ok()
                .map(|v| v as f32 / 255.0)
        };
        Some(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(&self) -> String {
        let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02x}{:02x}{:02x}",
            to_byte(self.r),
            to_byte(self.g),
            to_byte(self.b)
        )
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Bounding sphere (center + radius), recomputed on demand
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Point3<f64>,
    pub radius: f64,
}

impl BoundingSphere {
    /// Smallest-box-centred sphere around a point set (three.js convention:
    /// box center, then max distance). `None` for an empty set.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>> + Clone) -> Option<Self> {
        let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        let mut any = false;
        for p in points.clone() {
            any = true;
            min = min.inf(p);
            max = max.sup(p);
        }
        if !any {
            return None;
        }
        let center = nalgebra::center(&min, &max);
        let radius = points
            .into_iter()
            .map(|p| nalgebra::distance(&center, p))
            .fold(0.0, f64::max);
        Some(BoundingSphere { center, radius })
    }
}
