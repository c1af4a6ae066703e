// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clip styles for cross sections
//!
//! Each IFC category gets one [`ClipStyle`]: a line style plus the items and
//! meshes it applies to. [`ClipEdges`] computes the section lines of those
//! meshes against the current cutting plane.
//!
//! Styles are registered in two stages. [`apply_category_styles`] first
//! builds the complete map for every classified category, checks it against
//! the classifier, registers it, and only then forces a single recompute.

use crate::{
    merge_fragment_maps, Classifier, FragmentIdMap, FragmentsManager, MeshId, Plane, Result, Rgb,
    ViewerError, WorldId,
};
use nalgebra::Point3;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LineCap {
    Butt,
    #[default]
    Round,
    Square,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LineJoin {
    Miter,
    #[default]
    Round,
    Bevel,
}

/// Stroke used to draw section lines
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineStyle {
    pub color: Rgb,
    pub width: f32,
    pub cap: LineCap,
    pub join: LineJoin,
}

impl LineStyle {
    /// Width 2 with round caps and joins
    pub fn new(color: Rgb) -> Self {
        Self {
            color,
            width: 2.0,
            cap: LineCap::Round,
            join: LineJoin::Round,
        }
    }
}

/// Named style scoped to one world
#[derive(Clone, Debug, PartialEq)]
pub struct ClipStyle {
    pub name: String,
    pub world: WorldId,
    pub line: LineStyle,
    pub fragments: FragmentIdMap,
    pub meshes: BTreeSet<MeshId>,
}

impl ClipStyle {
    pub fn new(name: impl Into<String>, world: WorldId, line: LineStyle) -> Self {
        Self {
            name: name.into(),
            world,
            line,
            fragments: FragmentIdMap::new(),
            meshes: BTreeSet::new(),
        }
    }
}

/// Style registry of a clipping engine
pub trait ClipStyler {
    /// Create (or replace) a style and return it for further edits
    fn create_style(
        &mut self,
        name: &str,
        meshes: BTreeSet<MeshId>,
        world: WorldId,
        line: LineStyle,
    ) -> &mut ClipStyle;

    fn style_mut(&mut self, name: &str) -> Option<&mut ClipStyle>;

    /// Recompute section lines; `force` ignores dirty tracking
    fn update(&mut self, force: bool);
}

/// Source of per-category line colors
pub trait ColorSource {
    fn next_color(&mut self) -> Rgb;
}

/// Random colors from uuid v4 bytes
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomColors;

impl ColorSource for RandomColors {
    fn next_color(&mut self) -> Rgb {
        let uuid = uuid::Uuid::new_v4();
        let b = uuid.as_bytes();
        Rgb::new(b[0] as f32 / 255.0, b[1] as f32 / 255.0, b[2] as f32 / 255.0)
    }
}

/// Outcome of a style pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StyleReport {
    pub styles: usize,
    pub skipped_fragments: usize,
}

/// Register one clip style per classified category, then force a single
/// update.
///
/// Fragments named by the classifier but missing from the manager are
/// skipped. Fails with [`ViewerError::IncompleteStyles`] before the update if
/// any category ends up without a registered style.
pub fn apply_category_styles(
    classifier: &Classifier,
    fragments: &FragmentsManager,
    world: WorldId,
    clipper: &mut dyn ClipStyler,
    colors: &mut dyn ColorSource,
) -> Result<StyleReport> {
    let mut report = StyleReport::default();

    // Stage: compute every style before touching the clipper
    let mut staged: Vec<ClipStyle> = Vec::with_capacity(classifier.len());
    for category in classifier.list() {
        let mut style = ClipStyle::new(category, world, LineStyle::new(colors.next_color()));
        for (fragment_id, items) in classifier.find(&[category]) {
            let Some(fragment) = fragments.fragment(&fragment_id) else {
                log::debug!("[Clipper] Fragment {} not loaded, skipping", fragment_id);
                report.skipped_fragments += 1;
                continue;
            };
            style.meshes.insert(fragment.mesh);
            style.fragments.insert(fragment_id, items);
        }
        staged.push(style);
    }

    for style in &staged {
        let created = clipper.create_style(&style.name, style.meshes.clone(), world, style.line);
        merge_fragment_maps(&mut created.fragments, &style.fragments);
    }

    // Barrier: every category must be registered before the update
    let missing = classifier
        .list()
        .filter(|name| clipper.style_mut(name).is_none())
        .count();
    if missing > 0 {
        return Err(ViewerError::IncompleteStyles {
            expected: classifier.len(),
            missing,
        });
    }

    clipper.update(true);
    report.styles = staged.len();
    log::info!(
        "[Clipper] Applied {} category styles ({} fragments skipped)",
        report.styles,
        report.skipped_fragments
    );
    Ok(report)
}

/// Section lines of styled meshes against a cutting plane
#[derive(Debug, Default)]
pub struct ClipEdges {
    styles: BTreeMap<String, ClipStyle>,
    plane: Option<Plane>,
    edges: BTreeMap<String, Vec<[Point3<f64>; 2]>>,
    dirty: bool,
    generation: u64,
}

impl ClipEdges {
    pub fn set_plane(&mut self, plane: Plane) {
        self.plane = Some(plane);
        self.dirty = true;
    }

    pub fn plane(&self) -> Option<&Plane> {
        self.plane.as_ref()
    }

    /// Whether `compute_edges` has pending work
    pub fn needs_update(&self) -> bool {
        self.dirty
    }

    /// Recompute section segments of every style against the plane
    pub fn compute_edges(&mut self, fragments: &FragmentsManager) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        self.edges.clear();
        let Some(plane) = self.plane else {
            return;
        };
        for (name, style) in &self.styles {
            let segments: Vec<_> = style
                .meshes
                .iter()
                .filter_map(|mesh| fragments.geometry_of(*mesh))
                .flat_map(|geometry| geometry.section(&plane))
                .collect();
            if !segments.is_empty() {
                self.edges.insert(name.clone(), segments);
            }
        }
        self.generation += 1;
    }

    /// Computed segments with the style that draws them
    pub fn edges(&self) -> impl Iterator<Item = (&ClipStyle, &[[Point3<f64>; 2]])> {
        self.edges
            .iter()
            .filter_map(|(name, segs)| Some((self.styles.get(name)?, segs.as_slice())))
    }

    pub fn styles(&self) -> impl Iterator<Item = &ClipStyle> {
        self.styles.values()
    }

    /// Incremented each time edges are recomputed
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn clear(&mut self) {
        self.styles.clear();
        self.edges.clear();
        self.plane = None;
        self.dirty = false;
    }
}

impl ClipStyler for ClipEdges {
    fn create_style(
        &mut self,
        name: &str,
        meshes: BTreeSet<MeshId>,
        world: WorldId,
        line: LineStyle,
    ) -> &mut ClipStyle {
        let mut style = ClipStyle::new(name, world, line);
        style.meshes = meshes;
        self.dirty = true;
        match self.styles.entry(name.to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(style);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(style),
        }
    }

    fn style_mut(&mut self, name: &str) -> Option<&mut ClipStyle> {
        self.styles.get_mut(name)
    }

    fn update(&mut self, force: bool) {
        if force {
            self.dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{demo_road, FragmentGroup};
    use nalgebra::Vector3;

    /// Records the order of calls made on it
    #[derive(Default)]
    struct TracingStyler {
        inner: ClipEdges,
        trace: Vec<String>,
    }

    impl ClipStyler for TracingStyler {
        fn create_style(
            &mut self,
            name: &str,
            meshes: BTreeSet<MeshId>,
            world: WorldId,
            line: LineStyle,
        ) -> &mut ClipStyle {
            self.trace.push(format!("create {}", name));
            self.inner.create_style(name, meshes, world, line)
        }

        fn style_mut(&mut self, name: &str) -> Option<&mut ClipStyle> {
            self.inner.style_mut(name)
        }

        fn update(&mut self, force: bool) {
            let registered = self.inner.styles().count();
            self.trace.push(format!("update {} {}", force, registered));
            self.inner.update(force);
        }
    }

    struct FixedColor;

    impl ColorSource for FixedColor {
        fn next_color(&mut self) -> Rgb {
            Rgb::new(1.0, 0.0, 0.0)
        }
    }

    fn loaded_road() -> (FragmentsManager, Classifier) {
        let mut fragments = FragmentsManager::default();
        let model = fragments.insert(demo_road());
        let mut classifier = Classifier::default();
        classifier.by_entity(fragments.group(model).unwrap());
        (fragments, classifier)
    }

    #[test]
    fn test_styles_complete_before_single_update() {
        let (fragments, classifier) = loaded_road();
        let mut styler = TracingStyler::default();
        let report = apply_category_styles(
            &classifier,
            &fragments,
            WorldId::MAIN,
            &mut styler,
            &mut FixedColor,
        )
        .unwrap();

        let categories = classifier.len();
        assert_eq!(report.styles, categories);
        assert_eq!(styler.trace.len(), categories + 1);
        assert!(styler.trace[..categories]
            .iter()
            .all(|t| t.starts_with("create")));
        assert_eq!(
            styler.trace.last().unwrap(),
            &format!("update true {}", categories)
        );
    }

    #[test]
    fn test_style_line_defaults() {
        let (fragments, classifier) = loaded_road();
        let mut edges = ClipEdges::default();
        apply_category_styles(
            &classifier,
            &fragments,
            WorldId::MAIN,
            &mut edges,
            &mut RandomColors,
        )
        .unwrap();
        for style in edges.styles() {
            assert_eq!(style.line.width, 2.0);
            assert_eq!(style.line.cap, LineCap::Round);
            assert_eq!(style.line.join, LineJoin::Round);
            assert_eq!(style.world, WorldId::MAIN);
            assert!(!style.meshes.is_empty());
        }
    }

    #[test]
    fn test_missing_fragments_skipped() {
        let (_, classifier) = loaded_road();
        let empty = FragmentsManager::default();
        let mut edges = ClipEdges::default();
        let report = apply_category_styles(
            &classifier,
            &empty,
            WorldId::MAIN,
            &mut edges,
            &mut FixedColor,
        )
        .unwrap();
        assert_eq!(report.styles, classifier.len());
        assert!(report.skipped_fragments > 0);
        assert!(edges.styles().all(|s| s.meshes.is_empty()));
    }

    #[test]
    fn test_empty_classifier_still_updates() {
        let mut styler = TracingStyler::default();
        let mut classifier = Classifier::default();
        classifier.by_entity(&FragmentGroup::new("empty"));
        apply_category_styles(
            &classifier,
            &FragmentsManager::default(),
            WorldId::MAIN,
            &mut styler,
            &mut FixedColor,
        )
        .unwrap();
        assert_eq!(styler.trace, vec!["update true 0".to_string()]);
    }

    #[test]
    fn test_compute_edges_across_road() {
        let (fragments, classifier) = loaded_road();
        let mut edges = ClipEdges::default();
        apply_category_styles(
            &classifier,
            &fragments,
            WorldId::MAIN,
            &mut edges,
            &mut FixedColor,
        )
        .unwrap();
        let alignment = &fragments.first_group().unwrap().1.alignments[0];
        let station = alignment
            .point_at(0.25, crate::CurveView::Absolute)
            .unwrap();
        let tangent = alignment.absolute[0].tangent_at(&station).unwrap();
        edges.set_plane(Plane::new(station, tangent).unwrap());
        edges.compute_edges(&fragments);

        assert_eq!(edges.generation(), 1);
        assert!(edges.edges().count() > 0);
        assert!(!edges.needs_update());

        // Unchanged plane: nothing to do
        edges.compute_edges(&fragments);
        assert_eq!(edges.generation(), 1);
    }

    #[test]
    fn test_plane_misses_everything() {
        let (fragments, _) = loaded_road();
        let mut edges = ClipEdges::default();
        let f = fragments.first_group().unwrap().1.fragments[0].clone();
        edges.create_style(
            "IFCANY",
            BTreeSet::from([f.mesh]),
            WorldId::MAIN,
            LineStyle::new(Rgb::WHITE),
        );
        assert!(edges.needs_update());
        edges.set_plane(
            Plane::new(Point3::new(1.0e6, 0.0, 0.0), Vector3::x()).unwrap(),
        );
        edges.compute_edges(&fragments);
        assert_eq!(edges.edges().count(), 0);
    }
}
