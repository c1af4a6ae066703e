// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fragment registry
//!
//! A [`FragmentGroup`] is one loaded model: a set of fragments (one mesh
//! each, holding many items), the civil alignments it carries, and an
//! optional property table. The [`FragmentsManager`] owns every group in
//! insertion order and hands out [`ModelId`]s.

use crate::codec;
use crate::{
    Alignment, FragmentId, ItemId, MeshGeometry, MeshId, ModelId, Result, ViewerError,
};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Item id → attribute object, as stored in the companion JSON file
pub type PropertyTable = serde_json::Map<String, serde_json::Value>;

/// One renderable batch of items
#[derive(Clone, Debug)]
pub struct Fragment {
    pub id: FragmentId,
    /// Assigned by the manager on insert
    pub mesh: MeshId,
    pub geometry: Arc<MeshGeometry>,
    /// Item id → IFC category (upper case, e.g. `IFCWALL`)
    pub items: BTreeMap<ItemId, String>,
    /// Base color [r, g, b, a]
    pub color: [f32; 4],
}

impl Fragment {
    pub fn new(
        id: FragmentId,
        geometry: Arc<MeshGeometry>,
        items: BTreeMap<ItemId, String>,
        color: [f32; 4],
    ) -> Self {
        Self {
            id,
            mesh: MeshId(0),
            geometry,
            items,
            color,
        }
    }

    /// Items of this fragment that belong to `category`
    pub fn items_of(&self, category: &str) -> impl Iterator<Item = ItemId> + '_ {
        let category = category.to_string();
        self.items
            .iter()
            .filter(move |(_, c)| **c == category)
            .map(|(id, _)| *id)
    }
}

/// A loaded model
#[derive(Clone, Debug, Default)]
pub struct FragmentGroup {
    pub name: String,
    pub fragments: Vec<Fragment>,
    pub alignments: Vec<Arc<Alignment>>,
    properties: Option<PropertyTable>,
}

impl FragmentGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Attach the property table loaded alongside the geometry
    pub fn set_local_properties(&mut self, properties: PropertyTable) {
        self.properties = Some(properties);
    }

    pub fn local_properties(&self) -> Option<&PropertyTable> {
        self.properties.as_ref()
    }

    pub fn item_count(&self) -> usize {
        self.fragments.iter().map(|f| f.items.len()).sum()
    }

    pub fn is_civil(&self) -> bool {
        !self.alignments.is_empty()
    }
}

/// Owner of every loaded group
#[derive(Debug, Default)]
pub struct FragmentsManager {
    groups: Vec<(ModelId, FragmentGroup)>,
    /// Fragment id → (group slot, fragment slot)
    index: FxHashMap<FragmentId, (ModelId, usize)>,
    next_model: u64,
    next_mesh: u64,
    revision: u64,
}

impl FragmentsManager {
    /// Decode a fragment binary and insert it
    pub fn load(&mut self, bytes: &[u8]) -> Result<ModelId> {
        let group = codec::decode_group(bytes)?;
        Ok(self.insert(group))
    }

    /// Insert an already decoded group, assigning fresh mesh ids
    pub fn insert(&mut self, mut group: FragmentGroup) -> ModelId {
        self.next_model += 1;
        let model = ModelId(self.next_model);

        for (slot, fragment) in group.fragments.iter_mut().enumerate() {
            fragment.mesh = self.allocate_mesh();
            if let Some((previous, _)) = self.index.insert(fragment.id.clone(), (model, slot)) {
                log::warn!(
                    "[Fragments] Fragment {} from {} shadowed by {}",
                    fragment.id,
                    previous,
                    model
                );
            }
        }
        for alignment in &mut group.alignments {
            let alignment = Arc::make_mut(alignment);
            for i in 0..alignment.absolute.len() {
                let mesh = self.allocate_mesh();
                alignment.absolute[i].mesh = mesh;
                if let Some(h) = alignment.horizontal.get_mut(i) {
                    h.mesh = mesh;
                }
            }
        }

        log::info!(
            "[Fragments] Inserted '{}' as {} ({} fragments, {} alignments)",
            group.name,
            model,
            group.fragments.len(),
            group.alignments.len()
        );
        self.groups.push((model, group));
        self.revision += 1;
        model
    }

    /// Serialize one group to the fragment binary
    pub fn export(&self, model: ModelId) -> Result<Vec<u8>> {
        let group = self.group(model).ok_or(ViewerError::ModelNotFound(model))?;
        codec::encode_group(group)
    }

    /// Release every group. Returns how many were released.
    pub fn dispose(&mut self) -> usize {
        let count = self.groups.len();
        if count == 0 {
            return 0;
        }
        self.groups.clear();
        self.index.clear();
        self.revision += 1;
        log::info!("[Fragments] Disposed {} groups", count);
        count
    }

    /// Release a single group
    pub fn remove(&mut self, model: ModelId) -> Option<FragmentGroup> {
        let slot = self.groups.iter().position(|(id, _)| *id == model)?;
        let (_, group) = self.groups.remove(slot);
        self.reindex();
        self.revision += 1;
        Some(group)
    }

    /// Rebuild the fragment index; later groups win on shared ids
    fn reindex(&mut self) {
        self.index.clear();
        for (model, group) in &self.groups {
            for (slot, fragment) in group.fragments.iter().enumerate() {
                self.index.insert(fragment.id.clone(), (*model, slot));
            }
        }
    }

    /// Groups in insertion order
    pub fn groups(&self) -> impl Iterator<Item = (ModelId, &FragmentGroup)> {
        self.groups.iter().map(|(id, g)| (*id, g))
    }

    pub fn first_group(&self) -> Option<(ModelId, &FragmentGroup)> {
        self.groups.first().map(|(id, g)| (*id, g))
    }

    pub fn group(&self, model: ModelId) -> Option<&FragmentGroup> {
        self.groups
            .iter()
            .find(|(id, _)| *id == model)
            .map(|(_, g)| g)
    }

    pub fn group_mut(&mut self, model: ModelId) -> Option<&mut FragmentGroup> {
        self.revision += 1;
        self.groups
            .iter_mut()
            .find(|(id, _)| *id == model)
            .map(|(_, g)| g)
    }

    /// Look up a fragment across all groups
    pub fn fragment(&self, id: &FragmentId) -> Option<&Fragment> {
        let (model, slot) = self.index.get(id)?;
        self.group(*model)?.fragments.get(*slot)
    }

    /// Geometry drawn with `mesh`, if a fragment owns it
    pub fn geometry_of(&self, mesh: MeshId) -> Option<&Arc<MeshGeometry>> {
        self.groups
            .iter()
            .flat_map(|(_, g)| g.fragments.iter())
            .find(|f| f.mesh == mesh)
            .map(|f| &f.geometry)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Bumped on every structural change; renderers compare against it
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn allocate_mesh(&mut self) -> MeshId {
        self.next_mesh += 1;
        MeshId(self.next_mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlignmentCurve;
    use nalgebra::Point3;

    fn group_with(name: &str, fragment: &str) -> FragmentGroup {
        let mut group = FragmentGroup::new(name);
        let mut items = BTreeMap::new();
        items.insert(ItemId(1), "IFCWALL".to_string());
        group.fragments.push(Fragment::new(
            FragmentId::from(fragment),
            Arc::new(MeshGeometry::default()),
            items,
            [1.0; 4],
        ));
        group
    }

    #[test]
    fn test_insert_assigns_unique_meshes() {
        let mut manager = FragmentsManager::default();
        let mut civil = group_with("road", "f-road");
        civil.alignments.push(Arc::new(Alignment::new(
            1,
            "Axis",
            vec![AlignmentCurve::new(
                0,
                vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
                MeshId(0),
            )],
        )));
        let a = manager.insert(group_with("a", "f-a"));
        let b = manager.insert(civil);

        let mesh_a = manager.fragment(&FragmentId::from("f-a")).unwrap().mesh;
        let mesh_b = manager.fragment(&FragmentId::from("f-road")).unwrap().mesh;
        let curve_mesh = manager.group(b).unwrap().alignments[0].absolute[0].mesh;
        assert_ne!(mesh_a, mesh_b);
        assert_ne!(mesh_b, curve_mesh);
        assert_eq!(
            manager.group(b).unwrap().alignments[0].horizontal[0].mesh,
            curve_mesh
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_groups_keep_insertion_order() {
        let mut manager = FragmentsManager::default();
        manager.insert(group_with("first", "f1"));
        manager.insert(group_with("second", "f2"));
        let names: Vec<_> = manager.groups().map(|(_, g)| g.name.clone()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(manager.first_group().unwrap().1.name, "first");
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut manager = FragmentsManager::default();
        assert_eq!(manager.dispose(), 0);
        manager.insert(group_with("a", "f1"));
        assert_eq!(manager.dispose(), 1);
        assert_eq!(manager.dispose(), 0);
        assert!(manager.is_empty());
        assert!(manager.fragment(&FragmentId::from("f1")).is_none());
    }

    #[test]
    fn test_remove_single_group() {
        let mut manager = FragmentsManager::default();
        let a = manager.insert(group_with("a", "f1"));
        manager.insert(group_with("b", "f2"));
        assert!(manager.remove(a).is_some());
        assert!(manager.fragment(&FragmentId::from("f1")).is_none());
        assert!(manager.fragment(&FragmentId::from("f2")).is_some());
        assert!(manager.remove(a).is_none());
    }

    #[test]
    fn test_remove_restores_shadowed_fragment() {
        let mut manager = FragmentsManager::default();
        let a = manager.insert(group_with("a", "shared"));
        let b = manager.insert(group_with("b", "shared"));
        let mesh_b = manager.fragment(&FragmentId::from("shared")).unwrap().mesh;

        manager.remove(b);
        let fragment = manager.fragment(&FragmentId::from("shared")).unwrap();
        assert_ne!(fragment.mesh, mesh_b);
        assert_eq!(
            fragment.mesh,
            manager.group(a).unwrap().fragments[0].mesh
        );

        manager.remove(a);
        assert!(manager.fragment(&FragmentId::from("shared")).is_none());
    }

    #[test]
    fn test_export_missing_model() {
        let manager = FragmentsManager::default();
        assert!(matches!(
            manager.export(ModelId(9)),
            Err(ViewerError::ModelNotFound(ModelId(9)))
        ));
    }
}
