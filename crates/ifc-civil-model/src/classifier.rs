// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Groups items of a model by IFC category

use crate::{FragmentGroup, FragmentIdMap};
use std::collections::BTreeMap;

/// Category name → fragment/item map
#[derive(Clone, Debug, Default)]
pub struct Classifier {
    entities: BTreeMap<String, FragmentIdMap>,
}

impl Classifier {
    /// Classify every item of `group` by its IFC category. Results accumulate
    /// across calls.
    pub fn by_entity(&mut self, group: &FragmentGroup) {
        for fragment in &group.fragments {
            for (item, category) in &fragment.items {
                self.entities
                    .entry(category.clone())
                    .or_default()
                    .entry(fragment.id.clone())
                    .or_default()
                    .insert(*item);
            }
        }
        log::debug!(
            "[Classifier] '{}' classified into {} categories",
            group.name,
            self.entities.len()
        );
    }

    /// Category names, sorted
    pub fn list(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Union of the fragment maps of `categories`. Unknown names contribute
    /// nothing.
    pub fn find(&self, categories: &[&str]) -> FragmentIdMap {
        let mut found = FragmentIdMap::new();
        for name in categories {
            if let Some(map) = self.entities.get(*name) {
                crate::merge_fragment_maps(&mut found, map);
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fragment, FragmentId, ItemId, MeshGeometry};
    use std::sync::Arc;

    fn mixed_group() -> FragmentGroup {
        let mut group = FragmentGroup::new("mixed");
        let mut items = std::collections::BTreeMap::new();
        items.insert(ItemId(1), "IFCWALL".to_string());
        items.insert(ItemId(2), "IFCSLAB".to_string());
        items.insert(ItemId(3), "IFCWALL".to_string());
        group.fragments.push(Fragment::new(
            FragmentId::from("f1"),
            Arc::new(MeshGeometry::default()),
            items,
            [1.0; 4],
        ));
        group
    }

    #[test]
    fn test_by_entity_lists_categories() {
        let mut classifier = Classifier::default();
        classifier.by_entity(&mixed_group());
        let names: Vec<_> = classifier.list().collect();
        assert_eq!(names, vec!["IFCSLAB", "IFCWALL"]);
    }

    #[test]
    fn test_find_merges_items() {
        let mut classifier = Classifier::default();
        classifier.by_entity(&mixed_group());
        let walls = classifier.find(&["IFCWALL", "IFCUNKNOWN"]);
        assert_eq!(walls[&FragmentId::from("f1")].len(), 2);
        assert!(classifier.find(&["IFCUNKNOWN"]).is_empty());
    }
}
