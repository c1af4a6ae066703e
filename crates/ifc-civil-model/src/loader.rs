// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model loading, export and disposal

use crate::{FragmentGroup, FragmentsManager, ModelId, Result, ViewerError};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// File name of the exported geometry
pub const EXPORT_GEOMETRY_NAME: &str = "small.frag";

/// File name of the exported property table
pub const EXPORT_PROPERTIES_NAME: &str = "small.json";

/// Shown when a non-IFC file is picked
pub const REJECTION_MESSAGE: &str = "Please select an IFC file";

/// `.ifc` extension check, case-insensitive
pub fn is_ifc_file_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 4 && bytes[bytes.len() - 4..].eq_ignore_ascii_case(b".ifc")
}

/// IFC import options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// IFC categories never converted to fragments
    pub excluded_categories: Vec<String>,
    /// Re-centre the model on the ground-plane origin
    pub coordinate_to_origin: bool,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            excluded_categories: vec![
                "IFCTENDONANCHOR".to_string(),
                "IFCREINFORCINGBAR".to_string(),
                "IFCREINFORCINGELEMENT".to_string(),
            ],
            coordinate_to_origin: true,
        }
    }
}

impl LoaderSettings {
    pub fn is_excluded(&self, category: &str) -> bool {
        self.excluded_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category))
    }
}

/// Turns IFC bytes into fragments
pub trait IfcDecoder {
    fn decode(&self, name: &str, bytes: &[u8], settings: &LoaderSettings) -> Result<FragmentGroup>;
}

/// Delivers an exported file to the user
pub trait Downloader {
    fn download(&mut self, name: &str, bytes: &[u8]) -> Result<()>;
}

/// Result of [`ModelLoader::export`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    /// No group loaded, nothing downloaded
    NothingLoaded,
    /// Geometry downloaded; `properties` tells whether the table was too
    Exported { properties: bool },
}

#[derive(Clone, Debug, Default)]
pub struct ModelLoader {
    settings: LoaderSettings,
}

impl ModelLoader {
    pub fn new(settings: LoaderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    /// Reject anything that is not an `.ifc` file
    pub fn check_file(&self, name: &str) -> Result<()> {
        if is_ifc_file_name(name) {
            Ok(())
        } else {
            Err(ViewerError::UnsupportedExtension(name.to_string()))
        }
    }

    /// Check, decode and post-process without touching the world
    pub fn decode(&self, name: &str, bytes: &[u8], decoder: &dyn IfcDecoder) -> Result<FragmentGroup> {
        self.check_file(name)?;
        let mut group = decoder.decode(name, bytes, &self.settings)?;
        group.name = name.to_string();
        apply_settings(&mut group, &self.settings);
        Ok(group)
    }

    /// Decode and attach in one step
    pub fn load(
        &self,
        name: &str,
        bytes: &[u8],
        decoder: &dyn IfcDecoder,
        fragments: &mut FragmentsManager,
    ) -> Result<ModelId> {
        let group = self.decode(name, bytes, decoder)?;
        Ok(fragments.insert(group))
    }

    /// Download the first loaded group: geometry, then its property table.
    ///
    /// The two downloads are independent. If the second one fails the
    /// geometry file has already been delivered.
    pub fn export(
        &self,
        fragments: &FragmentsManager,
        downloader: &mut dyn Downloader,
    ) -> Result<ExportOutcome> {
        let Some((model, group)) = fragments.first_group() else {
            log::debug!("[Loader] Nothing to export");
            return Ok(ExportOutcome::NothingLoaded);
        };

        let data = fragments.export(model)?;
        downloader.download(EXPORT_GEOMETRY_NAME, &data)?;

        let Some(properties) = group.local_properties() else {
            return Ok(ExportOutcome::Exported { properties: false });
        };
        let json = serde_json::to_vec(properties)?;
        downloader.download(EXPORT_PROPERTIES_NAME, &json)?;
        log::info!("[Loader] Exported '{}' ({} bytes)", group.name, data.len());
        Ok(ExportOutcome::Exported { properties: true })
    }

    /// Release every loaded group
    pub fn dispose(&self, fragments: &mut FragmentsManager) -> usize {
        fragments.dispose()
    }
}

/// Drop excluded categories and optionally re-centre on the origin
pub fn apply_settings(group: &mut FragmentGroup, settings: &LoaderSettings) {
    for fragment in &mut group.fragments {
        fragment.items.retain(|_, category| !settings.is_excluded(category));
    }
    group.fragments.retain(|f| !f.items.is_empty());

    if settings.coordinate_to_origin {
        center_on_origin(group);
    }
}

/// Translate the group so its bounds are centred on x = z = 0
fn center_on_origin(group: &mut FragmentGroup) {
    let bounds = group
        .fragments
        .iter()
        .filter_map(|f| f.geometry.bounds())
        .reduce(|(amin, amax), (bmin, bmax)| (amin.inf(&bmin), amax.sup(&bmax)));
    let Some((min, max)) = bounds else {
        return;
    };
    let center = nalgebra::center(&min, &max);
    let offset = Vector3::new(-center.x, 0.0, -center.z);
    if offset.norm() <= f64::EPSILON {
        return;
    }

    for fragment in &mut group.fragments {
        Arc::make_mut(&mut fragment.geometry).translate(offset);
    }
    for alignment in &mut group.alignments {
        let alignment = Arc::make_mut(alignment);
        for curve in alignment
            .absolute
            .iter_mut()
            .chain(alignment.horizontal.iter_mut())
        {
            for p in &mut curve.points {
                *p += offset;
            }
        }
    }
    log::debug!(
        "[Loader] Moved '{}' to origin by ({:.2}, {:.2})",
        group.name,
        offset.x,
        offset.z
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{demo_road, Fragment, FragmentId, ItemId, MeshGeometry, PropertyTable};
    use std::collections::BTreeMap;

    struct BoxDecoder;

    impl IfcDecoder for BoxDecoder {
        fn decode(&self, _name: &str, bytes: &[u8], _settings: &LoaderSettings) -> Result<FragmentGroup> {
            if bytes.is_empty() {
                return Err(ViewerError::decode("empty.ifc", "no entities"));
            }
            let mut group = FragmentGroup::new("decoded");
            let mut items = BTreeMap::new();
            items.insert(ItemId(10), "IFCWALL".to_string());
            items.insert(ItemId(11), "IFCREINFORCINGBAR".to_string());
            group.fragments.push(Fragment::new(
                FragmentId::from("walls"),
                Arc::new(MeshGeometry::new(
                    vec![100.0, 0.0, 100.0, 102.0, 0.0, 100.0, 102.0, 3.0, 104.0],
                    Vec::new(),
                    vec![0, 1, 2],
                )),
                items,
                [0.8, 0.8, 0.8, 1.0],
            ));
            let mut rebar = BTreeMap::new();
            rebar.insert(ItemId(12), "IFCTENDONANCHOR".to_string());
            group.fragments.push(Fragment::new(
                FragmentId::from("rebar"),
                Arc::new(MeshGeometry::default()),
                rebar,
                [1.0; 4],
            ));
            Ok(group)
        }
    }

    #[derive(Default)]
    struct RecordingDownloader {
        files: Vec<(String, usize)>,
        fail_on: Option<&'static str>,
    }

    impl Downloader for RecordingDownloader {
        fn download(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
            if self.fail_on == Some(name) {
                return Err(ViewerError::other("disk full"));
            }
            self.files.push((name.to_string(), bytes.len()));
            Ok(())
        }
    }

    #[test]
    fn test_ifc_extension_check() {
        assert!(is_ifc_file_name("bridge.ifc"));
        assert!(is_ifc_file_name("BRIDGE.IFC"));
        assert!(is_ifc_file_name("road.Ifc"));
        assert!(!is_ifc_file_name("road.ifcxml"));
        assert!(!is_ifc_file_name("notes.txt"));
        assert!(!is_ifc_file_name("ifc"));
        assert!(!is_ifc_file_name(""));
    }

    #[test]
    fn test_non_ifc_rejected_without_attaching() {
        let loader = ModelLoader::default();
        let mut fragments = FragmentsManager::default();
        let err = loader
            .load("plan.dwg", b"data", &BoxDecoder, &mut fragments)
            .unwrap_err();
        assert!(err.is_user_input());
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_load_names_model_and_filters() {
        let loader = ModelLoader::default();
        let mut fragments = FragmentsManager::default();
        let model = loader
            .load("Bridge.IFC", b"ISO-10303-21;", &BoxDecoder, &mut fragments)
            .unwrap();

        let group = fragments.group(model).unwrap();
        assert_eq!(group.name, "Bridge.IFC");
        assert_eq!(group.fragments.len(), 1);
        assert_eq!(group.fragments[0].items.len(), 1);

        let (min, max) = group.fragments[0].geometry.bounds().unwrap();
        assert!((min.x + max.x).abs() < 1e-6);
        assert!((min.z + max.z).abs() < 1e-6);
        assert_eq!(min.y, 0.0);
    }

    #[test]
    fn test_decode_failure_attaches_nothing() {
        let loader = ModelLoader::default();
        let mut fragments = FragmentsManager::default();
        assert!(loader
            .load("empty.ifc", b"", &BoxDecoder, &mut fragments)
            .is_err());
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_export_without_models_downloads_nothing() {
        let loader = ModelLoader::default();
        let mut downloader = RecordingDownloader::default();
        let outcome = loader
            .export(&FragmentsManager::default(), &mut downloader)
            .unwrap();
        assert_eq!(outcome, ExportOutcome::NothingLoaded);
        assert!(downloader.files.is_empty());
    }

    #[test]
    fn test_export_first_group_only() {
        let loader = ModelLoader::default();
        let mut fragments = FragmentsManager::default();
        fragments.insert(demo_road());
        loader
            .load("second.ifc", b"x", &BoxDecoder, &mut fragments)
            .unwrap();

        let mut downloader = RecordingDownloader::default();
        let outcome = loader.export(&fragments, &mut downloader).unwrap();
        assert_eq!(outcome, ExportOutcome::Exported { properties: true });
        let names: Vec<_> = downloader.files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec![EXPORT_GEOMETRY_NAME, EXPORT_PROPERTIES_NAME]);

        let first = fragments.first_group().unwrap().0;
        assert_eq!(downloader.files[0].1, fragments.export(first).unwrap().len());
    }

    #[test]
    fn test_export_without_properties() {
        let loader = ModelLoader::default();
        let mut fragments = FragmentsManager::default();
        loader.load("a.ifc", b"x", &BoxDecoder, &mut fragments).unwrap();
        let mut downloader = RecordingDownloader::default();
        let outcome = loader.export(&fragments, &mut downloader).unwrap();
        assert_eq!(outcome, ExportOutcome::Exported { properties: false });
        assert_eq!(downloader.files.len(), 1);
    }

    #[test]
    fn test_export_is_not_atomic() {
        let loader = ModelLoader::default();
        let mut fragments = FragmentsManager::default();
        let mut road = demo_road();
        road.set_local_properties(PropertyTable::new());
        fragments.insert(road);

        let mut downloader = RecordingDownloader {
            fail_on: Some(EXPORT_PROPERTIES_NAME),
            ..Default::default()
        };
        assert!(loader.export(&fragments, &mut downloader).is_err());
        assert_eq!(downloader.files.len(), 1);
        assert_eq!(downloader.files[0].0, EXPORT_GEOMETRY_NAME);
    }

    #[test]
    fn test_dispose_twice() {
        let loader = ModelLoader::default();
        let mut fragments = FragmentsManager::default();
        fragments.insert(demo_road());
        assert_eq!(loader.dispose(&mut fragments), 1);
        assert_eq!(loader.dispose(&mut fragments), 0);
    }
}
