// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer configuration file

use crate::{GridConfig, LoaderSettings, MinimapConfig, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the JSON configuration file
pub const CONFIG_ENV: &str = "IFC_CIVIL_CONFIG";

/// Startup configuration. Missing keys fall back to defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Fragment binary of the civil road (`http(s)://` URL or local path).
    /// The built-in demo road is used when unset.
    pub road_model_url: Option<String>,
    /// Property table of the civil road
    pub road_properties_url: Option<String>,
    /// Where exports are written on desktop
    pub export_dir: PathBuf,
    pub loader: LoaderSettings,
    pub grid: GridConfig,
    pub minimap: MinimapConfig,
    pub camera_eye: [f32; 3],
    pub camera_target: [f32; 3],
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            road_model_url: None,
            road_properties_url: None,
            export_dir: PathBuf::from("."),
            loader: LoaderSettings::default(),
            grid: GridConfig::default(),
            minimap: MinimapConfig::default(),
            camera_eye: [5.0, 5.0, 5.0],
            camera_target: [0.0, 0.0, 0.0],
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Both road URLs set; otherwise the demo road is used
    pub fn road_sources(&self) -> Option<(&str, &str)> {
        match (&self.road_model_url, &self.road_properties_url) {
            (Some(model), Some(properties)) => Some((model.as_str(), properties.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ViewerConfig::from_json_str(
            r#"{ "road_model_url": "https://example.org/road.frag", "minimap": { "zoom": 0.1 } }"#,
        )
        .unwrap();
        assert_eq!(
            config.road_model_url.as_deref(),
            Some("https://example.org/road.frag")
        );
        assert!(config.road_sources().is_none());
        assert_eq!(config.minimap.zoom, 0.1);
        assert_eq!(config.minimap.size_x, 350.0);
        assert_eq!(config.camera_eye, [5.0, 5.0, 5.0]);
        assert!(config.loader.coordinate_to_origin);
    }

    #[test]
    fn test_invalid_json() {
        assert!(ViewerConfig::from_json_str("{ nope").is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ViewerConfig::load("/definitely/not/here.json"),
            Err(crate::ViewerError::Io(_))
        ));
    }
}
