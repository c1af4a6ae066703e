// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-Civil Model - fragments, classification and civil navigation contracts
//!
//! This crate holds everything the viewer needs that is not rendering: the
//! fragment registry and its binary codec, the IFC category classifier, clip
//! styles for cross sections, alignment math, and the relay that keeps the
//! plan, 3D and cross-section navigators in sync.
//!
//! # Architecture
//!
//! The renderer talks to this crate through a handful of traits:
//!
//! - [`Navigator3d`] - alignment markers and highlighting in the shared world
//! - [`CrossSectionNavigator`] - renders the cut at a station
//! - [`CameraControls`] - free-form camera framing
//! - [`ClipStyler`] - clip style registry with a forced recompute
//! - [`IfcDecoder`] - turns IFC bytes into a [`FragmentGroup`]
//! - [`Downloader`] - delivers exported files to the user
//!
//! Setup of the civil view is an explicit sequence of [`CivilPhase`]s guarded
//! by a cancellable [`SetupToken`], so a torn-down view never touches the scene.
//!
//! # Example
//!
//! ```ignore
//! use ifc_civil_model::{FragmentsManager, Classifier};
//!
//! let mut fragments = FragmentsManager::default();
//! let model = fragments.load(&bytes)?;
//! let mut classifier = Classifier::default();
//! classifier.by_entity(fragments.group(model).unwrap());
//! for category in classifier.list() {
//!     println!("{category}");
//! }
//! ```

pub mod alignment;
pub mod classifier;
pub mod clipping;
pub mod codec;
pub mod config;
pub mod demo;
pub mod error;
pub mod fragments;
pub mod geometry;
pub mod loader;
pub mod measure;
pub mod navigation;
pub mod panels;
pub mod phase;
pub mod relay;
pub mod setup;
pub mod types;

// Re-export all public types
pub use alignment::*;
pub use classifier::*;
pub use clipping::*;
pub use codec::{decode_group, encode_group, FRAGMENT_MAGIC, FRAGMENT_VERSION};
pub use config::*;
pub use demo::demo_road;
pub use error::*;
pub use fragments::*;
pub use geometry::*;
pub use loader::*;
pub use measure::*;
pub use navigation::*;
pub use panels::*;
pub use phase::*;
pub use relay::*;
pub use setup::*;
pub use types::*;
