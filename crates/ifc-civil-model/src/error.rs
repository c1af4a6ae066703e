// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for viewer operations

use crate::{CivilPhase, ModelId};
use thiserror::Error;

/// Result type alias for viewer operations
pub type Result<T> = std::result::Result<T, ViewerError>;

/// Errors that can occur while loading, exporting or wiring models
#[derive(Error, Debug)]
pub enum ViewerError {
    /// File name does not carry the `.ifc` extension
    #[error("Unsupported file '{0}': please select an IFC file")]
    UnsupportedExtension(String),

    /// IFC content could not be turned into fragments
    #[error("Failed to decode '{name}': {message}")]
    Decode { name: String, message: String },

    /// Fragment binary is malformed
    #[error("Invalid fragment data: {0}")]
    Codec(String),

    /// Remote or local resource could not be fetched
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// Setup step ran out of order
    #[error("Setup phase {actual:?} cannot advance to {requested:?}")]
    PhaseOrder {
        actual: CivilPhase,
        requested: CivilPhase,
    },

    /// Setup was cancelled by teardown
    #[error("Setup cancelled")]
    Cancelled,

    /// Model handle no longer exists
    #[error("Model {0} not found")]
    ModelNotFound(ModelId),

    /// Classification and style registration disagree
    #[error("Clip styles incomplete: {missing} of {expected} categories unregistered")]
    IncompleteStyles { expected: usize, missing: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl ViewerError {
    /// Create a new decode error
    pub fn decode(name: impl Into<String>, msg: impl Into<String>) -> Self {
        ViewerError::Decode {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a new codec error
    pub fn codec(msg: impl Into<String>) -> Self {
        ViewerError::Codec(msg.into())
    }

    /// Create a new fetch error
    pub fn fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        ViewerError::Fetch {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        ViewerError::Other(msg.into())
    }

    /// Whether the error comes from user input rather than data or network
    pub fn is_user_input(&self) -> bool {
        matches!(self, ViewerError::UnsupportedExtension(_))
    }
}
