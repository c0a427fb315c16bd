//! Error types for the display coordinator

use thiserror::Error;

use crate::axis::Axis;
use crate::view::ViewHandle;

/// Errors surfaced to callers of [`crate::Display`] operations.
///
/// None of these are fatal: a failed call leaves the display unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DisplayError {
    #[error("No compatible view for item '{item}'")]
    NoCompatibleView { item: String },

    #[error("Unknown axis: {0}")]
    AxisUnknown(Axis),

    #[error("View not found: {0}")]
    ViewNotFound(ViewHandle),
}

/// Errors reported by a single view's rebuild or update.
///
/// The display logs these per view and keeps going with the remaining views.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewError {
    #[error("Rebuild failed: {0}")]
    Rebuild(String),

    #[error("Update failed: {0}")]
    Update(String),

    #[error("Underlying item has no data")]
    ItemUnavailable,

    #[error("Non-finite extent on axis {0}")]
    InvalidExtent(Axis),

    #[error("View has been disposed")]
    Disposed,
}

/// Errors loading [`crate::DisplaySettings`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
