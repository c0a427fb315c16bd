//! Data item kinds

mod dataset;
mod mesh;

pub use dataset::{Calibration, Dataset};
pub use mesh::Mesh;

use sv_core::Axis;
use thiserror::Error;

/// Errors constructing or reshaping an item
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ItemError {
    #[error("{axes} axes given for {dims} array dimensions")]
    AxisCountMismatch { axes: usize, dims: usize },

    #[error("Axis {0} appears more than once")]
    DuplicateAxis(Axis),

    #[error("Unknown axis: {0}")]
    UnknownAxis(Axis),

    #[error("Invalid range {start}..{end} on axis {axis} of length {len}")]
    InvalidRange { axis: Axis, start: usize, end: usize, len: usize },

    #[error("Triangle references vertex {index} but mesh has {vertex_count} vertices")]
    VertexOutOfRange { index: u32, vertex_count: usize },
}
