//! Concrete data items and views for stackview displays

pub mod items;
mod dataset_view;
mod mesh_view;
mod volume_view;

pub use dataset_view::{DatasetView, DatasetViewFactory};
pub use items::{Calibration, Dataset, ItemError, Mesh};
pub use mesh_view::{MeshView, MeshViewFactory};
pub use volume_view::{VolumeView, VolumeViewFactory};

use std::sync::Arc;

use sv_core::{DataItem, ViewRegistry};

/// Factories for every built-in view. Volumes are tried before the generic
/// dataset view.
pub fn default_view_registry() -> ViewRegistry {
    ViewRegistry::new()
        .with(Arc::new(VolumeViewFactory))
        .with(Arc::new(DatasetViewFactory))
        .with(Arc::new(MeshViewFactory))
}

pub(crate) fn downcast_item<T: 'static>(item: &Arc<dyn DataItem>) -> Option<&T> {
    item.as_any().downcast_ref::<T>()
}
