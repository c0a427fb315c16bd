//! Plane-by-plane view of an N-dimensional dataset

use std::any::Any;
use std::sync::Arc;

use ahash::AHashMap;
use ndarray::Array2;
use sv_core::{Axis, AxisExtent, DataItem, View, ViewError, ViewFactory};

use crate::items::Dataset;
use crate::downcast_item;

/// Shows the X/Y plane of a [`Dataset`] at its own position on every other axis
pub struct DatasetView {
    item: Arc<dyn DataItem>,
    positions: AHashMap<Axis, f64>,
    plane: Option<Array2<f32>>,
    value_range: Option<(f32, f32)>,
    disposed: bool,
}

impl DatasetView {
    pub fn new(item: Arc<dyn DataItem>) -> Self {
        Self {
            item,
            positions: AHashMap::new(),
            plane: None,
            value_range: None,
            disposed: false,
        }
    }

    /// The plane extracted by the last successful update
    pub fn plane(&self) -> Option<&Array2<f32>> {
        self.plane.as_ref()
    }

    /// Sample range of the whole dataset, refreshed on rebuild and update
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.value_range
    }

    fn dataset(&self) -> Result<&Dataset, ViewError> {
        if self.disposed {
            return Err(ViewError::Disposed);
        }
        let dataset = downcast_item::<Dataset>(&self.item).ok_or(ViewError::ItemUnavailable)?;
        if dataset.is_empty() {
            return Err(ViewError::ItemUnavailable);
        }
        Ok(dataset)
    }
}

impl View for DatasetView {
    fn item(&self) -> &Arc<dyn DataItem> {
        &self.item
    }

    fn view_type(&self) -> &str {
        "dataset"
    }

    fn own_axes(&self) -> Vec<AxisExtent> {
        downcast_item::<Dataset>(&self.item)
            .map(Dataset::extents)
            .unwrap_or_default()
    }

    fn own_position(&self, axis: &Axis) -> f64 {
        self.positions.get(axis).copied().unwrap_or(0.0)
    }

    fn set_own_position(&mut self, axis: &Axis, position: f64) {
        self.positions.insert(axis.clone(), position);
    }

    fn rebuild(&mut self) -> Result<(), ViewError> {
        let dataset = self.dataset()?;
        let axes = dataset.axes();
        let value_range = dataset.value_range();
        // Forget positions on axes the dataset no longer has
        self.positions.retain(|axis, _| axes.contains(axis));
        self.value_range = value_range;
        self.plane = None;
        Ok(())
    }

    fn update(&mut self) -> Result<(), ViewError> {
        let dataset = self.dataset()?;
        let plane = dataset.plane(|axis| self.positions.get(axis).copied());
        let value_range = dataset.value_range();
        if plane.is_none() {
            tracing::trace!("Dataset {:?} has no X/Y plane", dataset.name());
        }
        self.plane = plane;
        self.value_range = value_range;
        Ok(())
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.plane = None;
        self.positions.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Accepts any [`Dataset`]
#[derive(Debug, Default)]
pub struct DatasetViewFactory;

impl ViewFactory for DatasetViewFactory {
    fn name(&self) -> &str {
        "dataset"
    }

    fn accepts(&self, item: &dyn DataItem) -> bool {
        item.as_any().is::<Dataset>()
    }

    fn create(&self, item: Arc<dyn DataItem>) -> Box<dyn View> {
        Box::new(DatasetView::new(item))
    }
}
