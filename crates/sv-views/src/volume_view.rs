//! Volume rendering view for three-dimensional datasets

use std::any::Any;
use std::sync::Arc;

use ahash::AHashMap;
use glam::DVec3;
use sv_core::{Axis, AxisExtent, DataItem, View, ViewError, ViewFactory};

use crate::downcast_item;
use crate::items::Dataset;

/// Renders a dataset with exactly X, Y and Z axes as a volume.
///
/// Geometry (voxel size and bounds) is derived on rebuild; the intensity
/// window and focus point follow the data and position on update.
pub struct VolumeView {
    item: Arc<dyn DataItem>,
    positions: AHashMap<Axis, f64>,
    voxel_size: DVec3,
    bounds: Option<(DVec3, DVec3)>,
    intensity_range: Option<(f32, f32)>,
    focus: Option<DVec3>,
    disposed: bool,
}

impl VolumeView {
    pub fn new(item: Arc<dyn DataItem>) -> Self {
        Self {
            item,
            positions: AHashMap::new(),
            voxel_size: DVec3::ONE,
            bounds: None,
            intensity_range: None,
            focus: None,
            disposed: false,
        }
    }

    pub fn voxel_size(&self) -> DVec3 {
        self.voxel_size
    }

    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        self.bounds
    }

    pub fn intensity_range(&self) -> Option<(f32, f32)> {
        self.intensity_range
    }

    /// Centre of the X/Y plane at the current Z position
    pub fn focus(&self) -> Option<DVec3> {
        self.focus
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

fn vector(extents: &[AxisExtent], value: impl Fn(&AxisExtent) -> f64) -> Option<DVec3> {
    let get = |axis: Axis| extents.iter().find(|e| e.axis == axis).map(&value);
    Some(DVec3::new(get(Axis::X)?, get(Axis::Y)?, get(Axis::Z)?))
}

impl View for VolumeView {
    fn item(&self) -> &Arc<dyn DataItem> {
        &self.item
    }

    fn view_type(&self) -> &str {
        "volume"
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
        let extents = self.dataset()?.extents();
        if extents.len() != 3 {
            let message = format!("volume needs 3 axes, item has {}", extents.len());
            return Err(ViewError::Rebuild(message));
        }
        let min = vector(&extents, |e| e.min);
        let max = vector(&extents, |e| e.max);
        let voxel_size = vector(&extents, |e| e.scale);
        match (min, max, voxel_size) {
            (Some(min), Some(max), Some(voxel_size)) => {
                self.bounds = Some((min, max));
                self.voxel_size = voxel_size;
                self.focus = None;
                Ok(())
            }
            _ => Err(ViewError::Rebuild("volume needs X, Y and Z axes".to_string())),
        }
    }

    fn update(&mut self) -> Result<(), ViewError> {
        let intensity_range = self.dataset()?.value_range();
        let (min, max) = self
            .bounds
            .ok_or_else(|| ViewError::Update("volume was never rebuilt".to_string()))?;
        let center = (min + max) * 0.5;
        let z = self.positions.get(&Axis::Z).copied().unwrap_or(min.z).clamp(min.z, max.z);
        self.intensity_range = intensity_range;
        self.focus = Some(DVec3::new(center.x, center.y, z));
        Ok(())
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.bounds = None;
        self.focus = None;
        self.positions.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Accepts datasets whose axes are exactly X, Y and Z
#[derive(Debug, Default)]
pub struct VolumeViewFactory;

impl ViewFactory for VolumeViewFactory {
    fn name(&self) -> &str {
        "volume"
    }

    fn accepts(&self, item: &dyn DataItem) -> bool {
        let Some(dataset) = item.as_any().downcast_ref::<Dataset>() else {
            return false;
        };
        let axes = dataset.axes();
        axes.len() == 3 && [Axis::X, Axis::Y, Axis::Z].iter().all(|axis| axes.contains(axis))
    }

    fn create(&self, item: Arc<dyn DataItem>) -> Box<dyn View> {
        Box::new(VolumeView::new(item))
    }
}
