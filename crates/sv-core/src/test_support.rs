//! Stub items and views for unit tests

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::axis::{Axis, AxisExtent};
use crate::error::ViewError;
use crate::view::{DataItem, ItemId, View, ViewFactory};

/// Item whose coordinate space is set directly by the test
pub struct StubItem {
    id: ItemId,
    name: String,
    axes: RwLock<Vec<AxisExtent>>,
    failing: AtomicBool,
}

impl StubItem {
    pub fn new(name: &str, axes: Vec<AxisExtent>) -> Arc<Self> {
        Arc::new(Self {
            id: ItemId::new(),
            name: name.to_string(),
            axes: RwLock::new(axes),
            failing: AtomicBool::new(false),
        })
    }

    /// Item with planar X/Y plus a Z axis over `[z_min, z_max]`
    pub fn stack(name: &str, z_min: f64, z_max: f64) -> Arc<Self> {
        Self::new(name, vec![
            AxisExtent::new(Axis::X, 0.0, 63.0, 1.0),
            AxisExtent::new(Axis::Y, 0.0, 63.0, 1.0),
            AxisExtent::new(Axis::Z, z_min, z_max, 1.0),
        ])
    }

    pub fn set_axes(&self, axes: Vec<AxisExtent>) {
        *self.axes.write() = axes;
    }

    pub fn current_axes(&self) -> Vec<AxisExtent> {
        self.axes.read().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl DataItem for StubItem {
    fn id(&self) -> ItemId {
        self.id
    }

    fn name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// View that records every call made by the display
pub struct StubView {
    item: Arc<dyn DataItem>,
    positions: AHashMap<Axis, f64>,
    pub rebuilds: usize,
    pub updates: usize,
    pub disposed: bool,
    dispose_counter: Arc<AtomicUsize>,
}

impl StubView {
    fn stub_item(&self) -> Option<&StubItem> {
        self.item.as_any().downcast_ref::<StubItem>()
    }

    fn failing(&self) -> bool {
        self.stub_item().map(|item| item.failing.load(Ordering::SeqCst)).unwrap_or(false)
    }
}

impl View for StubView {
    fn item(&self) -> &Arc<dyn DataItem> {
        &self.item
    }

    fn view_type(&self) -> &str {
        "StubView"
    }

    fn own_axes(&self) -> Vec<AxisExtent> {
        self.stub_item().map(StubItem::current_axes).unwrap_or_default()
    }

    fn own_position(&self, axis: &Axis) -> f64 {
        self.positions.get(axis).copied().unwrap_or(0.0)
    }

    fn set_own_position(&mut self, axis: &Axis, position: f64) {
        self.positions.insert(axis.clone(), position);
    }

    fn rebuild(&mut self) -> Result<(), ViewError> {
        self.rebuilds += 1;
        if self.failing() {
            return Err(ViewError::Rebuild("stub failure".to_string()));
        }
        Ok(())
    }

    fn update(&mut self) -> Result<(), ViewError> {
        self.updates += 1;
        if self.failing() {
            return Err(ViewError::Update("stub failure".to_string()));
        }
        Ok(())
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.dispose_counter.fetch_add(1, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory for [`StubView`], optionally restricted to one item name
pub struct StubFactory {
    name: String,
    only: Option<String>,
    pub disposed: Arc<AtomicUsize>,
}

impl StubFactory {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            only: None,
            disposed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn accepting(mut self, item_name: &str) -> Self {
        self.only = Some(item_name.to_string());
        self
    }
}

impl ViewFactory for StubFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, item: &dyn DataItem) -> bool {
        match &self.only {
            Some(only) => item.name().as_deref() == Some(only.as_str()),
            None => item.as_any().is::<StubItem>(),
        }
    }

    fn create(&self, item: Arc<dyn DataItem>) -> Box<dyn View> {
        Box::new(StubView {
            item,
            positions: AHashMap::new(),
            rebuilds: 0,
            updates: 0,
            disposed: false,
            dispose_counter: self.disposed.clone(),
        })
    }
}
