//! View abstraction - the contract between a display and the data it shows

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::axis::{Axis, AxisExtent};
use crate::error::{DisplayError, ViewError};

/// Unique identifier for a view attached to a display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewHandle(Uuid);

impl ViewHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view-{}", self.0)
    }
}

/// Unique identifier for a data item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

/// A multi-dimensional data item that can be shown in a display
pub trait DataItem: Send + Sync {
    /// Stable identity of this item
    fn id(&self) -> ItemId;

    /// Item name, used to name the display that first shows it
    fn name(&self) -> Option<String>;

    /// Get as any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Wraps one data item and exposes its own coordinate space to a display.
///
/// Implementations need not be thread-safe internally: the display only calls
/// the mutating methods while holding its own lock.
pub trait View: Send + Sync {
    /// The wrapped item
    fn item(&self) -> &Arc<dyn DataItem>;

    /// Get the view type (for logging and events)
    fn view_type(&self) -> &str;

    /// The view's own axes, extents and calibration
    fn own_axes(&self) -> Vec<AxisExtent>;

    /// The view's own position along `axis` (0 for axes it never received)
    fn own_position(&self, axis: &Axis) -> f64;

    /// Set the view's own position along `axis`
    fn set_own_position(&mut self, axis: &Axis, position: f64);

    /// Recompute derived geometry after a structural change
    fn rebuild(&mut self) -> Result<(), ViewError>;

    /// Refresh after the item's contents changed
    fn update(&mut self) -> Result<(), ViewError>;

    /// Release resources; the view is not used afterwards
    fn dispose(&mut self);

    /// Extent of one of the view's own axes
    fn own_extent(&self, axis: &Axis) -> Option<AxisExtent> {
        self.own_axes().into_iter().find(|extent| &extent.axis == axis)
    }

    /// Get as any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Creates views for the items it accepts
pub trait ViewFactory: Send + Sync {
    /// Factory name (for logging)
    fn name(&self) -> &str;

    /// Whether this factory can wrap `item`
    fn accepts(&self, item: &dyn DataItem) -> bool;

    /// Wrap `item` in a new view. Only called after `accepts` returned true.
    fn create(&self, item: Arc<dyn DataItem>) -> Box<dyn View>;
}

/// Ordered set of view factories. The first one accepting an item wins.
#[derive(Clone, Default)]
pub struct ViewRegistry {
    factories: Vec<Arc<dyn ViewFactory>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a factory; earlier registrations take precedence
    pub fn register(&mut self, factory: Arc<dyn ViewFactory>) {
        tracing::debug!("Registered view factory '{}'", factory.name());
        self.factories.push(factory);
    }

    /// Builder-style [`ViewRegistry::register`]
    pub fn with(mut self, factory: Arc<dyn ViewFactory>) -> Self {
        self.register(factory);
        self
    }

    /// Find the first factory accepting `item`
    pub fn factory_for(&self, item: &dyn DataItem) -> Option<&Arc<dyn ViewFactory>> {
        self.factories.iter().find(|factory| factory.accepts(item))
    }

    /// Wrap `item` in a view from the first accepting factory
    pub fn create_view(&self, item: Arc<dyn DataItem>) -> Result<Box<dyn View>, DisplayError> {
        match self.factory_for(item.as_ref()) {
            Some(factory) => {
                tracing::debug!("Factory '{}' accepted item {:?}", factory.name(), item.name());
                Ok(factory.create(item))
            }
            None => Err(DisplayError::NoCompatibleView {
                item: item.name().unwrap_or_else(|| "<unnamed>".to_string()),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.factories.iter().map(|factory| factory.name()).collect();
        f.debug_struct("ViewRegistry").field("factories", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubFactory, StubItem};

    #[test]
    fn test_first_accepting_factory_wins() {
        let registry = ViewRegistry::new()
            .with(Arc::new(StubFactory::named("picky").accepting("special")))
            .with(Arc::new(StubFactory::named("first")))
            .with(Arc::new(StubFactory::named("second")));

        let plain = StubItem::new("plain", vec![]);
        assert_eq!(registry.factory_for(plain.as_ref()).unwrap().name(), "first");

        let special = StubItem::new("special", vec![]);
        assert_eq!(registry.factory_for(special.as_ref()).unwrap().name(), "picky");
    }

    #[test]
    fn test_no_compatible_view() {
        let picky = StubFactory::named("picky").accepting("special");
        let registry = ViewRegistry::new().with(Arc::new(picky));
        let item: Arc<dyn DataItem> = StubItem::new("plain", vec![]);

        let err = registry.create_view(item).err().unwrap();
        assert_eq!(err, DisplayError::NoCompatibleView { item: "plain".to_string() });
    }
}
