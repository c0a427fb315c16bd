//! Display - owns a set of views and fuses their coordinate spaces
//!
//! A display keeps its views, the combined interval and the active axis
//! behind a single lock. Rebuild and Update take it exclusively, so no
//! navigation call can observe a half-rebuilt interval. Positions live in a
//! [`PositionStore`] with its own lock.
//!
//! Queries take the lock recursively, so a query made from inside
//! [`Display::with_view`] does not queue behind a waiting Rebuild.
//! Navigation takes it fairly and must not be called from inside `with_view`.

mod lifecycle;
mod registry;

pub use lifecycle::{PassReport, ViewFailure};
pub use registry::DisplayRegistry;

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::axis::Axis;
use crate::error::DisplayError;
use crate::events::events::{ActiveAxisChanged, PositionChanged, ViewAdded, ViewRemoved};
use crate::events::EventBus;
use crate::interval::{CombinedExtent, CombinedInterval};
use crate::navigation::{PositionStore, StepDirection};
use crate::settings::DisplaySettings;
use crate::view::{DataItem, ItemId, View, ViewHandle, ViewRegistry};

use lifecycle::Notice;

/// Unique identifier for a display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayId(Uuid);

impl DisplayId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DisplayId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "display-{}", self.0)
    }
}

/// Extents of the X/Y rendering plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaneExtents {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Serializable summary of a display, e.g. for a status bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplaySnapshot {
    pub id: DisplayId,
    pub name: Option<String>,
    pub axes: Vec<AxisSnapshot>,
    pub active_axis: Option<Axis>,
    pub views: Vec<ViewSnapshot>,
}

/// One combined axis in a [`DisplaySnapshot`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisSnapshot {
    pub axis: Axis,
    pub extent: CombinedExtent,
    /// Clamped position; `None` for planar axes
    pub position: Option<f64>,
}

/// One view in a [`DisplaySnapshot`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub handle: ViewHandle,
    pub view_type: String,
    pub item_name: Option<String>,
    pub visible: bool,
}

struct ViewEntry {
    handle: ViewHandle,
    view: Box<dyn View>,
}

/// Everything guarded by the display lock
struct DisplayState {
    views: Vec<ViewEntry>,
    interval: CombinedInterval,
    active_axis: Option<Axis>,
}

/// The aggregate owner of views, combined interval, positions and active axis
pub struct Display {
    id: DisplayId,
    name: RwLock<Option<String>>,
    state: RwLock<DisplayState>,
    positions: PositionStore,
    factories: ViewRegistry,
    events: Arc<EventBus>,
    settings: DisplaySettings,
    registry: Weak<DisplayRegistry>,
}

impl Display {
    /// Create an empty display
    pub fn new(factories: ViewRegistry, events: Arc<EventBus>, settings: DisplaySettings) -> Self {
        Self {
            id: DisplayId::new(),
            name: RwLock::new(None),
            state: RwLock::new(DisplayState {
                views: Vec::new(),
                interval: CombinedInterval::new(settings.scale_averaging),
                active_axis: None,
            }),
            positions: PositionStore::new(),
            factories,
            events,
            settings,
            registry: Weak::new(),
        }
    }

    pub(crate) fn with_registry(mut self, registry: Weak<DisplayRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn id(&self) -> DisplayId {
        self.id
    }

    pub fn name(&self) -> Option<String> {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = Some(name.into());
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn settings(&self) -> &DisplaySettings {
        &self.settings
    }

    // -- Mutation --

    /// Wrap `item` in a view from the first compatible factory, attach it and
    /// run Rebuild followed by Update.
    pub fn display_item(&self, item: Arc<dyn DataItem>) -> Result<ViewHandle, DisplayError> {
        let view = self.factories.create_view(item.clone())?;
        let handle = ViewHandle::new();
        let view_type = view.view_type().to_string();
        self.assign_name(item.as_ref());

        let mut notices = Vec::new();
        {
            let mut state = self.state.write();
            state.views.push(ViewEntry { handle, view });
            tracing::info!(
                "{}: displaying {:?} as {} ({})",
                self.id,
                item.name(),
                view_type,
                handle
            );
            self.rebuild_locked(&mut state, &mut notices);
            self.update_locked(&mut state, &mut notices);
        }

        self.events.publish(ViewAdded {
            display: self.id,
            view: handle,
            view_type,
        });
        self.emit(notices);
        Ok(handle)
    }

    /// Detach and dispose a view, then Rebuild
    pub fn remove_view(&self, handle: ViewHandle) -> Result<(), DisplayError> {
        let mut notices = Vec::new();
        {
            let mut state = self.state.write();
            let index = state
                .views
                .iter()
                .position(|entry| entry.handle == handle)
                .ok_or(DisplayError::ViewNotFound(handle))?;
            let mut entry = state.views.remove(index);
            entry.view.dispose();
            tracing::info!("{}: removed {}", self.id, handle);
            self.rebuild_locked(&mut state, &mut notices);
        }

        self.events.publish(ViewRemoved { display: self.id, view: handle });
        self.emit(notices);
        Ok(())
    }

    /// Designate `axis` as the active axis
    pub fn set_active_axis(&self, axis: Axis) -> Result<(), DisplayError> {
        {
            let mut state = self.state.write();
            if axis.is_planar() || !state.interval.contains(&axis) {
                tracing::debug!("{}: rejected active axis {}", self.id, axis);
                return Err(DisplayError::AxisUnknown(axis));
            }
            state.active_axis = Some(axis.clone());
        }
        self.events.publish(ActiveAxisChanged { display: self.id, axis });
        Ok(())
    }

    /// Move to `value` along `axis`, clamped to the combined extent.
    ///
    /// The PositionChanged notification is queued, not delivered: a handler
    /// may safely call back into `set_position`.
    pub fn set_position(&self, axis: &Axis, value: f64) -> Result<(), DisplayError> {
        let state = self.state.read();
        match self.positions.set(axis, value, &state.interval) {
            Ok(_) => {
                let event = PositionChanged { display: self.id, axis: axis.clone() };
                self.events.publish_later(event);
                Ok(())
            }
            Err(err) => {
                tracing::debug!("{}: rejected position {} on {}", self.id, value, axis);
                Err(err)
            }
        }
    }

    /// Move by `delta` along `axis` from the current clamped position
    pub fn step_position(&self, axis: &Axis, delta: f64) -> Result<(), DisplayError> {
        let state = self.state.read();
        let current = self.positions.get(axis, &state.interval);
        self.positions.set(axis, current + delta, &state.interval)?;
        let event = PositionChanged { display: self.id, axis: axis.clone() };
        self.events.publish_later(event);
        Ok(())
    }

    /// Step one `position_step` forward along `axis`
    pub fn next(&self, axis: &Axis) -> Result<(), DisplayError> {
        self.step(axis, StepDirection::Forward, 1)
    }

    /// Step one `position_step` backward along `axis`
    pub fn previous(&self, axis: &Axis) -> Result<(), DisplayError> {
        self.step(axis, StepDirection::Backward, 1)
    }

    /// Step `steps` times `position_step` forward (negative: backward)
    pub fn advance(&self, axis: &Axis, steps: i64) -> Result<(), DisplayError> {
        let direction = if steps < 0 { StepDirection::Backward } else { StepDirection::Forward };
        self.step(axis, direction, steps.unsigned_abs())
    }

    fn step(&self, axis: &Axis, direction: StepDirection, steps: u64) -> Result<(), DisplayError> {
        self.step_position(axis, direction.sign() * steps as f64 * self.settings.position_step)
    }

    /// Dispose every view and clear all derived state. Safe to call twice.
    pub fn teardown(&self) {
        let mut state = self.state.write();
        if state.views.is_empty() && state.interval.is_empty() {
            return;
        }
        for entry in state.views.iter_mut() {
            entry.view.dispose();
        }
        state.views.clear();
        state.interval.clear();
        state.active_axis = None;
        self.positions.clear();
        tracing::info!("{}: torn down", self.id);
    }

    // -- Queries --

    /// Whether `view` should be drawn at the current position.
    ///
    /// Unknown handles are never visible.
    pub fn is_visible(&self, handle: ViewHandle) -> bool {
        let state = self.state.read_recursive();
        state
            .views
            .iter()
            .find(|entry| entry.handle == handle)
            .map(|entry| self.visible_locked(&state, entry.view.as_ref()))
            .unwrap_or(false)
    }

    /// Handles of all views that are visible at the current position
    pub fn visible_views(&self) -> Vec<ViewHandle> {
        let state = self.state.read_recursive();
        state
            .views
            .iter()
            .filter(|entry| self.visible_locked(&state, entry.view.as_ref()))
            .map(|entry| entry.handle)
            .collect()
    }

    /// `(min, max)` of `axis` across all views
    pub fn combined_extent(&self, axis: &Axis) -> Option<(f64, f64)> {
        self.state.read_recursive().interval.extent(axis).map(|e| (e.min, e.max))
    }

    /// Averaged calibration of `axis`
    pub fn average_scale(&self, axis: &Axis) -> Option<f64> {
        self.state.read_recursive().interval.average_scale(axis)
    }

    /// Combined axes in first-observed order
    pub fn axes(&self) -> Vec<Axis> {
        self.state.read_recursive().interval.axes().cloned().collect()
    }

    /// Current clamped position along `axis`; 0 for untracked axes
    pub fn position(&self, axis: &Axis) -> f64 {
        let state = self.state.read_recursive();
        self.positions.get(axis, &state.interval)
    }

    /// Axes with a tracked position, sorted
    pub fn tracked_axes(&self) -> Vec<Axis> {
        self.positions.keys()
    }

    pub fn active_axis(&self) -> Option<Axis> {
        self.state.read_recursive().active_axis.clone()
    }

    /// The first view in list order
    pub fn active_view(&self) -> Option<ViewHandle> {
        self.state.read_recursive().views.first().map(|entry| entry.handle)
    }

    /// Combined extents of the X/Y plane
    pub fn plane_extents(&self) -> Option<PlaneExtents> {
        let state = self.state.read_recursive();
        let x = state.interval.extent(&Axis::X)?;
        let y = state.interval.extent(&Axis::Y)?;
        Some(PlaneExtents {
            x: x.min,
            y: y.min,
            width: x.max - x.min,
            height: y.max - y.min,
        })
    }

    /// Whether any view wraps the item with id `item`
    pub fn is_displaying(&self, item: ItemId) -> bool {
        self.state.read_recursive().views.iter().any(|entry| entry.view.item().id() == item)
    }

    /// View handles in list order
    pub fn views(&self) -> Vec<ViewHandle> {
        self.state.read_recursive().views.iter().map(|entry| entry.handle).collect()
    }

    pub fn view_count(&self) -> usize {
        self.state.read_recursive().views.len()
    }

    /// Run `f` with read access to a view. `f` may query the display but
    /// must not navigate or mutate it.
    pub fn with_view<R>(
        &self,
        handle: ViewHandle,
        f: impl FnOnce(&dyn View) -> R,
    ) -> Option<R> {
        let state = self.state.read_recursive();
        state
            .views
            .iter()
            .find(|entry| entry.handle == handle)
            .map(|entry| f(entry.view.as_ref()))
    }

    /// Consistent summary of the whole display
    pub fn snapshot(&self) -> DisplaySnapshot {
        let state = self.state.read_recursive();
        let axes = state
            .interval
            .iter()
            .map(|(axis, extent)| AxisSnapshot {
                axis: axis.clone(),
                extent: *extent,
                position: (!axis.is_planar()).then(|| self.positions.get(axis, &state.interval)),
            })
            .collect();
        let views = state
            .views
            .iter()
            .map(|entry| ViewSnapshot {
                handle: entry.handle,
                view_type: entry.view.view_type().to_string(),
                item_name: entry.view.item().name(),
                visible: self.visible_locked(&state, entry.view.as_ref()),
            })
            .collect();
        DisplaySnapshot {
            id: self.id,
            name: self.name(),
            axes,
            active_axis: state.active_axis.clone(),
            views,
        }
    }

    // -- Helpers --

    /// Name an unnamed display after the item, avoiding names already taken
    /// by other displays in the registry.
    fn assign_name(&self, item: &dyn DataItem) {
        if self.name.read().is_some() {
            return;
        }
        let Some(proposed) = item.name().filter(|name| !name.is_empty()) else {
            return;
        };
        let assigned = match self.registry.upgrade() {
            Some(registry) => registry.claim_name(self, &proposed, &self.settings.name_separator),
            None => {
                let mut current = self.name.write();
                if current.is_some() {
                    return;
                }
                *current = Some(proposed.clone());
                Some(proposed)
            }
        };
        if let Some(name) = assigned {
            tracing::debug!("{}: named '{}'", self.id, name);
        }
    }

    fn emit(&self, notices: Vec<Notice>) {
        for notice in notices {
            notice.publish(self.id, &self.events);
        }
    }
}

impl fmt::Debug for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Display")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("views", &self.view_count())
            .field("active_axis", &self.active_axis())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisExtent;
    use crate::error::ViewError;
    use crate::events::events::DisplayRebuilt;
    use crate::events::typed_handler;
    use crate::test_support::{StubFactory, StubItem, StubView};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn display() -> Display {
        let factories = ViewRegistry::new().with(Arc::new(StubFactory::named("stub")));
        Display::new(factories, Arc::new(EventBus::new()), DisplaySettings::default())
    }

    fn item_a() -> Arc<StubItem> {
        StubItem::stack("a", 0.0, 10.0)
    }

    fn item_b() -> Arc<StubItem> {
        StubItem::new("b", vec![
            AxisExtent::new(Axis::X, 0.0, 63.0, 1.0),
            AxisExtent::new(Axis::Y, 0.0, 63.0, 1.0),
            AxisExtent::new(Axis::Z, 5.0, 20.0, 1.0),
            AxisExtent::new(Axis::Time, 0.0, 3.0, 1.0),
        ])
    }

    fn assert_positions_match_interval(display: &Display) {
        let mut non_planar: Vec<Axis> =
            display.axes().into_iter().filter(|a| !a.is_planar()).collect();
        non_planar.sort();
        assert_eq!(display.tracked_axes(), non_planar);
    }

    #[test]
    fn test_two_views_combine() {
        let display = display();
        display.display_item(item_a()).unwrap();
        display.display_item(item_b()).unwrap();

        assert_eq!(display.combined_extent(&Axis::Z), Some((0.0, 20.0)));
        assert_eq!(display.combined_extent(&Axis::Time), Some((0.0, 3.0)));
        assert_eq!(display.tracked_axes(), vec![Axis::Z, Axis::Time]);
        assert_eq!(display.position(&Axis::Z), 0.0);
        assert_eq!(display.position(&Axis::Time), 0.0);
        assert_eq!(display.active_axis(), Some(Axis::Z));
    }

    #[test]
    fn test_set_position_clamps_to_max() {
        let display = display();
        display.display_item(item_a()).unwrap();
        display.display_item(item_b()).unwrap();

        display.set_position(&Axis::Z, 25.0).unwrap();
        assert_eq!(display.position(&Axis::Z), 20.0);
        assert_eq!(display.position(&Axis::Z), 20.0);

        display.set_position(&Axis::Z, 7.5).unwrap();
        assert_eq!(display.position(&Axis::Z), 7.5);
    }

    #[test]
    fn test_remove_view_drops_its_axes() {
        let display = display();
        display.display_item(item_a()).unwrap();
        let b = display.display_item(item_b()).unwrap();

        display.remove_view(b).unwrap();
        assert_eq!(display.combined_extent(&Axis::Time), None);
        assert_eq!(display.tracked_axes(), vec![Axis::Z]);
        assert_eq!(
            display.set_position(&Axis::Time, 1.0),
            Err(DisplayError::AxisUnknown(Axis::Time))
        );
        assert_eq!(display.remove_view(b), Err(DisplayError::ViewNotFound(b)));
    }

    #[test]
    fn test_unknown_active_axis_rejected() {
        let display = display();
        display.display_item(item_a()).unwrap();

        let q = Axis::custom("Q");
        assert_eq!(display.set_active_axis(q.clone()), Err(DisplayError::AxisUnknown(q)));
        assert_eq!(display.set_active_axis(Axis::X), Err(DisplayError::AxisUnknown(Axis::X)));
        assert_eq!(display.active_axis(), Some(Axis::Z));
    }

    #[test]
    fn test_active_axis_change_is_synchronous() {
        let display = display();
        display.display_item(item_b()).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        display.events().subscribe::<ActiveAxisChanged>(typed_handler(move |e: &ActiveAxisChanged| {
            assert_eq!(e.axis, Axis::Time);
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        display.set_active_axis(Axis::Time).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(display.active_axis(), Some(Axis::Time));
    }

    #[test]
    fn test_position_change_is_deferred_and_reentrant() {
        let display = Arc::new(display());
        display.display_item(item_a()).unwrap();
        display.events().dispatch_pending();

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let weak = Arc::downgrade(&display);
        display.events().subscribe::<PositionChanged>(typed_handler(move |e: &PositionChanged| {
            // A handler that navigates again must not deadlock or recurse.
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(display) = weak.upgrade() {
                    display.set_position(&e.axis, 2.0).unwrap();
                }
            }
        }));

        display.set_position(&Axis::Z, 5.0).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(display.events().pending_len(), 1);

        assert_eq!(display.events().dispatch_pending(), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(display.position(&Axis::Z), 2.0);
    }

    #[test]
    fn test_visibility_per_axis() {
        let display = display();
        let a = display.display_item(item_a()).unwrap();
        let b = display.display_item(item_b()).unwrap();

        // Z = 0, T = 0: only A covers Z = 0
        assert!(display.is_visible(a));
        assert!(!display.is_visible(b));

        display.set_position(&Axis::Z, 8.0).unwrap();
        assert!(display.is_visible(a));
        assert!(display.is_visible(b));

        // A lacks Time, so it is only visible at T == 0
        display.set_position(&Axis::Time, 1.0).unwrap();
        assert!(!display.is_visible(a));
        assert!(display.is_visible(b));
        assert_eq!(display.visible_views(), vec![b]);

        assert!(!display.is_visible(ViewHandle::new()));
    }

    #[test]
    fn test_view_without_common_axes_visible_only_at_zero() {
        let display = display();
        let time_only = StubItem::new("t", vec![AxisExtent::new(Axis::Time, 1.0, 4.0, 1.0)]);
        display.display_item(time_only).unwrap();
        let lonely = display
            .display_item(StubItem::new("c", vec![AxisExtent::new(Axis::Channel, -2.0, 2.0, 1.0)]))
            .unwrap();
        // Channel seeds at -2; Time seeds at 1
        assert!(!display.is_visible(lonely));

        let plane_only = display
            .display_item(StubItem::new("p", vec![AxisExtent::new(Axis::X, 0.0, 1.0, 1.0)]))
            .unwrap();
        assert!(!display.is_visible(plane_only));

        let zero_display = self::display();
        let time_only = StubItem::new("t", vec![AxisExtent::new(Axis::Time, 0.0, 4.0, 1.0)]);
        zero_display.display_item(time_only).unwrap();
        let plane_only = zero_display
            .display_item(StubItem::new("p", vec![AxisExtent::new(Axis::X, 0.0, 1.0, 1.0)]))
            .unwrap();
        assert!(zero_display.is_visible(plane_only));
        zero_display.set_position(&Axis::Time, 0.5).unwrap();
        assert!(!zero_display.is_visible(plane_only));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let display = display();
        display.display_item(item_a()).unwrap();
        display.display_item(item_b()).unwrap();
        display.set_position(&Axis::Time, 2.0).unwrap();

        display.rebuild();
        let first = display.snapshot();
        display.rebuild();
        let second = display.snapshot();

        assert_eq!(first, second);
        assert_eq!(display.position(&Axis::Time), 2.0);
    }

    #[test]
    fn test_prune_seed_across_add_remove_sequences() {
        let display = display();
        let mut handles = Vec::new();
        let items = [
            item_a(),
            item_b(),
            StubItem::new("c", vec![AxisExtent::new(Axis::Channel, 0.0, 2.0, 1.0)]),
            StubItem::new("q", vec![AxisExtent::new(Axis::custom("Q"), 1.0, 9.0, 1.0)]),
        ];
        for item in items.iter() {
            handles.push(display.display_item(item.clone()).unwrap());
            assert_positions_match_interval(&display);
        }
        for handle in [handles[1], handles[3], handles[0]] {
            display.remove_view(handle).unwrap();
            assert_positions_match_interval(&display);
        }
        assert_eq!(display.axes(), vec![Axis::Channel]);
        assert_eq!(display.active_axis(), Some(Axis::Channel));
    }

    #[test]
    fn test_display_name_from_first_item() {
        let display = display();
        assert_eq!(display.name(), None);
        display.display_item(item_a()).unwrap();
        display.display_item(item_b()).unwrap();
        assert_eq!(display.name(), Some("a".to_string()));
    }

    #[test]
    fn test_no_compatible_view_leaves_display_unchanged() {
        let only_a = StubFactory::named("only-a").accepting("a");
        let factories = ViewRegistry::new().with(Arc::new(only_a));
        let display =
            Display::new(factories, Arc::new(EventBus::new()), DisplaySettings::default());

        let err = display.display_item(item_b()).unwrap_err();
        assert_eq!(err, DisplayError::NoCompatibleView { item: "b".to_string() });
        assert_eq!(display.view_count(), 0);
        assert_eq!(display.name(), None);
    }

    #[test]
    fn test_update_propagates_positions_inside_view_extent() {
        let display = display();
        let a = display.display_item(item_a()).unwrap();
        let b = display.display_item(item_b()).unwrap();

        display.set_position(&Axis::Z, 10.5).unwrap();
        display.update();
        // A covers [0, 10], so 10.5 < 10 + 1 still propagates; B covers [5, 20]
        let own = |handle| display.with_view(handle, |v| v.own_position(&Axis::Z)).unwrap();
        assert_eq!(own(a), 10.5);
        assert_eq!(own(b), 10.5);

        display.set_position(&Axis::Z, 15.0).unwrap();
        display.update();
        assert_eq!(own(a), 10.5);
        assert_eq!(own(b), 15.0);

        // Below B's minimum: A follows, B keeps its last position
        display.set_position(&Axis::Z, 2.0).unwrap();
        display.update();
        assert_eq!(own(a), 2.0);
        assert_eq!(own(b), 15.0);

        // A never receives a Time position
        assert_eq!(display.with_view(a, |v| v.own_position(&Axis::Time)), Some(0.0));
    }

    #[test]
    fn test_query_inside_with_view_while_rebuild_waits() {
        let display = Arc::new(display());
        let handle = display.display_item(item_a()).unwrap();
        let (done, finished) = std::sync::mpsc::channel();

        let reader = display.clone();
        std::thread::spawn(move || {
            let result = reader.with_view(handle, |_| {
                let writer = reader.clone();
                let rebuild = std::thread::spawn(move || {
                    writer.rebuild();
                });
                // Let the rebuild queue up for the write lock
                std::thread::sleep(std::time::Duration::from_millis(100));
                (reader.position(&Axis::Z), reader.is_visible(handle), rebuild)
            });
            if let Some((position, visible, rebuild)) = result {
                let _ = done.send((position, visible));
                let _ = rebuild.join();
            }
        });

        let (position, visible) = finished
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("query inside with_view blocked behind rebuild");
        assert_eq!(position, 0.0);
        assert!(visible);
    }

    #[test]
    fn test_update_picks_up_cropped_item() {
        let display = display();
        let item = item_a();
        display.display_item(item.clone()).unwrap();
        display.set_position(&Axis::Z, 9.0).unwrap();

        item.set_axes(vec![
            AxisExtent::new(Axis::X, 0.0, 63.0, 1.0),
            AxisExtent::new(Axis::Y, 0.0, 63.0, 1.0),
            AxisExtent::new(Axis::Z, 0.0, 4.0, 1.0),
        ]);
        display.update();

        assert_eq!(display.combined_extent(&Axis::Z), Some((0.0, 4.0)));
        assert_eq!(display.position(&Axis::Z), 4.0);
    }

    #[test]
    fn test_update_escalates_to_rebuild_on_new_axis() {
        let display = display();
        let item = item_a();
        let handle = display.display_item(item.clone()).unwrap();
        let rebuilds = |display: &Display| {
            display.with_view(handle, |v| v.as_any().downcast_ref::<StubView>().unwrap().rebuilds)
        };
        let rebuilds_before = rebuilds(&display);

        let mut axes = item.current_axes();
        axes.push(AxisExtent::new(Axis::Channel, 0.0, 2.0, 1.0));
        item.set_axes(axes);
        display.update();

        assert_eq!(display.tracked_axes(), vec![Axis::Z, Axis::Channel]);
        let rebuilds_after = rebuilds(&display);
        assert_eq!(rebuilds_after, rebuilds_before.map(|n| n + 1));
    }

    #[test]
    fn test_view_failure_does_not_abort_pass() {
        let display = display();
        let bad = item_a();
        let a = display.display_item(bad.clone()).unwrap();
        let b = display.display_item(item_b()).unwrap();
        bad.set_failing(true);

        let report = display.rebuild();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].view, a);
        let rebuilds = display.with_view(b, |v| {
            v.as_any().downcast_ref::<StubView>().unwrap().rebuilds
        });
        assert_eq!(rebuilds, Some(2));
        assert_eq!(display.combined_extent(&Axis::Z), Some((0.0, 20.0)));

        let report = display.update();
        assert_eq!(report.failures.len(), 1);
        assert!(!report.is_ok());
    }

    #[test]
    fn test_non_finite_extent_reported_per_view() {
        let display = display();
        display.display_item(item_a()).unwrap();
        let broken = display
            .display_item(StubItem::new("broken", vec![
                AxisExtent::new(Axis::X, 0.0, 63.0, 1.0),
                AxisExtent::new(Axis::Y, 0.0, 63.0, 1.0),
                AxisExtent::new(Axis::Time, 0.0, f64::NAN, 1.0),
            ]))
            .unwrap();

        let expected = vec![ViewFailure {
            view: broken,
            error: ViewError::InvalidExtent(Axis::Time),
        }];
        assert_eq!(display.rebuild().failures, expected);
        assert_eq!(display.combined_extent(&Axis::Time), None);
        assert_eq!(display.update().failures, expected);
    }

    #[test]
    fn test_teardown_disposes_and_is_idempotent() {
        let factory = StubFactory::named("stub");
        let disposed = factory.disposed.clone();
        let display = Display::new(
            ViewRegistry::new().with(Arc::new(factory)),
            Arc::new(EventBus::new()),
            DisplaySettings::default(),
        );
        display.display_item(item_a()).unwrap();
        display.display_item(item_b()).unwrap();

        display.teardown();
        display.teardown();
        assert_eq!(disposed.load(Ordering::SeqCst), 2);
        assert_eq!(display.view_count(), 0);
        assert!(display.axes().is_empty());
        assert!(display.tracked_axes().is_empty());
        assert_eq!(display.active_axis(), None);
    }

    #[test]
    fn test_step_navigation() {
        let display = display();
        display.display_item(item_a()).unwrap();

        display.next(&Axis::Z).unwrap();
        display.next(&Axis::Z).unwrap();
        assert_eq!(display.position(&Axis::Z), 2.0);
        display.previous(&Axis::Z).unwrap();
        assert_eq!(display.position(&Axis::Z), 1.0);
        display.advance(&Axis::Z, 50).unwrap();
        assert_eq!(display.position(&Axis::Z), 10.0);
        display.advance(&Axis::Z, -3).unwrap();
        assert_eq!(display.position(&Axis::Z), 7.0);
        assert!(display.next(&Axis::Time).is_err());
    }

    #[test]
    fn test_plane_extents_and_membership() {
        let display = display();
        assert_eq!(display.plane_extents(), None);
        assert_eq!(display.active_view(), None);

        let item = item_a();
        let a = display.display_item(item.clone()).unwrap();
        display.display_item(item_b()).unwrap();

        assert_eq!(
            display.plane_extents(),
            Some(PlaneExtents { x: 0.0, y: 0.0, width: 63.0, height: 63.0 })
        );
        assert_eq!(display.active_view(), Some(a));
        assert!(display.is_displaying(item.id()));
        assert!(!display.is_displaying(ItemId::new()));
    }

    #[test]
    fn test_rebuild_publishes_after_unlock() {
        let display = Arc::new(display());
        let weak = Arc::downgrade(&display);
        let observed = Arc::new(AtomicUsize::new(0));
        let counter = observed.clone();
        display.events().subscribe::<DisplayRebuilt>(typed_handler(move |_: &DisplayRebuilt| {
            // Reading the display from a synchronous handler must not deadlock.
            if let Some(display) = weak.upgrade() {
                counter.store(display.view_count(), Ordering::SeqCst);
            }
        }));

        display.display_item(item_a()).unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let display = display();
        display.display_item(item_b()).unwrap();
        let json = serde_json::to_value(display.snapshot()).unwrap();

        assert_eq!(json["name"], "b");
        assert_eq!(json["active_axis"], "Z");
        assert_eq!(json["axes"].as_array().unwrap().len(), 4);
        assert!(json["axes"][0]["position"].is_null());
    }
}
