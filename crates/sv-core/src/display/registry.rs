//! Display registry - the set of live displays and the active one
//!
//! Callers hold the registry as an explicit handle; there is no process-wide
//! "current display".

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::axis::Axis;
use crate::events::EventBus;
use crate::settings::DisplaySettings;
use crate::view::{ViewHandle, ViewRegistry};
use crate::worker::{DisplayWorker, ItemEvent};

use super::{Display, DisplayId};

/// Owns every display created through it
pub struct DisplayRegistry {
    displays: RwLock<IndexMap<DisplayId, Arc<Display>>>,
    active: RwLock<Option<DisplayId>>,
    factories: ViewRegistry,
    events: Arc<EventBus>,
    settings: DisplaySettings,
    worker: DisplayWorker,
    delivery: JoinHandle<()>,
}

impl DisplayRegistry {
    /// Create a registry. Displays share its factories, event bus and settings.
    ///
    /// Deferred events on the shared bus are delivered by a task on `worker`.
    pub fn new(
        factories: ViewRegistry,
        settings: DisplaySettings,
        worker: DisplayWorker,
    ) -> Arc<Self> {
        let events = Arc::new(EventBus::new());
        let delivery = worker.deliver_events(&events);
        Arc::new(Self {
            displays: RwLock::new(IndexMap::new()),
            active: RwLock::new(None),
            factories,
            events,
            settings,
            worker,
            delivery,
        })
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn settings(&self) -> &DisplaySettings {
        &self.settings
    }

    /// Create an empty display and make it the active one
    pub fn create_display(self: &Arc<Self>) -> Arc<Display> {
        let display = Arc::new(
            Display::new(self.factories.clone(), self.events.clone(), self.settings.clone())
                .with_registry(Arc::downgrade(self)),
        );
        let id = display.id();
        self.displays.write().insert(id, display.clone());
        *self.active.write() = Some(id);
        tracing::info!("Created {}", id);
        display
    }

    pub fn display(&self, id: DisplayId) -> Option<Arc<Display>> {
        self.displays.read().get(&id).cloned()
    }

    /// All displays in creation order
    pub fn displays(&self) -> Vec<Arc<Display>> {
        self.displays.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.displays.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.displays.read().is_empty()
    }

    /// Make `id` the active display. Returns false for unknown ids.
    pub fn set_active_display(&self, id: DisplayId) -> bool {
        if !self.displays.read().contains_key(&id) {
            return false;
        }
        *self.active.write() = Some(id);
        true
    }

    pub fn active_display(&self) -> Option<Arc<Display>> {
        let id = (*self.active.read())?;
        self.display(id)
    }

    /// Clamped position along `axis` in the active display
    pub fn active_position(&self, axis: &Axis) -> Option<f64> {
        self.active_display().map(|active| active.position(axis))
    }

    /// The active view of the active display
    pub fn active_view(&self) -> Option<(Arc<Display>, ViewHandle)> {
        let active = self.active_display()?;
        let view = active.active_view()?;
        Some((active, view))
    }

    /// Remove a display and tear it down
    pub fn remove_display(&self, id: DisplayId) -> Option<Arc<Display>> {
        let removed = self.displays.write().shift_remove(&id);
        {
            let mut active = self.active.write();
            if *active == Some(id) {
                *active = None;
            }
        }
        // Torn down outside the registry lock: teardown takes the display lock.
        if let Some(display) = &removed {
            display.teardown();
            tracing::info!("Removed {}", id);
        }
        removed
    }

    /// Whether no display is currently called `name`
    pub fn is_unique_name(&self, name: &str) -> bool {
        name_is_free(&self.displays.read(), name)
    }

    /// `proposed`, or `proposed{sep}{n}` for the smallest `n` not taken
    pub fn unique_name(&self, proposed: &str, separator: &str) -> String {
        free_name(&self.displays.read(), proposed, separator)
    }

    /// Name an unnamed `display` after `proposed`, de-duplicated against the
    /// other displays. The check and the assignment happen under the
    /// registry's write lock, so concurrent claims never share a name.
    pub(crate) fn claim_name(
        &self,
        display: &Display,
        proposed: &str,
        separator: &str,
    ) -> Option<String> {
        let displays = self.displays.write();
        if display.name().is_some() {
            return None;
        }
        let name = free_name(&displays, proposed, separator);
        display.set_name(name.clone());
        Some(name)
    }

    /// Route an item notification to every display showing the item.
    ///
    /// Restructures run on the worker; the returned handles complete when
    /// each display has rebuilt.
    pub fn notify_item(&self, event: ItemEvent) -> Vec<JoinHandle<()>> {
        self.displays()
            .iter()
            .filter_map(|display| self.worker.handle_item_event(display, event))
            .collect()
    }

    /// Tear down and forget every display
    pub fn clear(&self) {
        let displays: Vec<Arc<Display>> = self.displays.write().drain(..).map(|(_, d)| d).collect();
        *self.active.write() = None;
        for display in displays {
            display.teardown();
        }
    }
}

impl Drop for DisplayRegistry {
    fn drop(&mut self) {
        self.delivery.abort();
    }
}

fn name_is_free(displays: &IndexMap<DisplayId, Arc<Display>>, name: &str) -> bool {
    displays.values().all(|shown| shown.name().as_deref() != Some(name))
}

fn free_name(
    displays: &IndexMap<DisplayId, Arc<Display>>,
    proposed: &str,
    separator: &str,
) -> String {
    let mut name = proposed.to_string();
    let mut n = 0;
    while !name_is_free(displays, &name) {
        n += 1;
        name = format!("{}{}{}", proposed, separator, n);
    }
    name
}

impl std::fmt::Debug for DisplayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayRegistry")
            .field("displays", &self.len())
            .field("active", &*self.active.read())
            .field("factories", &self.factories)
            .finish()
    }
}
