//! Worker dispatch for item notifications

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::display::Display;
use crate::events::EventBus;
use crate::view::ItemId;

/// Notification that a data item changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemEvent {
    /// The item's shape changed (axes added, removed or resized)
    Restructured(ItemId),
    /// The item's contents changed without reshaping
    Updated(ItemId),
}

impl ItemEvent {
    pub fn item(&self) -> ItemId {
        match self {
            ItemEvent::Restructured(id) | ItemEvent::Updated(id) => *id,
        }
    }
}

/// Runs restructure handling off the notifying thread
#[derive(Debug, Clone)]
pub struct DisplayWorker {
    runtime: Handle,
}

impl DisplayWorker {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Worker on the tokio runtime of the calling thread, if any
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Handle one item notification for `display`.
    ///
    /// Restructures are dispatched to a blocking task that rebuilds and
    /// updates the display under its lock; the returned handle completes when
    /// that is done. Content updates run on the calling thread. Events for
    /// items the display does not show are ignored.
    pub fn handle_item_event(
        &self,
        display: &Arc<Display>,
        event: ItemEvent,
    ) -> Option<JoinHandle<()>> {
        if !display.is_displaying(event.item()) {
            return None;
        }
        match event {
            ItemEvent::Restructured(item) => {
                let target = display.clone();
                Some(self.runtime.spawn_blocking(move || {
                    // The view may have been removed while the task was queued.
                    if !target.is_displaying(item) {
                        return;
                    }
                    let report = target.rebuild_and_update();
                    if !report.is_ok() {
                        let id = target.id();
                        let failed = report.failures.len();
                        tracing::warn!("{}: {} views failed after restructure", id, failed);
                    }
                }))
            }
            ItemEvent::Updated(_) => {
                display.update();
                None
            }
        }
    }

    /// Deliver events queued with [`EventBus::publish_later`] on this runtime.
    ///
    /// Each wake-up drains the whole queue on a blocking thread, so handlers
    /// may take display locks. The task ends once the bus is dropped.
    pub fn deliver_events(&self, events: &Arc<EventBus>) -> JoinHandle<()> {
        let signal = events.pending_signal();
        let events = Arc::downgrade(events);
        self.runtime.spawn(async move {
            loop {
                signal.notified().await;
                let Some(bus) = events.upgrade() else {
                    break;
                };
                match tokio::task::spawn_blocking(move || bus.dispatch_pending()).await {
                    Ok(delivered) => tracing::trace!("Delivered {} deferred events", delivered),
                    Err(err) => tracing::error!("Deferred event delivery failed: {}", err),
                }
            }
            tracing::debug!("Event bus dropped, delivery stopped");
        })
    }
}
