use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use ahash::AHashMap;
use tokio::sync::Notify;

/// Event bus shared by displays and their observers.
///
/// Events are either delivered immediately with [`EventBus::publish`] or
/// queued with [`EventBus::publish_later`] and delivered by the next
/// [`EventBus::dispatch_pending`]. Queued events are normally drained by a
/// delivery task (see [`crate::DisplayWorker::deliver_events`]) woken through
/// [`EventBus::pending_signal`]. No lock is held while a handler runs, so
/// handlers may publish, queue or subscribe from inside a callback.
pub struct EventBus {
    handlers: RwLock<AHashMap<TypeId, Vec<Arc<dyn EventHandler>>>>,
    pending: Mutex<VecDeque<(TypeId, Box<dyn Event>)>>,
    signal: Arc<Notify>,
}

/// Event trait that all events must implement
pub trait Event: Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

/// Handler trait for event handlers
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &dyn Event);
}

/// Display events
pub mod events {
    use super::Event;
    use crate::axis::Axis;
    use crate::display::DisplayId;
    use crate::view::ViewHandle;

    /// A tracked axis position changed. Always delivered deferred.
    #[derive(Debug, Clone, PartialEq)]
    pub struct PositionChanged {
        pub display: DisplayId,
        pub axis: Axis,
    }

    /// The active axis changed. Always delivered synchronously.
    #[derive(Debug, Clone, PartialEq)]
    pub struct ActiveAxisChanged {
        pub display: DisplayId,
        pub axis: Axis,
    }

    /// View added to a display
    #[derive(Debug, Clone, PartialEq)]
    pub struct ViewAdded {
        pub display: DisplayId,
        pub view: ViewHandle,
        pub view_type: String,
    }

    /// View removed from a display
    #[derive(Debug, Clone, PartialEq)]
    pub struct ViewRemoved {
        pub display: DisplayId,
        pub view: ViewHandle,
    }

    /// A view's rebuild or update failed
    #[derive(Debug, Clone, PartialEq)]
    pub struct ViewFailed {
        pub display: DisplayId,
        pub view: ViewHandle,
        pub message: String,
    }

    /// A display finished a structural rebuild
    #[derive(Debug, Clone, PartialEq)]
    pub struct DisplayRebuilt {
        pub display: DisplayId,
    }

    // Implement Event trait for all event types
    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {
                    fn as_any(&self) -> &dyn std::any::Any {
                        self
                    }
                }
            )*
        }
    }

    impl_event!(
        PositionChanged,
        ActiveAxisChanged,
        ViewAdded,
        ViewRemoved,
        ViewFailed,
        DisplayRebuilt
    );
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(AHashMap::new()),
            pending: Mutex::new(VecDeque::new()),
            signal: Arc::new(Notify::new()),
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe<E: Event>(&self, handler: Arc<dyn EventHandler>) {
        let type_id = TypeId::of::<E>();
        self.handlers.write().entry(type_id).or_insert_with(Vec::new).push(handler);
    }

    /// Publish an event to its handlers before returning
    pub fn publish<E: Event>(&self, event: E) {
        self.deliver(TypeId::of::<E>(), &event);
    }

    /// Queue an event for the next [`EventBus::dispatch_pending`] and wake
    /// the delivery task, if one is running
    pub fn publish_later<E: Event>(&self, event: E) {
        self.pending.lock().push_back((TypeId::of::<E>(), Box::new(event)));
        self.signal.notify_one();
    }

    /// Notified whenever an event is queued, and once when the bus is dropped
    pub fn pending_signal(&self) -> Arc<Notify> {
        self.signal.clone()
    }

    /// Deliver queued events in FIFO order, including any queued by handlers
    /// while draining. Returns the number of events delivered.
    pub fn dispatch_pending(&self) -> usize {
        let mut delivered = 0;
        loop {
            // Pop under the lock, deliver outside it
            let next = self.pending.lock().pop_front();
            let Some((type_id, event)) = next else {
                break;
            };
            self.deliver(type_id, event.as_ref());
            delivered += 1;
        }
        delivered
    }

    /// Number of queued events
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    fn deliver(&self, type_id: TypeId, event: &dyn Event) {
        let handlers = match self.handlers.read().get(&type_id) {
            Some(handlers) => handlers.clone(),
            None => return,
        };
        for handler in handlers {
            handler.handle(event);
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        // Lets a delivery task notice the bus is gone
        self.signal.notify_one();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}

/// Helper struct for creating event handlers from closures
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: Fn(&dyn Event) + Send + Sync,
{
    fn handle(&self, event: &dyn Event) {
        (self.handler)(event);
    }
}

/// Create an event handler from a closure
pub fn handler_from_fn<F>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(&dyn Event) + Send + Sync + 'static,
{
    Arc::new(ClosureEventHandler { handler: f })
}

/// Create a handler that only sees events of type `E`
pub fn typed_handler<E, F>(f: F) -> Arc<dyn EventHandler>
where
    E: Event,
    F: Fn(&E) + Send + Sync + 'static,
{
    handler_from_fn(move |event| {
        if let Some(event) = event.as_any().downcast_ref::<E>() {
            f(event);
        }
    })
}
