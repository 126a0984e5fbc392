//! Pub/Sub event bus between the engine and page-level callers.
//!
//! - `subscribe::<E>()` registers a callback, invoked synchronously on emit
//! - Buses built with `with_queue()` also keep emitted events until `poll()`
//!
//! Callbacks for one event type run in subscription order. A bus from
//! `new()` has no queue: events nobody subscribed to are simply dropped.

use log::warn;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Queue bound; the oldest half is dropped when reached
const MAX_QUEUE_SIZE: usize = 1000;

/// Marker trait for events
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;
type Subscribers = Arc<RwLock<HashMap<TypeId, Vec<Callback>>>>;
type Queue = Option<Arc<Mutex<Vec<BoxedEvent>>>>;

pub type BoxedEvent = Box<dyn Event>;

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Subscribers,
    queue: Queue,
}

impl EventBus {
    /// Subscribe-only bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus that also queues every event for `poll()`. The host must poll
    /// regularly; the queue is bounded and drops its oldest half when full.
    pub fn with_queue() -> Self {
        Self {
            subscribers: Subscribers::default(),
            queue: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    pub fn is_queued(&self) -> bool {
        self.queue.is_some()
    }

    /// Subscribe to events of type E.
    ///
    /// # Example
    /// ```ignore
    /// bus.subscribe::<InitialLoadProgress, _>(|e| println!("{:.0}%", e.percent));
    /// ```
    pub fn subscribe<E, F>(&self, callback: F)
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(TypeId::of::<E>())
            .or_default()
            .push(wrapped);
    }

    pub fn emit<E: Event>(&self, event: E) {
        dispatch(&self.subscribers, &self.queue, event);
    }

    /// Take all queued events (always empty without a queue)
    pub fn poll(&self) -> Vec<BoxedEvent> {
        match &self.queue {
            Some(queue) => std::mem::take(&mut *queue.lock().unwrap_or_else(|e| e.into_inner())),
            None => Vec::new(),
        }
    }

    /// Emitter handle for the engine
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            subscribers: Arc::clone(&self.subscribers),
            queue: self.queue.clone(),
        }
    }

    pub fn unsubscribe_all<E: Event>(&self) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&TypeId::of::<E>());
    }

    pub fn queue_len(&self) -> usize {
        self.queue
            .as_ref()
            .map_or(0, |q| q.lock().unwrap_or_else(|e| e.into_inner()).len())
    }
}

fn dispatch<E: Event>(subscribers: &Subscribers, queue: &Queue, event: E) {
    // Clone callbacks out so a callback may subscribe without deadlocking
    let callbacks = subscribers
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(&TypeId::of::<E>())
        .cloned()
        .unwrap_or_default();
    for cb in &callbacks {
        cb(&event);
    }

    let Some(queue) = queue else {
        return;
    };
    let mut queue = queue.lock().unwrap_or_else(|e| e.into_inner());
    if queue.len() >= MAX_QUEUE_SIZE {
        let evict = queue.len() / 2;
        warn!("Event queue full ({} events), dropping oldest {}", queue.len(), evict);
        queue.drain(0..evict);
    }
    queue.push(Box::new(event));
}

/// Cloneable emit-only handle
#[derive(Clone)]
pub struct EventEmitter {
    subscribers: Subscribers,
    queue: Queue,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscriber_types", &self.subscribers.read().map(|s| s.len()).unwrap_or(0))
            .finish()
    }
}

impl EventEmitter {
    pub fn emit<E: Event>(&self, event: E) {
        dispatch(&self.subscribers, &self.queue, event);
    }
}

/// Emitter owned by a controller; detached (no-op) after teardown
#[derive(Clone, Default, Debug)]
pub struct SequenceEmitter {
    inner: Option<EventEmitter>,
}

impl SequenceEmitter {
    /// No-op emitter
    pub fn dummy() -> Self {
        Self { inner: None }
    }

    pub fn from_emitter(emitter: EventEmitter) -> Self {
        Self { inner: Some(emitter) }
    }

    pub fn is_attached(&self) -> bool {
        self.inner.is_some()
    }

    pub fn detach(&mut self) {
        self.inner = None;
    }

    pub fn emit<E: Event>(&self, event: E) {
        if let Some(emitter) = &self.inner {
            emitter.emit(event);
        }
    }
}

/// Downcast a polled event.
///
/// Derefs to `dyn Event` first; calling `as_any()` on the Box itself would
/// hit the blanket impl and yield the Box, not the event.
#[inline]
pub fn downcast_event<E: Event>(event: &BoxedEvent) -> Option<&E> {
    (**event).as_any().downcast_ref::<E>()
}
