//! In-process publish/subscribe event bus.
//!
//! Subsystems never call each other directly: they emit named events here
//! and subscribe to the ones they care about. Dispatch is synchronous and
//! follows registration order.
//!
//! # Listener keys
//!
//! Listeners are registered under `name` or `name.namespace`. Namespaces only
//! partition listeners for bulk removal: `emit("name")` always reaches every
//! listener of `name`, whatever its namespace.
//!
//! # Dispatch rules
//!
//! - `emit` copies the listener list before the first handler runs, so a
//!   listener added by a handler waits for the next emission.
//! - A listener removed mid-emission (by itself or by another handler) is
//!   skipped if it has not run yet.
//! - A handler that returns an error or panics is logged; the remaining
//!   handlers still run.
//! - No lock is held while a handler runs, so handlers may freely call
//!   `on`, `off` and `emit` on the same bus.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::ShellError;
use crate::event::{EventKey, Payload, encode};

/// Result returned by every event handler.
pub type HandlerResult = Result<(), ShellError>;

type Handler = dyn Fn(&Payload) -> HandlerResult + Send + Sync;

/// Identifies one registered listener; pass it to [`EventBus::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

struct Listener {
    id: ListenerId,
    namespace: Option<String>,
    handler: Box<Handler>,
    live: AtomicBool,
}

impl Listener {
    fn matches(&self, namespace: Option<&str>, id: Option<ListenerId>) -> bool {
        namespace.is_none_or(|ns| self.namespace.as_deref() == Some(ns))
            && id.is_none_or(|id| self.id == id)
    }
}

#[derive(Default)]
struct BusInner {
    listeners: Mutex<BTreeMap<String, Vec<Arc<Listener>>>>,
    next_id: AtomicU64,
}

/// Cheaply clonable handle to a shared event bus.
///
/// Clones share the same listener table.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.event_names())
            .field("listeners", &self.listener_count(None))
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, BTreeMap<String, Vec<Arc<Listener>>>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn insert(&self, key: &str, id: ListenerId, handler: Box<Handler>) {
        let key = EventKey::parse(key);
        let listener = Arc::new(Listener {
            id,
            namespace: key.namespace.map(str::to_owned),
            handler,
            live: AtomicBool::new(true),
        });
        self.listeners()
            .entry(key.name.to_owned())
            .or_default()
            .push(listener);
        debug!(event = key.name, namespace = ?key.namespace, listener = %id, "listener registered");
    }

    /// Registers `handler` for `key` (`name` or `name.namespace`).
    ///
    /// Several handlers may listen to the same name; they fire in
    /// registration order.
    pub fn on<F>(&self, key: &str, handler: F) -> ListenerId
    where
        F: Fn(&Payload) -> HandlerResult + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.insert(key, id, Box::new(handler));
        id
    }

    /// Registers `handler` to fire at most once.
    ///
    /// The listener unregisters itself before calling `handler`, and a latch
    /// keeps it from running twice even if `handler` re-emits the event.
    pub fn once<F>(&self, key: &str, handler: F) -> ListenerId
    where
        F: Fn(&Payload) -> HandlerResult + Send + Sync + 'static,
    {
        let id = self.next_id();
        let name = EventKey::parse(key).name.to_owned();
        let bus = Arc::downgrade(&self.inner);
        let fired = AtomicBool::new(false);
        self.insert(
            key,
            id,
            Box::new(move |payload| {
                if fired.swap(true, Ordering::AcqRel) {
                    return Ok(());
                }
                if let Some(inner) = bus.upgrade() {
                    EventBus { inner }.remove(Some(name.as_str()), None, Some(id));
                }
                handler(payload)
            }),
        );
        id
    }

    /// Removes listeners and returns how many were removed.
    ///
    /// | key              | listener | removes                                  |
    /// |------------------|----------|------------------------------------------|
    /// | `name.ns`        | `Some`   | that listener, if it is in `ns`          |
    /// | `name.ns`        | `None`   | every `name` listener in `ns`            |
    /// | `name`           | `Some`   | that listener                            |
    /// | `name`           | `None`   | every `name` listener                    |
    /// | `.ns`            | any      | as above, across all event names         |
    ///
    /// An empty key with no listener id removes nothing; use
    /// [`clear`](Self::clear) for that.
    pub fn off(&self, key: &str, listener: Option<ListenerId>) -> usize {
        let key = EventKey::parse(key);
        if key.name.is_empty() {
            if key.namespace.is_none() && listener.is_none() {
                return 0;
            }
            return self.remove(None, key.namespace, listener);
        }
        self.remove(Some(key.name), key.namespace, listener)
    }

    fn remove(
        &self,
        name: Option<&str>,
        namespace: Option<&str>,
        id: Option<ListenerId>,
    ) -> usize {
        let mut removed = 0;
        self.listeners().retain(|event, registered| {
            if name.is_some_and(|name| name != event.as_str()) {
                return true;
            }
            registered.retain(|listener| {
                if listener.matches(namespace, id) {
                    listener.live.store(false, Ordering::Release);
                    removed += 1;
                    false
                } else {
                    true
                }
            });
            !registered.is_empty()
        });
        if removed > 0 {
            debug!(event = ?name, namespace = ?namespace, removed, "listeners removed");
        }
        removed
    }

    /// Synchronously delivers `payload` to every listener of the key's base
    /// name and returns how many handlers ran.
    pub fn emit(&self, key: &str, payload: &Payload) -> usize {
        let name = EventKey::parse(key).name;
        let snapshot = self.listeners().get(name).cloned();
        let Some(snapshot) = snapshot else {
            debug!(event = name, "event emitted with no listeners");
            return 0;
        };

        let mut invoked = 0;
        for listener in snapshot {
            if !listener.live.load(Ordering::Acquire) {
                continue;
            }
            invoked += 1;
            match panic::catch_unwind(AssertUnwindSafe(|| (listener.handler)(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(event = name, listener = %listener.id, error = %err, "event handler failed");
                }
                Err(panic) => {
                    error!(
                        event = name,
                        listener = %listener.id,
                        reason = panic_message(panic.as_ref()),
                        "event handler panicked"
                    );
                }
            }
        }
        invoked
    }

    /// Serializes `value` and emits it.
    ///
    /// # Errors
    ///
    /// Returns `ShellError::InvalidPayload` if `value` cannot be encoded; no
    /// handler runs in that case.
    pub fn publish<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<usize, ShellError> {
        let payload = encode(EventKey::parse(key).name, value)?;
        Ok(self.emit(key, &payload))
    }

    /// Number of listeners for one event name, or across all events.
    #[must_use]
    pub fn listener_count(&self, key: Option<&str>) -> usize {
        let listeners = self.listeners();
        match key {
            Some(key) => listeners
                .get(EventKey::parse(key).name)
                .map_or(0, Vec::len),
            None => listeners.values().map(Vec::len).sum(),
        }
    }

    /// Names of events that currently have listeners, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.listeners().keys().cloned().collect()
    }

    /// Removes every listener.
    pub fn clear(&self) {
        let mut listeners = self.listeners();
        for listener in listeners.values().flatten() {
            listener.live.store(false, Ordering::Release);
        }
        listeners.clear();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
