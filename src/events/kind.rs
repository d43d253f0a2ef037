// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::event::Event;

static NEXT_KIND_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an [`EventKind`].
///
/// Kind ids are issued in creation order and are only meaningful inside the
/// current process. Snapshots refer to kinds through the per-workflow counters
/// returned by [`Workflow::kind_counter`](crate::engine::Workflow::kind_counter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KindId(pub u64);

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kind#{}", self.0)
    }
}

/// Callback fired synchronously every time an instance of a kind is made.
pub type InitCallback = Arc<dyn Fn(&Event) + Send + Sync>;

struct KindInner {
    id: KindId,
    label: Option<String>,
    /// Wrapped kinds for an any-of composite; empty for a plain kind.
    members: Vec<EventKind>,
    init_callbacks: RwLock<Vec<InitCallback>>,
}

/// Identity token defining a class of workflow events.
///
/// Cloning an `EventKind` yields another handle to the same kind. Equality and
/// hashing are by identity, never by label.
#[derive(Clone)]
pub struct EventKind {
    inner: Arc<KindInner>,
}

impl EventKind {
    /// Create an unlabelled kind.
    pub fn new() -> Self {
        Self::build(None, Vec::new())
    }

    /// Create a kind with a debug label.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self::build(Some(label.into()), Vec::new())
    }

    /// Create a composite kind recognizing instances of any wrapped kind, plus
    /// instances made from the composite itself.
    pub fn any_of(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        let members: Vec<EventKind> = kinds.into_iter().collect();
        let label = members
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(" | ");
        Self::build(Some(format!("any_of({})", label)), members)
    }

    fn build(label: Option<String>, members: Vec<EventKind>) -> Self {
        Self {
            inner: Arc::new(KindInner {
                id: KindId(NEXT_KIND_ID.fetch_add(1, Ordering::Relaxed)),
                label,
                members,
                init_callbacks: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> KindId {
        self.inner.id
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    pub fn is_composite(&self) -> bool {
        !self.inner.members.is_empty()
    }

    /// Kinds wrapped by a composite; empty for a plain kind.
    pub fn members(&self) -> &[EventKind] {
        &self.inner.members
    }

    /// Make a new, distinct instance of this kind.
    ///
    /// Every registered init callback runs synchronously before the instance
    /// is returned.
    pub fn make(&self, payload: impl Into<Value>) -> Event {
        let event = Event::new(self.clone(), payload.into());
        // Clone the list so callbacks may register further callbacks.
        let callbacks = self.inner.init_callbacks.read().clone();
        for callback in callbacks {
            callback(&event);
        }
        event
    }

    /// Make an instance from any serializable payload.
    pub fn make_typed<T: Serialize>(&self, payload: &T) -> Result<Event, serde_json::Error> {
        Ok(self.make(serde_json::to_value(payload)?))
    }

    /// Whether `event` belongs to this kind.
    ///
    /// A plain kind recognizes its own instances and instances made by any
    /// composite that includes it; a composite additionally recognizes
    /// everything its members recognize.
    pub fn recognizes(&self, event: &Event) -> bool {
        event.kind().includes(self) || self.inner.members.iter().any(|m| m.recognizes(event))
    }

    /// Register a callback fired on every future `make`.
    pub fn on_init<F>(&self, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.init_callbacks.write().push(Arc::new(callback));
    }

    /// `true` if `other` is this kind or is nested anywhere inside it.
    fn includes(&self, other: &EventKind) -> bool {
        self == other || self.inner.members.iter().any(|m| m.includes(other))
    }
}

impl Default for EventKind {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for EventKind {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for EventKind {}

impl Hash for EventKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.label {
            Some(label) => write!(f, "{}", label),
            None => write!(f, "{}", self.inner.id),
        }
    }
}

impl fmt::Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventKind")
            .field("id", &self.inner.id.0)
            .field("label", &self.inner.label)
            .field("members", &self.inner.members.len())
            .finish()
    }
}
