// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::kind::EventKind;

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Monotonically issued handle of an [`Event`].
///
/// Ids are unique per process and increase in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

struct EventInner {
    id: EventId,
    kind: EventKind,
    payload: Value,
}

/// One identity-unique occurrence of an [`EventKind`].
///
/// Events are immutable and cheap to clone. The producing invocation is not
/// stored here; each context keeps its own producer table keyed by [`EventId`].
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    pub(crate) fn new(kind: EventKind, payload: Value) -> Self {
        Self {
            inner: Arc::new(EventInner {
                id: EventId(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed)),
                kind,
                payload,
            }),
        }
    }

    pub fn id(&self) -> EventId {
        self.inner.id
    }

    /// The kind whose factory produced this event.
    pub fn kind(&self) -> &EventKind {
        &self.inner.kind
    }

    pub fn payload(&self) -> &Value {
        &self.inner.payload
    }

    /// Deserialize the payload into `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.inner.payload)
    }

    /// Shorthand for `kind.recognizes(self)`.
    pub fn is(&self, kind: &EventKind) -> bool {
        kind.recognizes(self)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.inner.id.0)
            .field("kind", &self.inner.kind.to_string())
            .field("payload", &self.inner.payload)
            .finish()
    }
}
