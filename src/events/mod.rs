// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Event identity model.
//!
//! An [`EventKind`] is an identity token that defines a class of workflow
//! events; an [`Event`] is one concrete, identity-unique occurrence of a kind
//! carrying a JSON payload. Kinds and events compare by identity only: two
//! kinds with the same label are different kinds, and two events made from the
//! same kind with equal payloads are different events.
//!
//! # Example
//! ```
//! use the_junction::events::{any_of, define_event};
//! use serde_json::json;
//!
//! let approved = define_event("approved");
//! let rejected = define_event("rejected");
//! let decided = any_of([approved.clone(), rejected.clone()]);
//!
//! let first = approved.make(json!({"by": "alice"}));
//! let second = approved.make(json!({"by": "alice"}));
//! assert_ne!(first, second);
//! assert!(approved.recognizes(&first));
//! assert!(decided.recognizes(&first));
//! assert!(!rejected.recognizes(&first));
//! ```

mod event;
mod kind;

pub use event::{Event, EventId};
pub use kind::{EventKind, InitCallback, KindId};

/// Define a new, labelled event kind.
pub fn define_event(label: impl Into<String>) -> EventKind {
    EventKind::labeled(label)
}

/// Build a composite kind that recognizes instances of any of `kinds`.
pub fn any_of(kinds: impl IntoIterator<Item = EventKind>) -> EventKind {
    EventKind::any_of(kinds)
}
