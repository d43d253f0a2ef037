// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Optional layers built on the engine's interceptor and observer hooks.
//!
//! * [`snapshot`] - suspend a context for outside input and resume it later
//! * [`state`] - attach a typed, serializable state value to a context
//! * [`decorators`] - per-handler behaviour selected by tags

pub mod decorators;
pub mod snapshot;
pub mod state;


pub use decorators::{Decorator, DecoratorId, DecoratorRegistry, NO_PARALLEL, RUN_ONCE, TRACE_SPAN};
pub use snapshot::{request, OnRequest, SnapshotContext, SnapshotData, SnapshotWorkflow};
pub use state::{state, StateSnapshot, StateStore, StatefulContext, StatefulWorkflow};
