// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while building a workflow or dispatching its handlers.

use thiserror::Error;

/// Build-time and dispatch-time workflow errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    /// A join-spec must require at least one event kind.
    #[error("Handler '{handler}' was registered with an empty list of event kinds")]
    EmptyJoinSpec { handler: String },

    /// The same handler was registered twice for the same list of kinds.
    #[error("Handler '{handler}' is already registered for [{kinds}]")]
    DuplicateRegistration { handler: String, kinds: String },

    /// Two different handlers share a name; names identify handlers in the
    /// workflow version hash and in decorator metadata.
    #[error("Another handler named '{handler}' is already registered")]
    DuplicateHandlerName { handler: String },

    /// A deferred handler ran outside of any tokio runtime.
    #[error("Handler '{handler}' returned a deferred result but no tokio runtime is available")]
    MissingRuntime { handler: String },
}
