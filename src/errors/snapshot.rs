// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::Duration;
use thiserror::Error;

/// Errors from the snapshot/resume subsystem.
///
/// Double snapshots and unknown kind counters are hard failures. Sends that
/// arrive after a context was locked are not errors; they are logged.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// `snapshot()` was already called on this context.
    #[error("Context has already been snapshotted; a context can be snapshotted at most once")]
    AlreadySnapshotted,

    /// `request()` was called from a context created without snapshot support.
    #[error("Context was not created by a SnapshotWorkflow; request() is unavailable")]
    NotSnapshotEnabled,

    /// A counter in the snapshot does not name any kind of the resuming workflow.
    #[error("Snapshot refers to event kind counter {counter}, which this workflow does not define")]
    MissingKind { counter: u32 },

    /// A kind passed to `request()` is not handled by this workflow, so an
    /// answer for it could never be replayed.
    #[error("Requested event kind '{kind}' is not registered with any handler")]
    UnregisteredRequest { kind: String },

    /// More answers were supplied than the snapshot has outstanding requests.
    #[error("Answer {index} has no matching request; the snapshot awaits {requested} answer(s)")]
    UnexpectedAnswer { index: usize, requested: usize },

    /// The workflow definition changed between snapshot and resume.
    #[error("Workflow version mismatch: snapshot was taken at {expected}, current workflow is {found}")]
    VersionMismatch { expected: String, found: String },

    /// In-flight deferred handlers did not settle in time.
    #[error("Timed out after {0:?} waiting for in-flight handlers to settle")]
    DrainTimeout(Duration),

    /// The opaque snapshot encoding could not be decoded.
    #[error("Invalid snapshot encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// The snapshot record could not be (de)serialized.
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
