// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for snapshot and resume events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A context was locked for snapshotting; new handlers become no-ops.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_junction::observability::messages::snapshot::ContextLocked;
///
/// let msg = ContextLocked { in_flight: 2 };
/// tracing::info!("{}", msg);
/// ```
pub struct ContextLocked {
    pub in_flight: usize,
}

impl Display for ContextLocked {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Context locked for snapshot; draining {} in-flight handler(s)",
            self.in_flight
        )
    }
}

impl StructuredLog for ContextLocked {
    fn log(&self) {
        tracing::info!(in_flight = self.in_flight, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("snapshot_lock", span_name = name, in_flight = self.in_flight)
    }
}

/// An event was sent into a context that is locked for snapshotting.
///
/// # Log Level
/// `warn!` - Accepted, but it only reaches the snapshot queue
pub struct SendAfterLock<'a> {
    pub kind: &'a str,
    pub event: u64,
}

impl Display for SendAfterLock<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Event {} of kind '{}' was sent after the context was locked; it will not be dispatched",
            self.event, self.kind
        )
    }
}

impl StructuredLog for SendAfterLock<'_> {
    fn log(&self) {
        tracing::warn!(kind = self.kind, event = self.event, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("send_after_lock", span_name = name, kind = self.kind)
    }
}

/// An external request was recorded against a context.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct RequestRecorded<'a> {
    pub kind: &'a str,
    pub outstanding: usize,
}

impl Display for RequestRecorded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Awaiting external event of kind '{}' ({} outstanding)",
            self.kind, self.outstanding
        )
    }
}

impl StructuredLog for RequestRecorded<'_> {
    fn log(&self) {
        tracing::debug!(kind = self.kind, outstanding = self.outstanding, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("request", span_name = name, kind = self.kind)
    }
}

/// A snapshot was captured.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_junction::observability::messages::snapshot::SnapshotCaptured;
///
/// let msg = SnapshotCaptured {
///     queued: 3,
///     unrecoverable: 0,
///     requested: 1,
///     version: "ab12",
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct SnapshotCaptured<'a> {
    pub queued: usize,
    pub unrecoverable: usize,
    pub requested: usize,
    pub version: &'a str,
}

impl Display for SnapshotCaptured<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Snapshot captured at version {}: {} queued, {} unrecoverable, {} awaited from outside",
            self.version, self.queued, self.unrecoverable, self.requested
        )
    }
}

impl StructuredLog for SnapshotCaptured<'_> {
    fn log(&self) {
        tracing::info!(
            queued = self.queued,
            unrecoverable = self.unrecoverable,
            requested = self.requested,
            version = self.version,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "snapshot",
            span_name = name,
            queued = self.queued,
            requested = self.requested,
            version = self.version,
        )
    }
}

/// Resume is proceeding although the workflow definition changed.
///
/// # Log Level
/// `warn!` - Lenient version policy in effect
pub struct VersionMismatch<'a> {
    pub expected: &'a str,
    pub found: &'a str,
}

impl Display for VersionMismatch<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Resuming snapshot taken at version {} into workflow version {}",
            self.expected, self.found
        )
    }
}

impl StructuredLog for VersionMismatch<'_> {
    fn log(&self) {
        tracing::warn!(expected = self.expected, found = self.found, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "version_mismatch",
            span_name = name,
            expected = self.expected,
            found = self.found,
        )
    }
}

/// Events of kinds no handler accepts were dropped on resume.
///
/// # Log Level
/// `warn!` - Data present in the snapshot is not replayed
pub struct UnrecoverableEventsDropped {
    pub count: usize,
}

impl Display for UnrecoverableEventsDropped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dropping {} unrecoverable event(s) whose kinds are not handled by this workflow",
            self.count
        )
    }
}

impl StructuredLog for UnrecoverableEventsDropped {
    fn log(&self) {
        tracing::warn!(count = self.count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("unrecoverable_dropped", span_name = name, count = self.count)
    }
}

/// A fresh context is being built from a snapshot.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ResumeStarted {
    pub replayed: usize,
    pub answers: usize,
}

impl Display for ResumeStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Resuming workflow: replaying {} queued event(s) and {} answer(s)",
            self.replayed, self.answers
        )
    }
}

impl StructuredLog for ResumeStarted {
    fn log(&self) {
        tracing::info!(replayed = self.replayed, answers = self.answers, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "resume",
            span_name = name,
            replayed = self.replayed,
            answers = self.answers,
        )
    }
}
