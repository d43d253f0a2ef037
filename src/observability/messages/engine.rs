// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for context lifecycle and dispatch events.
//!
//! This module contains message types for logging events related to:
//! * Context creation
//! * Handler dispatch and failure
//! * Deferred completions
//! * Dispatch limits and runtime availability

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A new context was created from a workflow.
///
/// # Log Level
/// `debug!` - Lifecycle detail
///
/// # Example
/// ```
/// use the_junction::observability::messages::engine::ContextCreated;
///
/// let msg = ContextCreated {
///     join_specs: 3,
///     version: "9c1d",
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct ContextCreated<'a> {
    pub join_specs: usize,
    pub version: &'a str,
}

impl Display for ContextCreated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Created workflow context: {} join-specs, version {}",
            self.join_specs, self.version
        )
    }
}

impl StructuredLog for ContextCreated<'_> {
    fn log(&self) {
        tracing::debug!(
            join_specs = self.join_specs,
            version = self.version,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "context",
            span_name = name,
            join_specs = self.join_specs,
            version = self.version,
        )
    }
}

/// A join-spec was satisfied and its handler is about to run.
///
/// # Log Level
/// `debug!` - High-volume dispatch detail
///
/// # Example
/// ```
/// use the_junction::observability::messages::engine::HandlerDispatched;
///
/// let msg = HandlerDispatched {
///     handler: "summarize",
///     node: 7,
///     parent: 2,
///     inputs: 2,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct HandlerDispatched<'a> {
    pub handler: &'a str,
    pub node: u64,
    pub parent: u64,
    pub inputs: usize,
}

impl Display for HandlerDispatched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatching handler '{}' as node {} (parent {}) with {} input(s)",
            self.handler, self.node, self.parent, self.inputs
        )
    }
}

impl StructuredLog for HandlerDispatched<'_> {
    fn log(&self) {
        tracing::debug!(
            handler = self.handler,
            node = self.node,
            parent = self.parent,
            inputs = self.inputs,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "dispatch",
            span_name = name,
            handler = self.handler,
            node = self.node,
            parent = self.parent,
        )
    }
}

/// A handler failed synchronously; its token (or the root's) is cancelled.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_junction::observability::messages::engine::HandlerFailed;
///
/// let error = anyhow::anyhow!("bad input");
/// let msg = HandlerFailed {
///     handler: "parse",
///     node: 4,
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct HandlerFailed<'a> {
    pub handler: &'a str,
    pub node: u64,
    pub error: &'a anyhow::Error,
}

impl Display for HandlerFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Handler '{}' (node {}) failed: {:#}",
            self.handler, self.node, self.error
        )
    }
}

impl StructuredLog for HandlerFailed<'_> {
    fn log(&self) {
        tracing::error!(
            handler = self.handler,
            node = self.node,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "handler_failed",
            span_name = name,
            handler = self.handler,
            node = self.node,
        )
    }
}

/// The root was cancelled by a failure and nobody holds its signal.
///
/// # Log Level
/// `error!` - Failure that would otherwise go unnoticed
pub struct UnobservedFailure<'a> {
    pub handler: &'a str,
    pub error: &'a anyhow::Error,
}

impl Display for UnobservedFailure<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Unobserved workflow failure from handler '{}': {:#}",
            self.handler, self.error
        )
    }
}

impl StructuredLog for UnobservedFailure<'_> {
    fn log(&self) {
        tracing::error!(handler = self.handler, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("unobserved_failure", span_name = name, handler = self.handler)
    }
}

/// A deferred handler completed with an error nobody awaited.
///
/// # Log Level
/// `error!` - Failure that would otherwise go unnoticed
pub struct DeferredCompletionFailed<'a> {
    pub handler: &'a str,
    pub node: u64,
    pub error: &'a anyhow::Error,
}

impl Display for DeferredCompletionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Deferred completion of handler '{}' (node {}) failed: {:#}",
            self.handler, self.node, self.error
        )
    }
}

impl StructuredLog for DeferredCompletionFailed<'_> {
    fn log(&self) {
        tracing::error!(
            handler = self.handler,
            node = self.node,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "deferred_failed",
            span_name = name,
            handler = self.handler,
            node = self.node,
        )
    }
}

/// A dispatch ran more consecutive match rounds than allowed and stopped.
///
/// # Log Level
/// `error!` - Likely a synchronous handler cycle
pub struct CascadeLimitReached {
    pub limit: usize,
    pub pending: usize,
}

impl Display for CascadeLimitReached {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatch stopped after {} rounds with {} event(s) still queued; a synchronous handler cycle is likely",
            self.limit, self.pending
        )
    }
}

impl StructuredLog for CascadeLimitReached {
    fn log(&self) {
        tracing::error!(limit = self.limit, pending = self.pending, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "cascade_limit",
            span_name = name,
            limit = self.limit,
            pending = self.pending,
        )
    }
}
