// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the handler decorator framework.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A decorator wrapped a handler for one invocation.
///
/// # Log Level
/// `debug!` - High-volume dispatch detail
pub struct DecoratorApplied<'a> {
    pub decorator: &'a str,
    pub handler: &'a str,
}

impl Display for DecoratorApplied<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Applying decorator '{}' to handler '{}'",
            self.decorator, self.handler
        )
    }
}

impl StructuredLog for DecoratorApplied<'_> {
    fn log(&self) {
        tracing::debug!(decorator = self.decorator, handler = self.handler, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "decorator",
            span_name = name,
            decorator = self.decorator,
            handler = self.handler,
        )
    }
}

/// A handler is tagged with a decorator that is not registered.
///
/// # Log Level
/// `warn!` - Configuration problem; the tag is ignored
///
/// # Example
/// ```
/// use the_junction::observability::messages::decorator::UnknownDecorator;
///
/// let msg = UnknownDecorator {
///     decorator: "retry",
///     handler: "fetch",
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct UnknownDecorator<'a> {
    pub decorator: &'a str,
    pub handler: &'a str,
}

impl Display for UnknownDecorator<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Handler '{}' is tagged with unknown decorator '{}'; ignoring it",
            self.handler, self.decorator
        )
    }
}

impl StructuredLog for UnknownDecorator<'_> {
    fn log(&self) {
        tracing::warn!(decorator = self.decorator, handler = self.handler, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "unknown_decorator",
            span_name = name,
            decorator = self.decorator,
            handler = self.handler,
        )
    }
}

/// A no-parallel handler is queued behind earlier invocations.
///
/// # Log Level
/// `debug!` - Scheduling detail
pub struct AwaitingSerialization<'a> {
    pub handler: &'a str,
    pub node: u64,
    pub ahead: usize,
}

impl Display for AwaitingSerialization<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Handler '{}' (node {}) waits for {} earlier invocation(s)",
            self.handler, self.node, self.ahead
        )
    }
}

impl StructuredLog for AwaitingSerialization<'_> {
    fn log(&self) {
        tracing::debug!(
            handler = self.handler,
            node = self.node,
            ahead = self.ahead,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "no_parallel",
            span_name = name,
            handler = self.handler,
            node = self.node,
        )
    }
}

/// A run-once handler was skipped because it already ran in this context.
///
/// # Log Level
/// `debug!` - Scheduling detail
pub struct RunOnceSkipped<'a> {
    pub handler: &'a str,
}

impl Display for RunOnceSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Handler '{}' already ran in this context; skipping", self.handler)
    }
}

impl StructuredLog for RunOnceSkipped<'_> {
    fn log(&self) {
        tracing::debug!(handler = self.handler, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("run_once", span_name = name, handler = self.handler)
    }
}
