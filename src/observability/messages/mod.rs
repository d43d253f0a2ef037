// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for human-readable output and
//! [`StructuredLog`] for emitting the same event with structured fields at
//! its documented level.
//!
//! # Organization
//!
//! * `engine` - Context creation, dispatch and failure events
//! * `snapshot` - Snapshot/resume events
//! * `decorator` - Decorator framework events
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_junction::observability::messages::engine::ContextCreated;
//!
//! let msg = ContextCreated {
//!     join_specs: 4,
//!     version: "3f2a",
//! };
//!
//! tracing::debug!("{}", msg);
//! ```

use tracing::Span;

pub mod decorator;
pub mod engine;
pub mod snapshot;

/// A message that knows its own log level and structured fields.
pub trait StructuredLog {
    /// Emit the message at its documented level.
    fn log(&self);

    /// Create a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
