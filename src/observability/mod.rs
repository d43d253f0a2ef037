// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! This module provides centralized message types for all diagnostic and operational
//! logging throughout The Junction. Message types follow a struct-based pattern
//! with `Display` implementations so log text lives in one place and the
//! structured fields stay consistent between call sites.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - Context lifecycle, dispatch and handler failures
//! * `messages::snapshot` - Locking, capture and resume of suspended workflows
//! * `messages::decorator` - Handler decorator application
//!
//! # Usage
//!
//! ```rust
//! use the_junction::observability::messages::engine::HandlerFailed;
//! use the_junction::observability::messages::StructuredLog;
//!
//! let error = anyhow::anyhow!("tool call timed out");
//! HandlerFailed {
//!     handler: "call_tool",
//!     node: 3,
//!     error: &error,
//! }
//! .log();
//! ```

pub mod messages;
