// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Join-dispatch scheduler.
//!
//! A [`Workflow`] holds join-specs; each [`WorkflowContext`] created from it
//! owns a queue and a tree of handler invocations. Sending an event appends
//! it to the queue and runs matching to a fixed point.

mod context;
mod handler;
mod handler_context;
mod join;
mod node;
mod scheduler;
mod stream;
mod workflow;

#[cfg(test)]
mod integration_tests;

pub use context::WorkflowContext;
pub use handler::{DeferredResult, Handler, HandlerFn, HandlerId, HandlerOutput, HandlerResult};
pub use handler_context::{HandlerContext, InvocationCompletion, Signal};
pub use join::JoinSpec;
pub use node::{CompletionResult, NodeId, NodeStatus};
pub use stream::EventStream;
pub use workflow::Workflow;
