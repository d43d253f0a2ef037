// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use futures::future::{BoxFuture, Shared};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::engine::Handler;
use crate::events::Event;

/// Address of a handler invocation within one context. The root is node 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Root,
    /// Returned (or is returning) synchronously.
    Done,
    /// Waiting on a deferred completion.
    Running,
    Failed,
}

/// Outcome of a deferred completion, shareable between awaiters.
pub type CompletionResult = Result<Option<Event>, Arc<anyhow::Error>>;
pub(crate) type SharedCompletion = Shared<BoxFuture<'static, CompletionResult>>;

#[derive(Clone)]
pub(crate) struct Completion {
    pub future: SharedCompletion,
    pub observed: Arc<AtomicBool>,
}

pub(crate) struct NodeData {
    pub parent: Option<NodeId>,
    pub children: BTreeSet<NodeId>,
    pub handler: Option<Handler>,
    pub inputs: Vec<Event>,
    /// Events this node sent, with their context-wide sequence number.
    pub emitted: Vec<(u64, Event)>,
    pub token: Option<CancellationToken>,
    pub cancel_reason: Option<Arc<anyhow::Error>>,
    pub status: NodeStatus,
    pub completion: Option<Completion>,
}

impl NodeData {
    pub fn root() -> Self {
        Self {
            parent: None,
            children: BTreeSet::new(),
            handler: None,
            inputs: Vec::new(),
            emitted: Vec::new(),
            token: None,
            cancel_reason: None,
            status: NodeStatus::Root,
            completion: None,
        }
    }

    pub fn invocation(parent: NodeId, handler: Handler, inputs: Vec<Event>) -> Self {
        Self {
            parent: Some(parent),
            handler: Some(handler),
            inputs,
            status: NodeStatus::Done,
            ..Self::root()
        }
    }

    pub fn handler_name(&self) -> &str {
        self.handler.as_ref().map(|h| h.name()).unwrap_or("root")
    }
}
