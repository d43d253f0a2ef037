// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::any::Any;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::engine::context::ContextShared;
use crate::engine::node::{Completion, CompletionResult};
use crate::engine::{EventStream, HandlerId, NodeId, WorkflowContext};
use crate::events::Event;

/// Handle passed to every handler invocation.
///
/// Replaces ambient "current context" lookups: sends made through it are
/// attributed to this invocation, and its stream and signal are scoped to
/// this invocation's subtree.
#[derive(Clone)]
pub struct HandlerContext {
    shared: Arc<ContextShared>,
    node: NodeId,
}

impl HandlerContext {
    pub(crate) fn new(shared: Arc<ContextShared>, node: NodeId) -> Self {
        Self { shared, node }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.shared.parent_of(self.node)
    }

    pub fn send_event(&self, event: Event) {
        self.shared.send_from(self.node, vec![event]);
    }

    pub fn send_events(&self, events: Vec<Event>) {
        self.shared.send_from(self.node, events);
    }

    /// Send a control event that only the send observers see.
    pub(crate) fn send_reserved(&self, event: Event) {
        self.shared.send_reserved(self.node, event);
    }

    /// Events emitted by this invocation and its descendants.
    pub fn stream(&self) -> EventStream {
        self.shared.subscribe(self.node)
    }

    /// This invocation's cancellation signal (allocated on first use).
    pub fn signal(&self) -> Signal {
        self.shared.signal_for(self.node)
    }

    pub fn extension<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.shared.extension::<T>()
    }

    /// Deferred invocations of `handler` that have not settled yet, oldest first.
    pub fn running_invocations(&self, handler: HandlerId) -> Vec<InvocationCompletion> {
        self.shared.in_flight(Some(handler))
    }

    /// The context this invocation belongs to.
    pub fn context(&self) -> WorkflowContext {
        WorkflowContext::from_shared(self.shared.clone())
    }
}

/// Cancellation view of one node.
#[derive(Clone)]
pub struct Signal {
    shared: Arc<ContextShared>,
    node: NodeId,
    token: CancellationToken,
}

impl Signal {
    pub(crate) fn new(shared: Arc<ContextShared>, node: NodeId, token: CancellationToken) -> Self {
        Self {
            shared,
            node,
            token,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// The error that cancelled this node or one of its ancestors.
    pub fn reason(&self) -> Option<Arc<anyhow::Error>> {
        if !self.token.is_cancelled() {
            return None;
        }
        self.shared.reason_for(self.node)
    }
}

/// Pending result of a deferred invocation.
///
/// Completions settle after the emitted event (if any) has been dispatched.
#[derive(Clone)]
pub struct InvocationCompletion {
    node: NodeId,
    handler: HandlerId,
    completion: Completion,
}

impl InvocationCompletion {
    pub(crate) fn new(node: NodeId, handler: HandlerId, completion: Completion) -> Self {
        Self {
            node,
            handler,
            completion,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn handler_id(&self) -> HandlerId {
        self.handler
    }

    pub fn is_settled(&self) -> bool {
        self.completion.future.peek().is_some()
    }

    /// Await the result. Errors seen here are not logged as unobserved.
    pub async fn wait(self) -> CompletionResult {
        self.completion.observed.store(true, Ordering::SeqCst);
        self.completion.future.await
    }

    /// Await settlement without taking responsibility for errors.
    pub async fn settled(self) {
        let _ = self.completion.future.await;
    }
}
