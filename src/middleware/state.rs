// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed state attached to a context.
//!
//! A [`StatefulWorkflow`] creates contexts that carry one value of `S`,
//! reachable from handlers through [`state`]. Asynchronous work that mutates
//! the state can be registered with [`StateStore::track`]; handlers dispatched
//! while such work is unsettled wait for it before running.

use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::engine::{HandlerContext, HandlerOutput, HandlerResult, Workflow, WorkflowContext};
use crate::errors::StateError;
use crate::events::Event;
use crate::observability::messages::snapshot::VersionMismatch;
use crate::observability::messages::StructuredLog;
use crate::traits::{HandlerInterceptor, Invocation, Next};

type PendingFuture = Shared<BoxFuture<'static, ()>>;

/// Serialized state of a context, tagged with the workflow version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub version: String,
    pub state: String,
}

#[derive(Default)]
struct PendingWork {
    futures: Mutex<Vec<PendingFuture>>,
}

impl PendingWork {
    fn unsettled(&self) -> Vec<PendingFuture> {
        let mut futures = self.futures.lock();
        futures.retain(|f| f.peek().is_none());
        futures.clone()
    }
}

/// The state value of one context.
pub struct StateStore<S> {
    value: Mutex<S>,
    pending: Arc<PendingWork>,
    runtime: Option<Handle>,
}

impl<S: Send + 'static> StateStore<S> {
    fn new(value: S) -> Self {
        Self {
            value: Mutex::new(value),
            pending: Arc::new(PendingWork::default()),
            runtime: Handle::try_current().ok(),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.value.lock())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.value.lock())
    }

    pub fn get(&self) -> S
    where
        S: Clone,
    {
        self.value.lock().clone()
    }

    /// Register asynchronous work that handlers must wait for.
    ///
    /// The future is spawned when a tokio runtime is available; otherwise it
    /// runs when the first gated handler polls it.
    pub fn track<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shared = future.boxed().shared();
        if let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) {
            runtime.spawn(shared.clone());
        }
        self.pending.futures.lock().push(shared);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.unsettled().len()
    }

    /// Wait for every tracked future registered so far.
    pub async fn settle(&self) {
        join_all(self.pending.unsettled()).await;
    }
}

/// Delays handlers while tracked state work is unsettled.
struct PendingGate {
    pending: Arc<PendingWork>,
}

impl HandlerInterceptor for PendingGate {
    fn intercept(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult {
        let pending = self.pending.unsettled();
        if pending.is_empty() {
            return next.run(invocation);
        }

        let original = invocation.handler().func().clone();
        invocation.set_handler_fn(Arc::new(move |ctx: HandlerContext, inputs: Vec<Event>| {
            let pending = pending.clone();
            let original = original.clone();
            Ok(HandlerOutput::deferred(async move {
                join_all(pending).await;
                match original(ctx, inputs)? {
                    HandlerOutput::Emit(event) => Ok(event),
                    HandlerOutput::Deferred(future) => future.await,
                }
            }))
        }));
        next.run(invocation)
    }
}

/// The state attached to the handler's context, if it holds an `S`.
pub fn state<S: Send + Sync + 'static>(ctx: &HandlerContext) -> Option<Arc<StateStore<S>>> {
    ctx.extension::<StateStore<S>>()
}

/// A workflow whose contexts carry a value of `S`.
pub struct StatefulWorkflow<S> {
    workflow: Workflow,
    _state: PhantomData<fn() -> S>,
}

impl<S> Clone for StatefulWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            workflow: self.workflow.clone(),
            _state: PhantomData,
        }
    }
}

impl<S> StatefulWorkflow<S>
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow,
            _state: PhantomData,
        }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn create_context(&self, initial: S) -> StatefulContext<S> {
        let context = self.workflow.create_context();
        let store = Arc::new(StateStore::new(initial));
        context.insert_extension(store.clone());
        context.add_interceptor(Arc::new(PendingGate {
            pending: store.pending.clone(),
        }));
        StatefulContext { context, store }
    }

    /// Recreate a context holding the state captured in `snapshot`.
    pub fn resume(&self, snapshot: &StateSnapshot) -> Result<StatefulContext<S>, StateError> {
        let current = self.workflow.version();
        if snapshot.version != current {
            if self.workflow.config().snapshot.get_strict_version() {
                return Err(StateError::VersionMismatch {
                    expected: snapshot.version.clone(),
                    found: current,
                });
            }
            VersionMismatch {
                expected: &snapshot.version,
                found: &current,
            }
            .log();
        }
        let initial: S = serde_json::from_str(&snapshot.state)?;
        Ok(self.create_context(initial))
    }
}

/// A context created by a [`StatefulWorkflow`].
pub struct StatefulContext<S> {
    context: WorkflowContext,
    store: Arc<StateStore<S>>,
}

impl<S> Clone for StatefulContext<S> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            store: self.store.clone(),
        }
    }
}

impl<S> Deref for StatefulContext<S> {
    type Target = WorkflowContext;

    fn deref(&self) -> &WorkflowContext {
        &self.context
    }
}

impl<S> StatefulContext<S>
where
    S: Serialize + Send + 'static,
{
    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    pub fn state(&self) -> &Arc<StateStore<S>> {
        &self.store
    }

    /// Serialize the current state. Tracked work that has not settled is not
    /// waited for; call [`StateStore::settle`] first if it matters.
    pub fn snapshot(&self) -> Result<StateSnapshot, StateError> {
        let state = self.store.with(|value| serde_json::to_string(value))?;
        Ok(StateSnapshot {
            version: self.context.workflow().version(),
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Handler;
    use crate::events::define_event;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Tally {
        seen: u32,
    }

    #[test]
    fn test_handlers_reach_state() {
        let tick = define_event("tick");
        let workflow = Workflow::new();
        workflow
            .handle(
                &[tick.clone()],
                Handler::new("count", |ctx, _| {
                    if let Some(store) = state::<Tally>(&ctx) {
                        store.update(|tally| tally.seen += 1);
                    }
                    Ok(None)
                }),
            )
            .unwrap();

        let ctx = StatefulWorkflow::new(workflow).create_context(Tally::default());
        ctx.send_event(tick.make(json!(null)));
        ctx.send_event(tick.make(json!(null)));

        assert_eq!(ctx.state().get(), Tally { seen: 2 });
    }

    #[test]
    fn test_state_lookup_with_wrong_type() {
        let ctx = StatefulWorkflow::<Tally>::new(Workflow::new()).create_context(Tally::default());
        assert!(state::<String>(&ctx.root()).is_none());
        assert!(state::<Tally>(&ctx.root()).is_some());
    }

    #[test]
    fn test_snapshot_serializes_state() {
        let stateful = StatefulWorkflow::new(Workflow::new());
        let ctx = stateful.create_context(Tally { seen: 7 });

        let snapshot = ctx.snapshot().unwrap();
        assert_eq!(snapshot.state, r#"{"seen":7}"#);
        assert_eq!(snapshot.version, stateful.workflow().version());
    }
}
