// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-run context and the join-dispatch loop.
//!
//! Dispatch is a trampoline: every send enqueues under the dispatch lock, and
//! only the outermost send on a thread runs the match loop. Sends made by
//! handlers while the loop is running are picked up by the next round, so
//! matching never re-enters. The dispatch lock is reentrant so a handler can
//! send from inside the loop; other threads block until the loop reaches its
//! fixed point.

use anyhow::anyhow;
use futures::FutureExt;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::any::{Any, TypeId};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::config::FailurePolicy;
use crate::engine::node::{Completion, CompletionResult, NodeStatus, SharedCompletion};
use crate::engine::scheduler::SchedulerState;
use crate::engine::{
    DeferredResult, EventStream, Handler, HandlerContext, HandlerOutput, InvocationCompletion,
    NodeId, Signal, Workflow,
};
use crate::errors::WorkflowError;
use crate::events::{Event, EventKind};
use crate::observability::messages::engine::{
    CascadeLimitReached, ContextCreated, DeferredCompletionFailed, HandlerDispatched,
    HandlerFailed, UnobservedFailure,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{HandlerInterceptor, Invocation, Next, SendObserver};

pub(crate) struct ContextShared {
    workflow: Workflow,
    state: Mutex<SchedulerState>,
    dispatch: ReentrantMutex<Cell<bool>>,
    interceptors: RwLock<Vec<Arc<dyn HandlerInterceptor>>>,
    observers: RwLock<Vec<Arc<dyn SendObserver>>>,
    extensions: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    root_observed: AtomicBool,
    runtime: Option<Handle>,
}

/// Clears the "dispatching" flag even if a handler panics.
struct DispatchFlag<'a>(&'a Cell<bool>);

impl Drop for DispatchFlag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl ContextShared {
    fn new(workflow: Workflow) -> Self {
        Self {
            workflow,
            state: Mutex::new(SchedulerState::new()),
            dispatch: ReentrantMutex::new(Cell::new(false)),
            interceptors: RwLock::new(Vec::new()),
            observers: RwLock::new(Vec::new()),
            extensions: RwLock::new(HashMap::new()),
            root_observed: AtomicBool::new(false),
            runtime: Handle::try_current().ok(),
        }
    }

    pub(crate) fn send_from(self: &Arc<Self>, producer: NodeId, events: Vec<Event>) {
        let dispatching = self.dispatch.lock();

        for event in events {
            let observers = self.observers.read().clone();
            for observer in &observers {
                observer.on_send(&event, producer);
            }
            self.state.lock().record(producer, event);
        }

        if dispatching.get() {
            return;
        }
        dispatching.set(true);
        let _flag = DispatchFlag(&dispatching);
        self.run_dispatch();
    }

    /// Show `event` to the send observers only. It is never queued, streamed
    /// or kept in history.
    pub(crate) fn send_reserved(&self, producer: NodeId, event: Event) {
        let _dispatching = self.dispatch.lock();
        let observers = self.observers.read().clone();
        for observer in &observers {
            observer.on_send(&event, producer);
        }
    }

    /// Match rounds until nothing fires.
    ///
    /// Each round only considers events queued before it started, so a
    /// synchronous cycle advances one generation per round and the cascade
    /// limit can stop it.
    fn run_dispatch(self: &Arc<Self>) {
        let limit = self.workflow.config().dispatch.get_max_cascade_rounds();
        let specs = self.workflow.join_specs();

        for round in 0.. {
            if round == limit {
                let state = self.state.lock();
                if specs.iter().any(|spec| state.can_match(spec)) {
                    CascadeLimitReached {
                        limit,
                        pending: state.pending_len(),
                    }
                    .log();
                }
                break;
            }

            let horizon = self.state.lock().next_seq();
            let mut fired = false;

            for spec in &specs {
                loop {
                    let next = {
                        let mut state = self.state.lock();
                        state.take_match(spec, horizon).map(|matched| {
                            let node = state.create_node(
                                matched.parent,
                                spec.handler().clone(),
                                matched.inputs.clone(),
                            );
                            let parent = state.parent_of(node).unwrap_or(NodeId::ROOT);
                            (node, parent, matched.inputs)
                        })
                    };
                    let Some((node, parent, inputs)) = next else {
                        break;
                    };
                    fired = true;
                    self.invoke(node, parent, spec.handler(), inputs);
                }
            }

            if !fired {
                break;
            }
        }
    }

    fn invoke(self: &Arc<Self>, node: NodeId, parent: NodeId, handler: &Handler, inputs: Vec<Event>) {
        HandlerDispatched {
            handler: handler.name(),
            node: node.0,
            parent: parent.0,
            inputs: inputs.len(),
        }
        .log();

        let interceptors = self.interceptors.read().clone();
        let mut invocation = Invocation::new(
            HandlerContext::new(self.clone(), node),
            handler.clone(),
            inputs,
        );

        match Next::new(&interceptors).run(&mut invocation) {
            Ok(HandlerOutput::Emit(Some(event))) => self.send_from(node, vec![event]),
            Ok(HandlerOutput::Emit(None)) => {}
            Ok(HandlerOutput::Deferred(future)) => self.defer(node, handler, future),
            Err(error) => self.fail(node, handler.name(), error),
        }
    }

    fn defer(self: &Arc<Self>, node: NodeId, handler: &Handler, future: DeferredResult) {
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            let error = WorkflowError::MissingRuntime {
                handler: handler.name().to_string(),
            };
            self.fail(node, handler.name(), error.into());
            return;
        };

        let observed = Arc::new(AtomicBool::new(false));
        let this = self.clone();
        let name: Arc<str> = handler.name().into();
        let flag = observed.clone();
        let completion: SharedCompletion = async move {
            let result: CompletionResult = future.await.map_err(Arc::new);
            this.finish_deferred(node, &name, &result, &flag);
            result
        }
        .boxed()
        .shared();

        if let Some(data) = self.state.lock().node_mut(node) {
            data.status = NodeStatus::Running;
            data.completion = Some(Completion {
                future: completion.clone(),
                observed,
            });
        }

        runtime.spawn(completion.map(|_| ()));
    }

    fn finish_deferred(
        self: &Arc<Self>,
        node: NodeId,
        handler: &str,
        result: &CompletionResult,
        observed: &AtomicBool,
    ) {
        match result {
            Ok(Some(event)) => self.send_from(node, vec![event.clone()]),
            Ok(None) => {}
            Err(error) => {
                if !observed.load(Ordering::SeqCst) {
                    DeferredCompletionFailed {
                        handler,
                        node: node.0,
                        error,
                    }
                    .log();
                }
            }
        }

        // Stays Running until the emitted event has been dispatched
        if let Some(data) = self.state.lock().node_mut(node) {
            data.status = match result {
                Ok(_) => NodeStatus::Done,
                Err(_) => NodeStatus::Failed,
            };
        }
    }

    /// Route a synchronous handler failure to the node's token, or the
    /// root's when the node never allocated one.
    fn fail(self: &Arc<Self>, node: NodeId, handler: &str, error: anyhow::Error) {
        HandlerFailed {
            handler,
            node: node.0,
            error: &error,
        }
        .log();

        let reason = Arc::new(error);
        let (token, at_root) = {
            let mut state = self.state.lock();
            if let Some(data) = state.node_mut(node) {
                data.status = NodeStatus::Failed;
            }
            let target = if state.has_token(node) {
                node
            } else {
                NodeId::ROOT
            };
            state.set_reason(target, reason.clone());
            (state.token_for(target), target.is_root())
        };
        token.cancel();

        if at_root && !self.root_observed.load(Ordering::SeqCst) {
            let message = UnobservedFailure {
                handler,
                error: &reason,
            };
            message.log();
            if self.workflow.config().failure_policy == FailurePolicy::Panic {
                panic!("{}", message);
            }
        }
    }

    pub(crate) fn subscribe(&self, scope: NodeId) -> EventStream {
        EventStream::new(self.state.lock().subscribe(scope, true))
    }

    pub(crate) fn signal_for(self: &Arc<Self>, node: NodeId) -> Signal {
        if node.is_root() {
            self.root_observed.store(true, Ordering::SeqCst);
        }
        let token = self.state.lock().token_for(node);
        Signal::new(self.clone(), node, token)
    }

    pub(crate) fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.state.lock().parent_of(node)
    }

    pub(crate) fn reason_for(&self, node: NodeId) -> Option<Arc<anyhow::Error>> {
        self.state.lock().reason_for(node)
    }

    pub(crate) fn in_flight(&self, handler: Option<crate::engine::HandlerId>) -> Vec<InvocationCompletion> {
        self.state
            .lock()
            .in_flight(handler)
            .into_iter()
            .map(|(node, h, completion)| InvocationCompletion::new(node, h.id(), completion))
            .collect()
    }

    pub(crate) fn extension<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let value = self.extensions.read().get(&TypeId::of::<T>()).cloned()?;
        value.downcast::<T>().ok()
    }
}

/// A running instance of a [`Workflow`]: one queue, one invocation tree.
///
/// Contexts are cheap handles; clones refer to the same run.
///
/// # Example
/// ```
/// use the_junction::engine::{Handler, Workflow};
/// use the_junction::events::define_event;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let start = define_event("start");
/// let stop = define_event("stop");
/// let workflow = Workflow::new();
/// let stop_kind = stop.clone();
/// workflow
///     .handle(&[start.clone()], Handler::new("finish", move |_, _| Ok(Some(stop_kind.make("ok")))))
///     .unwrap();
///
/// let ctx = workflow.create_context();
/// let result = ctx.run_until(start.make(()), &stop).await.unwrap();
/// assert_eq!(result.payload(), "ok");
/// # }
/// ```
#[derive(Clone)]
pub struct WorkflowContext {
    shared: Arc<ContextShared>,
}

impl WorkflowContext {
    pub(crate) fn new(workflow: Workflow) -> Self {
        let version = workflow.version();
        ContextCreated {
            join_specs: workflow.join_specs().len(),
            version: &version,
        }
        .log();
        Self {
            shared: Arc::new(ContextShared::new(workflow)),
        }
    }

    pub(crate) fn from_shared(shared: Arc<ContextShared>) -> Self {
        Self { shared }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.shared.workflow
    }

    /// Send an event from outside any handler and dispatch to a fixed point.
    pub fn send_event(&self, event: Event) {
        self.shared.send_from(NodeId::ROOT, vec![event]);
    }

    /// Send several events as one batch; matching starts after all are queued.
    pub fn send_events(&self, events: Vec<Event>) {
        self.shared.send_from(NodeId::ROOT, events);
    }

    /// Every event sent into this context, history first.
    pub fn stream(&self) -> EventStream {
        self.shared.subscribe(NodeId::ROOT)
    }

    /// The root cancellation signal. Holding it marks root failures observed.
    pub fn signal(&self) -> Signal {
        self.shared.signal_for(NodeId::ROOT)
    }

    /// The error that cancelled the root, if any.
    pub fn failure(&self) -> Option<Arc<anyhow::Error>> {
        self.shared.reason_for(NodeId::ROOT)
    }

    /// Handler-side view of the root node.
    pub fn root(&self) -> HandlerContext {
        HandlerContext::new(self.shared.clone(), NodeId::ROOT)
    }

    /// Send `start` and wait for the first subsequent event of `stop`.
    ///
    /// Fails with the cancellation reason if the root is cancelled first.
    pub async fn run_until(&self, start: Event, stop: &EventKind) -> Result<Event, Arc<anyhow::Error>> {
        let signal = self.signal();
        let receiver = self.shared.state.lock().subscribe(NodeId::ROOT, false);
        let mut stream = EventStream::new(receiver).of_kind(stop);

        self.send_event(start);

        tokio::select! {
            event = stream.next_event() => event.ok_or_else(|| {
                Arc::new(anyhow!("event stream closed before '{}' arrived", stop))
            }),
            _ = signal.cancelled() => Err(signal
                .reason()
                .unwrap_or_else(|| Arc::new(anyhow!("workflow was cancelled")))),
        }
    }

    /// Events sent so far, in send order. Collected nodes drop out.
    pub fn history(&self) -> Vec<Event> {
        self.shared.state.lock().history()
    }

    /// Queued events no join-spec has consumed.
    pub fn pending_events(&self) -> Vec<Event> {
        self.shared.state.lock().pending()
    }

    /// Deferred invocations that have not settled.
    pub fn in_flight(&self) -> Vec<InvocationCompletion> {
        self.shared.in_flight(None)
    }

    pub fn node_count(&self) -> usize {
        self.shared.state.lock().node_count()
    }

    /// Drop finished leaf invocations. Returns the number of nodes removed.
    pub fn collect_garbage(&self) -> usize {
        self.shared.state.lock().collect_garbage()
    }

    /// Add a pre-handler hook. Hooks added first run outermost.
    pub fn add_interceptor(&self, interceptor: Arc<dyn HandlerInterceptor>) {
        self.shared.interceptors.write().push(interceptor);
    }

    /// Add a post-send hook.
    pub fn add_observer(&self, observer: Arc<dyn SendObserver>) {
        self.shared.observers.write().push(observer);
    }

    /// Attach a value handlers can look up by type.
    pub fn insert_extension<T: Any + Send + Sync>(&self, value: Arc<T>) {
        self.shared
            .extensions
            .write()
            .insert(TypeId::of::<T>(), value);
    }

    pub fn extension<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.shared.extension::<T>()
    }
}
