// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Suspend a running context for outside input and resume it later.
//!
//! A [`SnapshotWorkflow`] wraps a [`Workflow`] and equips every context it
//! creates with two hooks: a send observer that records [`request`]s for
//! outside events, and an interceptor that turns every handler into a no-op
//! once the context is locked. [`SnapshotContext::snapshot`] locks, drains
//! in-flight handlers and captures the unconsumed queue; [`SnapshotWorkflow::resume`]
//! replays it, plus the answers, into a fresh context.
//!
//! # Example
//! ```
//! use the_junction::engine::{Handler, Workflow};
//! use the_junction::events::define_event;
//! use the_junction::middleware::snapshot::{request, SnapshotData, SnapshotWorkflow};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let start = define_event("start");
//! let approval = define_event("approval");
//! let done = define_event("done");
//!
//! let workflow = Workflow::new();
//! let wanted = approval.clone();
//! workflow.handle(&[start.clone()], Handler::new("ask", move |ctx, _| {
//!     request(&ctx, &wanted)?;
//!     Ok(None)
//! }))?;
//! let done_kind = done.clone();
//! workflow.handle(&[approval.clone()], Handler::new("finish", move |_, inputs| {
//!     Ok(Some(done_kind.make(inputs[0].payload().clone())))
//! }))?;
//!
//! let snapshots = SnapshotWorkflow::new(workflow);
//! let ctx = snapshots.create_context();
//! ctx.send_event(start.make(()));
//!
//! let (requested, data) = ctx.snapshot().await?;
//! assert_eq!(requested, vec![approval.clone()]);
//!
//! let stored = data.to_base64()?;
//! let resumed = snapshots.resume(None, vec!["yes".into()], &SnapshotData::from_base64(&stored)?)?;
//! assert!(resumed.history().iter().any(|e| e.is(&done)));
//! # Ok(())
//! # }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::engine::{HandlerContext, HandlerOutput, HandlerResult, NodeId, Workflow, WorkflowContext};
use crate::errors::SnapshotError;
use crate::events::{Event, EventId, EventKind, KindId};
use crate::observability::messages::snapshot::{
    ContextLocked, RequestRecorded, ResumeStarted, SendAfterLock, SnapshotCaptured,
    UnrecoverableEventsDropped, VersionMismatch,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{HandlerInterceptor, Invocation, Next, SendObserver};

/// Called whenever a context starts awaiting an outside event.
pub type OnRequest = Arc<dyn Fn(&EventKind) + Send + Sync>;

/// Serializable record of a suspended context.
///
/// Events are stored as `(payload, kind counter)` pairs; counters come from
/// [`Workflow::kind_counter`]. Kinds no join-spec uses get counters past the
/// workflow's own and land in `unrecoverable_queue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    pub queue: Vec<(Value, u32)>,
    pub unrecoverable_queue: Vec<(Value, u32)>,
    pub version: String,
    /// Counters of the kinds awaited from outside, in request order.
    pub missing: Vec<u32>,
}

impl SnapshotData {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_base64(&self) -> Result<String, SnapshotError> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, SnapshotError> {
        Self::from_bytes(&STANDARD.decode(encoded)?)
    }
}

#[derive(Default)]
struct RequestLog {
    by_marker: HashMap<EventId, EventKind>,
    requested: Vec<EventKind>,
}

/// Per-context snapshot bookkeeping, reachable from handlers as an extension.
struct SnapshotState {
    marker: EventKind,
    requests: Mutex<RequestLog>,
    held: Mutex<Vec<Event>>,
    locked: AtomicBool,
    snapshotted: AtomicBool,
    on_request: Option<OnRequest>,
}

impl SnapshotState {
    fn new(on_request: Option<OnRequest>) -> Self {
        Self {
            marker: EventKind::labeled("snapshot_request"),
            requests: Mutex::new(RequestLog::default()),
            held: Mutex::new(Vec::new()),
            locked: AtomicBool::new(false),
            snapshotted: AtomicBool::new(false),
            on_request,
        }
    }

    fn record_request(&self, kind: &EventKind, notify: bool) {
        let outstanding = {
            let mut log = self.requests.lock();
            if !log.requested.contains(kind) {
                log.requested.push(kind.clone());
            }
            log.requested.len()
        };
        RequestRecorded {
            kind: &kind.to_string(),
            outstanding,
        }
        .log();
        if notify {
            if let Some(on_request) = &self.on_request {
                on_request(kind);
            }
        }
    }

    fn requested(&self) -> Vec<EventKind> {
        self.requests.lock().requested.clone()
    }
}

/// Holds the inputs of every invocation dispatched after lock.
struct SnapshotLock {
    state: Arc<SnapshotState>,
}

impl HandlerInterceptor for SnapshotLock {
    fn intercept(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult {
        if self.state.locked.load(Ordering::SeqCst) {
            self.state
                .held
                .lock()
                .extend(invocation.inputs().iter().cloned());
            return Ok(HandlerOutput::none());
        }
        next.run(invocation)
    }
}

struct RequestObserver {
    state: Arc<SnapshotState>,
}

impl SendObserver for RequestObserver {
    fn on_send(&self, event: &Event, producer: NodeId) {
        if self.state.marker.recognizes(event) {
            let kind = self.state.requests.lock().by_marker.remove(&event.id());
            if let Some(kind) = kind {
                self.state.record_request(&kind, true);
            }
            return;
        }
        // In-flight handlers finishing during the drain are expected.
        if producer.is_root() && self.state.locked.load(Ordering::SeqCst) {
            SendAfterLock {
                kind: &event.kind().to_string(),
                event: event.id().0,
            }
            .log();
        }
    }
}

/// Mark `kind` as awaited from outside the workflow.
///
/// The next snapshot of this context lists `kind` among the requested kinds,
/// and resuming supplies answers for it in request order.
///
/// # Errors
/// `NotSnapshotEnabled` when the context was not created by a
/// [`SnapshotWorkflow`].
pub fn request(ctx: &HandlerContext, kind: &EventKind) -> Result<(), SnapshotError> {
    let state = ctx
        .extension::<SnapshotState>()
        .ok_or(SnapshotError::NotSnapshotEnabled)?;
    let marker = state.marker.make(json!({ "requested": kind.to_string() }));
    state
        .requests
        .lock()
        .by_marker
        .insert(marker.id(), kind.clone());
    ctx.send_reserved(marker);
    Ok(())
}

/// A workflow whose contexts can be snapshotted and resumed.
#[derive(Clone)]
pub struct SnapshotWorkflow {
    workflow: Workflow,
}

impl SnapshotWorkflow {
    pub fn new(workflow: Workflow) -> Self {
        Self { workflow }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn create_context(&self) -> SnapshotContext {
        self.create_context_with(None)
    }

    /// Create a context that reports each new request to `on_request`.
    pub fn create_context_with(&self, on_request: Option<OnRequest>) -> SnapshotContext {
        let context = self.workflow.create_context();
        let state = Arc::new(SnapshotState::new(on_request));
        context.insert_extension(state.clone());
        context.add_interceptor(Arc::new(SnapshotLock {
            state: state.clone(),
        }));
        context.add_observer(Arc::new(RequestObserver {
            state: state.clone(),
        }));
        SnapshotContext { context, state }
    }

    /// Build a fresh context from `data`, answering the first
    /// `answers.len()` outstanding requests in order.
    ///
    /// # Errors
    /// * `VersionMismatch` - the workflow changed and strict versioning is on
    /// * `UnexpectedAnswer` - more answers than outstanding requests
    /// * `MissingKind` - a counter in `data` names no kind of this workflow
    pub fn resume(
        &self,
        on_request: Option<OnRequest>,
        answers: Vec<Value>,
        data: &SnapshotData,
    ) -> Result<SnapshotContext, SnapshotError> {
        let current = self.workflow.version();
        if data.version != current {
            if self.workflow.config().snapshot.get_strict_version() {
                return Err(SnapshotError::VersionMismatch {
                    expected: data.version.clone(),
                    found: current,
                });
            }
            VersionMismatch {
                expected: &data.version,
                found: &current,
            }
            .log();
        }

        if answers.len() > data.missing.len() {
            return Err(SnapshotError::UnexpectedAnswer {
                index: data.missing.len(),
                requested: data.missing.len(),
            });
        }

        let kind_for = |counter: u32| {
            self.workflow
                .kind_for_counter(counter)
                .ok_or(SnapshotError::MissingKind { counter })
        };
        let queued = data
            .queue
            .iter()
            .map(|(payload, counter)| Ok((kind_for(*counter)?, payload)))
            .collect::<Result<Vec<_>, SnapshotError>>()?;
        let awaited = data
            .missing
            .iter()
            .map(|counter| kind_for(*counter))
            .collect::<Result<Vec<_>, SnapshotError>>()?;

        if !data.unrecoverable_queue.is_empty() {
            UnrecoverableEventsDropped {
                count: data.unrecoverable_queue.len(),
            }
            .log();
        }
        ResumeStarted {
            replayed: queued.len(),
            answers: answers.len(),
        }
        .log();

        let resumed = self.create_context_with(on_request);
        for kind in &awaited[answers.len()..] {
            resumed.state.record_request(kind, false);
        }

        let mut events: Vec<Event> = queued
            .into_iter()
            .map(|(kind, payload)| kind.make(payload.clone()))
            .collect();
        events.extend(
            answers
                .into_iter()
                .zip(awaited.iter())
                .map(|(answer, kind)| kind.make(answer)),
        );
        resumed.context.send_events(events);

        Ok(resumed)
    }
}

/// A context created by a [`SnapshotWorkflow`].
#[derive(Clone)]
pub struct SnapshotContext {
    context: WorkflowContext,
    state: Arc<SnapshotState>,
}

impl Deref for SnapshotContext {
    type Target = WorkflowContext;

    fn deref(&self) -> &WorkflowContext {
        &self.context
    }
}

impl SnapshotContext {
    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    /// Kinds currently awaited from outside, in request order.
    pub fn requested_kinds(&self) -> Vec<EventKind> {
        self.state.requested()
    }

    pub fn is_locked(&self) -> bool {
        self.state.locked.load(Ordering::SeqCst)
    }

    /// Lock the context and capture it.
    ///
    /// The lock takes effect when this method is called, before the returned
    /// future is first polled. The future waits for in-flight deferred
    /// handlers (bounded by `snapshot.drain_timeout_ms`) and then returns the
    /// requested kinds and the snapshot record.
    ///
    /// # Errors
    /// * `AlreadySnapshotted` - on every call after the first
    /// * `DrainTimeout` - in-flight handlers did not settle in time
    /// * `UnregisteredRequest` - a requested kind is used by no join-spec
    pub fn snapshot(
        &self,
    ) -> impl Future<Output = Result<(Vec<EventKind>, SnapshotData), SnapshotError>> + Send + 'static
    {
        let started = self.lock();
        let this = self.clone();
        async move {
            started?;
            this.capture().await
        }
    }

    fn lock(&self) -> Result<(), SnapshotError> {
        if self.state.snapshotted.swap(true, Ordering::SeqCst) {
            return Err(SnapshotError::AlreadySnapshotted);
        }
        self.state.locked.store(true, Ordering::SeqCst);
        ContextLocked {
            in_flight: self.context.in_flight().len(),
        }
        .log();
        Ok(())
    }

    async fn drain(&self) {
        loop {
            let in_flight = self.context.in_flight();
            if in_flight.is_empty() {
                break;
            }
            join_all(in_flight.into_iter().map(|c| c.settled())).await;
        }
    }

    async fn capture(&self) -> Result<(Vec<EventKind>, SnapshotData), SnapshotError> {
        let timeout = self
            .context
            .workflow()
            .config()
            .snapshot
            .get_drain_timeout();
        tokio::time::timeout(timeout, self.drain())
            .await
            .map_err(|_| SnapshotError::DrainTimeout(timeout))?;

        let workflow = self.context.workflow();
        let mut events: Vec<Event> = std::mem::take(&mut *self.state.held.lock());
        events.extend(self.context.pending_events());
        events.sort_by_key(|event| event.id());

        let mut queue = Vec::new();
        let mut unrecoverable_queue = Vec::new();
        let mut local_counters: HashMap<KindId, u32> = HashMap::new();
        let mut next_local = workflow.kind_count();
        for event in events {
            let payload = event.payload().clone();
            match workflow.kind_counter(event.kind()) {
                Some(counter) => queue.push((payload, counter)),
                None => {
                    let counter = *local_counters.entry(event.kind().id()).or_insert_with(|| {
                        next_local += 1;
                        next_local - 1
                    });
                    unrecoverable_queue.push((payload, counter));
                }
            }
        }

        let requested = self.requested_kinds();
        let missing = requested
            .iter()
            .map(|kind| {
                workflow
                    .kind_counter(kind)
                    .ok_or_else(|| SnapshotError::UnregisteredRequest {
                        kind: kind.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let data = SnapshotData {
            queue,
            unrecoverable_queue,
            version: workflow.version(),
            missing,
        };
        SnapshotCaptured {
            queued: data.queue.len(),
            unrecoverable: data.unrecoverable_queue.len(),
            requested: requested.len(),
            version: &data.version,
        }
        .log();

        Ok((requested, data))
    }
}
