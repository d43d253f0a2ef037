// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::engine::HandlerContext;
use crate::events::Event;
use crate::middleware::decorators::DecoratorId;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handler identity. Clones of a [`Handler`] share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// Future produced by a handler whose result arrives later.
pub type DeferredResult = BoxFuture<'static, anyhow::Result<Option<Event>>>;

/// What a handler hands back to the scheduler.
pub enum HandlerOutput {
    /// Nothing, or one event, available right away.
    Emit(Option<Event>),
    /// A result that completes later; the node stays running until it does.
    Deferred(DeferredResult),
}

impl HandlerOutput {
    pub fn none() -> Self {
        HandlerOutput::Emit(None)
    }

    pub fn emit(event: Event) -> Self {
        HandlerOutput::Emit(Some(event))
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<Option<Event>>> + Send + 'static,
    {
        HandlerOutput::Deferred(Box::pin(future))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, HandlerOutput::Deferred(_))
    }
}

impl From<Option<Event>> for HandlerOutput {
    fn from(event: Option<Event>) -> Self {
        HandlerOutput::Emit(event)
    }
}

impl From<Event> for HandlerOutput {
    fn from(event: Event) -> Self {
        HandlerOutput::Emit(Some(event))
    }
}

impl fmt::Debug for HandlerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerOutput::Emit(event) => f.debug_tuple("Emit").field(event).finish(),
            HandlerOutput::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

pub type HandlerResult = anyhow::Result<HandlerOutput>;

/// The callable behind a handler. Inputs arrive in join-spec slot order.
pub type HandlerFn = Arc<dyn Fn(HandlerContext, Vec<Event>) -> HandlerResult + Send + Sync>;

/// A named handler function plus the decorators it is tagged with.
///
/// # Example
/// ```
/// use the_junction::engine::Handler;
/// use the_junction::events::define_event;
///
/// let done = define_event("done");
/// let handler = Handler::new("finish", move |_ctx, _inputs| Ok(Some(done.make(()))));
/// assert_eq!(handler.name(), "finish");
/// ```
#[derive(Clone)]
pub struct Handler {
    id: HandlerId,
    name: Arc<str>,
    func: HandlerFn,
    decorators: Vec<DecoratorId>,
}

impl Handler {
    /// A handler whose result is available synchronously.
    pub fn new<F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(HandlerContext, Vec<Event>) -> anyhow::Result<Option<Event>> + Send + Sync + 'static,
    {
        Self::from_fn(
            name,
            Arc::new(move |ctx, inputs| f(ctx, inputs).map(HandlerOutput::Emit)),
        )
    }

    /// A handler that returns a future; the scheduler does not wait for it.
    pub fn deferred<F, Fut>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(HandlerContext, Vec<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<Event>>> + Send + 'static,
    {
        Self::from_fn(
            name,
            Arc::new(move |ctx, inputs| Ok(HandlerOutput::deferred(f(ctx, inputs)))),
        )
    }

    /// A handler that decides per call whether to emit now or later.
    pub fn from_fn(name: impl Into<Arc<str>>, func: HandlerFn) -> Self {
        Self {
            id: HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            func,
            decorators: Vec::new(),
        }
    }

    /// Tag the handler with a decorator. Tags apply in order, first innermost.
    pub fn with_decorator(mut self, decorator: DecoratorId) -> Self {
        self.decorators.push(decorator);
        self
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decorators(&self) -> &[DecoratorId] {
        &self.decorators
    }

    pub fn func(&self) -> &HandlerFn {
        &self.func
    }

    pub fn call(&self, ctx: HandlerContext, inputs: Vec<Event>) -> HandlerResult {
        (self.func)(ctx, inputs)
    }

    pub(crate) fn with_func(&self, func: HandlerFn) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            func,
            decorators: self.decorators.clone(),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("decorators", &self.decorators)
            .finish()
    }
}
