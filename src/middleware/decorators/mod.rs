// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Handler decorators.
//!
//! A decorator is attached to a handler by tagging it with a
//! [`DecoratorId`] at build time (see [`Handler::with_decorator`]). Installing a
//! [`DecoratorRegistry`] on a context adds an interceptor that, for every
//! invocation, wraps the handler function with each tagged decorator and
//! threads a per-context metadata value through it.
//!
//! Tags apply in the order they were added, first tag innermost. Tags with no
//! registered decorator are logged and skipped.
//!
//! # Built-ins
//! * [`RUN_ONCE`] - at most one invocation per context
//! * [`NO_PARALLEL`] - invocations of the handler never overlap
//! * [`TRACE_SPAN`] - every invocation runs inside a tracing span
//!
//! [`Handler::with_decorator`]: crate::engine::Handler::with_decorator

mod no_parallel;
mod run_once;
mod trace_span;

pub use no_parallel::NoParallel;
pub use run_once::RunOnce;
pub use trace_span::TraceSpan;

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::engine::{HandlerFn, HandlerId, HandlerResult, WorkflowContext};
use crate::errors::DecoratorError;
use crate::observability::messages::decorator::{DecoratorApplied, UnknownDecorator};
use crate::observability::messages::StructuredLog;
use crate::traits::{HandlerInterceptor, Invocation, Next};

/// Name of a decorator, used to tag handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecoratorId(pub &'static str);

impl DecoratorId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for DecoratorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub const RUN_ONCE: DecoratorId = DecoratorId("run_once");
pub const NO_PARALLEL: DecoratorId = DecoratorId("no_parallel");
pub const TRACE_SPAN: DecoratorId = DecoratorId("trace_span");

/// Behaviour attached to tagged handlers.
///
/// Metadata is kept per context and per handler. It starts as
/// [`initial_metadata`](Decorator::initial_metadata), is read by
/// [`before_handler`](Decorator::before_handler) and replaced by whatever
/// [`after_handler`](Decorator::after_handler) returns. `after_handler` runs
/// once the handler returned, whether or not it succeeded; for deferred
/// handlers that is when the future was handed back, not when it resolved.
pub trait Decorator: Send + Sync {
    fn initial_metadata(&self) -> Value {
        Value::Null
    }

    /// Return the function to run in place of `handler`.
    fn before_handler(&self, handler: HandlerFn, invocation: &Invocation, metadata: &Value) -> HandlerFn;

    fn after_handler(&self, metadata: Value) -> Value {
        metadata
    }
}

/// Named decorators available to a context.
#[derive(Clone, Default)]
pub struct DecoratorRegistry {
    decorators: HashMap<DecoratorId, Arc<dyn Decorator>>,
}

impl DecoratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding [`RUN_ONCE`], [`NO_PARALLEL`] and [`TRACE_SPAN`].
    pub fn with_builtins() -> Self {
        let mut decorators: HashMap<DecoratorId, Arc<dyn Decorator>> = HashMap::new();
        decorators.insert(RUN_ONCE, Arc::new(RunOnce));
        decorators.insert(NO_PARALLEL, Arc::new(NoParallel));
        decorators.insert(TRACE_SPAN, Arc::new(TraceSpan));
        Self { decorators }
    }

    pub fn register(&mut self, id: DecoratorId, decorator: Arc<dyn Decorator>) -> Result<(), DecoratorError> {
        if self.decorators.contains_key(&id) {
            return Err(DecoratorError::DuplicateDecorator(id.to_string()));
        }
        self.decorators.insert(id, decorator);
        Ok(())
    }

    pub fn get(&self, id: DecoratorId) -> Option<Arc<dyn Decorator>> {
        self.decorators.get(&id).cloned()
    }

    pub fn contains(&self, id: DecoratorId) -> bool {
        self.decorators.contains_key(&id)
    }

    /// Apply the registered decorators to every tagged handler invoked in `context`.
    ///
    /// Metadata starts fresh for each context the registry is installed on.
    pub fn install(&self, context: &WorkflowContext) {
        context.add_interceptor(Arc::new(DecoratorInterceptor {
            decorators: self.decorators.clone(),
            metadata: Mutex::new(HashMap::new()),
        }));
    }
}

struct DecoratorInterceptor {
    decorators: HashMap<DecoratorId, Arc<dyn Decorator>>,
    metadata: Mutex<HashMap<(HandlerId, DecoratorId), Value>>,
}

impl DecoratorInterceptor {
    fn metadata_for(&self, key: (HandlerId, DecoratorId), decorator: &dyn Decorator) -> Value {
        self.metadata
            .lock()
            .entry(key)
            .or_insert_with(|| decorator.initial_metadata())
            .clone()
    }
}

impl HandlerInterceptor for DecoratorInterceptor {
    fn intercept(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult {
        let tags = invocation.handler().decorators().to_vec();
        if tags.is_empty() {
            return next.run(invocation);
        }

        let handler_id = invocation.handler().id();
        let mut applied = Vec::with_capacity(tags.len());
        let mut func = invocation.handler().func().clone();
        for tag in tags {
            let Some(decorator) = self.decorators.get(&tag) else {
                UnknownDecorator {
                    decorator: tag.name(),
                    handler: invocation.handler().name(),
                }
                .log();
                continue;
            };
            let metadata = self.metadata_for((handler_id, tag), decorator.as_ref());
            func = decorator.before_handler(func, invocation, &metadata);
            DecoratorApplied {
                decorator: tag.name(),
                handler: invocation.handler().name(),
            }
            .log();
            applied.push((tag, decorator.clone(), metadata));
        }

        invocation.set_handler_fn(func);
        let result = next.run(invocation);

        let mut store = self.metadata.lock();
        for (tag, decorator, metadata) in applied {
            store.insert((handler_id, tag), decorator.after_handler(metadata));
        }
        result
    }
}
