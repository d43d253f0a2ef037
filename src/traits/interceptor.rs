use std::sync::Arc;

use crate::engine::{Handler, HandlerContext, HandlerFn, HandlerResult, NodeId};
use crate::events::Event;

/// Pre-handler hook.
///
/// Every invocation passes through the context's interceptors in the order
/// they were added (first added is outermost). An interceptor may inspect or
/// replace the handler on the [`Invocation`] before calling
/// [`Next::run`], short-circuit by returning without calling it, or post-process
/// the result.
pub trait HandlerInterceptor: Send + Sync {
    fn intercept(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult;
}

/// The rest of the interceptor chain, ending in the handler itself.
pub struct Next<'a> {
    rest: &'a [Arc<dyn HandlerInterceptor>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn HandlerInterceptor>]) -> Self {
        Self { rest: chain }
    }

    pub fn run(self, invocation: &mut Invocation) -> HandlerResult {
        match self.rest.split_first() {
            Some((interceptor, rest)) => interceptor.intercept(invocation, Next { rest }),
            None => invocation.call(),
        }
    }
}

/// One handler invocation as seen by interceptors.
pub struct Invocation {
    context: HandlerContext,
    handler: Handler,
    inputs: Vec<Event>,
}

impl Invocation {
    pub(crate) fn new(context: HandlerContext, handler: Handler, inputs: Vec<Event>) -> Self {
        Self {
            context,
            handler,
            inputs,
        }
    }

    pub fn context(&self) -> &HandlerContext {
        &self.context
    }

    pub fn node_id(&self) -> NodeId {
        self.context.node_id()
    }

    /// The handler that will run. Identity (id, name, decorators) always
    /// refers to the registered handler unless an interceptor replaced it.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn inputs(&self) -> &[Event] {
        &self.inputs
    }

    /// Replace the handler entirely.
    pub fn replace_handler(&mut self, handler: Handler) {
        self.handler = handler;
    }

    /// Swap the function that runs while keeping the handler's identity.
    pub fn set_handler_fn(&mut self, func: HandlerFn) {
        self.handler = self.handler.with_func(func);
    }

    pub(crate) fn call(&self) -> HandlerResult {
        self.handler.call(self.context.clone(), self.inputs.clone())
    }
}
