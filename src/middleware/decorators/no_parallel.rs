// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;
use std::sync::Arc;

use super::Decorator;
use crate::engine::{HandlerContext, HandlerFn, HandlerOutput};
use crate::events::Event;
use crate::observability::messages::decorator::AwaitingSerialization;
use crate::observability::messages::StructuredLog;
use crate::traits::Invocation;

/// Serializes invocations of one handler within a context.
///
/// Each invocation waits until every earlier, still-running invocation of the
/// same handler has settled, so they complete in arrival order. The wrapped
/// handler always returns a deferred output.
pub struct NoParallel;

impl Decorator for NoParallel {
    fn before_handler(&self, handler: HandlerFn, invocation: &Invocation, _metadata: &Value) -> HandlerFn {
        let handler_id = invocation.handler().id();
        let name: Arc<str> = invocation.handler().name().into();

        Arc::new(move |ctx: HandlerContext, inputs: Vec<Event>| {
            let ahead: Vec<_> = ctx
                .running_invocations(handler_id)
                .into_iter()
                .filter(|running| running.node_id() != ctx.node_id())
                .collect();
            if !ahead.is_empty() {
                AwaitingSerialization {
                    handler: &name,
                    node: ctx.node_id().0,
                    ahead: ahead.len(),
                }
                .log();
            }

            let handler = handler.clone();
            Ok(HandlerOutput::deferred(async move {
                for running in ahead {
                    running.settled().await;
                }
                match handler(ctx, inputs)? {
                    HandlerOutput::Emit(event) => Ok(event),
                    HandlerOutput::Deferred(future) => future.await,
                }
            }))
        })
    }
}
