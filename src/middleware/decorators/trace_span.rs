// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;
use std::sync::Arc;
use tracing::field::Empty;
use tracing::{Instrument, Span};

use super::Decorator;
use crate::engine::{HandlerContext, HandlerFn, HandlerOutput};
use crate::events::Event;
use crate::traits::Invocation;

/// Runs every invocation inside an `info` span named `handler`.
///
/// The span carries `handler`, `node` and `inputs` fields, and records
/// `outcome` as `emitted`, `none` or `error`. A failure also fills the
/// `error` field. Deferred futures run inside the same span, which stays
/// `deferred` until the future settles.
pub struct TraceSpan;

fn record_outcome(span: &Span, result: &anyhow::Result<Option<Event>>) {
    match result {
        Ok(Some(_)) => {
            span.record("outcome", "emitted");
        }
        Ok(None) => {
            span.record("outcome", "none");
        }
        Err(err) => {
            span.record("outcome", "error");
            span.record("error", err.to_string().as_str());
        }
    }
}

impl Decorator for TraceSpan {
    fn before_handler(&self, handler: HandlerFn, invocation: &Invocation, _metadata: &Value) -> HandlerFn {
        let name: Arc<str> = invocation.handler().name().into();

        Arc::new(move |ctx: HandlerContext, inputs: Vec<Event>| {
            let span = tracing::info_span!(
                "handler",
                handler = %name,
                node = ctx.node_id().0,
                inputs = inputs.len(),
                outcome = Empty,
                error = Empty,
            );

            match span.in_scope(|| handler(ctx, inputs)) {
                Ok(HandlerOutput::Emit(event)) => {
                    let result = Ok(event);
                    record_outcome(&span, &result);
                    result.map(HandlerOutput::Emit)
                }
                Ok(HandlerOutput::Deferred(future)) => {
                    span.record("outcome", "deferred");
                    let traced = span.clone();
                    let future = async move {
                        let result = future.await;
                        record_outcome(&traced, &result);
                        result
                    };
                    Ok(HandlerOutput::Deferred(Box::pin(future.instrument(span))))
                }
                Err(err) => {
                    span.record("outcome", "error");
                    span.record("error", err.to_string().as_str());
                    Err(err)
                }
            }
        })
    }
}
