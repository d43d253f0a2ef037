// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;
use std::sync::Arc;

use super::Decorator;
use crate::engine::{HandlerContext, HandlerFn, HandlerOutput};
use crate::events::Event;
use crate::observability::messages::decorator::RunOnceSkipped;
use crate::observability::messages::StructuredLog;
use crate::traits::Invocation;

/// Runs the handler at most once per context; later invocations emit nothing.
pub struct RunOnce;

impl Decorator for RunOnce {
    fn initial_metadata(&self) -> Value {
        Value::Bool(false)
    }

    fn before_handler(&self, handler: HandlerFn, invocation: &Invocation, metadata: &Value) -> HandlerFn {
        if metadata.as_bool().unwrap_or(false) {
            RunOnceSkipped {
                handler: invocation.handler().name(),
            }
            .log();
            return Arc::new(|_: HandlerContext, _: Vec<Event>| Ok(HandlerOutput::none()));
        }
        handler
    }

    fn after_handler(&self, _metadata: Value) -> Value {
        Value::Bool(true)
    }
}
