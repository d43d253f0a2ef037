// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::future::ready;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::events::{Event, EventKind};

/// Events produced inside one invocation's subtree, oldest first.
///
/// A stream starts with everything the subtree already emitted and then
/// continues live. It never ends on its own while the context is alive; use
/// [`until`](Self::until) or [`take`](Self::take) to bound it.
pub struct EventStream {
    inner: BoxStream<'static, Event>,
}

impl EventStream {
    pub(crate) fn new(rx: UnboundedReceiver<Event>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx).boxed(),
        }
    }

    pub async fn next_event(&mut self) -> Option<Event> {
        self.inner.next().await
    }

    /// Keep only events of `kind` (composites included).
    pub fn of_kind(self, kind: &EventKind) -> Self {
        let kind = kind.clone();
        self.filter(move |event| kind.recognizes(event))
    }

    pub fn filter<F>(self, mut predicate: F) -> Self
    where
        F: FnMut(&Event) -> bool + Send + 'static,
    {
        Self {
            inner: self
                .inner
                .filter(move |event| ready(predicate(event)))
                .boxed(),
        }
    }

    /// End after the first event of `kind`, which is still yielded.
    pub fn until(self, kind: &EventKind) -> Self {
        let kind = kind.clone();
        self.until_event(move |event| kind.recognizes(event))
    }

    /// End after the first event matching `stop`, which is still yielded.
    pub fn until_event<F>(self, stop: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        let stop = Arc::new(stop);
        let inner = stream::unfold(Some(self.inner), move |state| {
            let stop = stop.clone();
            async move {
                let mut inner = state?;
                let event = inner.next().await?;
                let next = if stop(&event) { None } else { Some(inner) };
                Some((event, next))
            }
        });
        Self {
            inner: inner.boxed(),
        }
    }

    pub fn take(self, n: usize) -> Self {
        Self {
            inner: StreamExt::take(self.inner, n).boxed(),
        }
    }

    pub async fn collect_all(self) -> Vec<Event> {
        self.inner.collect().await
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.inner.as_mut().poll_next(cx)
    }
}
