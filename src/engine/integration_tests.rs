// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::engine::{
    Handler, HandlerContext, HandlerOutput, HandlerResult, NodeId, Workflow,
};
use crate::events::{define_event, Event, EventKind};
use crate::traits::{HandlerInterceptor, Invocation, Next, SendObserver};

/// Handler that emits one event of `kind` carrying the first input's payload.
fn forward(name: &str, kind: &EventKind) -> Handler {
    let kind = kind.clone();
    Handler::new(name.to_string(), move |_, inputs| {
        Ok(Some(kind.make(inputs[0].payload().clone())))
    })
}

fn labels(events: &[Event]) -> Vec<String> {
    events.iter().map(|e| e.kind().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_point_chain() {
        let start = define_event("start");
        let a = define_event("a");
        let b = define_event("b");
        let c = define_event("c");
        let stop = define_event("stop");

        let workflow = Workflow::new();
        workflow.handle(&[start.clone()], forward("to_a", &a)).unwrap();
        workflow.handle(&[a.clone()], forward("to_b", &b)).unwrap();
        workflow.handle(&[b.clone()], forward("to_c", &c)).unwrap();
        workflow.handle(&[c.clone()], forward("to_stop", &stop)).unwrap();

        let ctx = workflow.create_context();
        let result = ctx.run_until(start.make("go"), &stop).await.unwrap();

        assert_eq!(result.payload(), "go");
        assert_eq!(
            labels(&ctx.history()),
            vec!["start", "a", "b", "c", "stop"]
        );
        // Everything but `stop` was consumed
        assert_eq!(ctx.pending_events().len(), 1);
    }

    #[test]
    fn test_duplicate_slots_need_two_distinct_events() {
        let a = define_event("a");
        let pair = define_event("pair");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let workflow = Workflow::new();
        let pair_kind = pair.clone();
        let recorded = seen.clone();
        workflow
            .handle(
                &[a.clone(), a.clone()],
                Handler::new("join_pair", move |_, inputs| {
                    recorded.lock().push((inputs[0].id(), inputs[1].id()));
                    Ok(Some(pair_kind.make(())))
                }),
            )
            .unwrap();

        let ctx = workflow.create_context();
        let first = a.make(1);
        let second = a.make(2);

        ctx.send_event(first.clone());
        assert!(seen.lock().is_empty());

        ctx.send_event(second.clone());
        assert_eq!(seen.lock().as_slice(), &[(first.id(), second.id())]);
    }

    #[tokio::test]
    async fn test_fan_out_fan_in_completes_once() {
        let start = define_event("start");
        let task = define_event("task");
        let done = define_event("done");
        let all_complete = define_event("all_complete");
        let fan_in_calls = Arc::new(AtomicUsize::new(0));

        let workflow = Workflow::new();

        let task_kind = task.clone();
        workflow
            .handle(
                &[start.clone()],
                Handler::new("fan_out", move |ctx, _| {
                    ctx.send_events((1..=3).map(|i| task_kind.make(i)).collect());
                    Ok(None)
                }),
            )
            .unwrap();

        let done_kind = done.clone();
        workflow
            .handle(
                &[task.clone()],
                Handler::deferred("work", move |_, inputs| {
                    let done_kind = done_kind.clone();
                    async move {
                        let n: u64 = inputs[0].payload_as()?;
                        // Finish in reverse order of dispatch
                        tokio::time::sleep(Duration::from_millis(30 - n * 10)).await;
                        Ok(Some(done_kind.make(n)))
                    }
                }),
            )
            .unwrap();

        let all_kind = all_complete.clone();
        let calls = fan_in_calls.clone();
        workflow
            .handle(
                &[done.clone(), done.clone(), done.clone()],
                Handler::new("fan_in", move |_, inputs| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let total: u64 = inputs
                        .iter()
                        .map(|e| e.payload_as::<u64>())
                        .sum::<Result<u64, _>>()?;
                    Ok(Some(all_kind.make(total)))
                }),
            )
            .unwrap();

        let ctx = workflow.create_context();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            ctx.run_until(start.make(()), &all_complete),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(result.payload(), 6);
        assert_eq!(fan_in_calls.load(Ordering::SeqCst), 1);
        assert!(ctx.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_scoped_streams_are_isolated() {
        let start = define_event("start");
        let left = define_event("left");
        let right = define_event("right");
        let leaf = define_event("leaf");
        let echo = define_event("echo");
        let branches: Arc<Mutex<Vec<(String, HandlerContext)>>> = Arc::new(Mutex::new(Vec::new()));

        let workflow = Workflow::new();
        let (l, r) = (left.clone(), right.clone());
        workflow
            .handle(
                &[start.clone()],
                Handler::new("split", move |ctx, _| {
                    ctx.send_events(vec![l.make("left"), r.make("right")]);
                    Ok(None)
                }),
            )
            .unwrap();
        for (name, kind) in [("left_branch", &left), ("right_branch", &right)] {
            let store = branches.clone();
            let leaf_kind = leaf.clone();
            workflow
                .handle(
                    &[kind.clone()],
                    Handler::new(name, move |ctx, inputs| {
                        let side = inputs[0].payload().as_str().unwrap_or_default().to_string();
                        store.lock().push((side.clone(), ctx));
                        Ok(Some(leaf_kind.make(side)))
                    }),
                )
                .unwrap();
        }
        workflow.handle(&[leaf.clone()], forward("echo", &echo)).unwrap();

        let ctx = workflow.create_context();
        ctx.send_event(start.make(()));

        let branches = branches.lock().clone();
        assert_eq!(branches.len(), 2);
        for (side, branch_ctx) in branches {
            let seen = branch_ctx.stream().take(2).collect_all().await;
            assert_eq!(labels(&seen), vec!["leaf", "echo"]);
            assert!(seen.iter().all(|e| e.payload() == side.as_str()));
        }

        let everything = ctx.stream().take(7).collect_all().await;
        assert_eq!(everything.len(), 7);
    }

    #[tokio::test]
    async fn test_parent_is_producer_of_latest_input() {
        let a = define_event("a");
        let b = define_event("b");
        let trigger = define_event("trigger");
        let producer = Arc::new(Mutex::new(None));
        let parent = Arc::new(Mutex::new(None));

        let workflow = Workflow::new();
        let b_kind = b.clone();
        let producer_slot = producer.clone();
        workflow
            .handle(
                &[trigger.clone()],
                Handler::new("make_b", move |ctx, _| {
                    *producer_slot.lock() = Some(ctx.node_id());
                    Ok(Some(b_kind.make(())))
                }),
            )
            .unwrap();
        let parent_slot = parent.clone();
        workflow
            .handle(
                &[a.clone(), b.clone()],
                Handler::new("join", move |ctx, _| {
                    *parent_slot.lock() = ctx.parent();
                    Ok(None)
                }),
            )
            .unwrap();

        let ctx = workflow.create_context();
        ctx.send_event(a.make(()));
        ctx.send_event(trigger.make(()));

        let producer = producer.lock().unwrap();
        assert_ne!(producer, NodeId::ROOT);
        assert_eq!(*parent.lock(), Some(producer));
    }

    #[tokio::test]
    async fn test_sync_failure_cancels_root_and_running_descendants() {
        let start = define_event("start");
        let trigger = define_event("trigger");
        let aborted = define_event("aborted");

        let workflow = Workflow::new();
        let aborted_kind = aborted.clone();
        workflow
            .handle(
                &[start.clone()],
                Handler::deferred("watcher", move |ctx, _| {
                    let signal = ctx.signal();
                    let aborted_kind = aborted_kind.clone();
                    async move {
                        signal.cancelled().await;
                        let reason = signal.reason().map(|r| r.to_string()).unwrap_or_default();
                        Ok(Some(aborted_kind.make(reason)))
                    }
                }),
            )
            .unwrap();
        workflow
            .handle(
                &[trigger.clone()],
                Handler::new("boom", |_, _| Err(anyhow::anyhow!("boom"))),
            )
            .unwrap();

        let ctx = workflow.create_context();
        let signal = ctx.signal();
        let mut aborted_stream = ctx.stream().of_kind(&aborted);

        ctx.send_event(start.make(()));
        ctx.send_event(trigger.make(()));

        assert!(signal.is_cancelled());
        assert_eq!(ctx.failure().unwrap().to_string(), "boom");

        let event = tokio::time::timeout(Duration::from_secs(5), aborted_stream.next_event())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.payload(), "boom");
    }

    #[test]
    fn test_failure_with_own_token_stays_local() {
        let start = define_event("start");

        let workflow = Workflow::new();
        workflow
            .handle(
                &[start.clone()],
                Handler::new("careful", |ctx, _| {
                    let signal = ctx.signal();
                    assert!(!signal.is_cancelled());
                    Err(anyhow::anyhow!("local problem"))
                }),
            )
            .unwrap();

        let ctx = workflow.create_context();
        let root = ctx.signal();
        ctx.send_event(start.make(()));

        assert!(!root.is_cancelled());
        assert!(ctx.failure().is_none());
    }

    #[tokio::test]
    async fn test_run_until_reports_cancellation() {
        let start = define_event("start");
        let stop = define_event("stop");

        let workflow = Workflow::new();
        workflow
            .handle(
                &[start.clone()],
                Handler::new("fails", |_, _| Err(anyhow::anyhow!("no route"))),
            )
            .unwrap();

        let ctx = workflow.create_context();
        let error = ctx.run_until(start.make(()), &stop).await.unwrap_err();
        assert_eq!(error.to_string(), "no route");
    }

    #[tokio::test]
    async fn test_deferred_error_surfaces_to_waiter() {
        let start = define_event("start");

        let workflow = Workflow::new();
        workflow
            .handle(
                &[start.clone()],
                Handler::deferred("flaky", |_, _| async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Err::<Option<Event>, _>(anyhow::anyhow!("upstream 503"))
                }),
            )
            .unwrap();

        let ctx = workflow.create_context();
        let root = ctx.signal();
        ctx.send_event(start.make(()));

        let in_flight = ctx.in_flight();
        assert_eq!(in_flight.len(), 1);
        let error = in_flight[0].clone().wait().await.unwrap_err();

        assert_eq!(error.to_string(), "upstream 503");
        // Deferred errors do not cancel anything
        assert!(!root.is_cancelled());
        assert!(ctx.in_flight().is_empty());
    }

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl HandlerInterceptor for Recording {
        fn intercept(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult {
            self.log.lock().push(format!("{}:before", self.name));
            let result = next.run(invocation);
            self.log.lock().push(format!("{}:after", self.name));
            result
        }
    }

    struct Muzzle;

    impl HandlerInterceptor for Muzzle {
        fn intercept(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult {
            invocation.set_handler_fn(Arc::new(|_, _| Ok(HandlerOutput::none())));
            next.run(invocation)
        }
    }

    #[test]
    fn test_interceptors_run_in_order_and_can_replace_handlers() {
        let start = define_event("start");
        let out = define_event("out");
        let log = Arc::new(Mutex::new(Vec::new()));

        let workflow = Workflow::new();
        let handler_log = log.clone();
        let out_kind = out.clone();
        workflow
            .handle(
                &[start.clone()],
                Handler::new("body", move |_, _| {
                    handler_log.lock().push("handler".to_string());
                    Ok(Some(out_kind.make(())))
                }),
            )
            .unwrap();

        let ctx = workflow.create_context();
        ctx.add_interceptor(Arc::new(Recording {
            name: "outer",
            log: log.clone(),
        }));
        ctx.add_interceptor(Arc::new(Recording {
            name: "inner",
            log: log.clone(),
        }));
        ctx.send_event(start.make(()));

        assert_eq!(
            log.lock().as_slice(),
            &["outer:before", "inner:before", "handler", "inner:after", "outer:after"]
        );

        let muted = workflow.create_context();
        muted.add_interceptor(Arc::new(Muzzle));
        muted.send_event(start.make(()));
        assert_eq!(labels(&muted.history()), vec!["start"]);
    }

    struct ProducerLog(Arc<Mutex<Vec<(String, NodeId)>>>);

    impl SendObserver for ProducerLog {
        fn on_send(&self, event: &Event, producer: NodeId) {
            self.0.lock().push((event.kind().to_string(), producer));
        }
    }

    #[test]
    fn test_observers_see_every_send_with_producer() {
        let start = define_event("start");
        let next = define_event("next");
        let sends = Arc::new(Mutex::new(Vec::new()));

        let workflow = Workflow::new();
        workflow.handle(&[start.clone()], forward("step", &next)).unwrap();

        let ctx = workflow.create_context();
        ctx.add_observer(Arc::new(ProducerLog(sends.clone())));
        ctx.send_event(start.make(()));

        let sends = sends.lock();
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[0], ("start".to_string(), NodeId::ROOT));
        assert_eq!(sends[1].0, "next");
        assert_ne!(sends[1].1, NodeId::ROOT);
    }

    #[test]
    fn test_cascade_limit_stops_synchronous_cycle() {
        let ping = define_event("ping");
        let calls = Arc::new(AtomicUsize::new(0));
        let cfg = EngineConfig::from_yaml_str("dispatch:\n  max_cascade_rounds: 5\n").unwrap();

        let workflow = Workflow::with_config(cfg);
        let ping_kind = ping.clone();
        let counter = calls.clone();
        workflow
            .handle(
                &[ping.clone()],
                Handler::new("loop", move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(ping_kind.make(())))
                }),
            )
            .unwrap();

        let ctx = workflow.create_context();
        ctx.send_event(ping.make(()));

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(ctx.pending_events().len(), 1);
    }

    #[test]
    fn test_collect_garbage_after_chain() {
        let start = define_event("start");
        let a = define_event("a");
        let b = define_event("b");

        let workflow = Workflow::new();
        workflow.handle(&[start.clone()], forward("to_a", &a)).unwrap();
        workflow.handle(&[a.clone()], forward("to_b", &b)).unwrap();

        let ctx = workflow.create_context();
        ctx.send_event(start.make(()));
        assert_eq!(ctx.node_count(), 3);

        // The node that produced the still-queued `b` is kept, and so is its parent.
        assert_eq!(ctx.collect_garbage(), 0);

        // A sink registered later drains both the old and the new `b`.
        workflow.handle(&[b.clone()], Handler::new("sink", |_, _| Ok(None))).unwrap();
        ctx.send_event(start.make(()));
        assert!(ctx.pending_events().is_empty());
        assert_eq!(ctx.node_count(), 7);

        assert_eq!(ctx.collect_garbage(), 6);
        assert_eq!(ctx.node_count(), 1);
        // Only what the root itself sent survives collection
        assert_eq!(labels(&ctx.history()), vec!["start", "start"]);
    }
}
