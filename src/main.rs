// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::json;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use the_junction::config::{load_and_validate_config, EngineConfig};
use the_junction::engine::{Handler, Workflow};
use the_junction::events::{define_event, Event, EventKind};
use the_junction::middleware::decorators::{DecoratorRegistry, NO_PARALLEL, TRACE_SPAN};
use the_junction::middleware::snapshot::{request, OnRequest, SnapshotData, SnapshotWorkflow};

type DemoResult = Result<(), Box<dyn std::error::Error>>;

/// Demo description shown before each run
struct Demo {
    name: &'static str,
    title: &'static str,
    description: &'static str,
}

const DEMOS: [Demo; 3] = [
    Demo {
        name: "chain",
        title: "Chain: Fixed-Point Dispatch",
        description: "One event cascades through three handlers until `done` is emitted",
    },
    Demo {
        name: "fan-out",
        title: "Fan-Out / Fan-In",
        description: "A splitter emits parts, deferred workers process them, a join merges the results",
    },
    Demo {
        name: "approval",
        title: "Human in the Loop: Snapshot and Resume",
        description: "The workflow requests an approval, is snapshotted to base64 and resumed with the answer",
    },
];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("the_junction=info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let (config, selected) = match parse_args(&args[1..]) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("❌ {}", e);
            eprintln!("Usage: {} [--config <file.yaml|file.toml>] [chain|fan-out|approval|all]", args[0]);
            std::process::exit(1);
        }
    };

    println!("🔀 The Junction - Event-Driven Workflow Demo");
    println!("═══════════════════════════════════════════");

    for demo in DEMOS.iter().filter(|d| selected == "all" || selected == d.name) {
        println!("\n{}", "═".repeat(80));
        println!("{}", demo.title);
        println!("{}", "═".repeat(80));
        println!("📖 {}", demo.description);
        println!();

        let started = Instant::now();
        let outcome = match demo.name {
            "chain" => run_chain(config.clone()).await,
            "fan-out" => run_fan_out(config.clone()).await,
            _ => run_approval(config.clone()).await,
        };
        match outcome {
            Ok(()) => println!("\n✅ {} completed in {:?}", demo.name, started.elapsed()),
            Err(e) => println!("\n❌ {} failed: {}", demo.name, e),
        }
    }
}

fn parse_args(args: &[String]) -> Result<(EngineConfig, String), Box<dyn std::error::Error>> {
    let mut config = EngineConfig::default();
    let mut selected = "all".to_string();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().ok_or("--config requires a file path")?;
            config = load_and_validate_config(path)?;
        } else if arg == "all" || DEMOS.iter().any(|d| d.name == arg) {
            selected = arg.clone();
        } else {
            return Err(format!("unknown argument '{}'", arg).into());
        }
    }
    Ok((config, selected))
}

fn print_history(history: &[Event]) {
    println!("📜 History:");
    for event in history {
        println!("   • {} {}", event.kind(), event.payload());
    }
}

async fn run_chain(config: EngineConfig) -> DemoResult {
    let start = define_event("start");
    let upper = define_event("upper");
    let reversed = define_event("reversed");
    let done = define_event("done");

    let workflow = Workflow::with_config(config);
    let next = upper.clone();
    workflow.handle(
        &[start.clone()],
        Handler::new("uppercase", move |_, inputs| {
            let text = inputs[0].payload().as_str().unwrap_or_default().to_uppercase();
            Ok(Some(next.make(text)))
        }),
    )?;
    let next = reversed.clone();
    workflow.handle(
        &[upper.clone()],
        Handler::new("reverse", move |_, inputs| {
            let text: String = inputs[0].payload().as_str().unwrap_or_default().chars().rev().collect();
            Ok(Some(next.make(text)))
        }),
    )?;
    let next = done.clone();
    workflow.handle(
        &[reversed.clone()],
        Handler::new("finish", move |_, inputs| Ok(Some(next.make(inputs[0].payload().clone())))),
    )?;

    let ctx = workflow.create_context();
    let result = ctx
        .run_until(start.make("hello world"), &done)
        .await
        .map_err(|e| e.to_string())?;
    println!("🎯 Result: {}", result.payload());
    print_history(&ctx.history());
    Ok(())
}

async fn run_fan_out(config: EngineConfig) -> DemoResult {
    const PARTS: usize = 3;
    let start = define_event("start");
    let part = define_event("part");
    let processed = define_event("processed");
    let merged = define_event("merged");

    let workflow = Workflow::with_config(config);
    let part_kind = part.clone();
    workflow.handle(
        &[start.clone()],
        Handler::new("split", move |ctx, inputs| {
            let text = inputs[0].payload().as_str().unwrap_or_default().to_string();
            let parts = text
                .split_whitespace()
                .take(PARTS)
                .map(|word| part_kind.make(word))
                .collect();
            ctx.send_events(parts);
            Ok(None)
        }),
    )?;
    let processed_kind = processed.clone();
    workflow.handle(
        &[part.clone()],
        Handler::deferred("count_letters", move |_, inputs| {
            let processed_kind = processed_kind.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(25)).await;
                let word = inputs[0].payload().as_str().unwrap_or_default().to_string();
                let letters = word.len();
                Ok(Some(processed_kind.make(json!({ "word": word, "letters": letters }))))
            }
        })
        .with_decorator(TRACE_SPAN)
        .with_decorator(NO_PARALLEL),
    )?;
    let merged_kind = merged.clone();
    workflow.handle(
        &vec![processed.clone(); PARTS],
        Handler::new("merge", move |_, inputs| {
            let words: Vec<_> = inputs.iter().map(|e| e.payload().clone()).collect();
            Ok(Some(merged_kind.make(words)))
        }),
    )?;

    let ctx = workflow.create_context();
    DecoratorRegistry::with_builtins().install(&ctx);
    let result = ctx
        .run_until(start.make("rust joins events"), &merged)
        .await
        .map_err(|e| e.to_string())?;
    println!("🎯 Merged: {}", result.payload());
    print_history(&ctx.history());
    Ok(())
}

async fn run_approval(config: EngineConfig) -> DemoResult {
    let start = define_event("start");
    let draft = define_event("draft");
    let approval = define_event("approval");
    let published = define_event("published");

    let workflow = Workflow::with_config(config);
    let (wanted, draft_kind) = (approval.clone(), draft.clone());
    workflow.handle(
        &[start.clone()],
        Handler::new("write_draft", move |ctx, inputs| {
            request(&ctx, &wanted)?;
            Ok(Some(draft_kind.make(inputs[0].payload().clone())))
        }),
    )?;
    let published_kind = published.clone();
    workflow.handle(
        &[draft.clone(), approval.clone()],
        Handler::new("publish", move |_, inputs| {
            Ok(Some(published_kind.make(json!({
                "draft": inputs[0].payload(),
                "approved_by": inputs[1].payload(),
            }))))
        }),
    )?;

    let snapshots = SnapshotWorkflow::new(workflow);
    let on_request: OnRequest = Arc::new(|kind: &EventKind| {
        println!("🙋 Waiting for outside input: {}", kind);
    });
    let ctx = snapshots.create_context_with(Some(on_request));
    ctx.send_event(start.make("release notes"));

    let (requested, data) = ctx.snapshot().await?;
    let stored = data.to_base64()?;
    println!("💾 Snapshot awaiting {} answer(s), {} bytes encoded", requested.len(), stored.len());

    let restored = SnapshotData::from_base64(&stored)?;
    let resumed = snapshots.resume(None, vec![json!("alice")], &restored)?;
    print_history(&resumed.history());
    Ok(())
}
