//! duplex-rpc: coordinator/worker demonstration.
//!
//! Two execution contexts, one per OS thread, each running its own
//! single-threaded executor and [`Endpoint`]. Only the duplex channel
//! crosses between them.
//!
//! ```text
//! ┌───────────────────────┐                  ┌───────────────────────┐
//! │  main thread          │                  │  rpc-worker thread    │
//! │  Coordinator endpoint │◀── duplex() ───▶│  Worker endpoint      │
//! │  + shared console     │   (JSON frames)  │  (forwards its logs)  │
//! │  registers: clock     │                  │  registers: add, echo,│
//! │                       │                  │             ping      │
//! └───────────────────────┘                  └───────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::rc::Rc;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use futures_lite::future;
use log::{LevelFilter, info, warn};
use serde_json::{Value, json};

use duplex_rpc::EndpointConfig;
use duplex_rpc::adapters::console;
use duplex_rpc::rpc::channels::{self, ChannelEnd};
use duplex_rpc::rpc::{CallConfig, Endpoint, Executor};

// ── Worker context ────────────────────────────────────────────

fn run_worker(end: ChannelEnd) -> Result<()> {
    let executor = Rc::new(Executor::new());
    let (sender, receiver) = end.split();
    let endpoint = Endpoint::new(&EndpointConfig::worker(), sender, &executor);

    endpoint.register("add", |args, _ctx| async move {
        let a = args["a"].as_f64().context("`a` must be a number")?;
        let b = args["b"].as_f64().context("`b` must be a number")?;
        Ok(json!(a + b))
    })?;

    endpoint.register_ex("echo", |ctx, args| async move {
        let tag = ctx.config().t.clone().unwrap_or_default();
        Ok(json!({ "tag": tag, "args": args }))
    })?;

    // Re-entrant: answers by calling back into the coordinator first.
    endpoint.register("ping", |_args, ctx| async move {
        let now = ctx.invoke("clock", Value::Null, CallConfig::default()).await?;
        Ok(json!({ "pong": true, "coordinator_clock_ms": now }))
    })?;

    let serve = async move { endpoint.serve(&receiver).await };
    future::block_on(executor.run(serve));
    Ok(())
}

// ── Coordinator context ───────────────────────────────────────

async fn session(endpoint: Endpoint) -> Result<()> {
    let sum = endpoint
        .invoke("add", json!({ "a": 2, "b": 3 }), CallConfig::default())
        .await?;
    info!("add(2, 3) = {}", sum);

    let cfg = CallConfig {
        t: Some("demo".into()),
        ..CallConfig::default()
    };
    let echoed = endpoint.invoke("echo", json!([1, "two", null]), cfg).await?;
    info!("echo = {}", echoed);

    // Issued together; answers may come back in any order.
    let first = endpoint.invoke("add", json!({ "a": 1, "b": 1 }), CallConfig::default());
    let second = endpoint.invoke("add", json!({ "a": 10, "b": 20 }), CallConfig::default());
    let (first, second) = future::zip(first, second).await;
    info!("concurrent add = {} / {}", first?, second?);

    let pong = endpoint.invoke("ping", Value::Null, CallConfig::default()).await?;
    info!("ping = {}", pong);

    match endpoint.invoke("missing", Value::Null, CallConfig::default()).await {
        Ok(v) => bail!("unregistered method unexpectedly answered {}", v),
        Err(e) => info!("missing -> rejected: {}", e),
    }

    if endpoint.pending_calls() != 0 {
        warn!("{} calls still pending: {:?}", endpoint.pending_calls(), endpoint.pending_ids());
    }
    Ok(())
}

fn run_coordinator(config: &EndpointConfig, end: ChannelEnd) -> Result<()> {
    let executor = Rc::new(Executor::new());
    let (sender, receiver) = end.split();
    let endpoint = Endpoint::new(config, sender, &executor);

    let started = Instant::now();
    endpoint.register("clock", move |_args, _ctx| async move {
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(json!(elapsed))
    })?;

    let serving = endpoint.clone();
    let main = future::or(session(endpoint), async move {
        serving.serve(&receiver).await;
        Err(anyhow!("worker closed the channel"))
    });
    let outcome = future::block_on(executor.run(main));

    // Dropping the executor drops every task holding an endpoint clone,
    // which drops the sender and closes the link for the worker.
    drop(executor);
    outcome
}

// ── Main ──────────────────────────────────────────────────────

const BANNER_WIDTH: usize = 38;

fn banner(version: &str) -> [String; 3] {
    let title = format!("  duplex-rpc v{version}");
    [
        format!("╔{}╗", "═".repeat(BANNER_WIDTH)),
        format!("║{:<w$}║", title, w = BANNER_WIDTH),
        format!("╚{}╝", "═".repeat(BANNER_WIDTH)),
    ]
}

fn main() -> Result<()> {
    console::init(LevelFilter::Info).map_err(|e| anyhow!("installing console logger: {e}"))?;

    for line in banner(env!("CARGO_PKG_VERSION")) {
        info!("{line}");
    }

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            EndpointConfig::from_json(&text)?
        }
        None => EndpointConfig::coordinator(),
    };

    let (coordinator_end, worker_end) = channels::duplex();
    let worker = thread::Builder::new()
        .name("rpc-worker".into())
        .spawn(move || run_worker(worker_end))
        .context("spawning worker thread")?;

    let result = run_coordinator(&config, coordinator_end);

    match worker.join() {
        Ok(worker_result) => worker_result.context("worker context")?,
        Err(_) => bail!("worker thread panicked"),
    }
    result
}
