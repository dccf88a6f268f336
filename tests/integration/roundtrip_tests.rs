//! Round trips across a real channel pair: plain calls, spread-argument
//! handlers, per-call configuration, and nested calls back across the
//! channel from inside a handler.

use duplex_rpc::rpc::CallConfig;
use serde_json::{Value, json};

use super::mock_transport::Pair;

#[test]
fn add_round_trip() {
    let pair = Pair::new();
    pair.worker
        .register("add", |args, _ctx| async move {
            Ok(json!(args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0)))
        })
        .unwrap();

    let coordinator = pair.coordinator.clone();
    let result = pair.run(async move {
        coordinator
            .invoke("add", json!({"a": 2, "b": 3}), CallConfig::default())
            .await
    });
    assert_eq!(result, Ok(json!(5)));
    assert_eq!(pair.coordinator.pending_calls(), 0);
}

#[test]
fn worker_can_call_coordinator() {
    let pair = Pair::new();
    pair.coordinator
        .register("greet", |args, _ctx| async move {
            Ok(json!(format!("hello {}", args.as_str().unwrap_or("?"))))
        })
        .unwrap();

    let worker = pair.worker.clone();
    let result = pair.run(async move { worker.invoke("greet", json!("worker"), CallConfig::default()).await });
    assert_eq!(result, Ok(json!("hello worker")));
}

#[test]
fn register_ex_receives_positional_arguments() {
    let pair = Pair::new();
    pair.worker
        .register_ex("pair_up", |_ctx, args| async move {
            let x = args.first().cloned().unwrap_or(Value::Null);
            let y = args.get(1).cloned().unwrap_or(Value::Null);
            Ok(json!({"count": args.len(), "x": x, "y": y}))
        })
        .unwrap();

    let coordinator = pair.coordinator.clone();
    let (spread, empty) = pair.run(async move {
        let spread = coordinator.invoke("pair_up", json!([1, 2]), CallConfig::default()).await;
        let empty = coordinator.invoke("pair_up", Value::Null, CallConfig::default()).await;
        (spread, empty)
    });
    assert_eq!(spread, Ok(json!({"count": 2, "x": 1, "y": 2})));
    assert_eq!(empty, Ok(json!({"count": 0, "x": null, "y": null})));
}

#[test]
fn call_config_reaches_handler() {
    let pair = Pair::new();
    pair.worker
        .register("describe", |_args, ctx| async move {
            let cfg = ctx.config();
            Ok(json!({"s": cfg.s.clone(), "t": cfg.t.clone(), "o": cfg.o, "l": cfg.l}))
        })
        .unwrap();

    let coordinator = pair.coordinator.clone();
    let result = pair.run(async move {
        let cfg = CallConfig {
            s: Some("session".into()),
            t: Some("tab".into()),
            o: Some(3.0),
            l: Some(false),
            ..CallConfig::default()
        };
        coordinator.invoke("describe", Value::Null, cfg).await
    });
    assert_eq!(
        result,
        Ok(json!({"s": "session", "t": "tab", "o": 3.0, "l": false}))
    );
}

#[test]
fn handler_can_call_back_across_the_channel() {
    let pair = Pair::new();
    pair.coordinator
        .register("base", |_args, _ctx| async { Ok(json!(40)) })
        .unwrap();
    pair.worker
        .register("answer", |_args, ctx| async move {
            let base = ctx.invoke("base", Value::Null, CallConfig::default()).await?;
            Ok(json!(base.as_i64().unwrap_or(0) + 2))
        })
        .unwrap();

    let coordinator = pair.coordinator.clone();
    let result = pair.run(async move { coordinator.invoke("answer", Value::Null, CallConfig::default()).await });
    assert_eq!(result, Ok(json!(42)));
    assert_eq!(pair.coordinator.pending_calls(), 0);
    assert_eq!(pair.worker.pending_calls(), 0);
}

#[test]
fn mutual_recursion_does_not_deadlock() {
    let pair = Pair::new();
    for endpoint in [&pair.coordinator, &pair.worker] {
        endpoint
            .register("countdown", |args, ctx| async move {
                let n = args.as_u64().unwrap_or(0);
                if n == 0 {
                    return Ok(json!(ctx.endpoint().label()));
                }
                let deeper = ctx.invoke("countdown", json!(n - 1), CallConfig::default()).await?;
                Ok(deeper)
            })
            .unwrap();
    }

    let coordinator = pair.coordinator.clone();
    let odd = pair.run(async move { coordinator.invoke("countdown", json!(5), CallConfig::default()).await });
    // Six hops alternating worker, coordinator, ...: n = 0 lands on the coordinator.
    assert_eq!(odd, Ok(json!("coordinator")));

    let coordinator = pair.coordinator.clone();
    let even = pair.run(async move { coordinator.invoke("countdown", json!(4), CallConfig::default()).await });
    assert_eq!(even, Ok(json!("worker")));
}

#[test]
fn registered_methods_are_listed() {
    let pair = Pair::new();
    pair.worker.register("b", |_a, _c| async { Ok(Value::Null) }).unwrap();
    pair.worker.register_ex("a", |_c, _a| async { Ok(Value::Null) }).unwrap();
    assert_eq!(pair.worker.methods(), vec!["a".to_owned(), "b".to_owned()]);
    assert!(pair.worker.is_registered("a"));
    assert!(!pair.coordinator.is_registered("a"));
}
