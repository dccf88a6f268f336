//! Exact JSON on the channel, checked by feeding raw frames through the
//! codec and inspecting what the endpoint writes back.

use std::rc::Rc;

use duplex_rpc::EndpointConfig;
use duplex_rpc::rpc::channels::{self, ChannelReceiver, ChannelSender};
use duplex_rpc::rpc::codec;
use duplex_rpc::rpc::{CallConfig, Endpoint, Executor, Message, MessageSource};
use futures_lite::future;
use serde_json::{Value, json};

use super::mock_transport::{RecordingSink, recorded, settle, yield_times};

fn feed(frame: &Value) -> Message {
    codec::decode(frame.to_string().as_bytes()).expect("frame decodes")
}

fn sent_json(sink: &RecordingSink) -> Vec<Value> {
    sink.sent
        .borrow()
        .iter()
        .map(|m| serde_json::from_slice(&codec::encode(m).expect("encodes")).expect("valid json"))
        .collect()
}

#[test]
fn request_frame_is_answered_with_result() {
    let (executor, sink, endpoint) = recorded(&EndpointConfig::coordinator());
    endpoint
        .register("add", |args, _ctx| async move {
            Ok(json!(args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0)))
        })
        .unwrap();

    endpoint.dispatch(feed(&json!({
        "type": "RPCRequest",
        "asyncID": "call-1",
        "method": "add",
        "args": {"a": 2, "b": 3},
        "cfg": {}
    })));
    settle(&executor);

    assert_eq!(
        sent_json(&sink),
        vec![json!({"type": "RPCResponse", "asyncID": "call-1", "result": 5})]
    );
}

#[test]
fn failed_request_frame_carries_only_error() {
    let (executor, sink, endpoint) = recorded(&EndpointConfig::coordinator());
    endpoint.dispatch(feed(&json!({
        "type": "RPCRequest",
        "asyncID": "call-2",
        "method": "nope",
        "args": null,
        "cfg": null
    })));
    settle(&executor);

    assert_eq!(
        sent_json(&sink),
        vec![json!({"type": "RPCResponse", "asyncID": "call-2", "error": "no such method: nope"})]
    );
}

#[test]
fn outbound_request_frame_shape() {
    let (_executor, sink, endpoint) = recorded(&EndpointConfig::coordinator());
    let cfg = CallConfig {
        t: Some("tab".into()),
        l: Some(true),
        ..CallConfig::default()
    };
    let reply = endpoint.invoke("echo", json!([1, "two"]), cfg);

    assert_eq!(
        sent_json(&sink),
        vec![json!({
            "type": "RPCRequest",
            "asyncID": reply.call_id().as_str(),
            "method": "echo",
            "args": [1, "two"],
            "cfg": {"t": "tab", "l": true}
        })]
    );
}

#[test]
fn response_frame_without_result_resolves_to_null() {
    let (_executor, _sink, endpoint) = recorded(&EndpointConfig::coordinator());
    let reply = endpoint.invoke("f", Value::Null, CallConfig::default());
    endpoint.dispatch(feed(&json!({
        "type": "RPCResponse",
        "asyncID": reply.call_id().as_str(),
    })));
    assert_eq!(future::block_on(reply), Ok(Value::Null));
}

#[test]
fn unknown_message_type_is_ignored() {
    let (executor, sink, endpoint) = recorded(&EndpointConfig::coordinator());
    let message = feed(&json!({"type": "heartbeat", "seq": 4}));
    assert_eq!(message, Message::Unknown);

    endpoint.dispatch(message);
    settle(&executor);
    assert!(sink.sent.borrow().is_empty());
}

#[test]
fn extra_cfg_keys_survive_to_the_handler() {
    let (executor, sink, endpoint) = recorded(&EndpointConfig::coordinator());
    endpoint
        .register("cfg", |_args, ctx| async move {
            Ok(Value::Object(ctx.config().extra.clone()))
        })
        .unwrap();

    endpoint.dispatch(feed(&json!({
        "type": "RPCRequest",
        "asyncID": "call-3",
        "method": "cfg",
        "args": null,
        "cfg": {"s": "x", "priority": 2}
    })));
    settle(&executor);

    assert_eq!(sink.responses()[0].result, Some(json!({"priority": 2})));
}

/// Worker endpoint on one end of a real link; raw frames go in through
/// the other end and come back as decoded messages.
fn raw_worker() -> (Rc<Executor>, ChannelSender, ChannelReceiver, Endpoint, ChannelReceiver) {
    let executor = Rc::new(Executor::new());
    let (near, far) = channels::duplex();
    let (near_tx, near_rx) = near.split();
    let (far_tx, far_rx) = far.split();
    let quiet = EndpointConfig {
        forward_diagnostics: false,
        ..EndpointConfig::worker()
    };
    let worker = Endpoint::new(&quiet, far_tx, &executor);
    (executor, near_tx, near_rx, worker, far_rx)
}

fn serve_briefly(executor: &Executor, worker: &Endpoint, rx: ChannelReceiver) {
    let worker = worker.clone();
    future::block_on(executor.run(future::or(
        async move { worker.serve(&rx).await },
        yield_times(64),
    )));
}

fn received(rx: &ChannelReceiver) -> Vec<Value> {
    let mut out = Vec::new();
    while rx.queued() > 0 {
        match future::block_on(rx.recv()) {
            Some(Ok(message)) => out.push(serde_json::to_value(&message).expect("encodes")),
            other => panic!("unexpected frame: {other:?}"),
        }
    }
    out
}

#[test]
fn mistyped_cfg_still_reaches_the_handler() {
    let (executor, tx, rx, worker, worker_rx) = raw_worker();
    worker
        .register("speed", |_args, ctx| async move {
            Ok(json!({"o": ctx.config().o, "raw": ctx.config().extra.get("o").cloned()}))
        })
        .unwrap();

    let frame = json!({
        "type": "RPCRequest",
        "asyncID": "x",
        "method": "speed",
        "args": null,
        "cfg": {"o": "fast"}
    });
    tx.send_frame(frame.to_string().into_bytes()).unwrap();
    let frame = json!({"type": "RPCRequest", "asyncID": "y", "method": "speed", "cfg": []});
    tx.send_frame(frame.to_string().into_bytes()).unwrap();
    serve_briefly(&executor, &worker, worker_rx);

    assert_eq!(
        received(&rx),
        vec![
            json!({"type": "RPCResponse", "asyncID": "x", "result": {"o": null, "raw": "fast"}}),
            json!({"type": "RPCResponse", "asyncID": "y", "result": {"o": null, "raw": null}}),
        ]
    );
}

#[test]
fn malformed_request_with_call_id_is_answered() {
    let (executor, tx, rx, worker, worker_rx) = raw_worker();
    worker
        .register("m", |_args, _ctx| async { Ok(json!("unreachable")) })
        .unwrap();

    tx.send_frame(br#"{"type":"RPCRequest","asyncID":"bad","method":7}"#.to_vec())
        .unwrap();
    tx.send_frame(br#"{"type":"RPCRequest","method":"m"}"#.to_vec()).unwrap();
    tx.send_frame(b"not json at all".to_vec()).unwrap();
    serve_briefly(&executor, &worker, worker_rx);

    let answers = received(&rx);
    assert_eq!(answers.len(), 1, "only the frame with an asyncID is answered");
    assert_eq!(answers[0]["asyncID"], json!("bad"));
    let error = answers[0]["error"].as_str().expect("error text");
    assert!(error.starts_with("malformed request: "), "{error}");
}
