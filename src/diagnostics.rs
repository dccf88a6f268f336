//! Diagnostic output routing.
//!
//! Registration events and dropped responses produce one human-readable
//! line each. Where that line goes depends on the endpoint's role:
//!
//! ```text
//!   coordinator ──▶ log facade ──▶ shared console
//!   worker      ──▶ {type:"log"} ──▶ channel ──▶ coordinator ──▶ console
//! ```
//!
//! A worker whose forward fails (channel full or closed) falls back to its
//! local `log` backend so the line is never silently lost.

use core::str::FromStr;

use log::{Level, debug, log, warn};
use serde_json::{Value, json};

use crate::config::EndpointConfig;
use crate::rpc::codec::Message;
use crate::rpc::transport::MessageSink;

pub struct Diagnostics {
    label: String,
    forward: bool,
    owns_console: bool,
}

impl Diagnostics {
    pub fn new(config: &EndpointConfig) -> Self {
        Self {
            label: config.label.clone(),
            forward: config.forwards_diagnostics(),
            owns_console: config.role.owns_console(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Emit one diagnostic line, either locally or through `sink`.
    pub fn emit(&self, level: Level, line: &str, sink: &dyn MessageSink) {
        if self.forward {
            let msg = Message::Log {
                data: record(level, &self.label, line),
            };
            match sink.send(&msg) {
                Ok(()) => return,
                Err(e) => warn!("RPC[{}]: log forward failed: {}", self.label, e),
            }
        }
        log!(level, "RPC[{}]: {}", self.label, line);
    }

    /// Print a Log message received from the peer. Only the console owner
    /// prints; anyone else drops it.
    pub fn print_forwarded(&self, data: &Value) {
        if !self.owns_console {
            debug!("RPC[{}]: ignoring forwarded log", self.label);
            return;
        }
        let line = ForwardedLine::parse(data);
        match line.source {
            Some(source) => log!(line.level, "RPC[{}]: {}", source, line.message),
            None => log!(line.level, "RPC[{}] peer: {}", self.label, line.message),
        }
    }
}

/// Payload of a forwarded Log message.
pub fn record(level: Level, source: &str, message: &str) -> Value {
    json!({
        "level": level.as_str(),
        "source": source,
        "message": message,
    })
}

/// A forwarded line as the console owner understands it. Accepts the
/// structured [`record`] shape or any bare value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedLine {
    pub level: Level,
    pub source: Option<String>,
    pub message: String,
}

impl ForwardedLine {
    pub fn parse(data: &Value) -> Self {
        match data {
            Value::String(s) => Self {
                level: Level::Info,
                source: None,
                message: s.clone(),
            },
            Value::Object(map) if map.contains_key("message") => Self {
                level: map
                    .get("level")
                    .and_then(Value::as_str)
                    .and_then(|s| Level::from_str(s).ok())
                    .unwrap_or(Level::Info),
                source: map.get("source").and_then(Value::as_str).map(str::to_owned),
                message: match &map["message"] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            },
            other => Self {
                level: Level::Info,
                source: None,
                message: other.to_string(),
            },
        }
    }
}
