//! Message shapes exchanged on the channel.
//!
//! Wire format (JSON objects, one per channel message):
//! ```text
//! RPCRequest  { type, asyncID, method, args, cfg }
//! RPCResponse { type, asyncID, result?, error? }
//! log         { type, data }
//! ```
//!
//! The channel already delivers discrete messages, so there is no framing
//! here. `result` and `error` are mutually exclusive; a Response carrying
//! neither (or an `error` that is not a string) is a success whose value
//! is `null`.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::RpcError;

// ── Call identifier ──────────────────────────────────────────

/// Opaque token correlating one Request with its Response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Mint a fresh random (v4 UUID) identifier.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for CallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── Per-call configuration ───────────────────────────────────

/// Per-call options. Opaque to the RPC layer; handlers interpret them.
///
/// Decoding never fails: a recognized key holding an unexpected type is
/// kept in `extra` as sent, and a `cfg` that is not an object is treated
/// as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallConfig {
    /// String-valued context hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
    /// String-valued context hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    /// Numeric hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o: Option<f64>,
    /// Boolean flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l: Option<bool>,
    /// Anything else the caller sent, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallConfig {
    pub fn is_empty(&self) -> bool {
        self.s.is_none() && self.t.is_none() && self.o.is_none() && self.l.is_none() && self.extra.is_empty()
    }

    /// Sort an arbitrary JSON object into recognized options and `extra`.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let s = take_if(&mut map, "s", Value::is_string).and_then(|v| v.as_str().map(str::to_owned));
        let t = take_if(&mut map, "t", Value::is_string).and_then(|v| v.as_str().map(str::to_owned));
        let o = take_if(&mut map, "o", Value::is_number).and_then(|v| v.as_f64());
        let l = take_if(&mut map, "l", Value::is_boolean).and_then(|v| v.as_bool());
        Self { s, t, o, l, extra: map }
    }
}

fn take_if(map: &mut Map<String, Value>, key: &str, accept: fn(&Value) -> bool) -> Option<Value> {
    if map.get(key).is_some_and(accept) {
        map.remove(key)
    } else {
        None
    }
}

// ── Messages ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "asyncID")]
    pub call_id: CallId,
    pub method: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default, deserialize_with = "lenient_config")]
    pub cfg: CallConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "asyncID")]
    pub call_id: CallId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_none"
    )]
    pub error: Option<String>,
}

impl Response {
    pub fn success(call_id: CallId, result: Value) -> Self {
        Self {
            call_id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(call_id: CallId, error: impl Into<String>) -> Self {
        Self {
            call_id,
            result: None,
            error: Some(error.into()),
        }
    }

    /// What the original caller observes. Only a string `error` rejects.
    pub fn into_outcome(self) -> Result<Value, RpcError> {
        match self.error {
            Some(text) => Err(RpcError::Remote(text)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Every message that can travel on the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "RPCRequest")]
    Request(Request),
    #[serde(rename = "RPCResponse")]
    Response(Response),
    /// Ancillary diagnostics from a context without its own console.
    #[serde(rename = "log")]
    Log { data: Value },
    /// Any other `type`. Ignored by the RPC layer.
    #[serde(other, skip_serializing)]
    Unknown,
}

/// Encode a message for a byte-carrying channel.
pub fn encode(message: &Message) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(message)
}

/// Decode one channel message.
pub fn decode(bytes: &[u8]) -> Result<Message, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Call identifier of a Request frame that failed to decode, if the frame
/// is JSON that names itself a Request and carries a string `asyncID`.
pub fn request_id(bytes: &[u8]) -> Option<CallId> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    if value.get("type")?.as_str()? != "RPCRequest" {
        return None;
    }
    value.get("asyncID")?.as_str().map(CallId::from)
}

fn lenient_config<'de, D>(deserializer: D) -> Result<CallConfig, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(CallConfig::from_map(map)),
        _ => Ok(CallConfig::default()),
    }
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}
