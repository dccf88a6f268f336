//! Unified error types for the RPC layer.
//!
//! A single `RpcError` enum that every subsystem converts into, so the
//! invocation engine can turn any failure into a Response error with one
//! `to_string()` call. Only the text of an error ever crosses the channel.

use core::fmt;

use crate::rpc::codec::CallId;

// ---------------------------------------------------------------------------
// Top-level RPC error
// ---------------------------------------------------------------------------

/// Every fallible RPC operation funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// A function was registered under an empty method name.
    EmptyMethodName,
    /// A function with this name is already registered on this endpoint.
    DuplicateRegistration(String),
    /// The receiving side has no function registered under this name.
    NoSuchMethod(String),
    /// A spread-arguments handler received something other than an array or null.
    BadArguments(String),
    /// An inbound Request carried a call identifier but was otherwise unreadable.
    MalformedRequest(String),
    /// A registered function failed while serving a request. Holds its text.
    HandlerFailure(String),
    /// The peer reported a failure for one of our calls. Holds the peer's text.
    Remote(String),
    /// The channel refused an outbound message.
    Transport(TransportError),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMethodName => write!(f, "method name must not be empty"),
            Self::DuplicateRegistration(name) => write!(f, "duplicate registration: {name}"),
            Self::NoSuchMethod(name) => write!(f, "no such method: {name}"),
            Self::BadArguments(reason) => write!(f, "bad arguments: {reason}"),
            Self::MalformedRequest(reason) => write!(f, "malformed request: {reason}"),
            Self::HandlerFailure(text) | Self::Remote(text) => f.write_str(text),
            Self::Transport(e) => write!(f, "transport: {e}"),
        }
    }
}

impl std::error::Error for RpcError {}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The outbound queue has no free slot.
    Full,
    /// The link was closed by either end.
    Closed,
    /// A message could not be encoded or decoded.
    Codec(String),
    /// A Request frame failed to decode, but its call identifier was
    /// recovered so the caller can still be answered.
    MalformedRequest { call_id: CallId, reason: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "channel full"),
            Self::Closed => write!(f, "channel closed"),
            Self::Codec(msg) => write!(f, "codec: {msg}"),
            Self::MalformedRequest { call_id, reason } => {
                write!(f, "malformed request {call_id}: {reason}")
            }
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for RpcError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, RpcError>;
