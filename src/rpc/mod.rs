//! Transport-agnostic bidirectional RPC subsystem.
//!
//! Both contexts run the same [`Endpoint`]; either side registers functions
//! and either side calls the other's.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Endpoint                             │
//! │                                                             │
//! │  invoke ──▶ PendingTable ──▶ codec ──▶ MessageSink ──────▶ │ peer
//! │                  ▲                                          │
//! │                  │ Response                                 │
//! │  MessageSource ──▶ dispatch loop ──▶ Request ──▶ Registry  │
//! │       ▲                                  │ (spawned task)   │
//! │       │                                  ▼                  │
//! │      peer ◀──────── MessageSink ◀──── Response             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod channels;
pub mod codec;
pub mod engine;
pub mod pending;
pub mod registry;
pub mod transport;

pub use codec::{CallConfig, CallId, Message, Request, Response};
pub use engine::{CallContext, Endpoint, Executor, Reply};
pub use transport::{MessageSink, MessageSource, NullSink};
