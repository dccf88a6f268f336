//! Bidirectional RPC between two isolated execution contexts.
//!
//! A coordinator and a worker each own one [`rpc::Endpoint`] joined by a
//! single duplex message channel. Either side registers named functions
//! and either side invokes the other's, with requests and responses
//! correlated by call identifier.

#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod rpc;

pub use config::{EndpointConfig, Role};
pub use error::{RpcError, TransportError};
