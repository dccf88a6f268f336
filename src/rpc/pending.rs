//! Pending-call table.
//!
//! Maps each outstanding [`CallId`] to a single-fire completion handle.
//! An entry is taken out of the table before its handle fires, so a
//! duplicate Response finds nothing and cannot complete the call twice.
//!
//! Entries whose Response never arrives stay here for the life of the
//! endpoint. There is no timeout.

use std::collections::HashMap;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use serde_json::Value;

use super::codec::CallId;
use crate::error::RpcError;

/// Outcome delivered to a waiting caller.
pub type Outcome = Result<Value, RpcError>;

/// Single-fire completion handle shared by the table and the caller's future.
pub type Completion = Rc<Signal<NoopRawMutex, Outcome>>;

#[derive(Default)]
pub struct PendingTable {
    calls: HashMap<CallId, Completion>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new outstanding call and return its completion handle.
    pub fn insert(&mut self, id: CallId) -> Completion {
        let completion: Completion = Rc::new(Signal::new());
        self.calls.insert(id, completion.clone());
        completion
    }

    /// Remove and return the handle for `id`, if the call is still pending.
    pub fn take(&mut self, id: &CallId) -> Option<Completion> {
        self.calls.remove(id)
    }

    pub fn contains(&self, id: &CallId) -> bool {
        self.calls.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Outstanding identifiers, sorted.
    pub fn ids(&self) -> Vec<CallId> {
        let mut ids: Vec<CallId> = self.calls.keys().cloned().collect();
        ids.sort();
        ids
    }
}
