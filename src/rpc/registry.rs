//! Function registry: method name to handler.
//!
//! Populated once at startup per context. Lookup is by exact name; there is
//! no namespacing and no wildcard dispatch. Handlers are never removed.

use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use futures_lite::future::{BoxedLocal, FutureExt};
use serde_json::Value;

use super::engine::CallContext;
use crate::error::RpcError;

/// Boxed future produced by a handler.
pub type HandlerFuture = BoxedLocal<anyhow::Result<Value>>;

/// A registered function in canonical `(args, context)` shape.
pub type Handler = Rc<dyn Fn(Value, CallContext) -> HandlerFuture>;

#[derive(Default)]
pub struct Registry {
    fns: HashMap<String, Handler>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `handler` under `name`. The first registration of a name wins;
    /// later attempts fail and leave it in place.
    pub fn insert(&mut self, name: &str, handler: Handler) -> Result<(), RpcError> {
        if name.is_empty() {
            return Err(RpcError::EmptyMethodName);
        }
        if self.fns.contains_key(name) {
            return Err(RpcError::DuplicateRegistration(name.to_owned()));
        }
        self.fns.insert(name.to_owned(), handler);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Handler> {
        self.fns.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fns.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fns.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Box a `(args, context)` function into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Value, CallContext) -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + 'static,
{
    Rc::new(move |args: Value, ctx: CallContext| f(args, ctx).boxed_local())
}

/// Box a `(context, positional args)` function into a [`Handler`].
///
/// An array `args` is spread into the positional list, `null` becomes an
/// empty list, and anything else fails with [`RpcError::BadArguments`]
/// without calling `f`.
pub fn spread_handler<F, Fut>(f: F) -> Handler
where
    F: Fn(CallContext, Vec<Value>) -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + 'static,
{
    let f = Rc::new(f);
    Rc::new(move |args: Value, ctx: CallContext| match spread_args(args) {
        Ok(positional) => {
            let f = f.clone();
            async move { f(ctx, positional).await }.boxed_local()
        }
        Err(e) => async move { Err(anyhow::Error::from(e)) }.boxed_local(),
    })
}

/// Turn an `args` value into positional arguments.
pub fn spread_args(args: Value) -> Result<Vec<Value>, RpcError> {
    match args {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(RpcError::BadArguments(format!(
            "expected an array or null, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
