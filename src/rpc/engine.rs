//! RPC engine: one symmetric endpoint per execution context.
//!
//! **Outbound half** ([`Endpoint::invoke`]): mint a [`CallId`], park a
//! completion handle in the pending-call table, send a Request, hand the
//! caller a [`Reply`] future.
//!
//! **Inbound half**: look up the method, run the handler as its own task,
//! send back a Response carrying either the result or the error text.
//! A Response waits for room when the peer's queue is full; it is never
//! dropped for lack of space.
//!
//! **Dispatch loop** ([`Endpoint::serve`]): the single subscriber to the
//! channel. Requests are spawned onto the context's executor and never run
//! inline, so a handler may call back across the channel (and wait for
//! the answer) while the loop keeps servicing inbound messages.
//!
//! Everything here is single-threaded: state lives in `Rc<RefCell<_>>` and
//! no borrow is ever held across an `.await`.

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::any::Any;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::rc::{Rc, Weak};

use edge_executor::LocalExecutor;
use futures_lite::future::{self, BoxedLocal, FutureExt};
use log::{Level, debug, warn};
use serde_json::Value;

use super::codec::{CallConfig, CallId, Message, Request, Response};
use super::pending::{Outcome, PendingTable};
use super::registry::{self, Registry};
use super::transport::{MessageSink, MessageSource};
use crate::config::EndpointConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{RpcError, TransportError};

/// Capacity parameter of a context's executor. The run queue is built
/// unbounded, so this does not cap how many tasks may be ready at once.
pub const EXECUTOR_QUEUE: usize = 64;

/// The single-threaded scheduler each context runs its endpoint on.
pub type Executor = LocalExecutor<'static, EXECUTOR_QUEUE>;

/// One side of the channel: function registry, pending-call table, and the
/// outbound half of the transport. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Endpoint {
    inner: Rc<Inner>,
}

struct Inner {
    sink: Box<dyn MessageSink>,
    registry: RefCell<Registry>,
    pending: RefCell<PendingTable>,
    diagnostics: Diagnostics,
    /// Weak so that spawned handler tasks (which hold endpoint clones) do
    /// not keep their own executor alive.
    executor: Weak<Executor>,
}

/// What a handler sees besides its arguments.
#[derive(Clone)]
pub struct CallContext {
    call_id: CallId,
    method: String,
    config: CallConfig,
    endpoint: Endpoint,
}

impl CallContext {
    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The caller's per-call options.
    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    /// The local endpoint, for nested calls back across the channel.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Shorthand for `self.endpoint().invoke(..)`.
    pub fn invoke(&self, method: impl Into<String>, args: Value, cfg: CallConfig) -> Reply {
        self.endpoint.invoke(method, args, cfg)
    }
}

impl Endpoint {
    pub fn new(config: &EndpointConfig, sink: impl MessageSink + 'static, executor: &Rc<Executor>) -> Self {
        Self {
            inner: Rc::new(Inner {
                sink: Box::new(sink),
                registry: RefCell::new(Registry::new()),
                pending: RefCell::new(PendingTable::new()),
                diagnostics: Diagnostics::new(config),
                executor: Rc::downgrade(executor),
            }),
        }
    }

    pub fn label(&self) -> &str {
        self.inner.diagnostics.label()
    }

    // ── Registration ──────────────────────────────────────────

    /// Register `f` under `name`. Fails if the name is empty or taken;
    /// the existing registration is left untouched.
    pub fn register<F, Fut>(&self, name: &str, f: F) -> Result<(), RpcError>
    where
        F: Fn(Value, CallContext) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + 'static,
    {
        self.add_handler(name, registry::handler(f))
    }

    /// Register a function taking `(context, positional args)`. An array
    /// `args` is spread, `null` means no arguments, and anything else is
    /// answered with a `BadArguments` error.
    pub fn register_ex<F, Fut>(&self, name: &str, f: F) -> Result<(), RpcError>
    where
        F: Fn(CallContext, Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + 'static,
    {
        self.add_handler(name, registry::spread_handler(f))
    }

    fn add_handler(&self, name: &str, handler: registry::Handler) -> Result<(), RpcError> {
        self.inner.registry.borrow_mut().insert(name, handler)?;
        self.diag(Level::Info, &format!("+function {name}"));
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.registry.borrow().contains(name)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        self.inner.registry.borrow().names()
    }

    // ── Outbound half ─────────────────────────────────────────

    /// Call `method` on the peer.
    ///
    /// The Request is handed to the channel before this returns; if the
    /// channel is momentarily full it is queued on the executor and sent as
    /// soon as there is room. The returned [`Reply`] settles exactly once,
    /// with the peer's result or error, and never times out. Dropping it
    /// does not cancel the call.
    pub fn invoke(&self, method: impl Into<String>, args: Value, cfg: CallConfig) -> Reply {
        let call_id = CallId::new();
        let completion = self.inner.pending.borrow_mut().insert(call_id.clone());

        let request = Message::Request(Request {
            call_id: call_id.clone(),
            method: method.into(),
            args,
            cfg,
        });
        let sent = match self.inner.sink.send(&request) {
            Err(TransportError::Full) => self.send_later(call_id.clone(), request),
            other => other,
        };
        if let Err(e) = sent {
            self.inner.pending.borrow_mut().take(&call_id);
            warn!("RPC[{}]: request {} not sent: {}", self.label(), call_id, e);
            return Reply::settled(call_id, Err(e.into()));
        }

        let fut = async move { completion.wait().await };
        Reply {
            call_id,
            outcome: fut.boxed_local(),
        }
    }

    /// Queue a Request the channel had no room for.
    fn send_later(&self, call_id: CallId, request: Message) -> Result<(), TransportError> {
        let endpoint = self.clone();
        let queued = self.spawn(async move {
            if let Err(e) = endpoint.inner.sink.send_wait(&request).await {
                warn!("RPC[{}]: request {} not sent: {}", endpoint.label(), call_id, e);
                let completion = endpoint.inner.pending.borrow_mut().take(&call_id);
                if let Some(completion) = completion {
                    completion.signal(Err(e.into()));
                }
            }
        });
        if queued {
            debug!("RPC[{}]: channel full, request queued", self.label());
            Ok(())
        } else {
            Err(TransportError::Full)
        }
    }

    /// Number of calls still waiting for a Response.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Identifiers of calls still waiting for a Response, sorted.
    pub fn pending_ids(&self) -> Vec<CallId> {
        self.inner.pending.borrow().ids()
    }

    // ── Dispatch loop ─────────────────────────────────────────

    /// Subscribe to `source` until it closes.
    ///
    /// Undecodable frames are logged and dropped, except a Request whose
    /// call identifier survived, which is answered with an error. Nothing
    /// that arrives can end the loop except the channel closing.
    pub async fn serve<S: MessageSource>(&self, source: &S) {
        while let Some(frame) = source.recv().await {
            match frame {
                Ok(message) => self.dispatch(message),
                Err(TransportError::MalformedRequest { call_id, reason }) => {
                    warn!(
                        "RPC[{}]: rejecting malformed request {}: {}",
                        self.label(),
                        call_id,
                        reason
                    );
                    let error = RpcError::MalformedRequest(reason).to_string();
                    let response = Response::failure(call_id, error);
                    let endpoint = self.clone();
                    self.spawn(async move { endpoint.respond(response).await });
                }
                Err(e) => warn!("RPC[{}]: dropping undecodable message: {}", self.label(), e),
            }
        }
        debug!("RPC[{}]: channel closed", self.label());
    }

    /// Handle one inbound message without waiting on any handler.
    pub fn dispatch(&self, message: Message) {
        match message {
            Message::Request(request) => self.spawn_request(request),
            Message::Response(response) => self.handle_response(response),
            Message::Log { data } => self.inner.diagnostics.print_forwarded(&data),
            Message::Unknown => debug!("RPC[{}]: ignoring message of unknown type", self.label()),
        }
    }

    fn spawn_request(&self, request: Request) {
        let call_id = request.call_id.clone();
        let endpoint = self.clone();
        if !self.spawn(async move { endpoint.handle_request(request).await }) {
            warn!("RPC[{}]: executor gone, dropping request {}", self.label(), call_id);
        }
    }

    /// Run `task` detached on this context's executor. False once the
    /// executor has been dropped.
    fn spawn(&self, task: impl Future<Output = ()> + 'static) -> bool {
        match self.inner.executor.upgrade() {
            Some(executor) => {
                executor.spawn(task).detach();
                true
            }
            None => false,
        }
    }

    // ── Inbound half ──────────────────────────────────────────

    async fn handle_request(self, request: Request) {
        let Request {
            call_id,
            method,
            args,
            cfg,
        } = request;

        let response = match self.execute(&call_id, method, args, cfg).await {
            Ok(result) => Response::success(call_id, result),
            Err(e) => {
                debug!("RPC[{}]: call {} failed: {}", self.label(), call_id, e);
                Response::failure(call_id, e.to_string())
            }
        };

        self.respond(response).await;
    }

    /// Send a Response, waiting for room if the peer is behind.
    async fn respond(&self, response: Response) {
        let call_id = response.call_id.clone();
        if let Err(e) = self.inner.sink.send_wait(&Message::Response(response)).await {
            warn!("RPC[{}]: response {} not sent: {}", self.label(), call_id, e);
        }
    }

    async fn execute(&self, call_id: &CallId, method: String, args: Value, cfg: CallConfig) -> Outcome {
        let handler = self
            .inner
            .registry
            .borrow()
            .get(&method)
            .ok_or_else(|| RpcError::NoSuchMethod(method.clone()))?;

        let ctx = CallContext {
            call_id: call_id.clone(),
            method,
            config: cfg,
            endpoint: self.clone(),
        };

        // Calling the handler happens inside the guarded future so a panic
        // before its first await is caught too.
        let run = async move { handler(args, ctx).await };
        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(RpcError::HandlerFailure(format!("{e:#}"))),
            Err(payload) => Err(RpcError::HandlerFailure(panic_text(payload.as_ref()))),
        }
    }

    fn handle_response(&self, response: Response) {
        let completion = self.inner.pending.borrow_mut().take(&response.call_id);
        match completion {
            Some(completion) => completion.signal(response.into_outcome()),
            None => self.diag(Level::Warn, &format!("missed response: {}", response.call_id)),
        }
    }

    fn diag(&self, level: Level, line: &str) {
        self.inner.diagnostics.emit(level, line, self.inner.sink.as_ref());
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    }
}

/// Future returned by [`Endpoint::invoke`].
pub struct Reply {
    call_id: CallId,
    outcome: BoxedLocal<Outcome>,
}

impl Reply {
    fn settled(call_id: CallId, outcome: Outcome) -> Self {
        Self {
            call_id,
            outcome: future::ready(outcome).boxed_local(),
        }
    }

    /// The identifier this call was sent under.
    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }
}

impl Future for Reply {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.outcome.as_mut().poll(cx)
    }
}

// ── Tests ────────────────────────────────────────────────────
