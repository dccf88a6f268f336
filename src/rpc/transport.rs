//! Transport abstraction: any duplex message channel.
//!
//! The channel delivers whole messages in per-sender order but pairs
//! nothing: correlating Requests with Responses is the engine's job.
//!
//! Concrete implementations:
//! - In-memory channel pair between two threads ([`super::channels`])
//! - [`NullSink`] for endpoints that never talk to a peer
//!
//! The engine only sees these two traits, so a new transport needs zero
//! changes to the RPC logic.

use core::future::{self, Future};
use core::pin::Pin;

use super::codec::Message;
use crate::error::TransportError;

/// Future returned by [`MessageSink::send_wait`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + 'a>>;

/// Outbound half: the `send(message)` primitive.
pub trait MessageSink {
    /// Must not block. A send that cannot complete right now fails with
    /// [`TransportError::Full`] instead.
    fn send(&self, message: &Message) -> Result<(), TransportError>;

    /// Deliver `message`, waiting for room while the channel is full.
    ///
    /// Sinks that never fill up can keep the default, which is `send`.
    fn send_wait<'a>(&'a self, message: &Message) -> SendFuture<'a> {
        Box::pin(future::ready(self.send(message)))
    }
}

/// Inbound half: what the dispatch loop subscribes to.
pub trait MessageSource {
    /// Wait for the next inbound message.
    ///
    /// `None` means the channel is closed and nothing more will arrive.
    /// `Some(Err(_))` is a frame that could not be decoded; the loop
    /// drops it and keeps going.
    fn recv(&self) -> impl Future<Output = Option<Result<Message, TransportError>>>;
}

impl<T: MessageSink + ?Sized> MessageSink for std::rc::Rc<T> {
    fn send(&self, message: &Message) -> Result<(), TransportError> {
        (**self).send(message)
    }

    fn send_wait<'a>(&'a self, message: &Message) -> SendFuture<'a> {
        (**self).send_wait(message)
    }
}

/// A sink that discards all messages.
pub struct NullSink;

impl MessageSink for NullSink {
    fn send(&self, _message: &Message) -> Result<(), TransportError> {
        Ok(())
    }
}
