//! In-memory duplex channel between two execution contexts.
//!
//! Uses `embassy-sync` bounded channels, one per direction. Only encoded
//! bytes cross between the contexts, so the two sides never share a value
//! and may run on different threads.
//!
//! ```text
//! ┌──────────────┐   Vec<u8> (JSON)   ┌──────────────┐
//! │  Coordinator │──────────────────▶│    Worker    │
//! │  ChannelEnd  │◀──────────────────│  ChannelEnd  │
//! └──────────────┘   Vec<u8> (JSON)   └──────────────┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use futures_lite::future;

use super::codec::{self, Message};
use super::transport::{MessageSink, MessageSource, SendFuture};
use crate::error::TransportError;

/// Queue depth for each direction.
pub const CHANNEL_DEPTH: usize = 64;

/// One direction of the link.
struct Link {
    queue: Channel<CriticalSectionRawMutex, Vec<u8>, CHANNEL_DEPTH>,
    closed: AtomicBool,
    /// Wakes a receiver parked on an empty queue when the link closes.
    hangup: Signal<CriticalSectionRawMutex, ()>,
}

impl Link {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Channel::new(),
            closed: AtomicBool::new(false),
            hangup: Signal::new(),
        })
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.hangup.signal(());
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Create a connected pair of channel ends.
pub fn duplex() -> (ChannelEnd, ChannelEnd) {
    let a_to_b = Link::new();
    let b_to_a = Link::new();
    let a = ChannelEnd {
        sender: ChannelSender { link: a_to_b.clone() },
        receiver: ChannelReceiver { link: b_to_a.clone() },
    };
    let b = ChannelEnd {
        sender: ChannelSender { link: b_to_a },
        receiver: ChannelReceiver { link: a_to_b },
    };
    (a, b)
}

/// One side of a [`duplex`] link. Split it to hand the halves to an
/// endpoint (sender) and its dispatch loop (receiver).
pub struct ChannelEnd {
    sender: ChannelSender,
    receiver: ChannelReceiver,
}

impl ChannelEnd {
    pub fn split(self) -> (ChannelSender, ChannelReceiver) {
        (self.sender, self.receiver)
    }
}

/// Outbound half. Dropping it closes this direction of the link.
pub struct ChannelSender {
    link: Arc<Link>,
}

impl ChannelSender {
    /// Close this direction. The peer's receiver drains what is queued,
    /// then reports the end of the stream.
    pub fn close(&self) {
        self.link.close();
    }
}

impl ChannelSender {
    /// Queue an already-encoded frame without waiting.
    pub fn send_frame(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        if self.link.is_closed() {
            return Err(TransportError::Closed);
        }
        self.link.queue.try_send(frame).map_err(|_| TransportError::Full)
    }
}

impl MessageSink for ChannelSender {
    fn send(&self, message: &Message) -> Result<(), TransportError> {
        self.send_frame(codec::encode(message)?)
    }

    fn send_wait<'a>(&'a self, message: &Message) -> SendFuture<'a> {
        let frame = codec::encode(message);
        Box::pin(async move {
            let frame = frame?;
            if self.link.is_closed() {
                return Err(TransportError::Closed);
            }
            self.link.queue.send(frame).await;
            Ok(())
        })
    }
}

impl Drop for ChannelSender {
    fn drop(&mut self) {
        self.link.close();
    }
}

/// Inbound half.
pub struct ChannelReceiver {
    link: Arc<Link>,
}

impl ChannelReceiver {
    async fn next_frame(&self) -> Option<Vec<u8>> {
        loop {
            if let Ok(frame) = self.link.queue.try_receive() {
                return Some(frame);
            }
            if self.link.is_closed() {
                return None;
            }
            let frame = future::or(async { Some(self.link.queue.receive().await) }, async {
                self.link.hangup.wait().await;
                None
            })
            .await;
            if frame.is_some() {
                return frame;
            }
        }
    }

    /// Number of frames waiting to be received.
    pub fn queued(&self) -> usize {
        self.link.queue.len()
    }
}

impl MessageSource for ChannelReceiver {
    async fn recv(&self) -> Option<Result<Message, TransportError>> {
        let frame = self.next_frame().await?;
        Some(codec::decode(&frame).map_err(|e| match codec::request_id(&frame) {
            Some(call_id) => TransportError::MalformedRequest {
                call_id,
                reason: e.to_string(),
            },
            None => TransportError::from(e),
        }))
    }
}
