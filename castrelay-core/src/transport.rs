//! Delivery seam between the relay core and the messaging transport.
//!
//! The core only ever asks "send message M to connection C". Delivery is
//! fire-and-forget: an unknown, closed or backed-up connection is not an
//! error the core can act on, so implementations drop the message and
//! never make the caller wait on a slow peer.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{trace, warn};

use crate::message::HubMessage;

/// Capacity of each connection's outbound queue.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 100;

pub type MessageSender = mpsc::Sender<HubMessage>;
pub type MessageReceiver = mpsc::Receiver<HubMessage>;

// ── Transport ────────────────────────────────────────────────────

#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `message` to one connection. Must not wait for the peer
    /// to drain its queue.
    async fn send(&self, connection_id: &str, message: HubMessage);

    /// Deliver `message` to every listed connection.
    async fn send_many(&self, connection_ids: &[String], message: HubMessage) {
        for id in connection_ids {
            self.send(id, message.clone()).await;
        }
    }
}

// ── ChannelTransport ─────────────────────────────────────────────

/// In-process transport: one bounded mpsc queue per connection.
///
/// A queue that is full when a message arrives loses that message.
///
/// The host registers a queue when a socket is accepted and drains the
/// receiver into the socket writer; tests read the receiver directly.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    connections: RwLock<HashMap<String, MessageSender>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an outbound queue for `connection_id`, replacing any old one.
    pub fn register(&self, connection_id: &str) -> MessageReceiver {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        self.connections.write().insert(connection_id.to_owned(), tx);
        rx
    }

    /// Close the outbound queue for `connection_id`.
    pub fn unregister(&self, connection_id: &str) -> bool {
        self.connections.write().remove(connection_id).is_some()
    }

}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, connection_id: &str, message: HubMessage) {
        let tx = self.connections.read().get(connection_id).cloned();
        let Some(tx) = tx else {
            trace!(connection_id, %message, "no such connection; dropping message");
            return;
        };
        match tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                warn!(
                    connection_id,
                    message = message.name(),
                    "outbound queue full; dropping message"
                );
            }
            Err(TrySendError::Closed(_)) => {
                trace!(connection_id, "outbound queue closed; dropping message");
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registered_connection_receives_messages() {
        let transport = ChannelTransport::new();
        let mut rx = transport.register("v1");
        transport.send("v1", HubMessage::Reconnecting).await;
        assert_eq!(rx.recv().await, Some(HubMessage::Reconnecting));
    }

    #[tokio::test]
    async fn unknown_connection_is_silent() {
        let transport = ChannelTransport::new();
        transport.send("nobody", HubMessage::CtrlAltDel).await;
        assert!(!transport.unregister("nobody"));
    }

    #[tokio::test]
    async fn send_many_fans_out() {
        let transport = ChannelTransport::new();
        let mut a = transport.register("a");
        let mut b = transport.register("b");
        let targets = vec!["a".to_string(), "b".to_string(), "gone".to_string()];
        transport
            .send_many(&targets, HubMessage::ScreenCasterDisconnected)
            .await;
        assert_eq!(a.recv().await, Some(HubMessage::ScreenCasterDisconnected));
        assert_eq!(b.recv().await, Some(HubMessage::ScreenCasterDisconnected));
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_waiting() {
        let transport = ChannelTransport::new();
        let mut stalled = transport.register("stalled");
        let mut live = transport.register("live");

        for _ in 0..OUTBOUND_QUEUE_CAPACITY {
            transport.send("stalled", HubMessage::CtrlAltDel).await;
        }
        let overflow = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            transport.send_many(
                &["stalled".to_string(), "live".to_string()],
                HubMessage::Reconnecting,
            ),
        )
        .await;
        assert!(overflow.is_ok(), "send waited on a full queue");
        assert_eq!(live.recv().await, Some(HubMessage::Reconnecting));

        let mut queued = 0;
        while let Ok(message) = stalled.try_recv() {
            assert_eq!(message, HubMessage::CtrlAltDel);
            queued += 1;
        }
        assert_eq!(queued, OUTBOUND_QUEUE_CAPACITY);
    }

    #[tokio::test]
    async fn unregister_closes_queue() {
        let transport = ChannelTransport::new();
        let mut rx = transport.register("v1");
        assert!(transport.unregister("v1"));
        assert!(!transport.unregister("v1"));
        assert_eq!(rx.recv().await, None);
    }
}
