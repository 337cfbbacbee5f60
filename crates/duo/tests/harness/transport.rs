//! Scripted presence channel

use async_trait::async_trait;
use parking_lot::Mutex;
use remotemedia_duo::{Error, Result, SignalingMessage, SignalingTransport, TransportEvent};
use tokio::sync::mpsc;

/// Presence channel whose events are pushed by the test
#[derive(Default)]
pub struct ScriptedTransport {
    tx: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    published: Mutex<Vec<SignalingMessage>>,
    unsubscribed: Mutex<usize>,
    closed: Mutex<bool>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to the subscribed controller
    pub fn inject(&self, event: TransportEvent) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Confirm the subscription with `count` members present
    pub fn subscribed(&self, count: usize) {
        self.inject(TransportEvent::Subscribed { count });
    }

    /// Announce another member joining
    pub fn member_added(&self, member: &str) {
        self.inject(TransportEvent::MemberAdded {
            member: member.to_string(),
        });
    }

    /// Announce another member leaving
    pub fn member_removed(&self, member: &str) {
        self.inject(TransportEvent::MemberRemoved {
            member: member.to_string(),
        });
    }

    /// Drop the event sender, as a presence channel does when its
    /// connection goes away
    pub fn close(&self) {
        *self.closed.lock() = true;
        self.tx.lock().take();
    }

    /// Deliver a signaling message from the other side
    pub fn deliver(&self, message: SignalingMessage) {
        self.inject(TransportEvent::Message(message));
    }

    /// Everything published so far
    pub fn published(&self) -> Vec<SignalingMessage> {
        self.published.lock().clone()
    }

    /// Published messages with the given wire name
    pub fn published_named(&self, name: &str) -> Vec<SignalingMessage> {
        self.published
            .lock()
            .iter()
            .filter(|m| m.name() == name)
            .cloned()
            .collect()
    }

    /// Forget what was published so far
    pub fn clear_published(&self) {
        self.published.lock().clear();
    }

    /// Number of unsubscribe calls
    pub fn unsubscribe_calls(&self) -> usize {
        *self.unsubscribed.lock()
    }
}

#[async_trait]
impl SignalingTransport for ScriptedTransport {
    async fn subscribe(&self, _session: &str) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.tx.lock() = Some(tx);
        Ok(rx)
    }

    async fn publish(&self, message: SignalingMessage) -> Result<()> {
        if *self.closed.lock() {
            return Err(Error::signaling("presence channel closed"));
        }
        if self.tx.lock().is_none() {
            return Err(Error::signaling("publish before subscribe"));
        }
        self.published.lock().push(message);
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<()> {
        *self.unsubscribed.lock() += 1;
        Ok(())
    }
}
