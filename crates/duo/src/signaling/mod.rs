//! Signaling protocol and presence-channel transport contract
//!
//! The transport itself (a hosted presence channel, a WebSocket relay, ...)
//! lives outside this crate. [`MemoryRoom`] provides an in-process channel
//! with the same delivery rules.

pub mod memory;
pub mod protocol;

pub use memory::{MemoryRoom, MemoryTransport};
pub use protocol::{IceCandidate, SdpKind, SessionDescription, SignalingMessage};

use crate::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Event delivered by the presence channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Local subscription succeeded; `count` includes the local member
    Subscribed {
        /// Members present after joining
        count: usize,
    },
    /// Another member joined
    MemberAdded {
        /// Opaque transport-assigned member id
        member: String,
    },
    /// Another member left
    MemberRemoved {
        /// Id previously announced in `MemberAdded`, or a member that was
        /// already present when the local process subscribed
        member: String,
    },
    /// Signaling message published by another member
    Message(SignalingMessage),
}

/// Signaling transport collaborator
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Join `session` and start receiving its events
    async fn subscribe(&self, session: &str) -> Result<mpsc::UnboundedReceiver<TransportEvent>>;

    /// Broadcast a message to the other members of the joined session
    async fn publish(&self, message: SignalingMessage) -> Result<()>;

    /// Leave the joined session; other members observe `MemberRemoved`
    async fn unsubscribe(&self) -> Result<()>;
}
