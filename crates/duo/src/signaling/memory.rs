//! In-process presence channel
//!
//! Delivery rules match a hosted presence channel:
//! - the joining member gets `Subscribed { count }` including itself
//! - everybody else gets `MemberAdded` / `MemberRemoved` with the member's id
//! - published messages reach every other member, never the publisher
//!
//! Messages are pushed through their JSON wire encoding on the way.
//!
//! ```
//! # tokio_test::block_on(async {
//! use remotemedia_duo::{MemoryRoom, SignalingMessage, SignalingTransport, TransportEvent};
//!
//! let room = MemoryRoom::new();
//! let host = room.transport();
//! let peer = room.transport();
//!
//! let mut host_events = host.subscribe("room").await.unwrap();
//! let _peer_events = peer.subscribe("room").await.unwrap();
//! peer.publish(SignalingMessage::Ready).await.unwrap();
//!
//! assert_eq!(host_events.recv().await, Some(TransportEvent::Subscribed { count: 1 }));
//! assert!(matches!(
//!     host_events.recv().await,
//!     Some(TransportEvent::MemberAdded { .. })
//! ));
//! assert_eq!(
//!     host_events.recv().await,
//!     Some(TransportEvent::Message(SignalingMessage::Ready))
//! );
//! # });
//! ```

use super::{SignalingMessage, SignalingTransport, TransportEvent};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type MemberId = u64;

#[derive(Default)]
struct RoomState {
    sessions: HashMap<String, Vec<(MemberId, mpsc::UnboundedSender<TransportEvent>)>>,
    next_member_id: MemberId,
}

impl RoomState {
    fn broadcast_except(&self, session: &str, except: MemberId, event: &TransportEvent) {
        if let Some(members) = self.sessions.get(session) {
            for (id, tx) in members.iter().filter(|(id, _)| *id != except) {
                if tx.send(event.clone()).is_err() {
                    debug!("Member {} of {} no longer listening", id, session);
                }
            }
        }
    }
}

/// Shared in-process presence channel
#[derive(Clone, Default)]
pub struct MemoryRoom {
    state: Arc<Mutex<RoomState>>,
}

impl MemoryRoom {
    /// Create an empty room
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a member handle; it joins a session on `subscribe`
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            room: self.clone(),
            membership: Mutex::new(None),
        }
    }

    /// Number of members currently in `session`
    pub fn member_count(&self, session: &str) -> usize {
        self.state
            .lock()
            .sessions
            .get(session)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

/// One member's handle on a [`MemoryRoom`]
pub struct MemoryTransport {
    room: MemoryRoom,
    membership: Mutex<Option<(String, MemberId)>>,
}

#[async_trait]
impl SignalingTransport for MemoryTransport {
    async fn subscribe(&self, session: &str) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
        let mut membership = self.membership.lock();
        if let Some((joined, _)) = membership.as_ref() {
            return Err(Error::signaling(format!(
                "already subscribed to {}",
                joined
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.room.state.lock();
        let id = state.next_member_id;
        state.next_member_id += 1;

        let members = state.sessions.entry(session.to_string()).or_default();
        members.push((id, tx.clone()));
        let count = members.len();

        info!("Member {} joined {} ({} present)", id, session, count);
        let _ = tx.send(TransportEvent::Subscribed { count });
        let added = TransportEvent::MemberAdded {
            member: id.to_string(),
        };
        state.broadcast_except(session, id, &added);

        *membership = Some((session.to_string(), id));
        Ok(rx)
    }

    async fn publish(&self, message: SignalingMessage) -> Result<()> {
        let (session, id) = self
            .membership
            .lock()
            .clone()
            .ok_or_else(|| Error::signaling("publish before subscribe"))?;

        let wire = message.to_json()?;
        let decoded = SignalingMessage::from_json(&wire)?;
        debug!("Member {} publishing {} on {}", id, decoded.name(), session);

        self.room
            .state
            .lock()
            .broadcast_except(&session, id, &TransportEvent::Message(decoded));
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<()> {
        let Some((session, id)) = self.membership.lock().take() else {
            warn!("Unsubscribe without an active subscription");
            return Ok(());
        };

        let mut state = self.room.state.lock();
        if let Some(members) = state.sessions.get_mut(&session) {
            members.retain(|(member, _)| *member != id);
            if members.is_empty() {
                state.sessions.remove(&session);
            }
        }
        let removed = TransportEvent::MemberRemoved {
            member: id.to_string(),
        };
        state.broadcast_except(&session, id, &removed);
        info!("Member {} left {}", id, session);
        Ok(())
    }
}
