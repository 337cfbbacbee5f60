//! Peer connection contract and backends
//!
//! The negotiation core talks to the underlying connection only through
//! [`PeerConnection`]. [`RtcConnectionFactory`] builds real webrtc-rs
//! connections; tests plug in their own doubles.

pub mod candidates;
pub mod rtc;

pub use candidates::CandidateBuffer;
pub use rtc::{RtcConnectionFactory, RtcPeerConnection};

use crate::config::IceServerConfig;
use crate::media::{LocalTrack, RemoteTrack};
use crate::signaling::{IceCandidate, SessionDescription};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Transport-level state of the underlying connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    /// Created, nothing exchanged yet
    New,
    /// ICE/DTLS in progress
    Connecting,
    /// Media can flow
    Connected,
    /// Connectivity lost, may recover
    Disconnected,
    /// Connectivity lost for good
    Failed,
    /// Closed locally
    Closed,
}

/// Event raised by a connection's handlers
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Local ICE candidate gathered; to be trickled to the other side
    LocalCandidate(IceCandidate),
    /// Remote media track attached
    RemoteTrack(RemoteTrack),
    /// Connection state changed
    StateChanged(PeerConnectionState),
}

/// Connection event tagged with the session generation that produced it
#[derive(Debug, Clone)]
pub struct TaggedConnectionEvent {
    /// Generation of the session owning the connection
    pub generation: u64,
    /// The event
    pub event: ConnectionEvent,
}

/// Sink handed to a connection for reporting its events
///
/// Every event is tagged with the owning session's generation so that
/// events from a closed connection can be told apart and dropped.
#[derive(Debug, Clone)]
pub struct ConnectionEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedConnectionEvent>,
}

impl ConnectionEvents {
    /// Create a sink for `generation`
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<TaggedConnectionEvent>) -> Self {
        Self { generation, tx }
    }

    /// Generation this sink reports for
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report an event
    pub fn emit(&self, event: ConnectionEvent) {
        let tagged = TaggedConnectionEvent {
            generation: self.generation,
            event,
        };
        if self.tx.send(tagged).is_err() {
            debug!(
                "Connection event for generation {} dropped, controller gone",
                self.generation
            );
        }
    }
}

/// Underlying peer connection
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Attach a local track
    async fn add_track(&self, track: &LocalTrack) -> Result<()>;

    /// Produce a local offer
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Produce a local answer to the applied remote offer
    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Apply a local description
    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    /// Apply a remote description
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Add a remote ICE candidate
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Detach event handlers and close the connection
    async fn close(&self) -> Result<()>;
}

/// Builds peer connections
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    /// Create a connection using `ice_servers`, reporting into `events`
    async fn create(
        &self,
        ice_servers: &[IceServerConfig],
        events: ConnectionEvents,
    ) -> Result<Arc<dyn PeerConnection>>;
}
