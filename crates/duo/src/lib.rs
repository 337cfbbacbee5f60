//! Two-party WebRTC call negotiation for RemoteMedia
//!
//! This crate drives a direct audio/video call between exactly two
//! participants that meet in a shared presence channel. It owns the
//! negotiation logic only: who offers, who answers, how ICE candidates are
//! exchanged, and what happens when somebody leaves.
//!
//! # Features
//!
//! - **Role assignment**: the first member of an empty session becomes the
//!   host, the second becomes the peer, a surviving peer is promoted to host
//! - **Offer/answer/ICE exchange**: driven by an explicit transition table
//! - **ICE candidate buffering**: candidates that arrive before the remote
//!   description are held and flushed in order
//! - **Generation tagging**: late results from torn-down sessions are discarded
//! - **webrtc-rs backend**: [`RtcConnectionFactory`] for real peer connections
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  UI / application                                    │
//! │  ↓ join / leave / toggle_local_audio / snapshot      │
//! │  CallController                                      │
//! │  ├─ MembershipTracker (member count, host/peer role) │
//! │  ├─ negotiation::transition (state × event table)    │
//! │  └─ NegotiationSession (one per generation)          │
//! │      └─ PeerConnection (webrtc-rs or test double)    │
//! │  ↕ SignalingTransport (presence channel)             │
//! │  ↕ MediaDevices (local capture)                      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use remotemedia_duo::{CallController, DuoConfig, MemoryRoom, RtcConnectionFactory, SampleMediaSource};
//! use std::sync::Arc;
//!
//! let room = MemoryRoom::new();
//! let mut call = CallController::new(
//!     DuoConfig::default(),
//!     Arc::new(room.transport()),
//!     Arc::new(SampleMediaSource::new()),
//!     Arc::new(RtcConnectionFactory::new()?),
//! )?;
//!
//! call.join("presence-room").await?;
//! call.run().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod config;
pub mod controller;
pub mod error;
pub mod media;
pub mod membership;
pub mod negotiation;
pub mod peer;
pub mod signaling;

// Re-exports for public API
pub use config::{DuoConfig, IceServerConfig};
pub use controller::{CallController, CallEvent, CallSnapshot};
pub use error::{Error, ErrorCode, Result};
pub use media::{
    LocalMedia, LocalTrack, MediaConstraints, MediaDevices, MediaErrorKind, MediaKind,
    RemoteTrack, SampleMediaSource,
};
pub use membership::{MembershipTracker, Role, MAX_MEMBERS};
pub use negotiation::{NegotiationPhase, NegotiationState};
pub use peer::{PeerConnection, PeerConnectionFactory, RtcConnectionFactory};
pub use signaling::{
    IceCandidate, MemoryRoom, SessionDescription, SignalingMessage, SignalingTransport,
    TransportEvent,
};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
