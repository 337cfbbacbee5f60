//! Error types for call negotiation
//!
//! Every externally observable failure is reported as a typed [`Error`];
//! nothing in this crate is allowed to bring down the hosting process.

use crate::media::MediaErrorKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Call negotiation error type
#[derive(Debug, Error)]
pub enum Error {
    /// Local camera/microphone could not be acquired
    #[error("Media acquisition failed ({kind}): {message}")]
    MediaAcquisition {
        /// Failure category
        kind: MediaErrorKind,
        /// Detail from the media collaborator
        message: String,
    },

    /// The session already holds its maximum number of members
    #[error("Session is full: {count} members present, capacity is {capacity}")]
    CapacityExceeded {
        /// Member count reported by the transport on subscription
        count: usize,
        /// Session capacity
        capacity: usize,
    },

    /// Offer/answer exchange failed for the current session generation
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// An asynchronous step finished after its session was superseded
    #[error("Stale completion for generation {generation} (current {current})")]
    StaleCompletion {
        /// Generation the completion belongs to
        generation: u64,
        /// Generation currently alive (0 when no session is alive)
        current: u64,
    },

    /// WebRTC backend error
    #[error("WebRTC error: {0}")]
    WebRtc(String),

    /// Signaling transport error
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Configuration validation failed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation not allowed in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error category reported to UI observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Camera/microphone unavailable
    MediaError,
    /// Session full, the local process must leave
    CapacityExceeded,
    /// Negotiation aborted, retry on next ready/offer
    NegotiationError,
    /// Signaling channel failure
    SignalingError,
    /// Configuration rejected
    ConfigError,
    /// Anything else
    InternalError,
}

impl Error {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::MediaAcquisition { .. } => ErrorCode::MediaError,
            Error::CapacityExceeded { .. } => ErrorCode::CapacityExceeded,
            Error::Negotiation(_) | Error::WebRtc(_) => ErrorCode::NegotiationError,
            Error::Signaling(_) => ErrorCode::SignalingError,
            Error::InvalidConfig(_) | Error::Json(_) => ErrorCode::ConfigError,
            Error::StaleCompletion { .. } | Error::InvalidState(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the failed operation may be attempted again in this session
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::MediaAcquisition { .. }
                | Error::Negotiation(_)
                | Error::WebRtc(_)
                | Error::Signaling(_)
        )
    }

    /// Create a negotiation error
    pub fn negotiation(msg: impl Into<String>) -> Self {
        Error::Negotiation(msg.into())
    }

    /// Create a media acquisition error
    pub fn media(kind: MediaErrorKind, msg: impl Into<String>) -> Self {
        Error::MediaAcquisition {
            kind,
            message: msg.into(),
        }
    }

    /// Create a signaling error
    pub fn signaling(msg: impl Into<String>) -> Self {
        Error::Signaling(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

impl From<webrtc::Error> for Error {
    fn from(err: webrtc::Error) -> Self {
        Error::WebRtc(err.to_string())
    }
}

/// Result type for call negotiation operations
pub type Result<T> = std::result::Result<T, Error>;
