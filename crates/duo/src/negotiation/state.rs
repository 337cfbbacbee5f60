//! Negotiation states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the offer/answer exchange a negotiation is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationPhase {
    /// Host producing an offer and waiting for the answer
    Offering,
    /// Peer producing an answer to a received offer
    Answering,
}

/// State of the local negotiation
///
/// `Closed` is terminal: a closed controller is never resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "phase")]
pub enum NegotiationState {
    /// No session, no local media
    #[default]
    Idle,
    /// Local capture available, no session yet
    LocalMediaReady,
    /// Session open, descriptions being exchanged
    Negotiating(NegotiationPhase),
    /// Remote side answered or remote media arrived
    Connected,
    /// Left or failed for good
    Closed,
}

impl NegotiationState {
    /// Whether a negotiation session is expected to exist
    pub fn has_session(&self) -> bool {
        matches!(
            self,
            NegotiationState::Negotiating(_) | NegotiationState::Connected
        )
    }

    /// Whether remote ICE candidates are accepted in this state
    pub fn accepts_candidates(&self) -> bool {
        matches!(
            self,
            NegotiationState::LocalMediaReady
                | NegotiationState::Negotiating(_)
                | NegotiationState::Connected
        )
    }

    /// Whether this is the terminal state
    pub fn is_closed(&self) -> bool {
        matches!(self, NegotiationState::Closed)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationState::Idle => write!(f, "idle"),
            NegotiationState::LocalMediaReady => write!(f, "local-media-ready"),
            NegotiationState::Negotiating(NegotiationPhase::Offering) => {
                write!(f, "negotiating(offering)")
            }
            NegotiationState::Negotiating(NegotiationPhase::Answering) => {
                write!(f, "negotiating(answering)")
            }
            NegotiationState::Connected => write!(f, "connected"),
            NegotiationState::Closed => write!(f, "closed"),
        }
    }
}
