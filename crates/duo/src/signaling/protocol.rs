//! Signaling message types
//!
//! Messages carry no sender or recipient: every member of the session sees
//! every message and filters by role.

use crate::Result;
use serde::{Deserialize, Serialize};

/// Offer or answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    /// Session description offer
    Offer,
    /// Session description answer
    Answer,
}

/// Session description payload (`{"type": "offer", "sdp": "..."}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Offer or answer
    #[serde(rename = "type")]
    pub kind: SdpKind,
    /// Raw SDP
    pub sdp: String,
}

impl SessionDescription {
    /// Create an offer description
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    /// Create an answer description
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE candidate payload, field names as browsers serialize them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate line (`candidate:...`)
    pub candidate: String,

    /// Media stream identification tag
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// Media line index
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,

    /// ICE username fragment
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    /// Create a candidate with only the candidate line set
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
            username_fragment: None,
        }
    }
}

/// Message exchanged over the presence channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SignalingMessage {
    /// Non-host has local media and is ready to receive an offer
    #[serde(rename = "client-ready")]
    Ready,
    /// Host's offer
    #[serde(rename = "client-offer")]
    Offer(SessionDescription),
    /// Non-host's answer
    #[serde(rename = "client-answer")]
    Answer(SessionDescription),
    /// Trickled ICE candidate from either side
    #[serde(rename = "client-ice-candidate")]
    IceCandidate(IceCandidate),
}

impl SignalingMessage {
    /// Event name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            SignalingMessage::Ready => "client-ready",
            SignalingMessage::Offer(_) => "client-offer",
            SignalingMessage::Answer(_) => "client-answer",
            SignalingMessage::IceCandidate(_) => "client-ice-candidate",
        }
    }

    /// Encode as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
