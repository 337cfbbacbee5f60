//! Remote ICE candidate buffering
//!
//! The signaling channel gives no ordering guarantee between a description
//! and the candidates that depend on it. Candidates received before the
//! remote description has been applied are held here and released in
//! arrival order once it has.

use crate::signaling::IceCandidate;
use std::collections::VecDeque;
use tracing::debug;

/// Holds remote candidates until the remote description is applied
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    pending: VecDeque<IceCandidate>,
    remote_ready: bool,
}

impl CandidateBuffer {
    /// Create an empty buffer waiting for a remote description
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate
    ///
    /// Returns it back when it can be applied right away; otherwise keeps it.
    pub fn accept(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        if self.remote_ready {
            return Some(candidate);
        }
        self.pending.push_back(candidate);
        debug!("Buffered remote ICE candidate ({} pending)", self.pending.len());
        None
    }

    /// Record that the remote description is applied and release the backlog
    pub fn mark_remote_ready(&mut self) -> Vec<IceCandidate> {
        self.remote_ready = true;
        self.pending.drain(..).collect()
    }

    /// Number of held candidates
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
