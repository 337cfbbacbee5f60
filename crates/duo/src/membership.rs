//! Session membership and host/peer role assignment

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Maximum number of members in one session
pub const MAX_MEMBERS: usize = 2;

/// Role of the local process in the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Not subscribed yet
    #[default]
    Unassigned,
    /// Initiates offer/answer negotiation
    Host,
    /// Answers the host's offer
    Peer,
}

impl Role {
    /// Whether this role initiates negotiation
    pub fn is_host(&self) -> bool {
        matches!(self, Role::Host)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Unassigned => write!(f, "unassigned"),
            Role::Host => write!(f, "host"),
            Role::Peer => write!(f, "peer"),
        }
    }
}

/// Outcome of a member leaving
///
/// A member whose arrival pushed the session over capacity is remembered by
/// id, so its departure is told apart from the counterpart's regardless of
/// which of the two leaves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRemoval {
    /// The local process's counterpart left; tear down and promote
    Counterpart,
    /// A rejected over-capacity member left; nothing to do
    Overflow,
}

/// Tracks member count and the local role
///
/// Pure bookkeeping: no network or media side effects.
#[derive(Debug)]
pub struct MembershipTracker {
    member_count: usize,
    role: Role,
    capacity: usize,
    overflow: HashSet<String>,
}

impl Default for MembershipTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MembershipTracker {
    /// Create a tracker for a two-member session
    pub fn new() -> Self {
        Self {
            member_count: 0,
            role: Role::Unassigned,
            capacity: MAX_MEMBERS,
            overflow: HashSet::new(),
        }
    }

    /// Current role
    pub fn role(&self) -> Role {
        self.role
    }

    /// Members currently known to be present, including the local one
    pub fn member_count(&self) -> usize {
        self.member_count
    }

    /// Handle a successful subscription reporting `count` members
    ///
    /// The first member of an empty session becomes host; any later joiner
    /// becomes peer. More than [`MAX_MEMBERS`] is a capacity violation.
    pub fn on_subscribed(&mut self, count: usize) -> Result<Role> {
        self.member_count = count;

        if count > self.capacity {
            warn!(
                "Session has {} members, capacity is {}",
                count, self.capacity
            );
            return Err(Error::CapacityExceeded {
                count,
                capacity: self.capacity,
            });
        }

        if self.role == Role::Unassigned {
            self.role = if count <= 1 { Role::Host } else { Role::Peer };
            info!("Assigned role {} ({} member(s) present)", self.role, count);
        }

        Ok(self.role)
    }

    /// Handle another member joining
    pub fn on_member_added(&mut self, member: &str) {
        self.member_count += 1;
        debug!("Member {} joined, {} present", member, self.member_count);
        if self.member_count > self.capacity {
            warn!(
                "Over-capacity member {} joined ({} present); it is expected to leave",
                member, self.member_count
            );
            self.overflow.insert(member.to_string());
        }
    }

    /// Handle another member leaving
    ///
    /// When the counterpart leaves, the local process is promoted to host
    /// so it can drive the next negotiation. The caller runs the
    /// negotiation teardown before calling [`promote`](Self::promote).
    pub fn on_member_removed(&mut self, member: &str) -> MemberRemoval {
        self.member_count = self.member_count.saturating_sub(1);

        if self.overflow.remove(member) {
            debug!(
                "Over-capacity member {} left, {} present",
                member, self.member_count
            );
            return MemberRemoval::Overflow;
        }

        MemberRemoval::Counterpart
    }

    /// Promote the local process to host
    pub fn promote(&mut self) {
        if self.role != Role::Host {
            info!("Promoted from {} to host", self.role);
        }
        self.role = Role::Host;
    }
}
