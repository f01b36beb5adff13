//! Identifier types shared across the protocol.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Identity of a controller instance.
///
/// A small positive integer agreed out-of-band, unique per controller. The
/// reserved value [`ControllerId::BROADCAST`] addresses whichever controller
/// happens to receive the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControllerId(pub u16);

impl ControllerId {
    /// "Deliver to whoever receives this, regardless of id."
    pub const BROADCAST: ControllerId = ControllerId(1024);

    /// Whether this is the reserved broadcast destination.
    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a forwarding element in the shared fabric.
///
/// Owned by the switch collaborator; the protocol core only stores and
/// compares these, never interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SwitchId(pub u64);

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local port number on a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortNo(pub u32);

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
