//! Protocol constants.
//!
//! Values mirror the observed wire encoding: traffic-class tags 1001/1002,
//! flow priorities 0xfff/0xfff1, and a 5 second idle timeout on per-path
//! rules. Changing any of these changes what rules match on the fabric, so
//! they are fixed at compile time.

use std::time::Duration;

/// Traffic-class tag carried by discovery and activation frames.
pub const CLASS_DISCOVERY: u16 = 1001;

/// Traffic-class tag carried by controller-to-controller data frames.
pub const CLASS_COMMUNICATION: u16 = 1002;

/// Priority of the per-switch discovery trap rule.
pub const FLOW_PRIORITY_DEFAULT: u16 = 0xfff;

/// Priority of per-path forwarding and local delivery rules.
///
/// Must beat [`FLOW_PRIORITY_DEFAULT`] so stitched paths win over the trap.
pub const FLOW_PRIORITY_HIGH: u16 = 0xfff1;

/// Seconds of inactivity after which a switch drops a per-path rule.
///
/// This is also the only cleanup for the dangling half of a partially
/// installed rule pair: there is no rollback on install failure.
pub const PATH_RULE_IDLE_TIMEOUT_SECS: u16 = 5;

/// Keep-alive period: 3/4 of the idle timeout, so rules on an active path
/// see traffic before they can expire.
pub const KEEPALIVE_INTERVAL: Duration =
    Duration::from_millis(PATH_RULE_IDLE_TIMEOUT_SECS as u64 * 750);

/// Payload of the periodic keep-alive data frame.
pub const KEEPALIVE_TEXT: &str = "keep_alive";

/// Cost advertised for a freshly probed port.
pub const INITIAL_DISCOVERY_COST: u32 = 1;
