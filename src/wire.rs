//! Logical frame codec for the three discovery-class message types.
//!
//! Frames are encoded with postcard. Which traffic-class tag a frame travels
//! under on the data plane is the fabric collaborator's concern; this module
//! only fixes the logical fields.

use serde::Deserialize;
use serde::Serialize;
use snafu::ResultExt;
use tracing::warn;

use crate::error::DecodeFrameSnafu;
use crate::error::EncodeFrameSnafu;
use crate::error::InbandError;
use crate::fabric::Switch;
use crate::types::ControllerId;
use crate::types::PortNo;
use crate::types::SwitchId;

/// A decoded protocol frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// Flooded probe advertising reachability to `source` at `cost`.
    ///
    /// `origin_switch` names the switch the probe was sent from; it is only
    /// consulted when the probe turns out to be a same-region one.
    Discovery {
        /// Controller being advertised.
        source: ControllerId,
        /// Addressee, usually [`ControllerId::BROADCAST`].
        target: ControllerId,
        /// Switch the probe left the source region through.
        origin_switch: SwitchId,
        /// Accumulated path cost so far.
        cost: u32,
    },
    /// Reply confirming a discovered route and causing path installation.
    Activation {
        /// The original discoverer the activation travels toward.
        source: ControllerId,
        /// Controller that must act on this activation.
        target: ControllerId,
        /// Cost of the route being activated, carried unchanged.
        cost: u32,
    },
    /// Application payload between two controllers.
    Data {
        /// Sending controller.
        source: ControllerId,
        /// Receiving controller.
        target: ControllerId,
        /// Opaque application text.
        text: String,
    },
}

impl Frame {
    /// Serialize to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, InbandError> {
        postcard::to_stdvec(self).context(EncodeFrameSnafu)
    }

    /// Deserialize from wire bytes.
    ///
    /// A malformed frame fails here and only here; it never corrupts
    /// registry or topology state.
    pub fn decode(bytes: &[u8]) -> Result<Self, InbandError> {
        postcard::from_bytes(bytes).context(DecodeFrameSnafu)
    }
}

/// Encode `frame` and transmit it out `switch`:`port`. Fire-and-forget.
///
/// Returns `false` when encoding fails or the switch rejects the write.
pub fn send_frame(switch: &dyn Switch, port: PortNo, frame: &Frame) -> bool {
    match frame.encode() {
        Ok(bytes) => switch.write(port, &bytes),
        Err(error) => {
            warn!(switch = %switch.id(), %port, %error, "failed to encode outbound frame");
            false
        }
    }
}
