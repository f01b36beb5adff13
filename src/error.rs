//! Error types for the protocol core.
//!
//! No variant here is fatal to the process: the driver logs per-frame
//! failures and drops the offending frame, and the heartbeat and dispatch
//! loops keep running regardless.

use snafu::Snafu;

use crate::types::ControllerId;
use crate::types::SwitchId;

/// Errors surfaced by the protocol core.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InbandError {
    /// Inbound bytes did not decode as any known frame class.
    #[snafu(display("failed to decode frame: {source}"))]
    DecodeFrame {
        /// The underlying codec error.
        source: postcard::Error,
    },

    /// An outbound frame could not be serialized.
    #[snafu(display("failed to encode frame: {source}"))]
    EncodeFrame {
        /// The underlying codec error.
        source: postcard::Error,
    },

    /// No connection is recorded for the remote controller.
    #[snafu(display("no connection recorded for controller {controller}"))]
    UnknownController {
        /// The controller that was looked up.
        controller: ControllerId,
    },

    /// No intra-region path is known between two switches.
    #[snafu(display("no intra-region path from switch {from} to switch {to}"))]
    NoPath {
        /// Switch the path would start at.
        from: SwitchId,
        /// Switch the path would end at.
        to: SwitchId,
    },
}
