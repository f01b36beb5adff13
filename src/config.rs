//! Controller instance configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::constants::KEEPALIVE_INTERVAL;
use crate::types::ControllerId;

/// Configuration for one controller instance.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Out-of-band agreed identity of this controller.
    pub controller_id: ControllerId,

    /// Keep-alive period. Defaults to 3/4 of the path-rule idle timeout so
    /// active paths never expire under the heartbeat.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: Duration,

    /// Where to write the protocol event dump at shutdown; `None` disables
    /// the dump.
    #[serde(default)]
    pub event_dump_dir: Option<PathBuf>,
}

fn default_heartbeat_interval() -> Duration {
    KEEPALIVE_INTERVAL
}

impl ControllerConfig {
    /// Defaults for the given controller id.
    pub fn new(controller_id: ControllerId) -> Self {
        Self {
            controller_id,
            heartbeat_interval: KEEPALIVE_INTERVAL,
            event_dump_dir: None,
        }
    }

    /// Override the keep-alive period.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Enable the shutdown event dump into `dir`.
    pub fn with_event_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.event_dump_dir = Some(dir.into());
        self
    }
}
