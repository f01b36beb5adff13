//! Timestamped protocol event collection.
//!
//! Observability only, never protocol state. One [`EventLog`] is constructed
//! per controller instance and injected into the parts that emit events, so
//! several simulated controllers in one process never share counters. The
//! log is append-only and optionally dumped to a per-controller file at
//! shutdown.

use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use parking_lot::Mutex;

use crate::types::ControllerId;

/// Protocol events worth timestamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolEvent {
    /// A discovery frame left this controller (probe or relay).
    DiscoverySent,
    /// An activation frame left this controller.
    ActivationSent,
    /// First-ever connection recorded for some remote controller.
    FirstConnection,
    /// A connection displaced the previous best for some remote controller.
    NewBestConnection,
    /// A same-region probe taught us a switch adjacency.
    IntraRegionDiscovery,
    /// A forwarding rule was installed on a switch.
    RuleInstalled,
}

impl ProtocolEvent {
    const ALL: [ProtocolEvent; 6] = [
        ProtocolEvent::DiscoverySent,
        ProtocolEvent::ActivationSent,
        ProtocolEvent::FirstConnection,
        ProtocolEvent::NewBestConnection,
        ProtocolEvent::IntraRegionDiscovery,
        ProtocolEvent::RuleInstalled,
    ];

    fn label(self) -> &'static str {
        match self {
            ProtocolEvent::DiscoverySent => "discoveries",
            ProtocolEvent::ActivationSent => "activations",
            ProtocolEvent::FirstConnection => "firstconnections",
            ProtocolEvent::NewBestConnection => "newbest",
            ProtocolEvent::IntraRegionDiscovery => "intradiscoveries",
            ProtocolEvent::RuleInstalled => "rules",
        }
    }
}

/// Append-only log of timestamped protocol events for one controller.
pub struct EventLog {
    controller: ControllerId,
    entries: Mutex<Vec<(ProtocolEvent, u64)>>,
}

impl EventLog {
    /// Create an empty log for `controller`.
    pub fn new(controller: ControllerId) -> Self {
        Self {
            controller,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Record `event` at the current wall-clock time.
    pub fn record(&self, event: ProtocolEvent) {
        let timestamp_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.entries.lock().push((event, timestamp_millis));
    }

    /// How many times `event` has been recorded.
    pub fn count(&self, event: ProtocolEvent) -> usize {
        self.entries.lock().iter().filter(|(e, _)| *e == event).count()
    }

    /// Write the log to `dir/controller_<id>` as key=value lines, one
    /// timestamp list per event kind. Returns the path written.
    pub fn dump_to(&self, dir: &Path) -> io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("controller_{}", self.controller));
        let mut file = std::fs::File::create(&path)?;

        let entries = self.entries.lock();
        writeln!(file, "controller={}", self.controller)?;
        for event in ProtocolEvent::ALL {
            let timestamps: Vec<String> = entries
                .iter()
                .filter(|(e, _)| *e == event)
                .map(|(_, ts)| ts.to_string())
                .collect();
            writeln!(file, "{}=[{}]", event.label(), timestamps.join(", "))?;
        }
        file.flush()?;
        Ok(path)
    }
}
