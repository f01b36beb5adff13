//! Host-facing controller surface.
//!
//! [`InbandController`] wires the registry, topology, and driver together
//! for one controller instance and exposes what the host needs: the
//! per-frame dispatch entry point, switch/port lifecycle hooks, message
//! sending, listener registration, and a cancellable keep-alive heartbeat.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::ControllerConfig;
use crate::constants::INITIAL_DISCOVERY_COST;
use crate::constants::KEEPALIVE_TEXT;
use crate::driver::MessageListener;
use crate::driver::ProtocolDriver;
use crate::events::EventLog;
use crate::events::ProtocolEvent;
use crate::fabric::FlowRule;
use crate::fabric::Switch;
use crate::fabric::SwitchDirectory;
use crate::registry::ConnectionRegistry;
use crate::topology::TopologyMap;
use crate::types::ControllerId;
use crate::types::PortNo;
use crate::wire::Frame;
use crate::wire::send_frame;

/// One controller instance of the in-band communication protocol.
///
/// All state is scoped to this instance; several controllers can be
/// simulated in one process without sharing anything.
pub struct InbandController {
    config: ControllerConfig,
    registry: Arc<ConnectionRegistry>,
    topology: Arc<TopologyMap>,
    driver: ProtocolDriver,
    events: Arc<EventLog>,
    listeners: RwLock<Vec<Arc<dyn MessageListener>>>,
    cancel: CancellationToken,
}

impl InbandController {
    /// Construct a controller from its config and the host's switch lookup.
    pub fn new(config: ControllerConfig, directory: Arc<dyn SwitchDirectory>) -> Arc<Self> {
        let events = Arc::new(EventLog::new(config.controller_id));
        let topology = Arc::new(TopologyMap::new(events.clone()));
        let registry = Arc::new(ConnectionRegistry::new(
            config.controller_id,
            topology.clone(),
            events.clone(),
        ));
        let driver = ProtocolDriver::new(
            config.controller_id,
            registry.clone(),
            topology.clone(),
            directory,
            events.clone(),
        );
        Arc::new(Self {
            config,
            registry,
            topology,
            driver,
            events,
            listeners: RwLock::new(Vec::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// This controller's identity.
    pub fn controller_id(&self) -> ControllerId {
        self.config.controller_id
    }

    /// The instance's protocol event log.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The instance's intra-region topology model.
    pub fn topology(&self) -> &TopologyMap {
        &self.topology
    }

    /// Per-frame dispatch entry point: classify `bytes` received on
    /// `switch`:`port` and run the matching protocol flow.
    pub fn handle_frame(&self, switch: &Arc<dyn Switch>, port: PortNo, bytes: &[u8]) {
        let listeners = self.listeners.read().clone();
        self.driver.handle_frame(switch, port, bytes, &listeners);
    }

    /// Install the discovery trap when a switch joins this region, so
    /// flooded probes reaching it are punted to us.
    pub fn switch_added(&self, switch: &Arc<dyn Switch>) {
        if switch.install_rule(FlowRule::discovery_trap()) {
            self.events.record(ProtocolEvent::RuleInstalled);
            debug!(switch = %switch.id(), "installed discovery trap");
        } else {
            warn!(switch = %switch.id(), "switch rejected discovery trap rule");
        }
    }

    /// Flood a probe out a port that just came up.
    pub fn port_up(&self, switch: &Arc<dyn Switch>, port: PortNo) {
        let frame = Frame::Discovery {
            source: self.config.controller_id,
            target: ControllerId::BROADCAST,
            origin_switch: switch.id(),
            cost: INITIAL_DISCOVERY_COST,
        };
        send_frame(switch.as_ref(), port, &frame);
        self.events.record(ProtocolEvent::DiscoverySent);
        debug!(switch = %switch.id(), %port, "probed port");
    }

    /// Send `text` to `remote` over the active connection.
    ///
    /// Returns `false` when no connection is recorded or the switch rejects
    /// the frame.
    pub fn send_message(&self, remote: ControllerId, text: &str) -> bool {
        let Ok(connection) = self.registry.connection_to(remote) else {
            return false;
        };
        let frame = Frame::Data {
            source: self.config.controller_id,
            target: remote,
            text: text.to_string(),
        };
        send_frame(connection.switch.as_ref(), connection.port, &frame)
    }

    /// Register a listener for inbound application payloads.
    pub fn register_listener(&self, listener: Arc<dyn MessageListener>) {
        self.listeners.write().push(listener);
    }

    /// Ids of every remote controller with at least one recorded connection.
    pub fn connected_controllers(&self) -> Vec<ControllerId> {
        self.registry.connected_controllers()
    }

    /// Spawn the keep-alive loop.
    ///
    /// Sends a keep-alive data frame to every connected controller each
    /// period; only reads the connected set, so it never blocks on in-flight
    /// discovery. Runs until [`shutdown`](Self::shutdown).
    pub fn spawn_heartbeat(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = self.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(controller.config.heartbeat_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("keep-alive loop shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        for remote in controller.connected_controllers() {
                            if !controller.send_message(remote, KEEPALIVE_TEXT) {
                                warn!(%remote, "keep-alive send failed");
                            }
                        }
                    }
                }
            }
        })
    }

    /// Cancel background work and write the event dump if configured.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(dir) = &self.config.event_dump_dir {
            match self.events.dump_to(dir) {
                Ok(path) => info!(path = %path.display(), "protocol event dump written"),
                Err(error) => warn!(%error, "failed to write protocol event dump"),
            }
        }
    }
}
