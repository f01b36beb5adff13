//! Frame classification and the discovery/activation/data flows.
//!
//! The driver is invoked once per inbound frame. Each remote controller's
//! relationship to this one moves through three states: unknown (no registry
//! entry), candidate (entry exists below index 0), active (entry at index
//! 0). Discovery drives unknown-to-active and candidate-to-active
//! transitions; nothing ever moves a controller back to unknown.

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use crate::events::EventLog;
use crate::events::ProtocolEvent;
use crate::fabric::FlowRule;
use crate::fabric::Switch;
use crate::fabric::SwitchDirectory;
use crate::registry::ConnectionRegistry;
use crate::topology::TopologyMap;
use crate::types::ControllerId;
use crate::types::PortNo;
use crate::types::SwitchId;
use crate::wire::Frame;
use crate::wire::send_frame;

/// Receives application payloads delivered through the fabric.
///
/// Dispatch order is unspecified and each listener is isolated: a panic in
/// one is caught and logged, the rest still run.
pub trait MessageListener: Send + Sync {
    /// Called once per inbound data frame.
    fn on_message(&self, from: ControllerId, text: &str);
}

/// Classifies inbound frames and executes the protocol state machine.
pub struct ProtocolDriver {
    own_id: ControllerId,
    registry: Arc<ConnectionRegistry>,
    topology: Arc<TopologyMap>,
    directory: Arc<dyn SwitchDirectory>,
    events: Arc<EventLog>,
}

impl ProtocolDriver {
    /// Build a driver over the given registry, topology, and switch lookup.
    pub fn new(
        own_id: ControllerId,
        registry: Arc<ConnectionRegistry>,
        topology: Arc<TopologyMap>,
        directory: Arc<dyn SwitchDirectory>,
        events: Arc<EventLog>,
    ) -> Self {
        Self {
            own_id,
            registry,
            topology,
            directory,
            events,
        }
    }

    /// Classify-and-handle entry point for one inbound frame.
    ///
    /// A frame that fails to decode is logged and dropped without touching
    /// registry or topology state; no failure here is fatal.
    pub fn handle_frame(
        &self,
        switch: &Arc<dyn Switch>,
        port: PortNo,
        bytes: &[u8],
        listeners: &[Arc<dyn MessageListener>],
    ) {
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(switch = %switch.id(), %port, %error, "dropping undecodable frame");
                return;
            }
        };
        match frame {
            Frame::Discovery {
                source,
                target,
                origin_switch,
                cost,
            } => self.handle_discovery(switch, port, source, target, origin_switch, cost),
            Frame::Activation {
                source,
                target,
                cost,
            } => self.handle_activation(switch, port, source, target, cost),
            Frame::Data { source, text, .. } => self.handle_data(source, &text, listeners),
        }
    }

    fn handle_discovery(
        &self,
        switch: &Arc<dyn Switch>,
        port: PortNo,
        source: ControllerId,
        target: ControllerId,
        origin_switch: SwitchId,
        cost: u32,
    ) {
        if source == self.own_id {
            // Our own probe came back through the region: a same-region
            // topology observation, never a peer connection.
            self.record_intra_region_link(switch, port, origin_switch);
            return;
        }
        if !target.is_broadcast() && target != self.own_id {
            debug!(%source, %target, "discovery not addressed here, dropping");
            return;
        }
        self.registry
            .store_and_use_connection(source, switch, port, cost, true);
    }

    fn record_intra_region_link(
        &self,
        switch: &Arc<dyn Switch>,
        port: PortNo,
        origin_switch: SwitchId,
    ) {
        let Some(origin) = self.directory.switch(origin_switch) else {
            warn!(switch = %origin_switch, "same-region probe names an unknown switch, ignoring");
            return;
        };
        self.topology.record_adjacency(switch.id(), port, origin.id());
        self.events.record(ProtocolEvent::IntraRegionDiscovery);
        debug!(
            from = %switch.id(),
            %port,
            to = %origin.id(),
            "same-region discovery"
        );
    }

    fn handle_activation(
        &self,
        switch: &Arc<dyn Switch>,
        port: PortNo,
        source: ControllerId,
        target: ControllerId,
        cost: u32,
    ) {
        if target == self.own_id {
            // We are the discoverer being activated: accept inbound
            // communication frames for us at this edge.
            if switch.install_rule(FlowRule::deliver_local(port, self.own_id)) {
                self.events.record(ProtocolEvent::RuleInstalled);
            } else {
                warn!(switch = %switch.id(), %port, "switch rejected local delivery rule");
            }
            debug!(%source, switch = %switch.id(), %port, "path activated toward this controller");

            // Relaying already happened during discovery; never relay here.
            if !self.registry.has_connection_at(source, switch.id(), port) {
                self.registry
                    .store_and_use_connection(source, switch, port, cost, false);
            }
            return;
        }

        // Intermediate relay: stitch the receiving edge to our best
        // connection toward the activation target.
        let next = match self.registry.connection_to(target) {
            Ok(next) => next,
            Err(error) => {
                warn!(%target, %error, "dropping activation for unknown target");
                return;
            }
        };
        match self
            .topology
            .install_path(source, switch, port, target, &next.switch, next.port)
        {
            Ok(egress) => {
                let frame = Frame::Activation {
                    source,
                    target,
                    cost,
                };
                send_frame(egress.switch.as_ref(), egress.port, &frame);
                self.events.record(ProtocolEvent::ActivationSent);
                debug!(
                    %source,
                    %target,
                    from = %switch.id(),
                    to = %egress.switch.id(),
                    port = %egress.port,
                    "stitched path and forwarded activation"
                );
            }
            Err(error) => {
                // Activation is not retried; the discoverer may still find
                // another route.
                debug!(%source, %target, %error, "cannot stitch activation path, dropping");
            }
        }
    }

    fn handle_data(
        &self,
        source: ControllerId,
        text: &str,
        listeners: &[Arc<dyn MessageListener>],
    ) {
        for listener in listeners {
            let dispatched = catch_unwind(AssertUnwindSafe(|| listener.on_message(source, text)));
            if dispatched.is_err() {
                warn!(%source, "message listener panicked, continuing with remaining listeners");
            }
        }
    }
}
