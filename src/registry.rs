//! Ranked connection registry.
//!
//! Owns one ordered candidate list per remote controller, cheapest first.
//! The element at index 0 is by definition the active connection. Becoming
//! index 0 is the sole trigger for the two downstream effects: an activation
//! back toward the discovered controller and, during discovery, a relay of
//! the news to every other connected controller. Entries are never pruned;
//! stale candidates persist until restart.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::InbandError;
use crate::error::UnknownControllerSnafu;
use crate::events::EventLog;
use crate::events::ProtocolEvent;
use crate::fabric::Switch;
use crate::topology::TopologyMap;
use crate::types::ControllerId;
use crate::types::PortNo;
use crate::types::SwitchId;
use crate::wire::Frame;
use crate::wire::send_frame;

/// One concrete route to a remote controller.
#[derive(Clone)]
pub struct Connection {
    /// Switch the route leaves through.
    pub switch: Arc<dyn Switch>,
    /// Port on that switch.
    pub port: PortNo,
    /// Additive path cost advertised for this route.
    pub cost: u32,
}

impl Connection {
    fn is_at(&self, switch: SwitchId, port: PortNo) -> bool {
        self.switch.id() == switch && self.port == port
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("switch", &self.switch.id())
            .field("port", &self.port)
            .field("cost", &self.cost)
            .finish()
    }
}

type ConnectionTable = HashMap<ControllerId, Vec<Connection>>;

/// Per-remote-controller ranked connection lists for one controller.
pub struct ConnectionRegistry {
    own_id: ControllerId,
    topology: Arc<TopologyMap>,
    events: Arc<EventLog>,
    /// All candidate lists behind one lock: computing the insert position,
    /// inserting, checking for index 0, and the resulting sends must not
    /// interleave with another insert for the same remote controller, or
    /// contradictory activations can be emitted.
    connections: Mutex<ConnectionTable>,
}

impl ConnectionRegistry {
    /// Create an empty registry for the controller `own_id`.
    pub fn new(own_id: ControllerId, topology: Arc<TopologyMap>, events: Arc<EventLog>) -> Self {
        Self {
            own_id,
            topology,
            events,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a connection to `remote` into its ranked list and return the
    /// resulting index.
    ///
    /// The insert is stable ascending by cost; a new entry lands before
    /// equal-cost incumbents but never displaces a strictly cheaper one.
    /// Nothing is ever removed.
    pub fn store_connection(
        &self,
        remote: ControllerId,
        switch: &Arc<dyn Switch>,
        port: PortNo,
        cost: u32,
    ) -> usize {
        let mut connections = self.connections.lock();
        self.store_locked(&mut connections, remote, switch, port, cost)
    }

    /// [`store_connection`](Self::store_connection), then — if and only if
    /// the new entry landed at index 0 — send an activation back over it
    /// and, when `relay` is set, re-advertise `remote` to every other
    /// connected controller.
    ///
    /// A discovery that lands anywhere below index 0 is recorded but
    /// otherwise inert.
    pub fn store_and_use_connection(
        &self,
        remote: ControllerId,
        switch: &Arc<dyn Switch>,
        port: PortNo,
        cost: u32,
        relay: bool,
    ) -> usize {
        let mut connections = self.connections.lock();
        let index = self.store_locked(&mut connections, remote, switch, port, cost);
        if index == 0 {
            self.activate_connection(remote, switch, port, cost);
            if relay {
                self.relay_discovery(&connections, remote, switch, port, cost);
            }
        }
        index
    }

    fn store_locked(
        &self,
        connections: &mut ConnectionTable,
        remote: ControllerId,
        switch: &Arc<dyn Switch>,
        port: PortNo,
        cost: u32,
    ) -> usize {
        let list = connections.entry(remote).or_default();
        if list.is_empty() {
            self.events.record(ProtocolEvent::FirstConnection);
        }
        let index = list.partition_point(|c| c.cost < cost);
        if index == 0 && !list.is_empty() {
            self.events.record(ProtocolEvent::NewBestConnection);
        }
        list.insert(
            index,
            Connection {
                switch: switch.clone(),
                port,
                cost,
            },
        );
        debug!(%remote, switch = %switch.id(), %port, cost, index, "stored connection");
        index
    }

    /// Send an activation toward the controller whose discovery just became
    /// our best route to it.
    fn activate_connection(
        &self,
        remote: ControllerId,
        switch: &Arc<dyn Switch>,
        port: PortNo,
        cost: u32,
    ) {
        let frame = Frame::Activation {
            source: self.own_id,
            target: remote,
            cost,
        };
        send_frame(switch.as_ref(), port, &frame);
        self.events.record(ProtocolEvent::ActivationSent);
        debug!(%remote, switch = %switch.id(), %port, cost, "sent activation");
    }

    /// Re-advertise a new best connection to `remote` to every other
    /// connected controller.
    ///
    /// Skips `remote` itself and the previous hop (the controller whose
    /// recorded connection sits on exactly the switch/port this discovery
    /// arrived on) to prevent an immediate echo. For each remaining
    /// controller every known connection is tried, skipping those with no
    /// topology path from the discovering switch.
    fn relay_discovery(
        &self,
        connections: &ConnectionTable,
        remote: ControllerId,
        in_switch: &Arc<dyn Switch>,
        in_port: PortNo,
        cost: u32,
    ) {
        let previous = previous_hop(connections, in_switch.id(), in_port, remote);
        for (&other, routes) in connections.iter() {
            if other == remote || Some(other) == previous {
                continue;
            }
            for route in routes {
                let Some(additional) = self.topology.path_cost(in_switch.id(), route.switch.id())
                else {
                    debug!(
                        from = %in_switch.id(),
                        to = %route.switch.id(),
                        "no intra-region path, skipping relay target"
                    );
                    continue;
                };
                let frame = Frame::Discovery {
                    source: remote,
                    target: ControllerId::BROADCAST,
                    origin_switch: in_switch.id(),
                    cost: cost + additional,
                };
                send_frame(route.switch.as_ref(), route.port, &frame);
                self.events.record(ProtocolEvent::DiscoverySent);
                debug!(
                    %remote,
                    toward = %other,
                    switch = %route.switch.id(),
                    port = %route.port,
                    cost = cost + additional,
                    "relayed discovery"
                );
            }
        }
    }

    /// Whether any connection to `remote` is on record.
    pub fn has_connection_to(&self, remote: ControllerId) -> bool {
        self.connections
            .lock()
            .get(&remote)
            .is_some_and(|list| !list.is_empty())
    }

    /// Whether a connection to `remote` through exactly `switch`:`port` is
    /// on record. Used to avoid re-storing a duplicate during activation.
    pub fn has_connection_at(&self, remote: ControllerId, switch: SwitchId, port: PortNo) -> bool {
        self.connections
            .lock()
            .get(&remote)
            .is_some_and(|list| list.iter().any(|c| c.is_at(switch, port)))
    }

    /// The active (cheapest) connection to `remote`.
    ///
    /// Callers are expected to have checked [`has_connection_to`]
    /// (Self::has_connection_to) first; an unknown controller here is a
    /// caller bug, not a recoverable runtime condition.
    pub fn connection_to(&self, remote: ControllerId) -> Result<Connection, InbandError> {
        self.connections
            .lock()
            .get(&remote)
            .and_then(|list| list.first())
            .cloned()
            .ok_or_else(|| UnknownControllerSnafu { controller: remote }.build())
    }

    /// Every known connection to `remote`, best first.
    pub fn connections_to(&self, remote: ControllerId) -> Vec<Connection> {
        self.connections.lock().get(&remote).cloned().unwrap_or_default()
    }

    /// Ids of every remote controller with at least one recorded connection.
    pub fn connected_controllers(&self) -> Vec<ControllerId> {
        self.connections
            .lock()
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(&id, _)| id)
            .collect()
    }
}

/// The controller, if any, whose recorded connection to us uses exactly the
/// switch/port a discovery just arrived on.
fn previous_hop(
    connections: &ConnectionTable,
    switch: SwitchId,
    port: PortNo,
    excluded: ControllerId,
) -> Option<ControllerId> {
    connections
        .iter()
        .filter(|&(&id, _)| id != excluded)
        .find(|(_, routes)| routes.iter().any(|c| c.is_at(switch, port)))
        .map(|(&id, _)| id)
}
