//! Intra-region topology model.
//!
//! Tracks observed adjacency between switches inside one controller's own
//! region, answers path-cost queries for discovery relaying, and stitches
//! forwarding rules between two edge ports when a path is activated.
//!
//! Adjacency is monotonically discovered from same-region probes and never
//! re-verified or removed. The path lookup only ever observes one layer of
//! adjacency, so stitching is limited to a single intermediate hop; the
//! interface stays general (edge-list paths) so a shortest-path computation
//! could replace the lookup without changing callers.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use tracing::warn;

use crate::error::InbandError;
use crate::error::NoPathSnafu;
use crate::events::EventLog;
use crate::events::ProtocolEvent;
use crate::fabric::FlowRule;
use crate::fabric::Switch;
use crate::types::ControllerId;
use crate::types::PortNo;
use crate::types::SwitchId;

/// A directed adjacency observation: the source switch reaches `to` through
/// its local port `via_port`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TopologyEdge {
    /// Switch on the far side of the link.
    pub to: SwitchId,
    /// Local port facing it.
    pub via_port: PortNo,
}

/// Egress point returned by a successful path stitch: where a forwarded
/// activation should leave the region.
#[derive(Clone)]
pub struct Egress {
    /// Switch to transmit from.
    pub switch: Arc<dyn Switch>,
    /// Port to transmit out of.
    pub port: PortNo,
}

/// Same-region switch adjacency and path stitching for one controller.
pub struct TopologyMap {
    links: Mutex<HashMap<SwitchId, HashSet<TopologyEdge>>>,
    events: Arc<EventLog>,
}

impl TopologyMap {
    /// Create an empty topology bound to `events`.
    pub fn new(events: Arc<EventLog>) -> Self {
        Self {
            links: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Record that `from` reaches `to` through `via_port`.
    ///
    /// Idempotent: duplicate observations are no-ops.
    pub fn record_adjacency(&self, from: SwitchId, via_port: PortNo, to: SwitchId) {
        let mut links = self.links.lock();
        let inserted = links
            .entry(from)
            .or_default()
            .insert(TopologyEdge { to, via_port });
        if inserted {
            debug!(%from, %via_port, %to, "recorded switch adjacency");
        }
    }

    /// Edges to traverse from `from` to `to`, or `None` when no path is on
    /// record. Currently a single-edge lookup.
    pub fn path(&self, from: SwitchId, to: SwitchId) -> Option<Vec<TopologyEdge>> {
        if from == to {
            return Some(Vec::new());
        }
        let links = self.links.lock();
        let edge = links.get(&from)?.iter().find(|e| e.to == to).copied()?;
        Some(vec![edge])
    }

    /// Additive hop cost from `from` to `to`.
    ///
    /// Co-located switches cost 1 ("already here"), a direct adjacency costs
    /// its hop count, and `None` means no known path. Costs are non-negative
    /// and monotonic; connection ranking depends on that.
    pub fn path_cost(&self, from: SwitchId, to: SwitchId) -> Option<u32> {
        if from == to {
            return Some(1);
        }
        self.path(from, to).map(|edges| edges.len() as u32)
    }

    /// Install forwarding state for the `source` to `target` communication
    /// flow entering the region at `in_switch`:`in_port` and leaving at
    /// `out_switch`:`out_port`.
    ///
    /// When both edge points sit on the same switch a single rule suffices.
    /// Otherwise an adjacency must be on record in both directions; the
    /// ingress switch forwards toward the adjacent port and the egress
    /// switch accepts from the reverse one. Fails with no side effect when
    /// either directional adjacency is missing. A rule pair that fails after
    /// the first install is not rolled back; the dangling half ages out on
    /// its idle timeout.
    pub fn install_path(
        &self,
        source: ControllerId,
        in_switch: &Arc<dyn Switch>,
        in_port: PortNo,
        target: ControllerId,
        out_switch: &Arc<dyn Switch>,
        out_port: PortNo,
    ) -> Result<Egress, InbandError> {
        if in_switch.id() == out_switch.id() {
            self.install_rule(out_switch, FlowRule::forward_path(source, in_port, target, out_port));
            return Ok(Egress {
                switch: out_switch.clone(),
                port: out_port,
            });
        }

        let (forward, reverse) = {
            let links = self.links.lock();
            let forward = links
                .get(&in_switch.id())
                .and_then(|set| set.iter().find(|e| e.to == out_switch.id()).copied());
            let reverse = links
                .get(&out_switch.id())
                .and_then(|set| set.iter().find(|e| e.to == in_switch.id()).copied());
            (forward, reverse)
        };
        let (Some(forward), Some(reverse)) = (forward, reverse) else {
            return NoPathSnafu {
                from: in_switch.id(),
                to: out_switch.id(),
            }
            .fail();
        };

        self.install_rule(
            in_switch,
            FlowRule::forward_path(source, in_port, target, forward.via_port),
        );
        self.install_rule(
            out_switch,
            FlowRule::forward_path(source, reverse.via_port, target, out_port),
        );
        Ok(Egress {
            switch: out_switch.clone(),
            port: out_port,
        })
    }

    fn install_rule(&self, switch: &Arc<dyn Switch>, rule: FlowRule) {
        if switch.install_rule(rule) {
            self.events.record(ProtocolEvent::RuleInstalled);
        } else {
            warn!(switch = %switch.id(), "switch rejected forwarding rule");
        }
    }
}
