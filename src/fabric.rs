//! Switch/network collaborator boundary.
//!
//! The protocol core never talks to forwarding hardware directly. The host
//! hands it [`Switch`] handles and a [`SwitchDirectory`], and the core drives
//! them: fire-and-forget frame transmission plus forwarding-rule
//! installation. How a rule is rendered onto the actual data plane is the
//! collaborator's concern; the core only fixes the match/action shape.

use std::sync::Arc;

use crate::constants::CLASS_COMMUNICATION;
use crate::constants::CLASS_DISCOVERY;
use crate::constants::FLOW_PRIORITY_DEFAULT;
use crate::constants::FLOW_PRIORITY_HIGH;
use crate::constants::PATH_RULE_IDLE_TIMEOUT_SECS;
use crate::types::ControllerId;
use crate::types::PortNo;
use crate::types::SwitchId;

/// One forwarding element in the shared fabric.
///
/// Both operations are best-effort: a `false` return means the switch
/// rejected the request, and the caller does not retry.
pub trait Switch: Send + Sync {
    /// Stable identity of this switch.
    fn id(&self) -> SwitchId;

    /// Transmit a raw frame out `port`. Fire-and-forget.
    fn write(&self, port: PortNo, frame: &[u8]) -> bool;

    /// Install a forwarding rule on this switch.
    fn install_rule(&self, rule: FlowRule) -> bool;
}

/// Switch lookup by id, owned by the host.
pub trait SwitchDirectory: Send + Sync {
    /// Resolve a switch id to a live handle, if the switch is known.
    fn switch(&self, id: SwitchId) -> Option<Arc<dyn Switch>>;
}

/// Match portion of a forwarding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch {
    /// Traffic-class tag the frame must carry.
    pub class: u16,
    /// Ingress port, if the rule is port-specific.
    pub in_port: Option<PortNo>,
    /// Source controller of the flow, if matched.
    pub source: Option<ControllerId>,
    /// Target controller of the flow, if matched.
    pub target: Option<ControllerId>,
}

/// What a rule does with a matching frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Punt the frame to the governing controller.
    Deliver,
    /// Forward the frame out a port.
    Output(PortNo),
}

/// A forwarding rule the core asks a switch to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRule {
    /// Frames this rule applies to.
    pub matches: RuleMatch,
    /// What to do with them.
    pub action: RuleAction,
    /// Rule priority; higher wins.
    pub priority: u16,
    /// Seconds of inactivity before the switch drops the rule; 0 keeps it.
    pub idle_timeout_secs: u16,
}

impl FlowRule {
    /// Trap rule punting every discovery-class frame to the controller.
    ///
    /// Installed once per switch when it joins the region, so probes and
    /// activations flooding through the fabric reach the control plane.
    pub fn discovery_trap() -> Self {
        Self {
            matches: RuleMatch {
                class: CLASS_DISCOVERY,
                in_port: None,
                source: None,
                target: None,
            },
            action: RuleAction::Deliver,
            priority: FLOW_PRIORITY_DEFAULT,
            idle_timeout_secs: 0,
        }
    }

    /// Accept communication-class frames for `target` arriving on `in_port`.
    ///
    /// The "last hop" rule a controller installs where an activated path
    /// enters its own region.
    pub fn deliver_local(in_port: PortNo, target: ControllerId) -> Self {
        Self {
            matches: RuleMatch {
                class: CLASS_COMMUNICATION,
                in_port: Some(in_port),
                source: None,
                target: Some(target),
            },
            action: RuleAction::Deliver,
            priority: FLOW_PRIORITY_HIGH,
            idle_timeout_secs: PATH_RULE_IDLE_TIMEOUT_SECS,
        }
    }

    /// Forward the `source` to `target` communication flow from `in_port`
    /// out `out_port`.
    pub fn forward_path(
        source: ControllerId,
        in_port: PortNo,
        target: ControllerId,
        out_port: PortNo,
    ) -> Self {
        Self {
            matches: RuleMatch {
                class: CLASS_COMMUNICATION,
                in_port: Some(in_port),
                source: Some(source),
                target: Some(target),
            },
            action: RuleAction::Output(out_port),
            priority: FLOW_PRIORITY_HIGH,
            idle_timeout_secs: PATH_RULE_IDLE_TIMEOUT_SECS,
        }
    }
}
