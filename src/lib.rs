//! In-band peer discovery and path activation between network controllers
//! sharing a switched fabric.
//!
//! Independent controllers, each governing a disjoint region of one switched
//! fabric, find each other through the data plane: probes flood out switch
//! ports accumulating path cost, candidate routes are ranked cheapest-first
//! per remote controller, and the best route is answered with an activation
//! that stitches forwarding rules along the way. The switches are the only
//! transport; no controller is pre-configured with another's address.
//!
//! The crate splits into three layers plus collaborator boundaries:
//!
//! - [`topology`] — same-region switch adjacency, path cost, and rule
//!   stitching between two edge ports.
//! - [`registry`] — per-remote ranked connection lists; becoming the best
//!   connection triggers activation and discovery relaying.
//! - [`driver`] — per-frame classification and the discovery / activation /
//!   data flows.
//! - [`fabric`] and [`wire`] — the switch and frame-codec collaborators the
//!   core drives.
//! - [`controller`] — the host-facing surface: dispatch entry point,
//!   lifecycle hooks, message sending, and the keep-alive heartbeat.

pub mod config;
pub mod constants;
pub mod controller;
pub mod driver;
pub mod error;
pub mod events;
pub mod fabric;
pub mod registry;
pub mod testing;
pub mod topology;
pub mod types;
pub mod wire;

pub use config::ControllerConfig;
pub use controller::InbandController;
pub use driver::MessageListener;
pub use driver::ProtocolDriver;
pub use error::InbandError;
pub use events::EventLog;
pub use events::ProtocolEvent;
pub use fabric::FlowRule;
pub use fabric::RuleAction;
pub use fabric::RuleMatch;
pub use fabric::Switch;
pub use fabric::SwitchDirectory;
pub use registry::Connection;
pub use registry::ConnectionRegistry;
pub use topology::TopologyMap;
pub use types::ControllerId;
pub use types::PortNo;
pub use types::SwitchId;
pub use wire::Frame;
