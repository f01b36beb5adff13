//! In-memory fabric doubles for exercising the protocol without switches.
//!
//! [`MemorySwitch`] records every frame written and rule installed so tests
//! can assert on the protocol's side effects; [`MemoryDirectory`] is a plain
//! map-backed switch lookup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::fabric::FlowRule;
use crate::fabric::Switch;
use crate::fabric::SwitchDirectory;
use crate::types::PortNo;
use crate::types::SwitchId;
use crate::wire::Frame;

/// A switch that records writes and rule installs instead of forwarding.
pub struct MemorySwitch {
    id: SwitchId,
    writes: Mutex<Vec<(PortNo, Vec<u8>)>>,
    rules: Mutex<Vec<FlowRule>>,
}

impl MemorySwitch {
    /// Create a recording switch with the given id.
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: SwitchId(id),
            writes: Mutex::new(Vec::new()),
            rules: Mutex::new(Vec::new()),
        })
    }

    /// Raw frames written so far, in order.
    pub fn writes(&self) -> Vec<(PortNo, Vec<u8>)> {
        self.writes.lock().clone()
    }

    /// Written frames decoded back into [`Frame`]s, in order.
    ///
    /// Panics on undecodable bytes; tests only ever write encoded frames.
    pub fn written_frames(&self) -> Vec<(PortNo, Frame)> {
        self.writes
            .lock()
            .iter()
            .map(|(port, bytes)| (*port, Frame::decode(bytes).expect("recorded frame decodes")))
            .collect()
    }

    /// Written frames, consuming the recording.
    pub fn drain_frames(&self) -> Vec<(PortNo, Frame)> {
        let frames = self.written_frames();
        self.writes.lock().clear();
        frames
    }

    /// Forget recorded writes.
    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    /// Rules installed so far, in order.
    pub fn rules(&self) -> Vec<FlowRule> {
        self.rules.lock().clone()
    }
}

impl Switch for MemorySwitch {
    fn id(&self) -> SwitchId {
        self.id
    }

    fn write(&self, port: PortNo, frame: &[u8]) -> bool {
        self.writes.lock().push((port, frame.to_vec()));
        true
    }

    fn install_rule(&self, rule: FlowRule) -> bool {
        self.rules.lock().push(rule);
        true
    }
}

/// Map-backed switch lookup.
#[derive(Default)]
pub struct MemoryDirectory {
    switches: Mutex<HashMap<SwitchId, Arc<dyn Switch>>>,
}

impl MemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `switch` resolvable by id.
    pub fn register(&self, switch: Arc<dyn Switch>) {
        self.switches.lock().insert(switch.id(), switch);
    }
}

impl SwitchDirectory for MemoryDirectory {
    fn switch(&self, id: SwitchId) -> Option<Arc<dyn Switch>> {
        self.switches.lock().get(&id).cloned()
    }
}
