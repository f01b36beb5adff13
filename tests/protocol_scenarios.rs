//! End-to-end protocol scenarios over an in-memory fabric.
//!
//! Each test builds one or more controllers, feeds frames through the
//! per-frame dispatch entry point, and asserts on the frames and rules the
//! controllers push back into the fabric.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use inband::ControllerConfig;
use inband::ControllerId;
use inband::Frame;
use inband::InbandController;
use inband::MessageListener;
use inband::PortNo;
use inband::ProtocolEvent;
use inband::Switch;
use inband::SwitchId;
use inband::fabric::RuleAction;
use inband::testing::MemoryDirectory;
use inband::testing::MemorySwitch;

fn controller(id: u16, directory: &Arc<MemoryDirectory>) -> Arc<InbandController> {
    InbandController::new(
        ControllerConfig::new(ControllerId(id)),
        directory.clone(),
    )
}

fn discovery(source: u16, origin_switch: u64, cost: u32) -> Vec<u8> {
    Frame::Discovery {
        source: ControllerId(source),
        target: ControllerId::BROADCAST,
        origin_switch: SwitchId(origin_switch),
        cost,
    }
    .encode()
    .expect("encode")
}

#[test]
fn first_discovery_stores_activates_and_has_nothing_to_relay() {
    let directory = MemoryDirectory::new();
    let ctrl = controller(2, &directory);
    let s1 = MemorySwitch::new(1);
    let s1_handle: Arc<dyn Switch> = s1.clone();

    ctrl.handle_frame(&s1_handle, PortNo(1), &discovery(1, 10, 5));

    assert_eq!(ctrl.connected_controllers(), vec![ControllerId(1)]);
    let frames = s1.written_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].0, PortNo(1));
    assert_eq!(
        frames[0].1,
        Frame::Activation {
            source: ControllerId(2),
            target: ControllerId(1),
            cost: 5,
        }
    );
    assert_eq!(ctrl.events().count(ProtocolEvent::FirstConnection), 1);
    assert_eq!(ctrl.events().count(ProtocolEvent::ActivationSent), 1);
    assert_eq!(ctrl.events().count(ProtocolEvent::DiscoverySent), 0);
}

#[test]
fn cheaper_discovery_becomes_best_and_relays_with_added_path_cost() {
    let directory = MemoryDirectory::new();
    let ctrl = controller(2, &directory);
    let s1 = MemorySwitch::new(1);
    let s2 = MemorySwitch::new(2);
    let s1_handle: Arc<dyn Switch> = s1.clone();
    let s2_handle: Arc<dyn Switch> = s2.clone();

    // controller 1 first seen at s1:1 cost 5; controller 3 sits at s1:3
    ctrl.handle_frame(&s1_handle, PortNo(1), &discovery(1, 10, 5));
    ctrl.handle_frame(&s1_handle, PortNo(3), &discovery(3, 11, 2));
    // controller 3's route leaves through s1; a cheaper route to
    // controller 1 shows up on s2, with s2 adjacent to s1
    ctrl.topology().record_adjacency(SwitchId(2), PortNo(9), SwitchId(1));
    s1.clear_writes();

    ctrl.handle_frame(&s2_handle, PortNo(2), &discovery(1, 12, 3));

    // activation for the new best went out the new route
    let s2_frames = s2.written_frames();
    assert_eq!(s2_frames.len(), 1);
    assert_eq!(
        s2_frames[0].1,
        Frame::Activation {
            source: ControllerId(2),
            target: ControllerId(1),
            cost: 3,
        }
    );
    // relay toward controller 3 carries cost 3 + pathCost(s2, s1)
    let s1_frames = s1.written_frames();
    assert_eq!(s1_frames.len(), 1);
    assert_eq!(s1_frames[0].0, PortNo(3));
    assert_eq!(
        s1_frames[0].1,
        Frame::Discovery {
            source: ControllerId(1),
            target: ControllerId::BROADCAST,
            origin_switch: SwitchId(2),
            cost: 3 + 1,
        }
    );
    assert_eq!(ctrl.events().count(ProtocolEvent::NewBestConnection), 1);
}

#[test]
fn unaddressed_discovery_is_dropped() {
    let directory = MemoryDirectory::new();
    let ctrl = controller(2, &directory);
    let s1 = MemorySwitch::new(1);
    let s1_handle: Arc<dyn Switch> = s1.clone();

    let frame = Frame::Discovery {
        source: ControllerId(1),
        target: ControllerId(7),
        origin_switch: SwitchId(10),
        cost: 4,
    }
    .encode()
    .expect("encode");
    ctrl.handle_frame(&s1_handle, PortNo(1), &frame);

    assert!(ctrl.connected_controllers().is_empty());
    assert!(s1.written_frames().is_empty());
}

#[test]
fn own_probe_records_adjacency_not_a_connection() {
    let directory = MemoryDirectory::new();
    let ctrl = controller(2, &directory);
    let s1 = MemorySwitch::new(1);
    let s2 = MemorySwitch::new(2);
    let s1_handle: Arc<dyn Switch> = s1.clone();
    directory.register(s1.clone());
    directory.register(s2.clone());

    // our own probe sent from s2 arrives on s1:4
    ctrl.handle_frame(&s1_handle, PortNo(4), &discovery(2, 2, 1));

    assert!(ctrl.connected_controllers().is_empty());
    assert_eq!(ctrl.topology().path_cost(SwitchId(1), SwitchId(2)), Some(1));
    assert_eq!(ctrl.events().count(ProtocolEvent::IntraRegionDiscovery), 1);
}

#[test]
fn own_probe_naming_unknown_switch_is_ignored() {
    let directory = MemoryDirectory::new();
    let ctrl = controller(2, &directory);
    let s1 = MemorySwitch::new(1);
    let s1_handle: Arc<dyn Switch> = s1.clone();

    ctrl.handle_frame(&s1_handle, PortNo(4), &discovery(2, 99, 1));

    assert_eq!(ctrl.topology().path_cost(SwitchId(1), SwitchId(99)), None);
    assert_eq!(ctrl.events().count(ProtocolEvent::IntraRegionDiscovery), 0);
}

#[test]
fn activation_addressed_here_installs_accept_rule_and_stores_quietly() {
    let directory = MemoryDirectory::new();
    let ctrl = controller(2, &directory);
    let s2 = MemorySwitch::new(2);
    let s2_handle: Arc<dyn Switch> = s2.clone();

    let frame = Frame::Activation {
        source: ControllerId(1),
        target: ControllerId(2),
        cost: 3,
    }
    .encode()
    .expect("encode");
    ctrl.handle_frame(&s2_handle, PortNo(2), &frame);

    // local accept rule for ourselves at the receiving edge
    let rules = s2.rules();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].action, RuleAction::Deliver);
    assert_eq!(rules[0].matches.in_port, Some(PortNo(2)));
    assert_eq!(rules[0].matches.target, Some(ControllerId(2)));

    // the connection was stored and activated back, but nothing relayed
    assert_eq!(ctrl.connected_controllers(), vec![ControllerId(1)]);
    let frames = s2.written_frames();
    assert_eq!(frames.len(), 1);
    assert!(matches!(frames[0].1, Frame::Activation { .. }));
    assert_eq!(ctrl.events().count(ProtocolEvent::DiscoverySent), 0);

    // a second identical activation neither re-stores nor re-activates
    s2.clear_writes();
    let frame = Frame::Activation {
        source: ControllerId(1),
        target: ControllerId(2),
        cost: 3,
    }
    .encode()
    .expect("encode");
    ctrl.handle_frame(&s2_handle, PortNo(2), &frame);
    assert!(s2.written_frames().is_empty());
}

#[test]
fn activation_for_someone_else_is_stitched_and_forwarded() {
    let directory = MemoryDirectory::new();
    let ctrl = controller(2, &directory);
    let s1 = MemorySwitch::new(1);
    let s2 = MemorySwitch::new(2);
    let s1_handle: Arc<dyn Switch> = s1.clone();
    let s2_handle: Arc<dyn Switch> = s2.clone();

    // our best route toward controller 3 leaves at s2:5
    ctrl.handle_frame(&s2_handle, PortNo(5), &discovery(3, 20, 2));
    // both directions of the s1-s2 link are known
    ctrl.topology().record_adjacency(SwitchId(1), PortNo(10), SwitchId(2));
    ctrl.topology().record_adjacency(SwitchId(2), PortNo(20), SwitchId(1));
    s1.clear_writes();
    s2.clear_writes();

    let frame = Frame::Activation {
        source: ControllerId(1),
        target: ControllerId(3),
        cost: 4,
    }
    .encode()
    .expect("encode");
    ctrl.handle_frame(&s1_handle, PortNo(1), &frame);

    // ingress rule on s1 toward the link, egress rule on s2 toward the route
    let s1_rules = s1.rules();
    assert_eq!(s1_rules.len(), 1);
    assert_eq!(s1_rules[0].matches.in_port, Some(PortNo(1)));
    assert_eq!(s1_rules[0].action, RuleAction::Output(PortNo(10)));
    let s2_rules = s2.rules();
    assert_eq!(s2_rules.len(), 1);
    assert_eq!(s2_rules[0].matches.in_port, Some(PortNo(20)));
    assert_eq!(s2_rules[0].action, RuleAction::Output(PortNo(5)));

    // the activation itself went out the egress edge, cost unchanged
    let forwarded = s2.written_frames();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].0, PortNo(5));
    assert_eq!(
        forwarded[0].1,
        Frame::Activation {
            source: ControllerId(1),
            target: ControllerId(3),
            cost: 4,
        }
    );
}

#[test]
fn activation_without_topology_path_is_dropped_without_rules() {
    let directory = MemoryDirectory::new();
    let ctrl = controller(2, &directory);
    let s1 = MemorySwitch::new(1);
    let s2 = MemorySwitch::new(2);
    let s1_handle: Arc<dyn Switch> = s1.clone();
    let s2_handle: Arc<dyn Switch> = s2.clone();

    ctrl.handle_frame(&s2_handle, PortNo(5), &discovery(3, 20, 2));
    s2.clear_writes();

    let frame = Frame::Activation {
        source: ControllerId(1),
        target: ControllerId(3),
        cost: 4,
    }
    .encode()
    .expect("encode");
    ctrl.handle_frame(&s1_handle, PortNo(1), &frame);

    assert!(s1.rules().is_empty());
    assert!(s2.rules().is_empty());
    assert!(s2.written_frames().is_empty());
}

#[test]
fn malformed_frame_is_dropped_without_state_change() {
    let directory = MemoryDirectory::new();
    let ctrl = controller(2, &directory);
    let s1 = MemorySwitch::new(1);
    let s1_handle: Arc<dyn Switch> = s1.clone();

    ctrl.handle_frame(&s1_handle, PortNo(1), &[0xde, 0xad, 0xbe, 0xef]);

    assert!(ctrl.connected_controllers().is_empty());
    assert!(s1.written_frames().is_empty());

    // the controller keeps processing frames afterwards
    ctrl.handle_frame(&s1_handle, PortNo(1), &discovery(1, 10, 5));
    assert_eq!(ctrl.connected_controllers(), vec![ControllerId(1)]);
}

#[derive(Default)]
struct RecordingListener {
    messages: Mutex<Vec<(ControllerId, String)>>,
}

impl MessageListener for RecordingListener {
    fn on_message(&self, from: ControllerId, text: &str) {
        self.messages.lock().push((from, text.to_string()));
    }
}

struct PanickingListener;

impl MessageListener for PanickingListener {
    fn on_message(&self, _from: ControllerId, _text: &str) {
        panic!("listener bug");
    }
}

#[test]
fn data_frames_fan_out_and_a_panicking_listener_is_isolated() {
    let directory = MemoryDirectory::new();
    let ctrl = controller(2, &directory);
    let s1 = MemorySwitch::new(1);
    let s1_handle: Arc<dyn Switch> = s1.clone();

    let first = Arc::new(RecordingListener::default());
    let second = Arc::new(RecordingListener::default());
    ctrl.register_listener(Arc::new(PanickingListener));
    ctrl.register_listener(first.clone());
    ctrl.register_listener(second.clone());

    let frame = Frame::Data {
        source: ControllerId(1),
        target: ControllerId(2),
        text: "hello".into(),
    }
    .encode()
    .expect("encode");
    ctrl.handle_frame(&s1_handle, PortNo(1), &frame);

    assert_eq!(first.messages.lock().as_slice(), &[(ControllerId(1), "hello".to_string())]);
    assert_eq!(second.messages.lock().as_slice(), &[(ControllerId(1), "hello".to_string())]);
}

#[test]
fn send_message_requires_a_recorded_connection() {
    let directory = MemoryDirectory::new();
    let ctrl = controller(2, &directory);
    let s1 = MemorySwitch::new(1);
    let s1_handle: Arc<dyn Switch> = s1.clone();

    assert!(!ctrl.send_message(ControllerId(1), "hello"));

    ctrl.handle_frame(&s1_handle, PortNo(1), &discovery(1, 10, 5));
    s1.clear_writes();
    assert!(ctrl.send_message(ControllerId(1), "hello"));

    let frames = s1.written_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(
        frames[0].1,
        Frame::Data {
            source: ControllerId(2),
            target: ControllerId(1),
            text: "hello".into(),
        }
    );
}

/// Deliver every frame queued on one side of an inter-region link to the
/// controller on the other side, until both sides go quiet.
fn pump(
    left: (&Arc<InbandController>, &Arc<MemorySwitch>, PortNo),
    right: (&Arc<InbandController>, &Arc<MemorySwitch>, PortNo),
) {
    let left_switch: Arc<dyn Switch> = left.1.clone();
    let right_switch: Arc<dyn Switch> = right.1.clone();
    loop {
        let mut quiet = true;
        for (port, frame) in left.1.drain_frames() {
            if port == left.2 {
                quiet = false;
                let bytes = frame.encode().expect("encode");
                right.0.handle_frame(&right_switch, right.2, &bytes);
            }
        }
        for (port, frame) in right.1.drain_frames() {
            if port == right.2 {
                quiet = false;
                let bytes = frame.encode().expect("encode");
                left.0.handle_frame(&left_switch, left.2, &bytes);
            }
        }
        if quiet {
            break;
        }
    }
}

#[test]
fn two_controllers_discover_each_other_and_exchange_messages() {
    let _ = tracing_subscriber::fmt().with_env_filter("inband=debug").try_init();

    // region A: controller 1 governing switch 1; region B: controller 2
    // governing switch 2; one inter-region wire 1:1 <-> 2:1
    let dir_a = MemoryDirectory::new();
    let dir_b = MemoryDirectory::new();
    let ctrl1 = controller(1, &dir_a);
    let ctrl2 = controller(2, &dir_b);
    let sa = MemorySwitch::new(1);
    let sb = MemorySwitch::new(2);
    let sa_handle: Arc<dyn Switch> = sa.clone();
    let sb_handle: Arc<dyn Switch> = sb.clone();
    dir_a.register(sa.clone());
    dir_b.register(sb.clone());

    ctrl1.switch_added(&sa_handle);
    ctrl2.switch_added(&sb_handle);
    sa.clear_writes();
    sb.clear_writes();

    // controller 1 probes the port facing region B
    ctrl1.port_up(&sa_handle, PortNo(1));
    pump((&ctrl1, &sa, PortNo(1)), (&ctrl2, &sb, PortNo(1)));

    assert_eq!(ctrl1.connected_controllers(), vec![ControllerId(2)]);
    assert_eq!(ctrl2.connected_controllers(), vec![ControllerId(1)]);

    // both edges accept communication frames for their own controller
    assert!(
        sa.rules()
            .iter()
            .any(|r| r.matches.target == Some(ControllerId(1)) && r.action == RuleAction::Deliver)
    );
    assert!(
        sb.rules()
            .iter()
            .any(|r| r.matches.target == Some(ControllerId(2)) && r.action == RuleAction::Deliver)
    );

    // application traffic flows over the activated path
    let received = Arc::new(RecordingListener::default());
    ctrl2.register_listener(received.clone());
    assert!(ctrl1.send_message(ControllerId(2), "ping"));
    pump((&ctrl1, &sa, PortNo(1)), (&ctrl2, &sb, PortNo(1)));
    assert_eq!(received.messages.lock().as_slice(), &[(ControllerId(1), "ping".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_sends_keepalives_until_shutdown() {
    let _ = tracing_subscriber::fmt().with_env_filter("inband=debug").try_init();

    let directory = MemoryDirectory::new();
    let ctrl = InbandController::new(
        ControllerConfig::new(ControllerId(2)).with_heartbeat_interval(Duration::from_millis(100)),
        directory.clone(),
    );
    let s1 = MemorySwitch::new(1);
    let s1_handle: Arc<dyn Switch> = s1.clone();
    ctrl.handle_frame(&s1_handle, PortNo(1), &discovery(1, 10, 5));
    s1.clear_writes();

    let heartbeat = ctrl.spawn_heartbeat();
    tokio::time::sleep(Duration::from_millis(350)).await;

    let keepalives = s1
        .written_frames()
        .into_iter()
        .filter(|(_, frame)| {
            matches!(frame, Frame::Data { text, .. } if text == "keep_alive")
        })
        .count();
    assert!(keepalives >= 3, "expected at least 3 keep-alives, got {keepalives}");

    ctrl.shutdown();
    heartbeat.await.expect("heartbeat task joins after shutdown");
}

#[tokio::test]
async fn shutdown_writes_the_event_dump() {
    let dump_dir = tempfile::tempdir().expect("tempdir");
    let directory = MemoryDirectory::new();
    let ctrl = InbandController::new(
        ControllerConfig::new(ControllerId(2)).with_event_dump_dir(dump_dir.path()),
        directory.clone(),
    );
    let s1 = MemorySwitch::new(1);
    let s1_handle: Arc<dyn Switch> = s1.clone();
    ctrl.handle_frame(&s1_handle, PortNo(1), &discovery(1, 10, 5));

    ctrl.shutdown();

    let contents =
        std::fs::read_to_string(dump_dir.path().join("controller_2")).expect("dump exists");
    assert!(contents.starts_with("controller=2\n"));
    assert!(contents.contains("activations=["));
}
