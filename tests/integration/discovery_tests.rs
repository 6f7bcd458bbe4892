use std::time::Duration;

use growctl::GrowError;
use growctl::bandit::{Action, LinUcb, LinUcbConfig, RewardWeights};
use growctl::control::{ControlLoop, CycleOutcome, LoopSettings, StopSignal};
use growctl::device::{ChannelCandidate, ChannelDiscovery, HandshakeConfig, ProbeOutcome};
use growctl::test_utils::{MemorySink, ScriptedCandidate, ScriptedChannel};

fn handshake(accept_silent: bool) -> HandshakeConfig {
    HandshakeConfig {
        open_delay: Duration::ZERO,
        probe_timeout: Duration::from_millis(50),
        accept_silent,
        ..HandshakeConfig::default()
    }
}

fn boxed(candidates: Vec<ScriptedCandidate>) -> Vec<Box<dyn ChannelCandidate>> {
    candidates
        .into_iter()
        .map(|c| Box::new(c) as Box<dyn ChannelCandidate>)
        .collect()
}

#[test]
fn discovered_channel_drives_a_cycle() {
    let decoy = ScriptedChannel::new("/dev/ttyUSB0");
    decoy.respond_to("PING", &["$GPGGA,123519"]);
    let device = ScriptedChannel::new("/dev/ttyACM0");
    device.respond_to("PING", &["ARDUINO"]);
    device.respond_to("REQUEST_GREEN", &["310,150"]);

    let discovery = ChannelDiscovery::new(
        boxed(vec![
            ScriptedCandidate::new(decoy),
            ScriptedCandidate::new(device.clone()),
        ]),
        handshake(false),
    );
    let connected = discovery.connect().unwrap();
    assert_eq!(connected.candidate, "/dev/ttyACM0");

    // The firmware pushes its context line on its own.
    device.push_lines(&["24.5,55,300,150"]);

    let model = LinUcb::new(Action::COUNT, 4, LinUcbConfig::default()).unwrap();
    let sink = MemorySink::new();
    let settings = LoopSettings {
        settle_delay: Duration::ZERO,
        idle_delay: Duration::ZERO,
        read_timeout: Duration::from_millis(10),
        context_request: None,
        post_request: "REQUEST_GREEN".into(),
        reward_indices: (2, 3),
        weights: RewardWeights {
            primary: 0.9,
            secondary: 0.2,
        },
        max_device_faults: 0,
    };
    let mut control = ControlLoop::new(model, connected.channel, Box::new(sink.clone()), settings);

    let outcome = control.run_cycle(&StopSignal::never()).unwrap();
    let CycleOutcome::Committed(record) = outcome else {
        panic!("cycle did not commit");
    };
    assert!((record.reward - 9.0).abs() < 1e-9);
    assert_eq!(sink.records().len(), 1);

    let sent = device.sent();
    assert_eq!(sent[0], "PING");
    assert_eq!(sent[1], record.action.wire_command());
    assert_eq!(sent[2], "REQUEST_GREEN");
}

#[test]
fn probe_all_reports_every_candidate() {
    let wrong = ScriptedChannel::new("/dev/ttyUSB0");
    wrong.respond_to("PING", &["hello"]);
    let good = ScriptedChannel::new("/dev/ttyACM0");
    good.respond_to("PING", &["arduino"]);

    let discovery = ChannelDiscovery::new(
        boxed(vec![
            ScriptedCandidate::unopenable("/dev/ttyS9"),
            ScriptedCandidate::new(ScriptedChannel::new("/dev/ttyS0")),
            ScriptedCandidate::new(wrong),
            ScriptedCandidate::new(good),
        ]),
        handshake(false),
    );

    let reports = discovery.probe_all();
    assert_eq!(reports.len(), 4);
    assert!(matches!(reports[0].outcome, ProbeOutcome::OpenFailed(_)));
    assert_eq!(reports[1].outcome, ProbeOutcome::Silent);
    assert_eq!(reports[2].outcome, ProbeOutcome::WrongReply("hello".into()));
    assert!(reports[3].outcome.is_acknowledged());
}

#[test]
fn silent_port_is_rejected_unless_allowed() {
    let strict = ChannelDiscovery::new(
        boxed(vec![ScriptedCandidate::new(ScriptedChannel::new("/dev/ttyACM0"))]),
        handshake(false),
    );
    assert!(matches!(
        strict.connect(),
        Err(GrowError::DeviceNotFound { tried: 1 })
    ));

    let lenient = ChannelDiscovery::new(
        boxed(vec![ScriptedCandidate::new(ScriptedChannel::new("/dev/ttyACM0"))]),
        handshake(true),
    );
    assert_eq!(lenient.connect().unwrap().candidate, "/dev/ttyACM0");
}
