//! End-to-end pipeline tests: transports feeding the engine feeding
//! behaviors, the way an application wires things together.

use nith_io::engine::{
    BlinkDetector, BlinkEvent, BlinkThresholds, ChannelForwarder, LineListener, LogErrorBehavior,
    ParameterSelector, SelectorMode,
};
use nith_io::transport::{
    LineSender, PollingSender, UdpLineReceiver, UdpLineSender, UdpReceiverConfig,
};
use nith_io::{NithEngine, NithError, ParameterId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn wired_engine() -> (
    Arc<NithEngine>,
    crossbeam_channel::Receiver<nith_io::SensorSample>,
) {
    let engine = Arc::new(NithEngine::new());
    engine.add_error_behavior(Arc::new(LogErrorBehavior::new(engine.clone())));
    let (tx, rx) = crossbeam_channel::bounded(64);
    engine.add_sensor_behavior(Arc::new(ChannelForwarder::new(tx)));
    (engine, rx)
}

#[test]
fn lines_flow_through_selector_and_blink_detector() {
    let (engine, rx) = wired_engine();

    let selector = ParameterSelector::new();
    selector.add_rule(
        "NITHeye",
        SelectorMode::Keep,
        vec![ParameterId::EyeLeftIsOpen, ParameterId::EyeRightIsOpen],
    );
    engine.add_preprocessor(Arc::new(selector));

    let double_close = Arc::new(AtomicBool::new(false));
    let flag = double_close.clone();
    let thresholds = BlinkThresholds {
        double_close: 3,
        ..BlinkThresholds::default()
    };
    engine.add_sensor_behavior(Arc::new(BlinkDetector::new(thresholds, move |event| {
        if event == BlinkEvent::DoubleClose {
            flag.store(true, Ordering::Relaxed);
        }
    })));

    for _ in 0..3 {
        engine.on_line("$NITHeye-1.0|OPR|eyeLeft_isOpen=false&eyeRight_isOpen=false&gaze_x=0.3");
    }

    assert!(double_close.load(Ordering::Relaxed));
    assert_eq!(engine.last_error(), NithError::Ok);

    // Selector ran before the forwarder: gaze_x never leaves the engine
    let sample = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(sample.contains(ParameterId::EyeLeftIsOpen));
    assert!(!sample.contains(ParameterId::GazeX));
}

#[test]
fn validation_ladder_verdicts_end_to_end() {
    let (engine, _rx) = wired_engine();
    engine.set_accepted_names(vec!["NITHeye".to_string()]);
    engine.set_accepted_versions(vec!["1.0".to_string()]);
    engine.set_required_parameters(vec![ParameterId::EyeLeftIsOpen]);

    let cases = [
        ("not a sensor line", NithError::OutputNotCompliant),
        ("$NITHeye-1.0|OPR|eyeLeft_ape=b:0/v:1/x:2", NithError::MalformedParameter),
        ("$NITHhead-1.0|OPR|eyeLeft_isOpen=true", NithError::UnrecognizedSensorName),
        ("$NITHeye-2.0|OPR|eyeLeft_isOpen=true", NithError::UnrecognizedVersion),
        ("$NITHeye-1.0|ERR|eyeLeft_isOpen=true", NithError::StatusCodeError),
        ("$NITHeye-1.0|OPR|eyeRight_isOpen=true", NithError::MissingRequiredParameters),
        ("$NITHeye-1.0|OPR|eyeLeft_isOpen=true", NithError::Ok),
    ];
    for (line, expected) in cases {
        engine.on_line(line);
        assert_eq!(engine.last_error(), expected, "line: {}", line);
    }
}

#[test]
fn udp_receiver_feeds_engine_over_loopback() {
    let (engine, rx) = wired_engine();

    let receiver = UdpLineReceiver::new(UdpReceiverConfig {
        port: 29300,
        max_samples_per_second: 0,
    });
    receiver.add_listener(engine.clone());
    assert!(receiver.connect());

    let sender = UdpLineSender::unicast("127.0.0.1:29300".parse().unwrap()).unwrap();
    sender.send_line("$NITHfaceCam-2.0|OPR|mouth_ape=35/100&mouth_isOpen=true");

    let sample = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(sample.sensor_name, "NITHfaceCam");
    let aperture = sample.parameter(ParameterId::MouthAperture).unwrap();
    assert_eq!(aperture.value_f64(), 35.0);
    assert_eq!(aperture.normalized(), 35.0);
    assert_eq!(engine.last_error(), NithError::Ok);

    receiver.disconnect();
}

#[test]
fn polling_sender_repeats_commands_into_a_receiver() {
    let receiver = UdpLineReceiver::new(UdpReceiverConfig {
        port: 29301,
        max_samples_per_second: 0,
    });
    let (tx, rx) = crossbeam_channel::bounded::<String>(64);

    struct Collector(crossbeam_channel::Sender<String>);
    impl LineListener for Collector {
        fn on_line(&self, line: &str) {
            let _ = self.0.try_send(line.to_string());
        }
    }
    receiver.add_listener(Arc::new(Collector(tx)));
    assert!(receiver.connect());

    let polling = PollingSender::new();
    polling.add_sender(Arc::new(
        UdpLineSender::unicast("127.0.0.1:29301".parse().unwrap()).unwrap(),
    ));
    polling.set_data("$NITHreceiver|cmd=calibrate");
    assert!(polling.start_polling(5_000));

    let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    polling.stop_polling();
    receiver.disconnect();

    assert_eq!(first, "$NITHreceiver|cmd=calibrate");
    assert_eq!(second, first);
}

#[test]
fn rate_limited_receiver_reports_drops() {
    let (engine, rx) = wired_engine();

    let receiver = UdpLineReceiver::new(UdpReceiverConfig {
        port: 29302,
        max_samples_per_second: 10, // 100ms gap
    });
    receiver.add_listener(engine);
    assert!(receiver.connect());

    let sender = UdpLineSender::unicast("127.0.0.1:29302".parse().unwrap()).unwrap();
    for _ in 0..20 {
        sender.send_line("$NITHeye-1.0|OPR|gaze_x=1");
        std::thread::sleep(Duration::from_millis(2));
    }

    // First datagram is always admitted; the burst mostly is not
    let _ = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    std::thread::sleep(Duration::from_millis(200));
    assert!(receiver.dropped_samples() > 0);

    receiver.reset_dropped_samples();
    assert_eq!(receiver.dropped_samples(), 0);
    receiver.disconnect();
}
