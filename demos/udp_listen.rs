//! Listen for NITH sensor datagrams on UDP and print what arrives.
//!
//! Run a network sensor (or `mock_pipeline` in another terminal pointed at a
//! `UdpLineSender`) and watch samples, verdicts and blink events go by.

use nith_io::discovery::{DiscoveryConfig, DiscoveryService};
use nith_io::engine::{BlinkDetector, BlinkThresholds, LogErrorBehavior};
use nith_io::transport::{UdpLineReceiver, UdpReceiverConfig};
use nith_io::{NithEngine, ParameterId, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let engine = Arc::new(NithEngine::new());
    engine.add_error_behavior(Arc::new(LogErrorBehavior::new(engine.clone())));
    engine.add_sensor_behavior(Arc::new(BlinkDetector::new(
        BlinkThresholds::default(),
        |event| log::info!("Blink event: {:?}", event),
    )));

    let receiver = UdpLineReceiver::new(UdpReceiverConfig::default());
    receiver.add_listener(engine.clone());
    if !receiver.connect() {
        return Err(nith_io::Error::Other("could not bind UDP port".into()));
    }

    // Answer announcements so sensors find us without manual setup
    let discovery = DiscoveryService::new(DiscoveryConfig::default());
    discovery.register_device_port("NITHfaceCam", receiver.port());
    discovery.register_device_port("NITHheadMock", receiver.port());
    discovery.start();

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| nith_io::Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    log::info!("Listening on UDP port {}, Ctrl-C to exit", receiver.port());
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_secs(1));
        let sample = engine.last_sample();
        if !sample.values.is_empty() {
            let yaw = sample
                .parameter(ParameterId::HeadPosYaw)
                .map(|v| v.value_f64());
            log::info!(
                "Last sample from {}: {} value(s), yaw {:?}, verdict {:?}, {} dropped",
                sample.sensor_name,
                sample.values.len(),
                yaw,
                engine.last_error(),
                receiver.dropped_samples()
            );
        }
    }

    discovery.stop();
    receiver.disconnect();
    Ok(())
}
