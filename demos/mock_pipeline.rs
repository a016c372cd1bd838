//! Full pipeline without hardware: a mock head tracker feeds the engine,
//! which logs verdicts and blink events.
//!
//! Requires the `mock` feature:
//! `cargo run --example mock_pipeline --features mock`

use nith_io::engine::{BlinkDetector, BlinkThresholds, LogErrorBehavior, ParameterSelector, SelectorMode};
use nith_io::mock::{MockSensor, MockSensorConfig};
use nith_io::{NithEngine, ParameterId, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let engine = Arc::new(NithEngine::new());
    engine.add_error_behavior(Arc::new(LogErrorBehavior::new(engine.clone())));

    // Only eye parameters from the mock: demonstrates preprocessing
    let selector = ParameterSelector::new();
    selector.add_rule(
        "NITHheadMock",
        SelectorMode::Keep,
        vec![
            ParameterId::EyeLeftIsOpen,
            ParameterId::EyeRightIsOpen,
            ParameterId::HeadPosYaw,
        ],
    );
    engine.add_preprocessor(Arc::new(selector));

    engine.add_sensor_behavior(Arc::new(BlinkDetector::new(
        BlinkThresholds::default(),
        |event| log::info!("Blink event: {:?}", event),
    )));

    let sensor = MockSensor::new(MockSensorConfig::default());
    sensor.add_listener(engine.clone());
    if !sensor.connect() {
        return Err(nith_io::Error::Other("mock sensor failed to start".into()));
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| nith_io::Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_secs(1));
        let sample = engine.last_sample();
        let yaw = sample
            .parameter(ParameterId::HeadPosYaw)
            .map(|v| v.value_f64());
        log::info!("Yaw {:?}, verdict {:?}", yaw, engine.last_error());
    }

    sensor.disconnect();
    Ok(())
}
