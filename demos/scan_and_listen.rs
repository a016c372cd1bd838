//! Scan serial ports for a NITH sensor, connect to the best match and print
//! incoming samples.

use nith_io::discovery::{AutoConnect, PortScanner, ScanConfig};
use nith_io::engine::LogErrorBehavior;
use nith_io::transport::{SerialLineReceiver, SerialReceiverConfig};
use nith_io::{NithEngine, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let engine = Arc::new(NithEngine::new());
    engine.add_error_behavior(Arc::new(LogErrorBehavior::new(engine.clone())));

    let receiver = Arc::new(SerialLineReceiver::new(SerialReceiverConfig::default()));
    receiver.add_listener(engine.clone());

    // Optional required sensor substring from the command line
    let required = std::env::args().nth(1);
    if let Some(required) = &required {
        log::info!("Will only connect to a sensor matching '{}'", required);
    }

    let scanner = PortScanner::new(ScanConfig::default());
    scanner.add_observer(Arc::new(AutoConnect::new(receiver.clone(), required)));
    scanner.scan();

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| nith_io::Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_secs(1));
        if receiver.is_connected() {
            let sample = engine.last_sample();
            log::info!(
                "{} on {}: {} value(s), verdict {:?}",
                sample.sensor_name,
                receiver.port_name(),
                sample.values.len(),
                engine.last_error()
            );
        } else if !scanner.is_scanning() {
            log::info!("Not connected; rescanning");
            scanner.scan();
            std::thread::sleep(Duration::from_secs(2));
        }
    }

    receiver.disconnect();
    Ok(())
}
