//! Concurrent serial port auto-detection
//!
//! Every candidate port is opened and listened to in parallel, so total scan
//! time is bounded by the global timeout rather than the port count. A port
//! that emits a line carrying the protocol marker is recorded with the sensor
//! name embedded in that line.

use crate::transport::SerialLineReceiver;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serialport::{DataBits, FlowControl, Parity, StopBits};
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Marker every compliant sensor line starts with.
pub const SCAN_MARKER: &str = "$Nith";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Idle,
    Scanning,
    Finished,
    Error,
}

/// Port name → sensor name, for every port that answered with the marker.
pub type ScanResults = BTreeMap<String, String>;

pub trait ScanObserver: Send + Sync {
    fn on_scan(&self, status: ScanStatus, results: &ScanResults);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Global deadline for the whole scan
    pub timeout_ms: u64,
    /// Lines read from one port before giving up on it
    pub max_trials_per_port: u32,
    pub baud_rate: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            max_trials_per_port: 5,
            baud_rate: 115_200,
        }
    }
}

/// Scans all serial ports concurrently for devices speaking the protocol.
pub struct PortScanner {
    config: Mutex<ScanConfig>,
    observers: Arc<Mutex<Vec<Arc<dyn ScanObserver>>>>,
    scanning: Arc<AtomicBool>,
}

impl PortScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config: Mutex::new(config),
            observers: Arc::new(Mutex::new(Vec::new())),
            scanning: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn ScanObserver>) {
        self.observers.lock().push(observer);
    }

    pub fn clear_observers(&self) {
        self.observers.lock().clear();
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Relaxed)
    }

    /// Start a scan. Returns `false` if one is already running; the result
    /// arrives through the observers.
    pub fn scan(&self) -> bool {
        if self.scanning.swap(true, Ordering::SeqCst) {
            log::debug!("Scan requested while one is in progress");
            return false;
        }

        let config = self.config.lock().clone();
        let shared = Arc::new(ScanShared {
            results: Mutex::new(ScanResults::new()),
            finalized: AtomicBool::new(false),
            observers: self.observers.clone(),
            scanning: self.scanning.clone(),
        });
        shared.notify(ScanStatus::Scanning);

        let ports = match serialport::available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                log::error!("Serial port enumeration failed: {}", e);
                shared.notify(ScanStatus::Error);
                self.scanning.store(false, Ordering::SeqCst);
                return true;
            }
        };
        if ports.is_empty() {
            log::info!("No serial ports present");
            shared.finalize();
            return true;
        }
        log::info!("Scanning {} serial port(s)", ports.len());

        let remaining = Arc::new(AtomicUsize::new(ports.len()));
        let deadline = Instant::now() + Duration::from_millis(config.timeout_ms);

        for (index, port) in ports.into_iter().enumerate() {
            let shared = shared.clone();
            let remaining = remaining.clone();
            let config = config.clone();
            let thread_shared = shared.clone();
            let thread_remaining = remaining.clone();
            let spawn = thread::Builder::new()
                .name(format!("nith-scan-{}", index))
                .spawn(move || {
                    probe_port(&port.port_name, &config, deadline, &thread_shared);
                    // Last port out finalizes, unless the watchdog beat it
                    if thread_remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                        thread_shared.finalize();
                    }
                });
            if let Err(e) = spawn {
                log::error!("Failed to spawn scan thread: {}", e);
                if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                    shared.finalize();
                }
            }
        }

        // Watchdog enforcing the global deadline
        let watchdog_shared = shared;
        let timeout = Duration::from_millis(config.timeout_ms);
        if let Err(e) = thread::Builder::new()
            .name("nith-scan-watchdog".to_string())
            .spawn(move || {
                thread::sleep(timeout);
                watchdog_shared.finalize();
            })
        {
            log::error!("Failed to spawn scan watchdog: {}", e);
        }

        true
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

struct ScanShared {
    results: Mutex<ScanResults>,
    finalized: AtomicBool,
    observers: Arc<Mutex<Vec<Arc<dyn ScanObserver>>>>,
    scanning: Arc<AtomicBool>,
}

impl ScanShared {
    fn notify(&self, status: ScanStatus) {
        let results = self.results.lock().clone();
        let observers: Vec<_> = self.observers.lock().clone();
        for observer in &observers {
            observer.on_scan(status, &results);
        }
    }

    /// Deliver `Finished` and return to `Idle`, exactly once per scan no
    /// matter how many port threads and the watchdog race for it.
    fn finalize(&self) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }
        let results = self.results.lock().clone();
        log::info!("Scan finished, {} device(s) found", results.len());
        self.notify(ScanStatus::Finished);
        self.scanning.store(false, Ordering::SeqCst);
    }

    fn done(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }
}

/// Sensor name embedded in a marker line: everything before the first `|`,
/// with all `$` removed.
fn sensor_name_from_line(line: &str) -> String {
    let head = line.split('|').next().unwrap_or(line);
    head.replace('$', "")
}

fn probe_port(port_name: &str, config: &ScanConfig, deadline: Instant, shared: &ScanShared) {
    let opened = serialport::new(port_name, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(100))
        .open();
    let mut port = match opened {
        Ok(port) => port,
        Err(e) => {
            log::debug!("Scan cannot open {}: {}", port_name, e);
            return;
        }
    };

    let mut buf = [0u8; 512];
    let mut acc: Vec<u8> = Vec::new();
    let mut trials = 0u32;

    while Instant::now() < deadline && trials < config.max_trials_per_port && !shared.done() {
        let n = match port.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                log::debug!("Scan read error on {}: {}", port_name, e);
                return;
            }
        };
        for &byte in &buf[..n] {
            if byte != b'\n' {
                acc.push(byte);
                continue;
            }
            let line = String::from_utf8_lossy(&acc).trim_end_matches('\r').to_string();
            acc.clear();
            trials += 1;
            if line.contains(SCAN_MARKER) {
                let sensor = sensor_name_from_line(&line);
                log::info!("Found {} on {}", sensor, port_name);
                shared.results.lock().insert(port_name.to_string(), sensor);
                return;
            }
            if trials >= config.max_trials_per_port {
                log::debug!("{} exhausted its trial budget", port_name);
                return;
            }
        }
    }
}

/// Scan observer that connects a serial receiver to the best match.
///
/// Preference order: a result whose sensor name contains the required
/// substring, else the port with the lowest number embedded in its name,
/// else the lexicographically first port.
pub struct AutoConnect {
    receiver: Arc<SerialLineReceiver>,
    required_sensor: Option<String>,
}

impl AutoConnect {
    pub fn new(receiver: Arc<SerialLineReceiver>, required_sensor: Option<String>) -> Self {
        Self {
            receiver,
            required_sensor,
        }
    }

    fn pick<'a>(&self, results: &'a ScanResults) -> Option<&'a String> {
        if let Some(required) = &self.required_sensor {
            if let Some((port, _)) = results.iter().find(|(_, sensor)| sensor.contains(required)) {
                return Some(port);
            }
            log::warn!("No scanned device matches required sensor '{}'", required);
            return None;
        }
        results
            .keys()
            .min_by_key(|name| (embedded_number(name).unwrap_or(u32::MAX), (*name).clone()))
    }
}

fn embedded_number(port_name: &str) -> Option<u32> {
    let digits: String = port_name.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

impl ScanObserver for AutoConnect {
    fn on_scan(&self, status: ScanStatus, results: &ScanResults) {
        if status != ScanStatus::Finished {
            return;
        }
        if results.is_empty() {
            log::info!("Scan found no devices, nothing to connect");
            return;
        }
        if let Some(port) = self.pick(results) {
            log::info!("Auto-connecting to {}", port);
            self.receiver.connect_to(port);
        }
    }
}
