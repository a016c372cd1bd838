//! Serial line receiver
//!
//! Owns a serial port and a named reader thread that accumulates bytes into
//! `\n`-terminated lines and fans them out to registered listeners. The
//! connect path never returns `Err`: hardware may or may not be plugged in,
//! so failure is an expected outcome reported as `false` plus a log line.

use super::rate_limit::{RateLimiter, DEFAULT_MAX_LINES_PER_SECOND};
use crate::engine::LineListener;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_DISCONNECT_TIMEOUT_MS: u64 = 1500;

/// Serial receiver settings. 8N1 framing is fixed; everything else is here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialReceiverConfig {
    /// Port path, e.g. `/dev/ttyUSB0` or `COM3`
    pub port_path: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// With no byte for this long the sensor is considered unplugged
    pub disconnect_timeout_ms: u64,
    /// Inbound rate limit; 0 = unlimited
    pub max_samples_per_second: u32,
}

impl Default for SerialReceiverConfig {
    fn default() -> Self {
        Self {
            port_path: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            disconnect_timeout_ms: DEFAULT_DISCONNECT_TIMEOUT_MS,
            max_samples_per_second: DEFAULT_MAX_LINES_PER_SECOND,
        }
    }
}

/// Line-oriented serial receiver with listener fan-out and rate limiting.
///
/// The port handle lives behind a shared `Mutex<Option<..>>` so that
/// `disconnect()` is just "set it to `None`": idempotent, callable from any
/// thread, and safe from within an in-flight listener callback because it
/// never joins the reader thread.
pub struct SerialLineReceiver {
    config: Mutex<SerialReceiverConfig>,
    port: Arc<Mutex<Option<Box<dyn SerialPort>>>>,
    listeners: Arc<Mutex<Vec<Arc<dyn LineListener>>>>,
    limiter: Arc<Mutex<RateLimiter>>,
    connected: Arc<AtomicBool>,
    shutdown: Mutex<Arc<AtomicBool>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SerialLineReceiver {
    pub fn new(config: SerialReceiverConfig) -> Self {
        let limiter = RateLimiter::new(config.max_samples_per_second);
        Self {
            config: Mutex::new(config),
            port: Arc::new(Mutex::new(None)),
            listeners: Arc::new(Mutex::new(Vec::new())),
            limiter: Arc::new(Mutex::new(limiter)),
            connected: Arc::new(AtomicBool::new(false)),
            shutdown: Mutex::new(Arc::new(AtomicBool::new(false))),
            handle: Mutex::new(None),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn LineListener>) {
        self.listeners.lock().push(listener);
    }

    pub fn clear_listeners(&self) {
        self.listeners.lock().clear();
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Configured port path (not necessarily open).
    pub fn port_name(&self) -> String {
        self.config.lock().port_path.clone()
    }

    /// Lines rejected by the rate limiter since the last connect.
    pub fn dropped_samples(&self) -> u64 {
        self.limiter.lock().dropped()
    }

    pub fn reset_dropped_samples(&self) {
        self.limiter.lock().reset_dropped();
    }

    /// Connect to `path`, remembering it as the configured port.
    pub fn connect_to(&self, path: &str) -> bool {
        self.config.lock().port_path = path.to_string();
        self.connect()
    }

    /// Open the configured port and start the reader thread.
    ///
    /// Returns `false` (after logging) if the path is empty or the port
    /// cannot be opened. An existing connection is torn down first.
    pub fn connect(&self) -> bool {
        self.disconnect();
        self.reap_reader_thread();

        let config = self.config.lock().clone();
        if config.port_path.is_empty() {
            log::error!("No serial port path configured");
            return false;
        }

        let opened = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open();
        let port = match opened {
            Ok(port) => port,
            Err(e) => {
                log::error!("Failed to open {}: {}", config.port_path, e);
                return false;
            }
        };
        log::info!(
            "Opened serial port {} at {} baud",
            config.port_path,
            config.baud_rate
        );

        {
            let mut limiter = self.limiter.lock();
            limiter.set_limit(config.max_samples_per_second);
            limiter.reset();
        }
        *self.port.lock() = Some(port);

        let shutdown = Arc::new(AtomicBool::new(false));
        *self.shutdown.lock() = shutdown.clone();

        let worker = ReaderWorker {
            port: self.port.clone(),
            listeners: self.listeners.clone(),
            limiter: self.limiter.clone(),
            connected: self.connected.clone(),
            shutdown,
            disconnect_timeout: Duration::from_millis(config.disconnect_timeout_ms),
            port_path: config.port_path.clone(),
        };
        let spawned = thread::Builder::new()
            .name("nith-serial-rx".to_string())
            .spawn(move || worker.run());
        match spawned {
            Ok(handle) => {
                *self.handle.lock() = Some(handle);
                self.connected.store(true, Ordering::Relaxed);
                true
            }
            Err(e) => {
                log::error!("Failed to spawn serial reader thread: {}", e);
                *self.port.lock() = None;
                false
            }
        }
    }

    /// Drop the port handle and signal the reader thread to exit.
    ///
    /// Idempotent; never joins, so callable from listener callbacks.
    pub fn disconnect(&self) {
        self.shutdown.lock().store(true, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
        if self.port.lock().take().is_some() {
            log::info!("Serial port {} closed", self.config.lock().port_path);
        }
    }

    /// Write a line through the open port, appending the terminator.
    /// Best-effort: errors are logged, not returned.
    pub fn write_line(&self, line: &str) {
        let mut guard = self.port.lock();
        let Some(port) = guard.as_mut() else {
            log::debug!("write_line with no open port, ignoring");
            return;
        };
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        if let Err(e) = port.write_all(&bytes).and_then(|_| port.flush()) {
            log::warn!("Serial write failed: {}", e);
        }
    }

    /// Join a reader thread left over from a previous connection, if any.
    /// Only called from `connect()`, never from the reader thread itself.
    fn reap_reader_thread(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for SerialLineReceiver {
    fn drop(&mut self) {
        self.disconnect();
        self.reap_reader_thread();
    }
}

struct ReaderWorker {
    port: Arc<Mutex<Option<Box<dyn SerialPort>>>>,
    listeners: Arc<Mutex<Vec<Arc<dyn LineListener>>>>,
    limiter: Arc<Mutex<RateLimiter>>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    disconnect_timeout: Duration,
    port_path: String,
}

impl ReaderWorker {
    fn run(self) {
        log::debug!("Serial reader thread started for {}", self.port_path);
        let mut buf = [0u8; 1024];
        let mut acc: Vec<u8> = Vec::new();
        let mut last_byte = Instant::now();

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            let read = {
                let mut guard = self.port.lock();
                let Some(port) = guard.as_mut() else {
                    break; // disconnected under us
                };
                match port.read(&mut buf) {
                    Ok(n) => Ok(n),
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
                    Err(e) => Err(e),
                }
            };
            match read {
                Ok(0) => {
                    if last_byte.elapsed() >= self.disconnect_timeout {
                        log::warn!(
                            "No data from {} for {:?}, sensor considered unplugged",
                            self.port_path,
                            self.disconnect_timeout
                        );
                        self.fan_out_connection_error();
                        break;
                    }
                }
                Ok(n) => {
                    last_byte = Instant::now();
                    for &byte in &buf[..n] {
                        if byte == b'\n' {
                            self.handle_line(&acc);
                            acc.clear();
                        } else {
                            acc.push(byte);
                        }
                    }
                }
                Err(e) => {
                    log::error!("Read error on {}: {}", self.port_path, e);
                    self.fan_out_connection_error();
                    break;
                }
            }
        }

        self.connected.store(false, Ordering::Relaxed);
        *self.port.lock() = None;
        log::debug!("Serial reader thread for {} exiting", self.port_path);
    }

    fn handle_line(&self, raw: &[u8]) {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.is_empty() {
            return;
        }
        if !self.limiter.lock().admit() {
            return;
        }
        let line = String::from_utf8_lossy(raw);
        log::trace!("Serial line: {}", line);
        let listeners: Vec<_> = self.listeners.lock().clone();
        for listener in &listeners {
            listener.on_line(&line);
        }
    }

    fn fan_out_connection_error(&self) {
        let listeners: Vec<_> = self.listeners.lock().clone();
        for listener in &listeners {
            listener.on_connection_error();
        }
    }
}
