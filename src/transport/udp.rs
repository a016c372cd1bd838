//! UDP line receiver
//!
//! One datagram carries one line. The receive thread owns the socket; a short
//! read timeout keeps shutdown prompt without a second wakeup channel.

use super::rate_limit::{RateLimiter, DEFAULT_MAX_LINES_PER_SECOND};
use crate::engine::LineListener;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_UDP_PORT: u16 = 20100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpReceiverConfig {
    pub port: u16,
    /// Inbound rate limit; 0 = unlimited
    pub max_samples_per_second: u32,
}

impl Default for UdpReceiverConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_UDP_PORT,
            max_samples_per_second: DEFAULT_MAX_LINES_PER_SECOND,
        }
    }
}

/// Datagram-per-line receiver with the same listener and rate-limit surface
/// as the serial receiver.
///
/// Undecodable bytes are replaced, never fatal, and socket errors other than
/// timeouts are reported to listeners while the loop keeps running: a UDP
/// receiver has no peer to lose, so it only stops when told to.
pub struct UdpLineReceiver {
    config: Mutex<UdpReceiverConfig>,
    listeners: Arc<Mutex<Vec<Arc<dyn LineListener>>>>,
    limiter: Arc<Mutex<RateLimiter>>,
    connected: Arc<AtomicBool>,
    shutdown: Mutex<Arc<AtomicBool>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl UdpLineReceiver {
    pub fn new(config: UdpReceiverConfig) -> Self {
        let limiter = RateLimiter::new(config.max_samples_per_second);
        Self {
            config: Mutex::new(config),
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

    pub fn port(&self) -> u16 {
        self.config.lock().port
    }

    pub fn dropped_samples(&self) -> u64 {
        self.limiter.lock().dropped()
    }

    pub fn reset_dropped_samples(&self) {
        self.limiter.lock().reset_dropped();
    }

    /// Bind the configured port and start the receive thread.
    /// Bind failure logs and returns `false`.
    pub fn connect(&self) -> bool {
        self.disconnect();
        self.reap_receive_thread();

        let config = self.config.lock().clone();
        let socket = match UdpSocket::bind(("0.0.0.0", config.port)) {
            Ok(socket) => socket,
            Err(e) => {
                log::error!("Failed to bind UDP port {}: {}", config.port, e);
                return false;
            }
        };
        if let Err(e) = socket.set_read_timeout(Some(Duration::from_millis(200))) {
            log::error!("Failed to set UDP read timeout: {}", e);
            return false;
        }
        log::info!("Listening for sensor datagrams on 0.0.0.0:{}", config.port);

        {
            let mut limiter = self.limiter.lock();
            limiter.set_limit(config.max_samples_per_second);
            limiter.reset();
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        *self.shutdown.lock() = shutdown.clone();

        let listeners = self.listeners.clone();
        let limiter = self.limiter.clone();
        let connected = self.connected.clone();
        let spawned = thread::Builder::new()
            .name("nith-udp-rx".to_string())
            .spawn(move || {
                receive_loop(socket, listeners, limiter, &shutdown);
                connected.store(false, Ordering::Relaxed);
            });
        match spawned {
            Ok(handle) => {
                *self.handle.lock() = Some(handle);
                self.connected.store(true, Ordering::Relaxed);
                true
            }
            Err(e) => {
                log::error!("Failed to spawn UDP receive thread: {}", e);
                false
            }
        }
    }

    /// Signal the receive thread to stop. Idempotent, callback-safe.
    pub fn disconnect(&self) {
        self.shutdown.lock().store(true, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
    }

    fn reap_receive_thread(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for UdpLineReceiver {
    fn drop(&mut self) {
        self.disconnect();
        self.reap_receive_thread();
    }
}

fn receive_loop(
    socket: UdpSocket,
    listeners: Arc<Mutex<Vec<Arc<dyn LineListener>>>>,
    limiter: Arc<Mutex<RateLimiter>>,
    shutdown: &AtomicBool,
) {
    let mut buf = [0u8; 2048];
    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, _peer)) => {
                let line = String::from_utf8_lossy(&buf[..len]);
                let line = line.trim_end_matches(['\r', '\n']);
                if line.is_empty() {
                    continue;
                }
                if !limiter.lock().admit() {
                    continue;
                }
                log::trace!("UDP line: {}", line);
                let snapshot: Vec<_> = listeners.lock().clone();
                for listener in &snapshot {
                    listener.on_line(line);
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => {
                // Keep listening: a transient socket error must not kill the
                // receiver, but consumers get to hear about it.
                log::warn!("UDP receive error: {}", e);
                let snapshot: Vec<_> = listeners.lock().clone();
                for listener in &snapshot {
                    listener.on_connection_error();
                }
            }
        }
    }
    log::debug!("UDP receive thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, Sender};

    struct LineCollector {
        tx: Sender<String>,
    }

    impl LineListener for LineCollector {
        fn on_line(&self, line: &str) {
            let _ = self.tx.try_send(line.to_string());
        }
    }

    fn localhost_send(port: u16, payload: &[u8]) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.send_to(payload, ("127.0.0.1", port)).unwrap();
    }

    #[test]
    fn receives_datagrams_as_lines() {
        let receiver = UdpLineReceiver::new(UdpReceiverConfig {
            port: 29123,
            max_samples_per_second: 0,
        });
        let (tx, rx) = bounded(8);
        receiver.add_listener(Arc::new(LineCollector { tx }));
        assert!(receiver.connect());

        localhost_send(29123, b"$NITHeye-1.0|OPR|eyeLeft_isOpen=true\r\n");
        let line = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(line, "$NITHeye-1.0|OPR|eyeLeft_isOpen=true");

        receiver.disconnect();
        assert!(!receiver.is_connected());
    }

    #[test]
    fn lossy_decoding_never_fails() {
        let receiver = UdpLineReceiver::new(UdpReceiverConfig {
            port: 29124,
            max_samples_per_second: 0,
        });
        let (tx, rx) = bounded(8);
        receiver.add_listener(Arc::new(LineCollector { tx }));
        assert!(receiver.connect());

        localhost_send(29124, &[0x24, 0xff, 0xfe, 0x41]);
        let line = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(line.starts_with('$'));
        assert!(line.ends_with('A'));

        receiver.disconnect();
    }

    #[test]
    fn reconnect_rebinds_same_port() {
        let receiver = UdpLineReceiver::new(UdpReceiverConfig {
            port: 29125,
            max_samples_per_second: 0,
        });
        assert!(receiver.connect());
        receiver.disconnect();
        assert!(receiver.connect());
        receiver.disconnect();
    }
}
