//! UDP device announcement service
//!
//! Network sensors announce themselves by datagram; the service records them,
//! looks up which data port that device type should stream to, and replies
//! with the receiver's address so the sensor knows where to send.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_DISCOVERY_PORT: u16 = 20500;

/// Announcement reply sender identity.
const RECEIVER_NAME: &str = "NITHreceiver";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub port: u16,
    /// Expected data port per device type, e.g. `NITHfaceCam = 20100`
    pub device_ports: BTreeMap<String, u16>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DISCOVERY_PORT,
            device_ports: BTreeMap::new(),
        }
    }
}

/// One announced device, as last heard from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_type: String,
    pub version: String,
    pub ip: IpAddr,
    pub port: u16,
    /// Data port this receiver expects the device to stream to
    pub expected_port: u16,
}

pub trait DiscoveryObserver: Send + Sync {
    fn on_device(&self, device: &DeviceInfo);
}

/// Listens for device announcements and replies with the receiver address.
///
/// Malformed or unknown announcements are logged and dropped; the listen
/// loop never exits on bad input.
pub struct DiscoveryService {
    config: Arc<Mutex<DiscoveryConfig>>,
    devices: Arc<Mutex<BTreeMap<String, DeviceInfo>>>,
    observers: Arc<Mutex<Vec<Arc<dyn DiscoveryObserver>>>>,
    running: Arc<AtomicBool>,
    shutdown: Mutex<Arc<AtomicBool>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DiscoveryService {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            devices: Arc::new(Mutex::new(BTreeMap::new())),
            observers: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Mutex::new(Arc::new(AtomicBool::new(false))),
            handle: Mutex::new(None),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn DiscoveryObserver>) {
        self.observers.lock().push(observer);
    }

    pub fn clear_observers(&self) {
        self.observers.lock().clear();
    }

    /// Map a device type to the data port its stream is expected on.
    pub fn register_device_port(&self, device_type: impl Into<String>, port: u16) {
        self.config.lock().device_ports.insert(device_type.into(), port);
    }

    /// Devices heard so far, keyed `"<deviceType>-<ip>"`.
    pub fn devices(&self) -> BTreeMap<String, DeviceInfo> {
        self.devices.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Bind the discovery port and start the listen thread.
    pub fn start(&self) -> bool {
        self.stop();
        self.reap_listen_thread();

        let config = self.config.lock().clone();
        let socket = match UdpSocket::bind(("0.0.0.0", config.port)) {
            Ok(socket) => socket,
            Err(e) => {
                log::error!("Failed to bind discovery port {}: {}", config.port, e);
                return false;
            }
        };
        if let Err(e) = socket.set_read_timeout(Some(Duration::from_millis(200))) {
            log::error!("Failed to set discovery read timeout: {}", e);
            return false;
        }
        log::info!("Discovery service listening on 0.0.0.0:{}", config.port);

        let shutdown = Arc::new(AtomicBool::new(false));
        *self.shutdown.lock() = shutdown.clone();

        let worker = ListenWorker {
            socket,
            discovery_port: config.port,
            config: self.config.clone(),
            devices: self.devices.clone(),
            observers: self.observers.clone(),
            shutdown,
        };
        let running = self.running.clone();
        let spawned = thread::Builder::new()
            .name("nith-discovery".to_string())
            .spawn(move || {
                worker.run();
                running.store(false, Ordering::Relaxed);
            });
        match spawned {
            Ok(handle) => {
                *self.handle.lock() = Some(handle);
                self.running.store(true, Ordering::Relaxed);
                true
            }
            Err(e) => {
                log::error!("Failed to spawn discovery thread: {}", e);
                false
            }
        }
    }

    /// Signal the listen thread to stop. Idempotent, callback-safe.
    pub fn stop(&self) {
        self.shutdown.lock().store(true, Ordering::Relaxed);
        self.running.store(false, Ordering::Relaxed);
    }

    fn reap_listen_thread(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        self.stop();
        self.reap_listen_thread();
    }
}

struct ListenWorker {
    socket: UdpSocket,
    discovery_port: u16,
    config: Arc<Mutex<DiscoveryConfig>>,
    devices: Arc<Mutex<BTreeMap<String, DeviceInfo>>>,
    observers: Arc<Mutex<Vec<Arc<dyn DiscoveryObserver>>>>,
    shutdown: Arc<AtomicBool>,
}

impl ListenWorker {
    fn run(self) {
        let mut buf = [0u8; 1024];
        while !self.shutdown.load(Ordering::Relaxed) {
            let (len, peer) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    continue;
                }
                Err(e) => {
                    log::warn!("Discovery receive error: {}", e);
                    continue;
                }
            };
            let announcement = String::from_utf8_lossy(&buf[..len]);
            let announcement = announcement.trim();
            self.handle_announcement(announcement, peer);
        }
        log::debug!("Discovery thread exiting");
    }

    fn handle_announcement(&self, announcement: &str, peer: SocketAddr) {
        let Some(parsed) = parse_announcement(announcement) else {
            log::warn!("Malformed announcement from {}: {}", peer, announcement);
            return;
        };
        let lookup = self.config.lock().device_ports.get(&parsed.device_type).copied();
        let Some(expected_port) = lookup else {
            log::warn!(
                "Announcement from unregistered device type '{}'",
                parsed.device_type
            );
            return;
        };

        let device = DeviceInfo {
            device_type: parsed.device_type,
            version: parsed.version,
            ip: parsed.ip,
            port: parsed.port,
            expected_port,
        };
        log::info!(
            "Device {} {} announced from {}:{}",
            device.device_type,
            device.version,
            device.ip,
            device.port
        );

        let key = format!("{}-{}", device.device_type, device.ip);
        self.devices.lock().insert(key, device.clone());

        self.reply(&device);

        let observers: Vec<_> = self.observers.lock().clone();
        for observer in &observers {
            observer.on_device(&device);
        }
    }

    fn reply(&self, device: &DeviceInfo) {
        let local_ip = local_ip_toward(device.ip).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let reply = format!(
            "{}|receiver_ip={}&expected_port={}",
            RECEIVER_NAME, local_ip, device.expected_port
        );
        let target = SocketAddr::new(device.ip, self.discovery_port);
        if let Err(e) = self.socket.send_to(reply.as_bytes(), target) {
            log::warn!("Failed to reply to {}: {}", target, e);
        }
    }
}

struct Announcement {
    device_type: String,
    version: String,
    ip: IpAddr,
    port: u16,
}

/// `<deviceType>-<version>|device_ip=<ip>&device_port=<port>`
fn parse_announcement(text: &str) -> Option<Announcement> {
    let (identity, params) = text.split_once('|')?;
    let (device_type, version) = identity.split_once('-')?;
    if device_type.is_empty() || version.is_empty() {
        return None;
    }

    let mut ip = None;
    let mut port = None;
    for pair in params.split('&') {
        let (key, value) = pair.split_once('=')?;
        match key {
            "device_ip" => ip = Some(value.parse().ok()?),
            "device_port" => port = Some(value.parse().ok()?),
            _ => {}
        }
    }
    Some(Announcement {
        device_type: device_type.to_string(),
        version: version.to_string(),
        ip: ip?,
        port: port?,
    })
}

/// The local address the OS would route from when talking to `target`.
/// No packet is sent; `connect` on UDP only selects a route.
fn local_ip_toward(target: IpAddr) -> Option<IpAddr> {
    let probe = UdpSocket::bind("0.0.0.0:0").ok()?;
    probe.connect((target, 1)).ok()?;
    probe.local_addr().ok().map(|addr| addr.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, Sender};

    #[test]
    fn announcement_parsing() {
        let a = parse_announcement("NITHfaceCam-1.2|device_ip=192.168.1.40&device_port=21000")
            .unwrap();
        assert_eq!(a.device_type, "NITHfaceCam");
        assert_eq!(a.version, "1.2");
        assert_eq!(a.ip, "192.168.1.40".parse::<IpAddr>().unwrap());
        assert_eq!(a.port, 21000);
    }

    #[test]
    fn malformed_announcements_are_rejected() {
        assert!(parse_announcement("").is_none());
        assert!(parse_announcement("no pipe here").is_none());
        assert!(parse_announcement("noversion|device_ip=1.2.3.4&device_port=1").is_none());
        assert!(parse_announcement("dev-1.0|device_ip=not-an-ip&device_port=1").is_none());
        assert!(parse_announcement("dev-1.0|device_ip=1.2.3.4").is_none());
    }

    #[test]
    fn extra_announcement_params_are_ignored() {
        let a = parse_announcement("dev-1.0|extra=x&device_ip=10.0.0.2&device_port=9&more=y")
            .unwrap();
        assert_eq!(a.ip, "10.0.0.2".parse::<IpAddr>().unwrap());
        assert_eq!(a.port, 9);
    }

    struct DeviceRecorder {
        tx: Sender<DeviceInfo>,
    }

    impl DiscoveryObserver for DeviceRecorder {
        fn on_device(&self, device: &DeviceInfo) {
            let _ = self.tx.try_send(device.clone());
        }
    }

    #[test]
    fn announced_device_is_recorded_and_answered() {
        let mut config = DiscoveryConfig {
            port: 29500,
            device_ports: BTreeMap::new(),
        };
        config.device_ports.insert("NITHfaceCam".to_string(), 20100);
        let service = DiscoveryService::new(config);
        let (tx, rx) = bounded(4);
        service.add_observer(Arc::new(DeviceRecorder { tx }));
        assert!(service.start());

        // Announce from a socket bound to the discovery port convention is
        // not required; replies go to (device_ip, discovery port), so use
        // loopback as the device address and listen there.
        let device_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let device_port = device_socket.local_addr().unwrap().port();
        let announcement = format!(
            "NITHfaceCam-2.0|device_ip=127.0.0.1&device_port={}",
            device_port
        );
        device_socket
            .send_to(announcement.as_bytes(), ("127.0.0.1", 29500))
            .unwrap();

        let device = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(device.device_type, "NITHfaceCam");
        assert_eq!(device.expected_port, 20100);
        assert!(service.devices().contains_key("NITHfaceCam-127.0.0.1"));

        service.stop();
    }

    #[test]
    fn unknown_device_type_is_ignored() {
        let service = DiscoveryService::new(DiscoveryConfig {
            port: 29501,
            device_ports: BTreeMap::new(),
        });
        let (tx, rx) = bounded(4);
        service.add_observer(Arc::new(DeviceRecorder { tx }));
        assert!(service.start());

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(
                b"Mystery-1.0|device_ip=127.0.0.1&device_port=9",
                ("127.0.0.1", 29501),
            )
            .unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
        assert!(service.devices().is_empty());

        service.stop();
    }
}
