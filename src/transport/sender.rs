//! Outbound line senders
//!
//! Commands flow back to sensors over the same line format. [`UdpLineSender`]
//! covers the network path; [`PollingSender`] repeats the current command at
//! a microsecond-precise rate for firmware that expects a steady heartbeat.

use crate::timing::MicroTimer;
use parking_lot::Mutex;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

/// Anything that can carry one line toward a sensor.
pub trait LineSender: Send + Sync {
    fn send_line(&self, line: &str);
}

/// Fire-and-forget UDP sender bound to an ephemeral local port.
pub struct UdpLineSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpLineSender {
    /// Broadcast sender targeting `255.255.255.255:port`.
    pub fn broadcast(port: u16) -> crate::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_broadcast(true)?;
        Ok(Self {
            socket,
            target: SocketAddr::from(([255, 255, 255, 255], port)),
        })
    }

    /// Unicast sender targeting one device.
    pub fn unicast(target: SocketAddr) -> crate::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl LineSender for UdpLineSender {
    fn send_line(&self, line: &str) {
        if let Err(e) = self.socket.send_to(line.as_bytes(), self.target) {
            log::warn!("UDP send to {} failed: {}", self.target, e);
        }
    }
}

/// Repeats the current command line to every attached sender on a
/// [`MicroTimer`] schedule.
///
/// With no command set a tick sends nothing; `send_now` pushes out of band
/// without disturbing the schedule.
pub struct PollingSender {
    senders: Arc<Mutex<Vec<Arc<dyn LineSender>>>>,
    data: Arc<Mutex<Option<String>>>,
    timer: MicroTimer,
}

pub const DEFAULT_POLL_INTERVAL_US: u64 = 10_000;

impl PollingSender {
    pub fn new() -> Self {
        let senders: Arc<Mutex<Vec<Arc<dyn LineSender>>>> = Arc::new(Mutex::new(Vec::new()));
        let data: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let timer = MicroTimer::new(DEFAULT_POLL_INTERVAL_US);

        let tick_senders = senders.clone();
        let tick_data = data.clone();
        timer.on_tick(move |_| {
            let line = tick_data.lock().clone();
            if let Some(line) = line {
                let snapshot: Vec<_> = tick_senders.lock().clone();
                for sender in &snapshot {
                    sender.send_line(&line);
                }
            }
        });

        Self {
            senders,
            data,
            timer,
        }
    }

    pub fn add_sender(&self, sender: Arc<dyn LineSender>) {
        self.senders.lock().push(sender);
    }

    pub fn clear_senders(&self) {
        self.senders.lock().clear();
    }

    /// Replace the command repeated on every tick.
    pub fn set_data(&self, line: impl Into<String>) {
        *self.data.lock() = Some(line.into());
    }

    /// Stop repeating; ticks continue but carry nothing.
    pub fn clear_data(&self) {
        *self.data.lock() = None;
    }

    pub fn data(&self) -> Option<String> {
        self.data.lock().clone()
    }

    /// Send the current command immediately, off-schedule.
    pub fn send_now(&self) {
        let line = self.data.lock().clone();
        if let Some(line) = line {
            let snapshot: Vec<_> = self.senders.lock().clone();
            for sender in &snapshot {
                sender.send_line(&line);
            }
        }
    }

    /// Start the polling timer at `interval_us` microseconds per send.
    pub fn start_polling(&self, interval_us: u64) -> bool {
        self.timer.set_interval_us(interval_us);
        self.timer.start()
    }

    pub fn stop_polling(&self) {
        self.timer.stop();
    }

    pub fn is_polling(&self) -> bool {
        self.timer.is_running()
    }
}

impl Default for PollingSender {
    fn default() -> Self {
        Self::new()
    }
}
