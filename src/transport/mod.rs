//! Serial and UDP transports
//!
//! Receivers turn a byte or datagram stream into complete lines and hand
//! them to [`LineListener`](crate::engine::LineListener)s; senders carry
//! command lines back toward the hardware. All connect paths are
//! non-throwing: failure is logged and reported as `false`.

mod rate_limit;
mod sender;
mod serial;
mod udp;

pub use rate_limit::{RateLimiter, DEFAULT_MAX_LINES_PER_SECOND};
pub use sender::{LineSender, PollingSender, UdpLineSender, DEFAULT_POLL_INTERVAL_US};
pub use serial::{
    SerialLineReceiver, SerialReceiverConfig, DEFAULT_BAUD_RATE, DEFAULT_DISCONNECT_TIMEOUT_MS,
    DEFAULT_READ_TIMEOUT_MS,
};
pub use udp::{UdpLineReceiver, UdpReceiverConfig, DEFAULT_UDP_PORT};
