//! Finding sensors without configuration
//!
//! Two independent mechanisms: a concurrent serial port scan that probes
//! every port for the protocol marker, and a UDP announcement service that
//! network sensors use to find the receiver.

mod scanner;
mod service;

pub use scanner::{
    AutoConnect, PortScanner, ScanConfig, ScanObserver, ScanResults, ScanStatus, SCAN_MARKER,
};
pub use service::{
    DeviceInfo, DiscoveryConfig, DiscoveryObserver, DiscoveryService, DEFAULT_DISCOVERY_PORT,
};
