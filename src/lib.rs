//! nith-io - Receiver library for NITH line-oriented sensor telemetry
//!
//! This library provides everything a receiving application needs to talk to
//! NITH assistive sensors: the wire protocol model, a parse/transform/dispatch
//! engine, serial and UDP transports, port auto-detection and device
//! discovery, and a microsecond polling timer.
//!
//! ## Features
//!
//! - `mock`: Enable a synthetic sensor for hardware-free testing

pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod protocol;
pub mod timing;
pub mod transport;

// Re-export commonly used types
pub use engine::NithEngine;
pub use error::{Error, Result};
pub use protocol::{NithError, ParameterId, SensorSample, StatusCode};
