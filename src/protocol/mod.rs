//! NITH wire protocol: data model, frame parser and validation
//!
//! A frame is one text line. Parsing never panics and never raises across the
//! module boundary: every line produces a [`SensorSample`] plus exactly one
//! [`NithError`] verdict, and malformed numeric tokens degrade to `NaN` or
//! `false` views instead of failing the sample.

mod params;
mod parser;
mod sample;
mod value;

pub use params::{ParameterId, StatusCode};
pub use parser::{parse_line, NithError, SIGIL};
pub use sample::{DeviceProfile, SensorSample};
pub use value::{ParameterValue, ValueShape};
