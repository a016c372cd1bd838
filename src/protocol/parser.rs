//! Frame parser and validation ladder
//!
//! Wire format, one line per sample:
//!
//! ```text
//! $<name>-<version>|<STATUS>|<p1>=<v1>&<p2>=<v2>...[$<extra-data>]
//! ```
//!
//! [`parse_line`] always returns a sample alongside exactly one verdict. A
//! line that fails validation still yields whatever was parsed before the
//! failing check, so error observers can inspect context; only structurally
//! unparsable lines come back with a mostly empty sample.

use super::params::StatusCode;
use super::sample::{DeviceProfile, SensorSample};
use super::value::{ParameterValue, ValueShape, ValueToken};
use crate::protocol::ParameterId;

/// Line delimiter sigil opening every frame.
pub const SIGIL: char = '$';

/// The verdict produced for one received line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NithError {
    /// Neutral initial state; never produced by the validation ladder
    #[default]
    NotAnError,
    /// Transport-level failure: surfaced by receivers, not by the parser
    Connection,
    /// The line does not comply with the frame grammar
    OutputNotCompliant,
    /// A value token violates the `/` range grammar
    MalformedParameter,
    /// Sensor name not in the accepted-names list
    UnrecognizedSensorName,
    /// Version not in the accepted-versions list
    UnrecognizedVersion,
    /// Sensor reported an `ERR` status code
    StatusCodeError,
    /// A required parameter is absent from the sample
    MissingRequiredParameters,
    /// The line passed every check
    Ok,
}

impl NithError {
    /// Whether this verdict represents a fault (neither `Ok` nor `NotAnError`).
    pub fn is_fault(&self) -> bool {
        !matches!(self, NithError::Ok | NithError::NotAnError)
    }
}

/// Parse and validate one protocol line against `profile`.
///
/// The checks run in a fixed order and the first failure wins:
/// sigil and structure, value-token grammar, sensor name, version, status
/// code, required parameters.
pub fn parse_line(line: &str, profile: &DeviceProfile) -> (SensorSample, NithError) {
    let mut sample = SensorSample {
        raw_line: line.to_string(),
        ..Default::default()
    };

    if !line.starts_with(SIGIL) {
        return (sample, NithError::OutputNotCompliant);
    }

    let mut segments = line.split(SIGIL);
    segments.next(); // empty prefix before the leading sigil
    let standard = segments.next().unwrap_or("");
    // Only the second segment is retained; anything beyond is neither
    // standard nor extra data.
    sample.extra_data = segments.next().map(str::to_string);

    let fields: Vec<&str> = standard.split('|').collect();
    if fields.len() < 3 {
        return (sample, NithError::OutputNotCompliant);
    }

    let Some((name, version)) = fields[0].split_once('-') else {
        return (sample, NithError::OutputNotCompliant);
    };
    sample.sensor_name = name.to_string();
    sample.version = version.to_string();
    sample.status = StatusCode::from_wire(fields[1]);

    let mut malformed_value = false;
    if !fields[2].is_empty() {
        for pair in fields[2].split('&') {
            let Some((key, raw_value)) = pair.split_once('=') else {
                return (sample, NithError::OutputNotCompliant);
            };
            let id = ParameterId::from_wire(key);
            if id == ParameterId::NotAParameter {
                log::trace!("Dropping unknown parameter key {:?}", key);
                continue;
            }
            match ValueShape::parse_token(raw_value) {
                ValueToken::Ok(shape) => sample.values.push(ParameterValue { id, shape }),
                ValueToken::Malformed => {
                    log::trace!("Malformed value token {:?} for {:?}", raw_value, key);
                    malformed_value = true;
                }
            }
        }
    }
    if malformed_value {
        return (sample, NithError::MalformedParameter);
    }

    if !profile.accepts_name(&sample.sensor_name) {
        return (sample, NithError::UnrecognizedSensorName);
    }
    if !profile.accepts_version(&sample.version) {
        return (sample, NithError::UnrecognizedVersion);
    }
    if sample.status == StatusCode::Error {
        return (sample, NithError::StatusCodeError);
    }
    if !sample.contains_all(&profile.required_parameters) {
        return (sample, NithError::MissingRequiredParameters);
    }

    (sample, NithError::Ok)
}
