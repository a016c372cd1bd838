//! Parsed sensor samples and the acceptance profile used to validate them

use super::params::{ParameterId, StatusCode};
use super::value::ParameterValue;

/// One parsed line of telemetry.
///
/// Constructed fresh by the frame parser for every received line, rewritten in
/// place by each preprocessor in the pipeline, then handed to observers. The
/// engine itself retains only the most recent sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorSample {
    /// The raw line as received, kept for diagnostics
    pub raw_line: String,
    pub sensor_name: String,
    pub version: String,
    pub status: StatusCode,
    /// Parameter values in wire order. Duplicate ids are legal mid-pipeline;
    /// lookups return the first occurrence.
    pub values: Vec<ParameterValue>,
    /// Free-form segment after a second `$`, if any
    pub extra_data: Option<String>,
}

impl SensorSample {
    /// First value stored for `id`, if any.
    pub fn parameter(&self, id: ParameterId) -> Option<&ParameterValue> {
        self.values.iter().find(|v| v.id == id)
    }

    /// Whether a value for `id` is present.
    pub fn contains(&self, id: ParameterId) -> bool {
        self.values.iter().any(|v| v.id == id)
    }

    /// Whether values for every id in `ids` are present.
    pub fn contains_all(&self, ids: &[ParameterId]) -> bool {
        ids.iter().all(|id| self.contains(*id))
    }
}

/// Acceptance configuration read on every parse.
///
/// An empty accepted set is a wildcard: it accepts anything. An empty
/// required-parameter list requires nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceProfile {
    pub accepted_names: Vec<String>,
    pub accepted_versions: Vec<String>,
    pub required_parameters: Vec<ParameterId>,
}

impl DeviceProfile {
    pub(crate) fn accepts_name(&self, name: &str) -> bool {
        self.accepted_names.is_empty() || self.accepted_names.iter().any(|n| n == name)
    }

    pub(crate) fn accepts_version(&self, version: &str) -> bool {
        self.accepted_versions.is_empty() || self.accepted_versions.iter().any(|v| v == version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sample_is_empty() {
        let sample = SensorSample::default();
        assert!(sample.sensor_name.is_empty());
        assert_eq!(sample.status, StatusCode::NotAStatusCode);
        assert!(sample.values.is_empty());
        assert!(sample.extra_data.is_none());
    }

    #[test]
    fn duplicate_lookup_returns_first() {
        let mut sample = SensorSample::default();
        sample
            .values
            .push(ParameterValue::scalar(ParameterId::GazeX, "1"));
        sample
            .values
            .push(ParameterValue::scalar(ParameterId::GazeX, "2"));
        assert_eq!(
            sample.parameter(ParameterId::GazeX).unwrap().value_str(),
            "1"
        );
        assert!(sample.contains_all(&[ParameterId::GazeX]));
        assert!(!sample.contains_all(&[ParameterId::GazeX, ParameterId::GazeY]));
    }

    #[test]
    fn empty_profile_is_wildcard() {
        let profile = DeviceProfile::default();
        assert!(profile.accepts_name("anything"));
        assert!(profile.accepts_version("0.0"));
    }
}
