//! Per-sensor parameter keep/drop preprocessor
//!
//! Useful when multiplexing several sensors into one engine: accept head
//! angles only from the head tracker, mouth aperture only from the breath
//! sensor, and so on.

use super::Preprocessor;
use crate::protocol::{ParameterId, SensorSample};
use parking_lot::Mutex;

/// What a matching rule does with its parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorMode {
    /// Keep only the listed parameters (empty set keeps everything)
    Keep,
    /// Drop the listed parameters (empty set drops everything)
    Drop,
}

#[derive(Debug, Clone)]
struct SelectorRule {
    /// Substring matched against the sample's sensor name
    sensor_match: String,
    mode: SelectorMode,
    parameters: Vec<ParameterId>,
}

/// Preprocessor applying per-sensor keep/drop rules.
///
/// The first rule whose sensor substring matches the sample applies; samples
/// with no matching rule pass unchanged.
#[derive(Default)]
pub struct ParameterSelector {
    rules: Mutex<Vec<SelectorRule>>,
}

impl ParameterSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Order matters: earlier rules win.
    pub fn add_rule(
        &self,
        sensor_match: impl Into<String>,
        mode: SelectorMode,
        parameters: Vec<ParameterId>,
    ) {
        self.rules.lock().push(SelectorRule {
            sensor_match: sensor_match.into(),
            mode,
            parameters,
        });
    }

    pub fn clear_rules(&self) {
        self.rules.lock().clear();
    }
}

impl Preprocessor for ParameterSelector {
    fn transform(&self, mut sample: SensorSample) -> SensorSample {
        let rules = self.rules.lock();
        let Some(rule) = rules
            .iter()
            .find(|r| sample.sensor_name.contains(&r.sensor_match))
        else {
            return sample;
        };
        match rule.mode {
            SelectorMode::Keep => {
                if !rule.parameters.is_empty() {
                    sample.values.retain(|v| rule.parameters.contains(&v.id));
                }
            }
            SelectorMode::Drop => {
                if rule.parameters.is_empty() {
                    sample.values.clear();
                } else {
                    sample.values.retain(|v| !rule.parameters.contains(&v.id));
                }
            }
        }
        sample
    }
}
