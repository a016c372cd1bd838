//! Bundled observers: error logging and cross-thread sample forwarding

use super::{ErrorBehavior, SensorBehavior};
use crate::protocol::{NithError, SensorSample};
use crate::NithEngine;
use crossbeam_channel::{Sender, TrySendError};
use std::sync::Arc;

/// Error behavior logging every fault verdict with a human-readable reason.
///
/// Identity and contract faults include the engine's currently configured
/// acceptance lists for diagnostic context. `Ok` and `NotAnError` are traced
/// only.
pub struct LogErrorBehavior {
    engine: Arc<NithEngine>,
}

impl LogErrorBehavior {
    pub fn new(engine: Arc<NithEngine>) -> Self {
        Self { engine }
    }

    fn describe(&self, error: NithError) -> String {
        let profile = self.engine.profile();
        match error {
            NithError::NotAnError => String::new(),
            NithError::Connection => {
                "no connection to any sensor on the selected port".to_string()
            }
            NithError::OutputNotCompliant => {
                "sensor output does not comply with the NITH line format".to_string()
            }
            NithError::MalformedParameter => {
                "a parameter value token violates the range grammar".to_string()
            }
            NithError::UnrecognizedSensorName => format!(
                "wrong sensor name or model connected; compatible sensors are: {:?}",
                profile.accepted_names
            ),
            NithError::UnrecognizedVersion => format!(
                "wrong sensor version connected; compatible versions are: {:?}",
                profile.accepted_versions
            ),
            NithError::StatusCodeError => {
                "sensor sent an ERR status code (possible hardware fault)".to_string()
            }
            NithError::MissingRequiredParameters => format!(
                "sensor does not provide the required parameters: {:?}",
                profile
                    .required_parameters
                    .iter()
                    .map(|p| p.as_wire())
                    .collect::<Vec<_>>()
            ),
            NithError::Ok => "sensor is operating normally".to_string(),
        }
    }
}

impl ErrorBehavior for LogErrorBehavior {
    fn on_error(&self, error: NithError) -> bool {
        if error == NithError::NotAnError {
            return false;
        }
        if error.is_fault() {
            log::warn!("Sensor error ({:?}): {}", error, self.describe(error));
        } else {
            log::trace!("{}", self.describe(error));
        }
        true
    }
}

/// Sensor behavior forwarding cloned samples into a channel.
///
/// Consumers that want samples off the dispatch thread attach the receiving
/// end; a full or disconnected channel drops the sample with a log line
/// instead of blocking the receive loop.
pub struct ChannelForwarder {
    tx: Sender<SensorSample>,
}

impl ChannelForwarder {
    pub fn new(tx: Sender<SensorSample>) -> Self {
        Self { tx }
    }
}

impl SensorBehavior for ChannelForwarder {
    fn on_sample(&self, sample: &SensorSample) {
        match self.tx.try_send(sample.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::trace!("Sample channel full, dropping sample");
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Sample channel disconnected, dropping sample");
            }
        }
    }
}
