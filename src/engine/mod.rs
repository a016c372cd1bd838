//! Transform & dispatch pipeline
//!
//! [`NithEngine`] is the hub between transports and consumers: it parses each
//! received line, runs the sample through the ordered preprocessor chain, then
//! notifies error behaviors and sensor behaviors, all synchronously on the
//! calling (transport) thread and in registration order.

mod behaviors;
mod blink;
mod selector;

pub use behaviors::{ChannelForwarder, LogErrorBehavior};
pub use blink::{BlinkDetector, BlinkEvent, BlinkThresholds};
pub use selector::{ParameterSelector, SelectorMode};

use crate::protocol::{parse_line, DeviceProfile, NithError, ParameterId, SensorSample};
use parking_lot::Mutex;
use std::sync::Arc;

/// Boundary trait transports call into with each received line.
pub trait LineListener: Send + Sync {
    /// One complete line, terminators already stripped.
    fn on_line(&self, line: &str);

    /// The transport hit a read or decode failure.
    fn on_connection_error(&self) {}
}

/// A pluggable transform applied to every sample before dispatch.
///
/// Transforms may add, remove or rewrite parameter values; implementations
/// holding state (calibration history, previous positions) use interior
/// mutability.
pub trait Preprocessor: Send + Sync {
    fn transform(&self, sample: SensorSample) -> SensorSample;
}

/// A consumer notified with every transformed sample.
pub trait SensorBehavior: Send + Sync {
    fn on_sample(&self, sample: &SensorSample);
}

/// A consumer notified with every verdict, `Ok` included.
pub trait ErrorBehavior: Send + Sync {
    /// Returns whether the behavior considered the verdict actionable.
    fn on_error(&self, error: NithError) -> bool;
}

/// The protocol engine: validation profile, preprocessor chain and observer
/// registries, plus last-sample/last-error retention for synchronous queries.
///
/// Registries are snapshotted out of their locks before iteration, so a
/// callback may register behaviors or disconnect a transport without
/// deadlocking the dispatch path.
#[derive(Default)]
pub struct NithEngine {
    profile: Mutex<DeviceProfile>,
    preprocessors: Mutex<Vec<Arc<dyn Preprocessor>>>,
    sensor_behaviors: Mutex<Vec<Arc<dyn SensorBehavior>>>,
    error_behaviors: Mutex<Vec<Arc<dyn ErrorBehavior>>>,
    last_sample: Mutex<SensorSample>,
    last_error: Mutex<NithError>,
}

impl NithEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch a parsed sample and verdict through the observer path.
    fn dispatch(&self, sample: SensorSample, error: NithError) {
        let preprocessors: Vec<_> = self.preprocessors.lock().clone();
        let sample = preprocessors
            .iter()
            .fold(sample, |s, p| p.transform(s));

        let error_behaviors: Vec<_> = self.error_behaviors.lock().clone();
        for behavior in &error_behaviors {
            behavior.on_error(error);
        }

        // Sensor behaviors run unconditionally, even on a fault verdict:
        // consumers choose their own degradation policy.
        let sensor_behaviors: Vec<_> = self.sensor_behaviors.lock().clone();
        for behavior in &sensor_behaviors {
            behavior.on_sample(&sample);
        }

        *self.last_sample.lock() = sample;
        *self.last_error.lock() = error;
    }

    pub fn add_preprocessor(&self, preprocessor: Arc<dyn Preprocessor>) {
        self.preprocessors.lock().push(preprocessor);
    }

    pub fn add_sensor_behavior(&self, behavior: Arc<dyn SensorBehavior>) {
        self.sensor_behaviors.lock().push(behavior);
    }

    pub fn add_error_behavior(&self, behavior: Arc<dyn ErrorBehavior>) {
        self.error_behaviors.lock().push(behavior);
    }

    pub fn clear_preprocessors(&self) {
        self.preprocessors.lock().clear();
    }

    pub fn clear_sensor_behaviors(&self) {
        self.sensor_behaviors.lock().clear();
    }

    pub fn clear_error_behaviors(&self) {
        self.error_behaviors.lock().clear();
    }

    /// Current acceptance profile (cloned).
    pub fn profile(&self) -> DeviceProfile {
        self.profile.lock().clone()
    }

    pub fn set_profile(&self, profile: DeviceProfile) {
        *self.profile.lock() = profile;
    }

    pub fn set_accepted_names(&self, names: Vec<String>) {
        self.profile.lock().accepted_names = names;
    }

    pub fn set_accepted_versions(&self, versions: Vec<String>) {
        self.profile.lock().accepted_versions = versions;
    }

    pub fn set_required_parameters(&self, parameters: Vec<ParameterId>) {
        self.profile.lock().required_parameters = parameters;
    }

    /// Most recently dispatched sample (after preprocessing).
    pub fn last_sample(&self) -> SensorSample {
        self.last_sample.lock().clone()
    }

    /// Most recently dispatched verdict.
    pub fn last_error(&self) -> NithError {
        *self.last_error.lock()
    }
}

impl LineListener for NithEngine {
    fn on_line(&self, line: &str) {
        let profile = self.profile.lock().clone();
        let (sample, error) = parse_line(line, &profile);
        self.dispatch(sample, error);
    }

    fn on_connection_error(&self) {
        // Nothing to transform: an empty sample goes straight to observers.
        let sample = SensorSample::default();
        let error_behaviors: Vec<_> = self.error_behaviors.lock().clone();
        for behavior in &error_behaviors {
            behavior.on_error(NithError::Connection);
        }
        let sensor_behaviors: Vec<_> = self.sensor_behaviors.lock().clone();
        for behavior in &sensor_behaviors {
            behavior.on_sample(&sample);
        }
        *self.last_sample.lock() = sample;
        *self.last_error.lock() = NithError::Connection;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ParameterValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBehavior {
        samples: AtomicUsize,
        errors: AtomicUsize,
    }

    impl CountingBehavior {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                samples: AtomicUsize::new(0),
                errors: AtomicUsize::new(0),
            })
        }
    }

    impl SensorBehavior for CountingBehavior {
        fn on_sample(&self, _sample: &SensorSample) {
            self.samples.fetch_add(1, Ordering::Relaxed);
        }
    }

    impl ErrorBehavior for CountingBehavior {
        fn on_error(&self, error: NithError) -> bool {
            if error.is_fault() {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            error != NithError::NotAnError
        }
    }

    struct TagPreprocessor;

    impl Preprocessor for TagPreprocessor {
        fn transform(&self, mut sample: SensorSample) -> SensorSample {
            sample
                .values
                .push(ParameterValue::scalar(ParameterId::CalibrationStatus, "tagged"));
            sample
        }
    }

    #[test]
    fn dispatch_order_and_retention() {
        let engine = NithEngine::new();
        let counter = CountingBehavior::new();
        engine.add_sensor_behavior(counter.clone());
        engine.add_error_behavior(counter.clone());
        engine.add_preprocessor(Arc::new(TagPreprocessor));

        engine.on_line("$NITHeye-1.0|OPR|eyeLeft_isOpen=true");
        assert_eq!(counter.samples.load(Ordering::Relaxed), 1);
        assert_eq!(counter.errors.load(Ordering::Relaxed), 0);
        assert_eq!(engine.last_error(), NithError::Ok);
        // Preprocessor output is what gets retained
        assert!(engine.last_sample().contains(ParameterId::CalibrationStatus));
    }

    #[test]
    fn sensor_behaviors_run_even_on_error() {
        let engine = NithEngine::new();
        let counter = CountingBehavior::new();
        engine.add_sensor_behavior(counter.clone());
        engine.add_error_behavior(counter.clone());

        engine.on_line("garbage");
        assert_eq!(counter.samples.load(Ordering::Relaxed), 1);
        assert_eq!(counter.errors.load(Ordering::Relaxed), 1);
        assert_eq!(engine.last_error(), NithError::OutputNotCompliant);
    }

    #[test]
    fn connection_error_dispatches_empty_sample() {
        let engine = NithEngine::new();
        let counter = CountingBehavior::new();
        engine.add_sensor_behavior(counter.clone());
        engine.on_connection_error();
        assert_eq!(counter.samples.load(Ordering::Relaxed), 1);
        assert_eq!(engine.last_error(), NithError::Connection);
        assert!(engine.last_sample().values.is_empty());
    }

    #[test]
    fn profile_updates_apply_to_next_line() {
        let engine = NithEngine::new();
        engine.set_accepted_names(vec!["NITHhead".into()]);
        engine.on_line("$NITHeye-1.0|OPR|gaze_x=1");
        assert_eq!(engine.last_error(), NithError::UnrecognizedSensorName);

        engine.set_accepted_names(vec![]);
        engine.on_line("$NITHeye-1.0|OPR|gaze_x=1");
        assert_eq!(engine.last_error(), NithError::Ok);
    }

    #[test]
    fn noop_chain_is_idempotent() {
        struct Identity;
        impl Preprocessor for Identity {
            fn transform(&self, sample: SensorSample) -> SensorSample {
                sample
            }
        }

        let engine = NithEngine::new();
        engine.add_preprocessor(Arc::new(Identity));
        engine.add_preprocessor(Arc::new(Identity));

        engine.on_line("$NITHeye-1.0|OPR|mouth_ape=42/100");
        let first = engine.last_sample();
        engine.on_line("$NITHeye-1.0|OPR|mouth_ape=42/100");
        assert_eq!(engine.last_sample(), first);
    }
}
