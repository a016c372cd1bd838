//! Debounced blink edge detection
//!
//! Six counters keyed by (side, direction) advance or reset with every sample
//! carrying both eye-openness booleans; a counter reaching exactly its
//! threshold fires the corresponding event once. Growth past the threshold
//! does not refire until the counter has been reset by a state change.

use super::SensorBehavior;
use crate::protocol::{ParameterId, SensorSample};
use parking_lot::Mutex;

/// A debounced eye-state edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkEvent {
    LeftOpen,
    LeftClose,
    RightOpen,
    RightClose,
    DoubleOpen,
    DoubleClose,
}

/// Per-event frame-count thresholds. Default is 5 frames for every event.
#[derive(Debug, Clone, Copy)]
pub struct BlinkThresholds {
    pub left_open: u32,
    pub left_close: u32,
    pub right_open: u32,
    pub right_close: u32,
    pub double_open: u32,
    pub double_close: u32,
}

pub const DEFAULT_BLINK_THRESHOLD: u32 = 5;

impl Default for BlinkThresholds {
    fn default() -> Self {
        Self {
            left_open: DEFAULT_BLINK_THRESHOLD,
            left_close: DEFAULT_BLINK_THRESHOLD,
            right_open: DEFAULT_BLINK_THRESHOLD,
            right_close: DEFAULT_BLINK_THRESHOLD,
            double_open: DEFAULT_BLINK_THRESHOLD,
            double_close: DEFAULT_BLINK_THRESHOLD,
        }
    }
}

#[derive(Default)]
struct Counters {
    left_open: u32,
    left_close: u32,
    right_open: u32,
    right_close: u32,
    double_open: u32,
    double_close: u32,
}

/// Sensor behavior turning `eyeLeft_isOpen`/`eyeRight_isOpen` streams into
/// debounced [`BlinkEvent`]s delivered to a user callback.
///
/// Samples missing either openness parameter are ignored.
pub struct BlinkDetector {
    thresholds: BlinkThresholds,
    counters: Mutex<Counters>,
    callback: Box<dyn Fn(BlinkEvent) + Send + Sync>,
}

impl BlinkDetector {
    pub fn new(
        thresholds: BlinkThresholds,
        callback: impl Fn(BlinkEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            thresholds,
            counters: Mutex::new(Counters::default()),
            callback: Box::new(callback),
        }
    }

    fn step(counter: &mut u32, condition: bool) -> u32 {
        *counter = if condition { *counter + 1 } else { 0 };
        *counter
    }
}

impl SensorBehavior for BlinkDetector {
    fn on_sample(&self, sample: &SensorSample) {
        let (Some(left), Some(right)) = (
            sample.parameter(ParameterId::EyeLeftIsOpen),
            sample.parameter(ParameterId::EyeRightIsOpen),
        ) else {
            return;
        };
        let l = left.value_bool();
        let r = right.value_bool();

        // Condition table: a counter advances while its condition holds and
        // resets the moment it does not. Single-eye close counters only run
        // while the other eye stays open; a double close is its own state.
        let mut fired = Vec::new();
        {
            let mut c = self.counters.lock();
            let t = &self.thresholds;
            if Self::step(&mut c.left_open, l) == t.left_open {
                fired.push(BlinkEvent::LeftOpen);
            }
            if Self::step(&mut c.left_close, !l && r) == t.left_close {
                fired.push(BlinkEvent::LeftClose);
            }
            if Self::step(&mut c.right_open, r) == t.right_open {
                fired.push(BlinkEvent::RightOpen);
            }
            if Self::step(&mut c.right_close, !r && l) == t.right_close {
                fired.push(BlinkEvent::RightClose);
            }
            if Self::step(&mut c.double_open, l && r) == t.double_open {
                fired.push(BlinkEvent::DoubleOpen);
            }
            if Self::step(&mut c.double_close, !l && !r) == t.double_close {
                fired.push(BlinkEvent::DoubleClose);
            }
        }
        for event in fired {
            (self.callback)(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{parse_line, DeviceProfile};
    use std::sync::{Arc, Mutex as StdMutex};

    fn eye_sample(left: bool, right: bool) -> SensorSample {
        let line = format!(
            "$NITHeye-1.0|OPR|eyeLeft_isOpen={}&eyeRight_isOpen={}",
            left, right
        );
        parse_line(&line, &DeviceProfile::default()).0
    }

    fn detector_with_log(threshold: u32) -> (BlinkDetector, Arc<StdMutex<Vec<BlinkEvent>>>) {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sink = log.clone();
        let thresholds = BlinkThresholds {
            left_open: threshold,
            left_close: threshold,
            right_open: threshold,
            right_close: threshold,
            double_open: threshold,
            double_close: threshold,
        };
        let detector = BlinkDetector::new(thresholds, move |e| sink.lock().unwrap().push(e));
        (detector, log)
    }

    #[test]
    fn left_close_fires_at_threshold_once() {
        let (detector, log) = detector_with_log(3);
        for _ in 0..5 {
            detector.on_sample(&eye_sample(false, true));
        }
        let events = log.lock().unwrap();
        assert_eq!(
            events.iter().filter(|e| **e == BlinkEvent::LeftClose).count(),
            1
        );
        // Right eye stayed open throughout
        assert!(events.contains(&BlinkEvent::RightOpen));
        assert!(!events.contains(&BlinkEvent::DoubleClose));
    }

    #[test]
    fn double_close_suppresses_single_eye_close() {
        let (detector, log) = detector_with_log(2);
        for _ in 0..4 {
            detector.on_sample(&eye_sample(false, false));
        }
        let events = log.lock().unwrap();
        assert!(events.contains(&BlinkEvent::DoubleClose));
        assert!(!events.contains(&BlinkEvent::LeftClose));
        assert!(!events.contains(&BlinkEvent::RightClose));
    }

    #[test]
    fn state_change_resets_counters() {
        let (detector, log) = detector_with_log(3);
        detector.on_sample(&eye_sample(false, true));
        detector.on_sample(&eye_sample(false, true));
        // Interruption resets the left-close counter
        detector.on_sample(&eye_sample(true, true));
        detector.on_sample(&eye_sample(false, true));
        detector.on_sample(&eye_sample(false, true));
        assert!(!log.lock().unwrap().contains(&BlinkEvent::LeftClose));
        detector.on_sample(&eye_sample(false, true));
        assert!(log.lock().unwrap().contains(&BlinkEvent::LeftClose));
    }

    #[test]
    fn samples_without_eye_parameters_are_ignored() {
        let (detector, log) = detector_with_log(1);
        let (sample, _) = parse_line("$NITHhead-1.0|OPR|head_pos_yaw=1", &DeviceProfile::default());
        detector.on_sample(&sample);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn no_refire_past_threshold() {
        let (detector, log) = detector_with_log(2);
        for _ in 0..10 {
            detector.on_sample(&eye_sample(true, true));
        }
        let events = log.lock().unwrap();
        assert_eq!(
            events.iter().filter(|e| **e == BlinkEvent::DoubleOpen).count(),
            1
        );
    }
}
