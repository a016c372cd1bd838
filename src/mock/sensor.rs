//! Synthetic head tracker emitting well-formed protocol lines
//!
//! Stands in for real hardware in demos and tests: a named thread produces
//! head angles wandering under Gaussian noise plus randomly blinking eyes,
//! formatted exactly as a compliant sensor would send them.

use super::noise::NoiseGenerator;
use crate::engine::LineListener;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MockSensorConfig {
    pub sensor_name: String,
    pub version: String,
    /// Lines emitted per second
    pub rate_hz: u32,
    /// 0 = entropy, anything else reproduces the same stream
    pub seed: u64,
    /// Standard deviation of the per-sample head angle step, degrees
    pub angle_step_stddev: f64,
    /// Probability that either eye toggles open/closed on a given sample
    pub blink_probability: f64,
}

impl Default for MockSensorConfig {
    fn default() -> Self {
        Self {
            sensor_name: "NITHheadMock".to_string(),
            version: "1.0".to_string(),
            rate_hz: 50,
            seed: 0,
            angle_step_stddev: 0.8,
            blink_probability: 0.02,
        }
    }
}

/// Hardware-free line source with the same connect surface as a receiver.
pub struct MockSensor {
    config: MockSensorConfig,
    listeners: Arc<Mutex<Vec<Arc<dyn LineListener>>>>,
    connected: Arc<AtomicBool>,
    shutdown: Mutex<Arc<AtomicBool>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MockSensor {
    pub fn new(config: MockSensorConfig) -> Self {
        Self {
            config,
            listeners: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(false)),
            shutdown: Mutex::new(Arc::new(AtomicBool::new(false))),
            handle: Mutex::new(None),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn LineListener>) {
        self.listeners.lock().push(listener);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn connect(&self) -> bool {
        self.disconnect();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }

        let config = self.config.clone();
        if config.rate_hz == 0 {
            log::error!("Mock sensor rate must be nonzero");
            return false;
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        *self.shutdown.lock() = shutdown.clone();

        let listeners = self.listeners.clone();
        let connected = self.connected.clone();
        let spawned = thread::Builder::new()
            .name("nith-mock-sensor".to_string())
            .spawn(move || {
                emit_loop(&config, &listeners, &shutdown);
                connected.store(false, Ordering::Relaxed);
            });
        match spawned {
            Ok(handle) => {
                *self.handle.lock() = Some(handle);
                self.connected.store(true, Ordering::Relaxed);
                log::info!("Mock sensor running at {} Hz", self.config.rate_hz);
                true
            }
            Err(e) => {
                log::error!("Failed to spawn mock sensor thread: {}", e);
                false
            }
        }
    }

    pub fn disconnect(&self) {
        self.shutdown.lock().store(true, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
    }
}

impl Drop for MockSensor {
    fn drop(&mut self) {
        self.disconnect();
        if let Some(handle) = self.handle.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

struct HeadState {
    yaw: f64,
    pitch: f64,
    roll: f64,
    left_open: bool,
    right_open: bool,
}

fn emit_loop(
    config: &MockSensorConfig,
    listeners: &Mutex<Vec<Arc<dyn LineListener>>>,
    shutdown: &AtomicBool,
) {
    let mut noise = NoiseGenerator::new(config.seed);
    let mut state = HeadState {
        yaw: 0.0,
        pitch: 0.0,
        roll: 0.0,
        left_open: true,
        right_open: true,
    };
    let period = Duration::from_secs(1) / config.rate_hz;

    while !shutdown.load(Ordering::Relaxed) {
        state.yaw = (state.yaw + noise.gaussian(config.angle_step_stddev)).clamp(-90.0, 90.0);
        state.pitch = (state.pitch + noise.gaussian(config.angle_step_stddev)).clamp(-90.0, 90.0);
        state.roll = (state.roll + noise.gaussian(config.angle_step_stddev)).clamp(-90.0, 90.0);
        if noise.chance(config.blink_probability) {
            state.left_open = !state.left_open;
        }
        if noise.chance(config.blink_probability) {
            state.right_open = !state.right_open;
        }

        let line = format!(
            "${}-{}|OPR|head_pos_yaw={:.2}&head_pos_pitch={:.2}&head_pos_roll={:.2}\
             &eyeLeft_isOpen={}&eyeRight_isOpen={}",
            config.sensor_name,
            config.version,
            state.yaw,
            state.pitch,
            state.roll,
            state.left_open,
            state.right_open
        );
        let snapshot: Vec<_> = listeners.lock().clone();
        for listener in &snapshot {
            listener.on_line(&line);
        }
        thread::sleep(period);
    }
    log::debug!("Mock sensor thread exiting");
}
