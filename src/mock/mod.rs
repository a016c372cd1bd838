//! Synthetic sensor for hardware-free development (feature `mock`)

mod noise;
mod sensor;

pub use noise::NoiseGenerator;
pub use sensor::{MockSensor, MockSensorConfig};
