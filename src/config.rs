//! File configuration
//!
//! Loads receiver configuration from a TOML file. Every section has working
//! defaults, so a missing or partial file still yields a usable setup;
//! required parameter names are checked against the protocol vocabulary at
//! load time because a typo there would otherwise fail silently forever.

use crate::discovery::{DiscoveryConfig, ScanConfig};
use crate::error::{Error, Result};
use crate::protocol::ParameterId;
use crate::transport::{SerialReceiverConfig, UdpReceiverConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Engine acceptance profile, as named in a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Accepted sensor names; empty accepts any
    pub accepted_names: Vec<String>,
    /// Accepted sensor versions; empty accepts any
    pub accepted_versions: Vec<String>,
    /// Required parameter wire names, e.g. `["eyeLeft_isOpen"]`
    pub required_parameters: Vec<String>,
}

impl EngineConfig {
    /// Resolve the configured wire names, rejecting any not in the
    /// vocabulary.
    pub fn required_parameter_ids(&self) -> Result<Vec<ParameterId>> {
        self.required_parameters
            .iter()
            .map(|name| {
                let id = ParameterId::from_wire(name);
                if id == ParameterId::NotAParameter {
                    Err(Error::UnknownParameter(name.clone()))
                } else {
                    Ok(id)
                }
            })
            .collect()
    }
}

/// Top-level receiver configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NithConfig {
    pub engine: EngineConfig,
    pub serial: SerialReceiverConfig,
    pub udp: UdpReceiverConfig,
    pub scan: ScanConfig,
    pub discovery: DiscoveryConfig,
}

impl NithConfig {
    /// Load configuration from a TOML file and validate parameter names.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: NithConfig = toml::from_str(&contents)?;
        config.engine.required_parameter_ids()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = NithConfig::default();
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.disconnect_timeout_ms, 1500);
        assert_eq!(config.udp.port, 20100);
        assert_eq!(config.scan.timeout_ms, 1000);
        assert_eq!(config.scan.max_trials_per_port, 5);
        assert_eq!(config.discovery.port, 20500);
        assert!(config.engine.accepted_names.is_empty());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: NithConfig = toml::from_str(
            r#"
            [serial]
            port_path = "/dev/ttyUSB0"

            [engine]
            accepted_names = ["NITHeye"]
            "#,
        )
        .unwrap();
        assert_eq!(config.serial.port_path, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.engine.accepted_names, vec!["NITHeye"]);
        assert_eq!(config.udp.port, 20100);
    }

    #[test]
    fn required_parameters_resolve_to_ids() {
        let engine = EngineConfig {
            required_parameters: vec!["eyeLeft_isOpen".to_string(), "head_pos_yaw".to_string()],
            ..EngineConfig::default()
        };
        let ids = engine.required_parameter_ids().unwrap();
        assert_eq!(
            ids,
            vec![ParameterId::EyeLeftIsOpen, ParameterId::HeadPosYaw]
        );
    }

    #[test]
    fn unknown_required_parameter_is_an_error() {
        let engine = EngineConfig {
            required_parameters: vec!["eyeLeft_isOpne".to_string()],
            ..EngineConfig::default()
        };
        match engine.required_parameter_ids() {
            Err(Error::UnknownParameter(name)) => assert_eq!(name, "eyeLeft_isOpne"),
            other => panic!("expected UnknownParameter, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn toml_round_trip() {
        let mut config = NithConfig::default();
        config.serial.port_path = "COM7".to_string();
        config.engine.accepted_versions = vec!["2.0".to_string()];
        config
            .discovery
            .device_ports
            .insert("NITHfaceCam".to_string(), 20100);

        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[engine]"));
        assert!(text.contains("[serial]"));
        assert!(text.contains("[discovery"));

        let parsed: NithConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.serial.port_path, "COM7");
        assert_eq!(parsed.engine.accepted_versions, vec!["2.0"]);
        assert_eq!(parsed.discovery.device_ports["NITHfaceCam"], 20100);
    }
}
