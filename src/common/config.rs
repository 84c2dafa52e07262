//! Solution settings loaded from `solution.toml`.
//!
//! Every key is optional and falls back to the testbed defaults, so a
//! missing file is not an error. A file that exists but cannot be read or
//! parsed is.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::error::ConfigError;

/// Root of `solution.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SolutionConfig {
    pub controller: ControllerConfig,
    pub solution: IdentityConfig,
    pub control_loop: ControlLoopConfig,
    pub telemetry: TelemetryConfig,
}

/// Where the global solution controller listens.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ControllerConfig {
    pub address: String,
    pub request_port: u16,
    pub subscribe_port: u16,
    /// Upper bound for the registration round trip.
    pub register_timeout_ms: u64,
    /// Receive timeout of the command listener, i.e. how quickly it notices shutdown.
    pub listener_poll_ms: u64,
    /// How long a report may wait for room in the request socket's queue.
    pub send_timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            address: "172.16.16.12".to_string(),
            request_port: 7001,
            subscribe_port: 7000,
            register_timeout_ms: 5000,
            listener_poll_ms: 250,
            send_timeout_ms: 1000,
        }
    }
}

impl ControllerConfig {
    pub fn register_timeout(&self) -> Duration {
        Duration::from_millis(self.register_timeout_ms)
    }

    pub fn listener_poll(&self) -> Duration {
        Duration::from_millis(self.listener_poll_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Names announced to the controller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct IdentityConfig {
    pub network_name: String,
    pub solution_name: String,
    pub event_list: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            network_name: "network_zigbee".to_string(),
            solution_name: "blacklisting".to_string(),
            event_list: vec!["6lowpan-THR".to_string(), "6lowpan-PER".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ControlLoopConfig {
    pub tick_interval_ms: u64,
    /// External (IEEE 802.11) channel whose overlapping targets get black/whitelisted.
    pub interfering_channel: u32,
    /// Channel mapping CSV, relative to the config directory.
    pub channel_mapping: String,
    /// Slotframe schedule pushed on TSCH activation.
    pub slotframe_file: String,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            interfering_channel: 6,
            channel_mapping: "ieee80211_to_ieee802154_channels.csv".to_string(),
            slotframe_file: "taisc_slotframe.csv".to_string(),
        }
    }
}

impl ControlLoopConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TelemetryConfig {
    /// Counter windows kept at most; further node ids are ignored.
    pub max_tracked_nodes: usize,
    pub monitor_type: String,
    /// Technology label wrapping THR/PER in the monitor value.
    pub technology: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_tracked_nodes: 64,
            monitor_type: "performance".to_string(),
            technology: "Zigbee".to_string(),
        }
    }
}

impl SolutionConfig {
    /// Load configuration from a TOML file.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        let config: SolutionConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(config_path: &Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            log::info!("{} not found, using default solution settings", config_path.display());
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.request_port == 0 || self.controller.subscribe_port == 0 {
            return Err(ConfigError::Validation("controller ports must be non-zero".to_string()));
        }
        let timeouts = [
            ("register-timeout-ms", self.controller.register_timeout_ms),
            ("listener-poll-ms", self.controller.listener_poll_ms),
            ("send-timeout-ms", self.controller.send_timeout_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, millis)| *millis == 0) {
            return Err(ConfigError::Validation(format!("{} must be positive", name)));
        }
        if self.control_loop.tick_interval_ms == 0 {
            return Err(ConfigError::Validation("tick-interval-ms must be positive".to_string()));
        }
        if self.telemetry.max_tracked_nodes == 0 {
            return Err(ConfigError::Validation("max-tracked-nodes must be positive".to_string()));
        }
        if self.solution.solution_name.is_empty() {
            return Err(ConfigError::Validation("solution-name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[controller]\naddress = \"10.0.0.5\"\nregister-timeout-ms = 750\n\n[control-loop]\ninterfering-channel = 11\n"
        )
        .unwrap();

        let config = SolutionConfig::load(file.path()).unwrap();
        assert_eq!(config.controller.address, "10.0.0.5");
        assert_eq!(config.controller.register_timeout(), Duration::from_millis(750));
        assert_eq!(config.controller.request_port, 7001);
        assert_eq!(config.control_loop.interfering_channel, 11);
        assert_eq!(config.solution.solution_name, "blacklisting");
        assert_eq!(config.telemetry.max_tracked_nodes, 64);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SolutionConfig::load_or_default(&dir.path().join("solution.toml")).unwrap();
        assert_eq!(config.controller.subscribe_port, 7000);
        assert_eq!(config.control_loop.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_file_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[controller\naddress = ").unwrap();
        assert!(matches!(SolutionConfig::load_or_default(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_zero_tick_interval_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[control-loop]\ntick-interval-ms = 0\n").unwrap();
        assert!(matches!(SolutionConfig::load(file.path()), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_zero_controller_timeouts_are_rejected() {
        for key in ["register-timeout-ms", "listener-poll-ms", "send-timeout-ms"] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            write!(file, "[controller]\n{} = 0\n", key).unwrap();
            match SolutionConfig::load(file.path()) {
                Err(ConfigError::Validation(message)) => assert!(message.contains(key), "{}", message),
                other => panic!("{} = 0 accepted: {:?}", key, other.map(|_| ())),
            }
        }
    }
}
