//! Simulator configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::physics::{PhysicsConfig, Scenario};

/// Complete simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Listen address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Physics tick interval in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Seconds spent in each scenario
    #[serde(default = "default_scenario_secs")]
    pub scenario_secs: u64,

    /// RPM smoothing factor, 0..1
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,

    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,

    /// Scenario at startup
    #[serde(default)]
    pub start_scenario: Scenario,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    35000
}

fn default_tick_ms() -> u64 {
    50
}

fn default_scenario_secs() -> u64 {
    30
}

fn default_smoothing() -> f64 {
    0.15
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tick_ms: default_tick_ms(),
            scenario_secs: default_scenario_secs(),
            smoothing: default_smoothing(),
            seed: None,
            start_scenario: Scenario::default(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> SimResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.tick_ms == 0 {
            return Err(SimError::Config("tick_ms must be positive".into()));
        }
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(SimError::Config(format!(
                "smoothing {} outside (0, 1]",
                self.smoothing
            )));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn physics(&self) -> PhysicsConfig {
        PhysicsConfig {
            scenario_period: Duration::from_secs(self.scenario_secs),
            smoothing: self.smoothing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = SimConfig::from_toml("").unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:35000");
        assert_eq!(config.tick(), Duration::from_millis(50));
        assert_eq!(config.physics(), PhysicsConfig::default());
        assert_eq!(config.start_scenario, Scenario::ColdStart);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_overrides() {
        let config = SimConfig::from_toml(
            r#"
            port = 35001
            scenario_secs = 5
            seed = 42
            start_scenario = "aggressive"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 35001);
        assert_eq!(config.physics().scenario_period, Duration::from_secs(5));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.start_scenario, Scenario::Aggressive);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(SimConfig::from_toml("tick_ms = 0"), Err(SimError::Config(_))));
        assert!(matches!(SimConfig::from_toml("smoothing = 1.5"), Err(SimError::Config(_))));
        assert!(matches!(SimConfig::from_toml("port = \"x\""), Err(SimError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"127.0.0.1\"\ntick_ms = 20").unwrap();

        let config = SimConfig::load(file.path()).unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:35000");
        assert_eq!(config.tick_ms, 20);
        assert!(SimConfig::load("/nonexistent/sim.toml").is_err());
    }
}
