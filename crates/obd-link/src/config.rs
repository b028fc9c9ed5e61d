//! Link configuration
//!
//! Endpoint, timing and channel selection for the polling client. Every field
//! has a default, so an empty TOML file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use obd_conv::{registry::resolve_all, BatchPlan, ChannelId};
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, LinkResult};
use crate::poller::PollPlans;

/// Environment variable overriding the adapter host
pub const ENV_HOST: &str = "OBD_HOST";
/// Environment variable overriding the adapter port
pub const ENV_PORT: &str = "OBD_PORT";

/// Complete link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Adapter host
    #[serde(default = "default_host")]
    pub host: String,

    /// Adapter TCP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Timing
    #[serde(default)]
    pub timing: TimingConfig,

    /// Channel selection
    #[serde(default)]
    pub channels: ChannelConfig,

    /// AT init sequence sent after every connect
    #[serde(default = "default_init_commands")]
    pub init_commands: Vec<String>,
}

fn default_host() -> String {
    "192.168.0.10".to_string()
}

fn default_port() -> u16 {
    35000
}

fn default_init_commands() -> Vec<String> {
    ["ATZ", "ATE0", "ATL0", "ATS0", "ATH0", "ATSP0", "0100"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timing: TimingConfig::default(),
            channels: ChannelConfig::default(),
            init_commands: default_init_commands(),
        }
    }
}

impl LinkConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> LinkResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LinkError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> LinkResult<Self> {
        toml::from_str(content).map_err(|e| LinkError::InvalidConfig(e.to_string()))
    }

    /// Apply `OBD_HOST` / `OBD_PORT` if set
    pub fn apply_env(&mut self) -> LinkResult<()> {
        self.apply_overrides(std::env::var(ENV_HOST).ok(), std::env::var(ENV_PORT).ok())
    }

    fn apply_overrides(&mut self, host: Option<String>, port: Option<String>) -> LinkResult<()> {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.host = host.trim().to_string();
        }
        if let Some(port) = port {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| LinkError::InvalidConfig(format!("{}={} is not a port", ENV_PORT, port)))?;
        }
        Ok(())
    }

    /// `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve the channel selection into batch plans
    ///
    /// Unknown identifiers are rejected here, once, rather than per poll.
    pub fn build_plans(&self) -> LinkResult<PollPlans> {
        let fast = resolve_all(&self.channels.fast)?;
        let slow = resolve_all(&self.channels.slow)?;
        let build = |channels: &[ChannelId]| -> LinkResult<Vec<BatchPlan>> {
            if channels.is_empty() {
                return Ok(Vec::new());
            }
            if self.channels.split_batches {
                Ok(BatchPlan::split_within_budget(channels)?)
            } else {
                Ok(vec![BatchPlan::new(channels.to_vec())?])
            }
        };
        let plans = PollPlans::new(build(&fast)?, build(&slow)?);
        if plans.is_empty() {
            return Err(LinkError::InvalidConfig("no channels selected".into()));
        }
        Ok(plans)
    }
}

// =============================================================================
// Timing Configuration
// =============================================================================

/// Timeouts and cadences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Bound on a single TCP connect attempt (ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Bound on waiting for one prompt-terminated reply (ms)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Fixed delay between reconnect attempts (ms)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Pause between polling cycles (ms)
    #[serde(default = "default_cycle_delay_ms")]
    pub cycle_delay_ms: u64,

    /// Slow batch runs every Nth cycle
    #[serde(default = "default_slow_every")]
    pub slow_every: u32,
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_read_timeout_ms() -> u64 {
    2000
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_cycle_delay_ms() -> u64 {
    20
}

fn default_slow_every() -> u32 {
    10
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            cycle_delay_ms: default_cycle_delay_ms(),
            slow_every: default_slow_every(),
        }
    }
}

impl TimingConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }
}

// =============================================================================
// Channel Configuration
// =============================================================================

/// Channels of interest, split by cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Polled every cycle
    #[serde(default = "default_fast")]
    pub fast: Vec<String>,

    /// Polled every `slow_every` cycles
    #[serde(default = "default_slow")]
    pub slow: Vec<String>,

    /// Split each cadence into single-frame batches
    #[serde(default = "default_split_batches")]
    pub split_batches: bool,
}

fn default_fast() -> Vec<String> {
    ["RPM", "BOOST", "TIMING", "THROTTLE", "STFT"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_slow() -> Vec<String> {
    ["IAT", "COOLANT_TEMP", "OIL_TEMP", "LTFT", "VOLTAGE", "LOAD", "AFR"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_split_batches() -> bool {
    true
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            fast: default_fast(),
            slow: default_slow(),
            split_batches: default_split_batches(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.endpoint(), "192.168.0.10:35000");
        assert_eq!(config.timing.slow_every, 10);
        assert_eq!(config.timing.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.init_commands.first().map(String::as_str), Some("ATZ"));
        assert_eq!(config.init_commands.last().map(String::as_str), Some("0100"));
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = LinkConfig::from_toml("").unwrap();
        assert_eq!(config.port, 35000);
        assert_eq!(config.channels.fast, default_fast());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
host = "127.0.0.1"
port = 35001

[timing]
slow_every = 5

[channels]
fast = ["RPM", "BOOST"]
slow = ["COOLANT_TEMP"]
"#
        )
        .unwrap();

        let config = LinkConfig::load(file.path()).unwrap();
        assert_eq!(config.endpoint(), "127.0.0.1:35001");
        assert_eq!(config.timing.slow_every, 5);
        assert_eq!(config.timing.read_timeout_ms, 2000);
        assert_eq!(config.channels.fast, vec!["RPM", "BOOST"]);
    }

    #[test]
    fn test_overrides() {
        let mut config = LinkConfig::default();
        config
            .apply_overrides(Some("10.0.0.5".into()), Some("35010".into()))
            .unwrap();
        assert_eq!(config.endpoint(), "10.0.0.5:35010");

        assert!(config.apply_overrides(None, Some("port".into())).is_err());
    }

    #[test]
    fn test_build_plans_splits_defaults() {
        let plans = LinkConfig::default().build_plans().unwrap();
        assert_eq!(plans.fast.len(), 2);
        assert_eq!(plans.fast[0].request(), "010C0B");
        assert!(plans.warnings().is_empty());
    }

    #[test]
    fn test_build_plans_unsplit_warns() {
        let mut config = LinkConfig::default();
        config.channels.split_batches = false;
        let plans = config.build_plans().unwrap();
        assert_eq!(plans.fast.len(), 1);
        assert_eq!(plans.slow.len(), 1);
        assert_eq!(plans.warnings().len(), 2);
    }

    #[test]
    fn test_build_plans_rejects_unknown_channel() {
        let mut config = LinkConfig::default();
        config.channels.fast.push("WARP_CORE".into());
        assert!(matches!(config.build_plans(), Err(LinkError::InvalidConfig(_))));

        config.channels.fast.clear();
        config.channels.slow.clear();
        assert!(config.build_plans().is_err());
    }
}
