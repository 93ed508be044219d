//! Configuration management for Pulselink.
//!
//! Everything is read once at startup: a TOML file (optional), overridden
//! by command-line flags. There is no runtime reconfiguration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// TX tick interval.
pub const TX_INTERVAL: Duration = Duration::from_millis(100);

/// Link-health check interval.
pub const HEALTH_INTERVAL: Duration = Duration::from_millis(200);

/// Dashboard statistics refresh interval.
pub const STATS_INTERVAL: Duration = Duration::from_millis(250);

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Socket configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Worker thread configuration.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Link-health monitor configuration.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Latency statistics configuration.
    #[serde(default)]
    pub stats: StatsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;

        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if !(1..=99).contains(&self.runtime.rx_priority)
            || !(1..=99).contains(&self.runtime.tx_priority)
        {
            return Err(Error::Config(
                "realtime priorities must be within 1-99".into(),
            ));
        }

        if self.monitor.expected_interval_ms == 0 {
            return Err(Error::Config("expected interval must be non-zero".into()));
        }

        if self.stats.sampler_capacity == 0 {
            return Err(Error::Config("sampler capacity must be non-zero".into()));
        }

        Ok(())
    }
}

/// Socket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Kernel receive buffer size in bytes.
    pub recv_buffer_size: usize,
    /// Kernel send buffer size in bytes.
    pub send_buffer_size: usize,
    /// Blocking receive timeout in milliseconds.
    pub recv_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: 2 * 1024 * 1024,
            send_buffer_size: 1024 * 1024,
            recv_timeout_ms: 100,
        }
    }
}

impl TransportConfig {
    /// Convert to the transport layer's socket options.
    pub fn socket_config(&self) -> crate::transport::SocketConfig {
        crate::transport::SocketConfig {
            send_buffer_size: self.send_buffer_size,
            recv_buffer_size: self.recv_buffer_size,
            reuse_addr: true,
            recv_timeout: Duration::from_millis(self.recv_timeout_ms),
        }
    }
}

/// Worker thread configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Core to pin the RX worker to.
    pub rx_core: Option<usize>,
    /// Core to pin the TX worker to.
    pub tx_core: Option<usize>,
    /// RX worker SCHED_FIFO priority (1-99).
    pub rx_priority: u8,
    /// TX worker SCHED_FIFO priority (1-99).
    pub tx_priority: u8,
    /// Whether to attempt SCHED_FIFO at all.
    pub realtime: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            rx_core: None,
            tx_core: None,
            rx_priority: crate::runtime::DEFAULT_RX_PRIORITY,
            tx_priority: crate::runtime::DEFAULT_TX_PRIORITY,
            realtime: true,
        }
    }
}

impl RuntimeConfig {
    /// Convert to the runtime layer's worker options.
    pub fn worker_config(&self, sampler_capacity: usize) -> crate::runtime::RuntimeConfig {
        crate::runtime::RuntimeConfig {
            rx_core: self.rx_core,
            tx_core: self.tx_core,
            rx_priority: self.rx_priority,
            tx_priority: self.tx_priority,
            realtime: self.realtime,
            sampler_capacity,
        }
    }
}

/// Link-health monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Lifesign freeze timeout in milliseconds.
    pub comm_timeout_ms: u64,
    /// Expected receive interval in milliseconds.
    pub expected_interval_ms: u64,
    /// Allowed interval deviation in microseconds.
    pub tolerance_us: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            comm_timeout_ms: 1000,
            expected_interval_ms: 100,
            tolerance_us: 5000,
        }
    }
}

impl MonitorConfig {
    /// Build a monitor from these settings.
    pub fn build(&self) -> crate::protocol::LinkMonitor {
        crate::protocol::LinkMonitor::with_settings(
            Duration::from_millis(self.comm_timeout_ms),
            Duration::from_millis(self.expected_interval_ms),
            Duration::from_micros(self.tolerance_us),
        )
    }
}

/// Latency statistics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Samples retained per latency ring.
    pub sampler_capacity: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            sampler_capacity: crate::stats::DEFAULT_SAMPLE_CAPACITY,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error).
    pub level: String,
    /// Whether to emit ANSI color.
    pub color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            color: true,
        }
    }
}

/// Initialize the global tracing subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(config.color).with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_priority_bounds_rejected() {
        let mut config = Config::default();
        config.runtime.rx_priority = 0;
        assert!(config.validate().is_err());

        config.runtime.rx_priority = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.monitor.comm_timeout_ms, 1000);
        assert_eq!(parsed.transport.recv_buffer_size, 2 * 1024 * 1024);
        assert_eq!(parsed.runtime.rx_priority, 80);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [monitor]
            comm_timeout_ms = 2500
            "#,
        )
        .unwrap();
        assert_eq!(parsed.monitor.comm_timeout_ms, 2500);
        assert_eq!(parsed.monitor.expected_interval_ms, 100);
        assert_eq!(parsed.runtime.tx_priority, 70);
    }
}
