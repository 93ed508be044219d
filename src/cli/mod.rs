//! Command-line interface for Pulselink.

use std::net::SocketAddrV4;
use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::error::{Error, Result};

/// Pulselink - real-time UDP peer with latency dashboard
#[derive(Parser, Debug)]
#[command(
    name = "pulselink",
    author,
    version,
    about = "Real-time bidirectional UDP peer with link-health monitoring",
    long_about = r#"
Pulselink exchanges CRC-framed packets with a single remote peer on a fixed
100 ms cadence, monitors the peer's lifesign and inter-arrival timing, and
renders TX/RX/interval latency percentiles in a pinned terminal dashboard.

QUICK START (two terminals):
  pulselink --src 127.0.0.1:9000 --dst 127.0.0.1:9001
  pulselink --src 127.0.0.1:9001 --dst 127.0.0.1:9000
"#
)]
pub struct Cli {
    /// Local address to bind, as <addr>:<port> (IPv4)
    #[arg(long)]
    pub src: SocketAddrV4,

    /// Remote peer address, as <addr>:<port> (IPv4)
    #[arg(long)]
    pub dst: SocketAddrV4,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Pin the RX worker to this CPU core
    #[arg(long)]
    pub rx_core: Option<usize>,

    /// Pin the TX worker to this CPU core
    #[arg(long)]
    pub tx_core: Option<usize>,

    /// Disable SCHED_FIFO realtime scheduling for the workers
    #[arg(long)]
    pub no_realtime: bool,

    /// Disable the pinned dashboard (plain scrolling output)
    #[arg(long)]
    pub no_dashboard: bool,
}

impl Cli {
    /// Validate the endpoint tuple beyond what address parsing enforces.
    pub fn validate(&self) -> Result<()> {
        if self.src.port() == 0 || self.dst.port() == 0 {
            return Err(Error::Config("ports must be within 1-65535".into()));
        }
        Ok(())
    }

    /// Resolve the effective configuration: file (if any) plus CLI overrides.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        config.logging.level = self.log_level.clone();
        config.logging.color = !self.no_color;

        if self.rx_core.is_some() {
            config.runtime.rx_core = self.rx_core;
        }
        if self.tx_core.is_some() {
            config.runtime.tx_core = self.tx_core;
        }
        if self.no_realtime {
            config.runtime.realtime = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::parse_from([
            "pulselink",
            "--src",
            "192.168.1.10:9000",
            "--dst",
            "192.168.1.20:9001",
        ]);
        assert_eq!(cli.src.port(), 9000);
        assert_eq!(cli.dst.ip().octets(), [192, 168, 1, 20]);
        cli.validate().unwrap();
    }

    #[test]
    fn test_missing_dst_fails() {
        assert!(Cli::try_parse_from(["pulselink", "--src", "10.0.0.1:9000"]).is_err());
    }

    #[test]
    fn test_malformed_address_fails() {
        assert!(Cli::try_parse_from([
            "pulselink",
            "--src",
            "not-an-address",
            "--dst",
            "10.0.0.2:9001"
        ])
        .is_err());
        // IPv6 is out of scope; the V4-typed field rejects it.
        assert!(Cli::try_parse_from([
            "pulselink",
            "--src",
            "[::1]:9000",
            "--dst",
            "10.0.0.2:9001"
        ])
        .is_err());
    }

    #[test]
    fn test_zero_port_rejected() {
        let cli = Cli::parse_from([
            "pulselink",
            "--src",
            "10.0.0.1:0",
            "--dst",
            "10.0.0.2:9001",
        ]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::parse_from([
            "pulselink",
            "--src",
            "10.0.0.1:9000",
            "--dst",
            "10.0.0.2:9001",
            "--rx-core",
            "2",
            "--tx-core",
            "3",
            "--no-realtime",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.runtime.rx_core, Some(2));
        assert_eq!(config.runtime.tx_core, Some(3));
        assert!(!config.runtime.realtime);
    }
}
