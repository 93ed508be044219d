//! # Pulselink
//!
//! Real-time bidirectional UDP peer with link-health monitoring and a
//! latency percentile dashboard.
//!
//! Pulselink exchanges CRC-framed packets with a single remote peer on a
//! fixed cadence, watches the peer's lifesign counter and inter-arrival
//! timing to classify the link as healthy, unstable, or lost, and records
//! nanosecond latency samples into lock-free ring stores whose percentile
//! snapshots feed a pinned terminal dashboard.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Main Thread (epoll readiness loop)             │
//! │   TX tick (100ms) │ health tick (200ms) │ stats tick (250ms)    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                     UdpRuntime (thread manager)                 │
//! │      ┌──────────────┐    SPSC rings    ┌──────────────┐         │
//! │      │  RX worker   │                  │  TX worker   │         │
//! │      │ (core-pinned,│                  │ (core-pinned,│         │
//! │      │  SCHED_FIFO) │                  │  SCHED_FIFO) │         │
//! │      └──────────────┘                  └──────────────┘         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │          Connected UDP socket (blocking, recv timeout)          │
//! └─────────────────────────────────────────────────────────────────┘

#![warn(clippy::all, clippy::pedantic)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]  // Intentional wire-width narrowing
#![allow(clippy::cast_precision_loss)]       // Acceptable for stats
#![allow(clippy::cast_sign_loss)]            // Latency values are non-negative
#![allow(clippy::unreadable_literal)]        // Numeric literals are clear
#![allow(clippy::doc_markdown)]              // ASCII diagrams in docs

pub mod cli;
pub mod config;
pub mod error;
pub mod protocol;
pub mod runtime;
pub mod sched;
pub mod signals;
pub mod stats;
pub mod transport;
pub mod ui;

pub use config::Config;
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::protocol::{Frame, LinkMonitor, LinkStatus, RxPacket, TxPacket};
    pub use crate::runtime::{RuntimeConfig, RxHandler, UdpRuntime};
    pub use crate::stats::{LatencyReport, LatencySampler};
    pub use crate::transport::UdpEndpoint;
}
