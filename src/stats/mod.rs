//! Latency statistics collection and aggregation.

mod sampler;

pub use sampler::{LatencyReport, LatencySampler, ScopedSample, DEFAULT_SAMPLE_CAPACITY};
