//! Wrap-around latency sample ring with on-demand percentile computation.
//!
//! `record` is O(1): one relaxed sample store, one release index publish,
//! one relaxed count bump. That keeps it safe on the hot path of a single
//! producer thread. `snapshot` copies the live window, sorts it, and
//! computes percentiles; it runs on the consumer side and never blocks the
//! producer.
//!
//! A snapshot taken while the producer is writing may miss or double-see
//! the last one or two in-flight samples at the tail boundary; each sample
//! value itself is read whole (the slots are atomic words). That is
//! acceptable for latency reporting, which is advisory.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// Default sample capacity: ~2.7 hours of samples at a 10 Hz tick.
pub const DEFAULT_SAMPLE_CAPACITY: usize = 100_000;

/// Lock-free single-producer sample store.
pub struct LatencySampler {
    samples: Box<[AtomicU64]>,
    write_idx: CachePadded<AtomicUsize>,
    total: CachePadded<AtomicU64>,
}

impl LatencySampler {
    /// Create a sampler with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SAMPLE_CAPACITY)
    }

    /// Create a sampler retaining the most recent `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "sampler needs at least one slot");
        let samples = (0..capacity)
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            samples,
            write_idx: CachePadded::new(AtomicUsize::new(0)),
            total: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Record one latency sample in nanoseconds.
    pub fn record(&self, latency_ns: u64) {
        let idx = self.write_idx.load(Ordering::Relaxed);
        self.samples[idx].store(latency_ns, Ordering::Relaxed);
        self.write_idx
            .store((idx + 1) % self.samples.len(), Ordering::Release);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the span between two instants.
    pub fn record_span(&self, start: Instant, end: Instant) {
        let ns = end.saturating_duration_since(start).as_nanos();
        self.record(ns.min(u128::from(u64::MAX)) as u64);
    }

    /// Start a scoped measurement recorded on drop.
    pub fn start_measurement(&self) -> ScopedSample<'_> {
        ScopedSample {
            sampler: self,
            start: Instant::now(),
        }
    }

    /// Total samples recorded, including overwritten ones.
    pub fn sample_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Discard all samples.
    pub fn reset(&self) {
        self.write_idx.store(0, Ordering::Release);
        self.total.store(0, Ordering::Release);
    }

    /// Snapshot the live window and compute aggregate statistics.
    pub fn snapshot(&self) -> LatencyReport {
        let total = self.total.load(Ordering::Acquire);
        if total == 0 {
            return LatencyReport::default();
        }

        let capacity = self.samples.len();
        let n = usize::try_from(total).map_or(capacity, |t| t.min(capacity));

        // Copy in insertion order: [0, n) before the ring wraps, otherwise
        // [write_idx, capacity) ++ [0, write_idx).
        let mut sorted = Vec::with_capacity(n);
        if total <= capacity as u64 {
            for slot in &self.samples[..n] {
                sorted.push(slot.load(Ordering::Relaxed));
            }
        } else {
            let write = self.write_idx.load(Ordering::Acquire);
            for slot in &self.samples[write..] {
                sorted.push(slot.load(Ordering::Relaxed));
            }
            for slot in &self.samples[..write] {
                sorted.push(slot.load(Ordering::Relaxed));
            }
        }

        sorted.sort_unstable();

        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for &ns in &sorted {
            let us = ns as f64 / 1000.0;
            sum += us;
            sum_sq += us * us;
        }

        let count_f = sorted.len() as f64;
        let mean_us = sum / count_f;
        let stdev_us = if sorted.len() > 1 {
            let variance = (sum_sq - (sum * sum / count_f)) / (count_f - 1.0);
            variance.max(0.0).sqrt()
        } else {
            0.0
        };

        LatencyReport {
            count: total,
            min_us: sorted[0] as f64 / 1000.0,
            max_us: sorted[sorted.len() - 1] as f64 / 1000.0,
            mean_us,
            stdev_us,
            p50_us: percentile(&sorted, 50.0),
            p95_us: percentile(&sorted, 95.0),
            p99_us: percentile(&sorted, 99.0),
            p999_us: percentile(&sorted, 99.9),
            p9999_us: percentile(&sorted, 99.99),
        }
    }
}

impl Default for LatencySampler {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII measurement guard; records elapsed time on drop.
pub struct ScopedSample<'a> {
    sampler: &'a LatencySampler,
    start: Instant,
}

impl Drop for ScopedSample<'_> {
    fn drop(&mut self) {
        self.sampler.record_span(self.start, Instant::now());
    }
}

/// Nearest-rank percentile over ascending `sorted` data, reported in µs.
fn percentile(sorted: &[u64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0) * sorted.len() as f64;
    let idx = (rank.ceil() as usize).clamp(1, sorted.len());
    sorted[idx - 1] as f64 / 1000.0
}

/// Aggregate statistics computed from one snapshot, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyReport {
    /// Total samples recorded (including overwritten).
    pub count: u64,
    pub min_us: f64,
    pub max_us: f64,
    pub mean_us: f64,
    pub stdev_us: f64,
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub p999_us: f64,
    pub p9999_us: f64,
}

impl LatencyReport {
    /// Whether any samples were recorded.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Render a multi-line summary table for shutdown output.
    pub fn format_summary(&self, label: &str) -> String {
        if self.is_empty() {
            return format!("[{label}] no samples collected\n");
        }
        format!(
            "┌──────────────────────────────────────────────┐\n\
             │ {label:<44} │\n\
             ├──────────────────────────────────────────────┤\n\
             │ Samples : {:<34} │\n\
             │ Min     : {:>12.2} us                      │\n\
             │ Max     : {:>12.2} us                      │\n\
             │ Mean    : {:>12.2} us                      │\n\
             │ StdDev  : {:>12.2} us                      │\n\
             │ p50     : {:>12.2} us                      │\n\
             │ p95     : {:>12.2} us                      │\n\
             │ p99     : {:>12.2} us                      │\n\
             │ p99.9   : {:>12.2} us                      │\n\
             │ p99.99  : {:>12.2} us                      │\n\
             └──────────────────────────────────────────────┘\n",
            self.count,
            self.min_us,
            self.max_us,
            self.mean_us,
            self.stdev_us,
            self.p50_us,
            self.p95_us,
            self.p99_us,
            self.p999_us,
            self.p9999_us,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_empty_snapshot_is_zero() {
        let sampler = LatencySampler::with_capacity(16);
        let report = sampler.snapshot();
        assert!(report.is_empty());
        assert_eq!(report.p50_us, 0.0);
    }

    #[test]
    fn test_known_distribution_percentiles() {
        let sampler = LatencySampler::new();
        // 1us, 2us, ..., 100_000us stored as nanoseconds.
        for us in 1..=100_000u64 {
            sampler.record(us * 1000);
        }

        let report = sampler.snapshot();
        assert_eq!(report.count, 100_000);
        assert_eq!(report.min_us, 1.0);
        assert_eq!(report.max_us, 100_000.0);
        assert_eq!(report.p50_us, 50_000.0);
        assert_eq!(report.p95_us, 95_000.0);
        assert_eq!(report.p99_us, 99_000.0);
        assert_eq!(report.p999_us, 99_900.0);
        assert_eq!(report.p9999_us, 99_990.0);
        assert!((report.mean_us - 50_000.5).abs() < 1e-6);
    }

    #[test]
    fn test_single_sample() {
        let sampler = LatencySampler::with_capacity(8);
        sampler.record(42_000);
        let report = sampler.snapshot();
        assert_eq!(report.count, 1);
        assert_eq!(report.min_us, 42.0);
        assert_eq!(report.max_us, 42.0);
        assert_eq!(report.p50_us, 42.0);
        assert_eq!(report.p9999_us, 42.0);
        assert_eq!(report.stdev_us, 0.0);
    }

    #[test]
    fn test_wrap_keeps_last_capacity_samples() {
        let capacity = 1000;
        let sampler = LatencySampler::with_capacity(capacity);

        // Insert capacity + k samples; only the last `capacity` survive.
        let k = 345u64;
        let total = capacity as u64 + k;
        for i in 1..=total {
            sampler.record(i * 1000);
        }

        let report = sampler.snapshot();
        assert_eq!(report.count, total);
        // Oldest surviving sample is k+1 us, newest is total us.
        assert_eq!(report.min_us, (k + 1) as f64);
        assert_eq!(report.max_us, total as f64);
    }

    #[test]
    fn test_percentile_monotonicity_random_data() {
        let mut rng = StdRng::seed_from_u64(0x70756C7365);
        let sampler = LatencySampler::with_capacity(10_000);
        for _ in 0..25_000 {
            sampler.record(rng.gen_range(100..50_000_000));
        }

        let r = sampler.snapshot();
        assert!(r.min_us <= r.p50_us);
        assert!(r.p50_us <= r.p95_us);
        assert!(r.p95_us <= r.p99_us);
        assert!(r.p99_us <= r.p999_us);
        assert!(r.p999_us <= r.p9999_us);
        assert!(r.p9999_us <= r.max_us);
    }

    #[test]
    fn test_stdev_on_known_data() {
        let sampler = LatencySampler::with_capacity(8);
        // 2us, 4us, 4us, 4us, 5us, 5us, 7us, 9us: stdev = 2.138... (n-1)
        for us in [2u64, 4, 4, 4, 5, 5, 7, 9] {
            sampler.record(us * 1000);
        }
        let r = sampler.snapshot();
        assert!((r.mean_us - 5.0).abs() < 1e-9);
        assert!((r.stdev_us - 2.138089935).abs() < 1e-6);
    }

    #[test]
    fn test_reset() {
        let sampler = LatencySampler::with_capacity(8);
        sampler.record(1000);
        sampler.reset();
        assert!(sampler.snapshot().is_empty());
        assert_eq!(sampler.sample_count(), 0);
    }

    #[test]
    fn test_scoped_sample_records() {
        let sampler = LatencySampler::with_capacity(8);
        {
            let _guard = sampler.start_measurement();
        }
        assert_eq!(sampler.sample_count(), 1);
    }

    #[test]
    fn test_format_summary_contains_percentiles() {
        let sampler = LatencySampler::with_capacity(8);
        sampler.record(1500);
        let text = sampler.snapshot().format_summary("TX Send Latency");
        assert!(text.contains("TX Send Latency"));
        assert!(text.contains("p99.99"));
    }
}
