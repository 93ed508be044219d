//! Link-health monitoring.
//!
//! Two independent signals are tracked per peer:
//!
//! - **Liveness**: the peer's lifesign counter must keep changing. If it
//!   freezes for `comm_timeout` the link is declared lost. A lifesign that
//!   wraps back to an identical value across two consecutive receives
//!   momentarily looks frozen; a correct peer changes its lifesign every
//!   frame, so this window is a single receive interval.
//! - **Stability**: the inter-arrival interval must stay inside
//!   `[expected − tolerance, expected + tolerance]`. Out-of-tolerance
//!   intervals increment a saturating streak counter and flag the link
//!   unstable until an in-tolerance interval clears it.
//!
//! Status is derived on query, not stored: `Lost` dominates, then
//! `Unstable`, else `Healthy`.

use std::time::{Duration, Instant};

use crate::error::LinkError;

/// Default timeout before a frozen lifesign means loss of communication.
pub const DEFAULT_COMM_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default expected receive interval.
pub const DEFAULT_EXPECTED_INTERVAL: Duration = Duration::from_millis(100);

/// Default allowed deviation from the expected interval.
pub const DEFAULT_INTERVAL_TOLERANCE: Duration = Duration::from_micros(5000);

/// Derived link status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Lifesign changing, interval inside tolerance.
    Healthy,
    /// Lifesign changing, interval outside tolerance.
    Unstable,
    /// Lifesign frozen past the communication timeout.
    Lost,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Healthy => write!(f, "healthy"),
            LinkStatus::Unstable => write!(f, "unstable"),
            LinkStatus::Lost => write!(f, "lost"),
        }
    }
}

/// Lifesign and interval tracker for one receive direction.
///
/// Mutated only from the RX path after a frame passes validation; other
/// threads may read derived status through a shared lock and tolerate
/// transient inconsistency (the dashboard is advisory).
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    last_rx_lifesign: u16,
    prev_rx_lifesign: u16,
    last_change: Instant,
    last_recv: Instant,
    comm_timeout: Duration,
    expected_interval: Duration,
    tolerance: Duration,
    last_interval_us: u32,
    unstable_streak: u16,
    unstable: bool,
    error: Option<LinkError>,
}

impl LinkMonitor {
    /// Create a monitor with default timeout, interval, and tolerance.
    ///
    /// Both instants seed to the creation time, so the very first receive
    /// interval measures time since construction and is typically out of
    /// tolerance. That first-frame classification is documented behavior.
    pub fn new() -> Self {
        Self::with_settings(
            DEFAULT_COMM_TIMEOUT,
            DEFAULT_EXPECTED_INTERVAL,
            DEFAULT_INTERVAL_TOLERANCE,
        )
    }

    /// Create a monitor with explicit settings.
    pub fn with_settings(
        comm_timeout: Duration,
        expected_interval: Duration,
        tolerance: Duration,
    ) -> Self {
        let now = Instant::now();
        Self {
            last_rx_lifesign: 0,
            prev_rx_lifesign: 0,
            last_change: now,
            last_recv: now,
            comm_timeout,
            expected_interval,
            tolerance,
            last_interval_us: 0,
            unstable_streak: 0,
            unstable: false,
            error: None,
        }
    }

    /// Record a received lifesign, stamping the current time.
    pub fn observe(&mut self, lifesign: u16) {
        self.observe_at(lifesign, Instant::now());
    }

    /// Record a received lifesign at an explicit instant.
    ///
    /// Updates the interval stability classification first, then the
    /// lifesign change tracking.
    pub fn observe_at(&mut self, lifesign: u16, now: Instant) {
        let interval = now.saturating_duration_since(self.last_recv);
        self.last_interval_us = interval.as_micros().min(u128::from(u32::MAX)) as u32;
        self.last_recv = now;

        let lower = self.expected_interval.saturating_sub(self.tolerance);
        let upper = self.expected_interval + self.tolerance;

        if interval < lower || interval > upper {
            self.unstable_streak = self.unstable_streak.saturating_add(1);
            self.unstable = true;
            if self.error.is_none() {
                self.error = Some(LinkError::UnstableCommunication);
            }
        } else {
            self.unstable_streak = 0;
            self.unstable = false;
            if self.error == Some(LinkError::UnstableCommunication) {
                self.error = None;
            }
        }

        self.prev_rx_lifesign = self.last_rx_lifesign;
        self.last_rx_lifesign = lifesign;

        if self.last_rx_lifesign != self.prev_rx_lifesign {
            self.last_change = now;
            if self.error == Some(LinkError::LossOfCommunication) {
                self.error = None;
            }
        }
    }

    /// Check whether the lifesign has been frozen past the timeout.
    pub fn is_lost(&self) -> bool {
        self.is_lost_at(Instant::now())
    }

    /// Loss check at an explicit instant.
    pub fn is_lost_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_change) >= self.comm_timeout
    }

    /// Check whether the last interval was outside tolerance.
    pub fn is_unstable(&self) -> bool {
        self.unstable
    }

    /// Derive the current link status.
    pub fn status(&self) -> LinkStatus {
        self.status_at(Instant::now())
    }

    /// Derive the link status at an explicit instant.
    pub fn status_at(&self, now: Instant) -> LinkStatus {
        if self.is_lost_at(now) {
            LinkStatus::Lost
        } else if self.unstable {
            LinkStatus::Unstable
        } else {
            LinkStatus::Healthy
        }
    }

    /// Re-initialize the monitor (e.g. on reconnect).
    ///
    /// Instants re-seed to now; unstable state and any link error clear.
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    /// Reset at an explicit instant.
    pub fn reset_at(&mut self, now: Instant) {
        self.last_rx_lifesign = 0;
        self.prev_rx_lifesign = 0;
        self.last_change = now;
        self.last_recv = now;
        self.last_interval_us = 0;
        self.unstable_streak = 0;
        self.unstable = false;
        if matches!(
            self.error,
            Some(LinkError::LossOfCommunication | LinkError::UnstableCommunication)
        ) {
            self.error = None;
        }
    }

    /// Get the most recent receive interval in microseconds.
    pub fn last_interval_us(&self) -> u32 {
        self.last_interval_us
    }

    /// Get the consecutive out-of-tolerance interval count.
    pub fn unstable_streak(&self) -> u16 {
        self.unstable_streak
    }

    /// Get the last lifesign received.
    pub fn last_lifesign(&self) -> u16 {
        self.last_rx_lifesign
    }

    /// Time elapsed since the lifesign last changed.
    pub fn time_since_change(&self) -> Duration {
        self.time_since_change_at(Instant::now())
    }

    /// Elapsed-since-change at an explicit instant.
    pub fn time_since_change_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_change)
    }

    /// Get the configured communication timeout.
    pub fn comm_timeout(&self) -> Duration {
        self.comm_timeout
    }

    /// Get the configured expected interval.
    pub fn expected_interval(&self) -> Duration {
        self.expected_interval
    }

    /// Get the configured interval tolerance.
    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Get the current link error, if any.
    pub fn error(&self) -> Option<LinkError> {
        self.error
    }
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor_started_at(t0: Instant) -> LinkMonitor {
        let mut m = LinkMonitor::with_settings(
            Duration::from_millis(1000),
            Duration::from_millis(100),
            Duration::from_micros(5000),
        );
        m.reset_at(t0);
        m
    }

    #[test]
    fn test_interval_classification() {
        let t0 = Instant::now();
        let mut m = monitor_started_at(t0);

        // t=0: first frame, interval 0 us, below the lower bound.
        m.observe_at(1, t0);
        assert!(m.is_unstable());
        assert_eq!(m.unstable_streak(), 1);

        // t=100ms, 200ms: exactly on cadence.
        m.observe_at(2, t0 + Duration::from_millis(100));
        assert!(!m.is_unstable());
        assert_eq!(m.unstable_streak(), 0);
        assert_eq!(m.error(), None);
        assert_eq!(m.last_interval_us(), 100_000);

        m.observe_at(3, t0 + Duration::from_millis(200));
        assert!(!m.is_unstable());

        // t=350ms: 150ms gap, out of tolerance.
        m.observe_at(4, t0 + Duration::from_millis(350));
        assert!(m.is_unstable());
        assert_eq!(m.unstable_streak(), 1);
        assert_eq!(m.error(), Some(LinkError::UnstableCommunication));
        assert_eq!(m.last_interval_us(), 150_000);

        // Back in tolerance: streak resets and the error clears.
        m.observe_at(5, t0 + Duration::from_millis(450));
        assert!(!m.is_unstable());
        assert_eq!(m.unstable_streak(), 0);
        assert_eq!(m.error(), None);
    }

    #[test]
    fn test_tolerance_boundaries_inclusive() {
        let t0 = Instant::now();
        let mut m = monitor_started_at(t0);
        m.observe_at(1, t0 + Duration::from_millis(100));

        // 95ms = lower bound, in tolerance.
        m.observe_at(2, t0 + Duration::from_micros(195_000));
        assert!(!m.is_unstable());

        // 105ms = upper bound, in tolerance.
        m.observe_at(3, t0 + Duration::from_micros(300_000));
        assert!(!m.is_unstable());

        // 105.001ms: out.
        m.observe_at(4, t0 + Duration::from_micros(405_001));
        assert!(m.is_unstable());
    }

    #[test]
    fn test_loss_declared_after_timeout() {
        let t0 = Instant::now();
        let mut m = monitor_started_at(t0);

        // Lifesign changes at t=0.
        m.observe_at(1, t0);
        assert!(!m.is_lost_at(t0 + Duration::from_millis(999)));
        assert!(m.is_lost_at(t0 + Duration::from_millis(1000)));
        assert!(m.is_lost_at(t0 + Duration::from_millis(1100)));
    }

    #[test]
    fn test_frozen_lifesign_counts_as_loss() {
        let t0 = Instant::now();
        let mut m = monitor_started_at(t0);

        m.observe_at(7, t0);
        // Frames keep arriving but the lifesign never changes.
        for i in 1..=12u64 {
            m.observe_at(7, t0 + Duration::from_millis(100 * i));
        }
        assert!(m.is_lost_at(t0 + Duration::from_millis(1200)));

        // A change revives the link.
        m.observe_at(8, t0 + Duration::from_millis(1300));
        assert!(!m.is_lost_at(t0 + Duration::from_millis(1400)));
    }

    #[test]
    fn test_status_derivation() {
        let t0 = Instant::now();
        let mut m = monitor_started_at(t0);

        m.observe_at(1, t0 + Duration::from_millis(100));
        assert_eq!(m.status_at(t0 + Duration::from_millis(150)), LinkStatus::Healthy);

        m.observe_at(2, t0 + Duration::from_millis(350));
        assert_eq!(m.status_at(t0 + Duration::from_millis(400)), LinkStatus::Unstable);

        // Lost dominates unstable.
        assert_eq!(
            m.status_at(t0 + Duration::from_millis(1400)),
            LinkStatus::Lost
        );
    }

    #[test]
    fn test_streak_saturates() {
        let t0 = Instant::now();
        let mut m = monitor_started_at(t0);

        let mut now = t0;
        for i in 0..70_000u32 {
            // 200ms cadence keeps every interval out of tolerance.
            now += Duration::from_millis(200);
            m.observe_at((i % 65536) as u16, now);
        }
        assert_eq!(m.unstable_streak(), u16::MAX);
    }

    #[test]
    fn test_reset_clears_state() {
        let t0 = Instant::now();
        let mut m = monitor_started_at(t0);

        m.observe_at(1, t0 + Duration::from_millis(350));
        assert!(m.is_unstable());

        let t1 = t0 + Duration::from_millis(400);
        m.reset_at(t1);
        assert!(!m.is_unstable());
        assert_eq!(m.unstable_streak(), 0);
        assert_eq!(m.error(), None);
        assert_eq!(m.last_lifesign(), 0);
        assert!(!m.is_lost_at(t1 + Duration::from_millis(999)));
    }
}
