//! Periodic tick scheduling.
//!
//! Kernel timer file descriptors (`timerfd`) multiplexed through an epoll
//! readiness loop. Each registered timer fires independently at its own
//! interval and dispatches a callback on the main thread; the loop blocks
//! in `epoll_wait` between expirations, so an idle peer burns no CPU.
//!
//! Signal delivery on the main thread interrupts `epoll_wait` with `EINTR`;
//! the loop treats that as a wakeup and re-checks the shutdown flag, which
//! is how Ctrl+C terminates a run.

use std::os::fd::{AsFd, AsRawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use tracing::{debug, warn};

use crate::error::{Result, SchedulerError};

/// A periodic monotonic-clock timer backed by a timerfd.
pub struct PeriodicTimer {
    fd: TimerFd,
    interval: Duration,
}

impl PeriodicTimer {
    /// Create a non-blocking periodic timer firing every `interval`.
    pub fn new(interval: Duration) -> Result<Self> {
        let fd = TimerFd::new(ClockId::CLOCK_MONOTONIC, TimerFlags::TFD_NONBLOCK)
            .map_err(|e| SchedulerError::TimerCreate(e.to_string()))?;

        fd.set(
            Expiration::Interval(TimeSpec::from_duration(interval)),
            TimerSetTimeFlags::empty(),
        )
        .map_err(|e| SchedulerError::SetTime(e.to_string()))?;

        debug!(?interval, "periodic timer armed");
        Ok(Self { fd, interval })
    }

    /// Read and return the number of expirations since the last read.
    ///
    /// Must be called when the fd signals readable, or the timer stays
    /// level-triggered forever.
    pub fn acknowledge(&self) -> Result<u64> {
        let mut buf = [0u8; 8];
        // Expiration counts are a fixed 8-byte read on a timerfd.
        let n = unsafe {
            libc::read(
                self.fd.as_fd().as_raw_fd(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
            )
        };
        if n != 8 {
            return Err(SchedulerError::TimerRead(
                std::io::Error::last_os_error().to_string(),
            )
            .into());
        }
        Ok(u64::from_ne_bytes(buf))
    }

    /// The configured firing interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Readiness loop that owns periodic timers and their callbacks.
///
/// The loop runs until the shared shutdown flag is raised, either by the
/// signal handler or by any callback that holds a clone of it.
pub struct EventLoop<'a> {
    epoll: Epoll,
    timers: Vec<(PeriodicTimer, Box<dyn FnMut() + 'a>)>,
}

impl<'a> EventLoop<'a> {
    /// Create an empty readiness loop.
    pub fn new() -> Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::empty())
            .map_err(|e| SchedulerError::EventLoopCreate(e.to_string()))?;
        Ok(Self {
            epoll,
            timers: Vec::new(),
        })
    }

    /// Register a timer; `callback` runs once per readiness event.
    pub fn add_timer(
        &mut self,
        timer: PeriodicTimer,
        callback: impl FnMut() + 'a,
    ) -> Result<()> {
        let slot = self.timers.len() as u64;
        self.epoll
            .add(timer.fd.as_fd(), EpollEvent::new(EpollFlags::EPOLLIN, slot))
            .map_err(|e| SchedulerError::RegisterEvent(e.to_string()))?;
        self.timers.push((timer, Box::new(callback)));
        Ok(())
    }

    /// Run until `shutdown` is observed.
    ///
    /// Blocks in `epoll_wait` between timer expirations. `EINTR` (signal
    /// delivery on this thread) wakes the loop for a shutdown re-check.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        let mut events = [EpollEvent::empty(); 16];

        while !shutdown.load(Ordering::Acquire) {
            let n = match self.epoll.wait(&mut events, EpollTimeout::NONE) {
                Ok(n) => n,
                Err(nix::errno::Errno::EINTR) => continue,
                Err(e) => {
                    warn!("epoll_wait failed: {e}");
                    return Err(SchedulerError::WaitEvent(e.to_string()).into());
                }
            };

            for event in &events[..n] {
                let slot = event.data() as usize;
                if let Some((timer, callback)) = self.timers.get_mut(slot) {
                    // Drain the expiration count before dispatch; a slow
                    // callback coalesces missed ticks into one.
                    if timer.acknowledge().is_ok() {
                        callback();
                    }
                }
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
            }
        }

        debug!("event loop exited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_timer_fires_and_shutdown_stops_loop() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let fired = Arc::new(AtomicU32::new(0));

        let mut event_loop = EventLoop::new().unwrap();
        let timer = PeriodicTimer::new(Duration::from_millis(10)).unwrap();

        // The callback raises the shutdown flag after three ticks; run()
        // must observe it and return.
        let fired_cb = Arc::clone(&fired);
        let shutdown_cb = Arc::clone(&shutdown);
        event_loop
            .add_timer(timer, move || {
                if fired_cb.fetch_add(1, Ordering::Relaxed) + 1 >= 3 {
                    shutdown_cb.store(true, Ordering::Release);
                }
            })
            .unwrap();

        let start = Instant::now();
        event_loop.run(&shutdown).unwrap();

        assert!(fired.load(Ordering::Relaxed) >= 3);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_independent_intervals() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let fast = Arc::new(AtomicU32::new(0));
        let slow = Arc::new(AtomicU32::new(0));

        let mut event_loop = EventLoop::new().unwrap();

        let fast_cb = Arc::clone(&fast);
        event_loop
            .add_timer(PeriodicTimer::new(Duration::from_millis(5)).unwrap(), move || {
                fast_cb.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();

        let slow_cb = Arc::clone(&slow);
        let shutdown_cb = Arc::clone(&shutdown);
        event_loop
            .add_timer(PeriodicTimer::new(Duration::from_millis(25)).unwrap(), move || {
                if slow_cb.fetch_add(1, Ordering::Relaxed) + 1 >= 2 {
                    shutdown_cb.store(true, Ordering::Release);
                }
            })
            .unwrap();

        event_loop.run(&shutdown).unwrap();

        // ~50ms elapsed: the fast timer must have outpaced the slow one.
        assert!(slow.load(Ordering::Relaxed) >= 2);
        assert!(fast.load(Ordering::Relaxed) > slow.load(Ordering::Relaxed));
    }

    #[test]
    fn test_acknowledge_counts_expirations() {
        let timer = PeriodicTimer::new(Duration::from_millis(5)).unwrap();
        std::thread::sleep(Duration::from_millis(40));
        let count = timer.acknowledge().unwrap();
        assert!(count >= 4, "expected several expirations, got {count}");
    }
}
