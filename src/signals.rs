//! Graceful-shutdown signal handling.
//!
//! A process-wide facility installed once: `SIGINT` and `SIGTERM` are
//! routed to a single atomic flag through `signal_hook`, whose handler is
//! one async-signal-safe atomic store and nothing else. Registered
//! on-shutdown callbacks run on the main thread the first time the flag is
//! observed, never in signal context.
//!
//! Worker threads block both signals so that delivery always lands on the
//! main thread, where it interrupts the blocking `epoll_wait` and gets the
//! readiness loop to re-check the flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow, Signal};
use parking_lot::Mutex;
use tracing::info;

use crate::error::Result;

type ShutdownCallback = Box<dyn FnOnce() + Send>;

/// Process-wide shutdown flag with deferred callbacks.
#[derive(Clone)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
    callbacks: Arc<Mutex<Vec<ShutdownCallback>>>,
}

impl ShutdownFlag {
    /// Install handlers for `SIGINT` and `SIGTERM`.
    pub fn install() -> Result<Self> {
        let flag = Arc::new(AtomicBool::new(false));

        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&flag))?;
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&flag))?;

        info!("signal handler installed (press Ctrl+C to stop)");

        Ok(Self {
            flag,
            callbacks: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Create an uninstalled flag (tests, embedding).
    pub fn manual() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            callbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Request shutdown programmatically.
    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Shared handle to the raw flag, for blocking loops.
    pub fn as_atomic(&self) -> &AtomicBool {
        &self.flag
    }

    /// Register a callback to run once shutdown is first observed.
    pub fn on_shutdown(&self, callback: impl FnOnce() + Send + 'static) {
        self.callbacks.lock().push(Box::new(callback));
    }

    /// Run and drain the registered callbacks.
    ///
    /// Called by the main thread after the readiness loop exits; calling
    /// it again is a no-op.
    pub fn run_callbacks(&self) {
        let drained = std::mem::take(&mut *self.callbacks.lock());
        for callback in drained {
            callback();
        }
    }
}

/// Block `SIGINT`/`SIGTERM` on the calling thread.
///
/// Workers call this at startup so signal delivery stays on main.
pub fn mask_shutdown_signals() -> Result<()> {
    let mut set = SigSet::empty();
    set.add(Signal::SIGINT);
    set.add(Signal::SIGTERM);
    pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&set), None)
        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_flag() {
        let flag = ShutdownFlag::manual();
        assert!(!flag.is_set());
        flag.set();
        assert!(flag.is_set());
    }

    #[test]
    fn test_callbacks_run_once() {
        use std::sync::atomic::AtomicU32;

        let flag = ShutdownFlag::manual();
        let ran = Arc::new(AtomicU32::new(0));

        let ran_cb = Arc::clone(&ran);
        flag.on_shutdown(move || {
            ran_cb.fetch_add(1, Ordering::SeqCst);
        });

        flag.set();
        flag.run_callbacks();
        flag.run_callbacks();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mask_is_per_thread() {
        std::thread::spawn(|| {
            mask_shutdown_signals().expect("mask should succeed");
        })
        .join()
        .unwrap();
    }
}
