//! RX/TX worker runtime.
//!
//! [`UdpRuntime`] owns one receive worker, one transmit worker, and the two
//! SPSC rings between them and the main thread. The workers share the
//! connected UDP socket, each touching only its own direction, and are
//! optionally pinned to dedicated cores under SCHED_FIFO.
//!
//! Data paths:
//! - TX: main thread encodes → [`UdpRuntime::queue_packet`] → TX ring →
//!   TX worker → `send`. Send duration lands in the TX sampler.
//! - RX: RX worker blocks in `recv` (bounded by the socket timeout) →
//!   inter-arrival interval sampled → raw bytes pushed to the RX ring →
//!   [`RxHandler`] callback runs synchronously on the worker →
//!   receive-to-callback-done duration lands in the RX sampler.
//!
//! Shutdown is cooperative: the `running` flag flips with `Release`, each
//! worker observes it with `Acquire` within one socket timeout (RX) or one
//! 10 µs yield (TX), and `shutdown` joins both.

mod affinity;
mod ring;

pub use ring::{Consumer, Producer, RingBuffer, DEFAULT_CAPACITY, DEFAULT_SLOT_SIZE};

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::error::{Result, RuntimeError};
use crate::signals::mask_shutdown_signals;
use crate::stats::LatencySampler;
use crate::transport::{is_transient, UdpEndpoint};

/// Default RX worker SCHED_FIFO priority.
pub const DEFAULT_RX_PRIORITY: u8 = 80;

/// Default TX worker SCHED_FIFO priority.
pub const DEFAULT_TX_PRIORITY: u8 = 70;

/// TX worker yield while its ring is empty.
const TX_IDLE_SLEEP: Duration = Duration::from_micros(10);

/// Worker placement and scheduling configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Core to pin the RX worker to (`None` = unpinned).
    pub rx_core: Option<usize>,
    /// Core to pin the TX worker to (`None` = unpinned).
    pub tx_core: Option<usize>,
    /// RX worker SCHED_FIFO priority (1-99).
    pub rx_priority: u8,
    /// TX worker SCHED_FIFO priority (1-99).
    pub tx_priority: u8,
    /// Whether to attempt real-time scheduling at all.
    pub realtime: bool,
    /// Capacity of each latency sampler.
    pub sampler_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            rx_core: None,
            tx_core: None,
            rx_priority: DEFAULT_RX_PRIORITY,
            tx_priority: DEFAULT_TX_PRIORITY,
            realtime: true,
            sampler_capacity: crate::stats::DEFAULT_SAMPLE_CAPACITY,
        }
    }
}

/// Receiver of raw datagrams, invoked synchronously on the RX worker.
pub trait RxHandler: Send {
    /// Handle one received datagram.
    ///
    /// `frame` views the worker's receive buffer and is valid only for the
    /// duration of the call; copy it if it must outlive the callback.
    fn on_packet(&mut self, frame: &[u8]);
}

impl<F: FnMut(&[u8]) + Send> RxHandler for F {
    fn on_packet(&mut self, frame: &[u8]) {
        self(frame);
    }
}

/// Snapshot of the runtime packet counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterSnapshot {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_drops: u64,
    pub tx_drops: u64,
}

struct RuntimeShared {
    running: AtomicBool,
    rx_fatal: AtomicBool,
    rx_packets: AtomicU64,
    tx_packets: AtomicU64,
    rx_drops: AtomicU64,
    tx_drops: AtomicU64,
    tx_sampler: LatencySampler,
    rx_sampler: LatencySampler,
    interval_sampler: LatencySampler,
}

/// Thread manager owning the RX and TX workers and both packet rings.
pub struct UdpRuntime {
    shared: Arc<RuntimeShared>,
    tx_producer: Mutex<Producer>,
    rx_consumer: Mutex<Consumer>,
    rx_handle: Option<JoinHandle<()>>,
    tx_handle: Option<JoinHandle<()>>,
}

impl UdpRuntime {
    /// Spawn the workers over `endpoint`'s socket.
    ///
    /// Thread creation failure is fatal; affinity or scheduling failures
    /// inside the workers are logged and degrade gracefully.
    pub fn start(
        endpoint: &UdpEndpoint,
        config: &RuntimeConfig,
        handler: impl RxHandler + 'static,
    ) -> Result<Self> {
        let shared = Arc::new(RuntimeShared {
            running: AtomicBool::new(true),
            rx_fatal: AtomicBool::new(false),
            rx_packets: AtomicU64::new(0),
            tx_packets: AtomicU64::new(0),
            rx_drops: AtomicU64::new(0),
            tx_drops: AtomicU64::new(0),
            tx_sampler: LatencySampler::with_capacity(config.sampler_capacity),
            rx_sampler: LatencySampler::with_capacity(config.sampler_capacity),
            interval_sampler: LatencySampler::with_capacity(config.sampler_capacity),
        });

        let (tx_producer, tx_consumer) = RingBuffer::new();
        let (rx_producer, rx_consumer) = RingBuffer::new();

        let rx_handle = {
            let socket = endpoint.socket();
            let shared = Arc::clone(&shared);
            let cfg = config.clone();
            thread::Builder::new()
                .name("pulselink-rx".into())
                .spawn(move || rx_worker(&socket, &shared, rx_producer, handler, &cfg))
                .map_err(RuntimeError::ThreadCreate)?
        };

        let tx_handle = {
            let socket = endpoint.socket();
            let worker_shared = Arc::clone(&shared);
            let cfg = config.clone();
            match thread::Builder::new()
                .name("pulselink-tx".into())
                .spawn(move || tx_worker(&socket, &worker_shared, tx_consumer, &cfg))
            {
                Ok(handle) => handle,
                Err(e) => {
                    // Unwind the already-running RX worker before failing.
                    shared.running.store(false, Ordering::Release);
                    let _ = rx_handle.join();
                    return Err(RuntimeError::ThreadCreate(e).into());
                }
            }
        };

        info!(
            "runtime started (rx core {:?} prio {}, tx core {:?} prio {}, realtime {})",
            config.rx_core, config.rx_priority, config.tx_core, config.tx_priority, config.realtime
        );

        Ok(Self {
            shared,
            tx_producer: Mutex::new(tx_producer),
            rx_consumer: Mutex::new(rx_consumer),
            rx_handle: Some(rx_handle),
            tx_handle: Some(tx_handle),
        })
    }

    /// Enqueue an encoded frame for the TX worker.
    ///
    /// Returns `false` (and counts a drop) when the TX ring is full.
    pub fn queue_packet(&self, frame: &[u8]) -> bool {
        let ok = self.tx_producer.lock().push(frame);
        if !ok {
            self.shared.tx_drops.fetch_add(1, Ordering::Relaxed);
        }
        ok
    }

    /// Drain one raw datagram from the RX ring, if available.
    pub fn poll_rx(&self, out: &mut [u8]) -> Option<usize> {
        self.rx_consumer.lock().pop(out)
    }

    /// Approximate TX ring occupancy (diagnostics only).
    pub fn tx_queue_len(&self) -> usize {
        self.tx_producer.lock().len()
    }

    /// Whether the RX worker died on a non-transient socket error.
    pub fn rx_failed(&self) -> bool {
        self.shared.rx_fatal.load(Ordering::Acquire)
    }

    /// Current packet counters.
    pub fn counters(&self) -> CounterSnapshot {
        CounterSnapshot {
            rx_packets: self.shared.rx_packets.load(Ordering::Relaxed),
            tx_packets: self.shared.tx_packets.load(Ordering::Relaxed),
            rx_drops: self.shared.rx_drops.load(Ordering::Relaxed),
            tx_drops: self.shared.tx_drops.load(Ordering::Relaxed),
        }
    }

    /// Sampler of `send` call durations.
    pub fn tx_sampler(&self) -> &LatencySampler {
        &self.shared.tx_sampler
    }

    /// Sampler of receive-to-callback-complete durations.
    pub fn rx_sampler(&self) -> &LatencySampler {
        &self.shared.rx_sampler
    }

    /// Sampler of RX inter-arrival intervals.
    pub fn interval_sampler(&self) -> &LatencySampler {
        &self.shared.interval_sampler
    }

    /// Stop both workers, join them, and report summary statistics.
    pub fn shutdown(&mut self) {
        if self.rx_handle.is_none() && self.tx_handle.is_none() {
            return;
        }

        self.shared.running.store(false, Ordering::Release);

        if let Some(handle) = self.rx_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.tx_handle.take() {
            let _ = handle.join();
        }

        let c = self.counters();
        info!(
            "runtime stopped: rx {} (dropped {}), tx {} (dropped {})",
            c.rx_packets, c.rx_drops, c.tx_packets, c.tx_drops
        );

        print!(
            "{}",
            self.shared
                .rx_sampler
                .snapshot()
                .format_summary("RX Processing Latency")
        );
        print!(
            "{}",
            self.shared
                .tx_sampler
                .snapshot()
                .format_summary("TX Send Latency")
        );
        print!(
            "{}",
            self.shared
                .interval_sampler
                .snapshot()
                .format_summary("RX Inter-Packet Interval")
        );
    }
}

impl Drop for UdpRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn rx_worker(
    socket: &UdpSocket,
    shared: &RuntimeShared,
    mut rx_ring: Producer,
    mut handler: impl RxHandler,
    config: &RuntimeConfig,
) {
    if let Err(e) = mask_shutdown_signals() {
        warn!("rx worker: failed to mask signals: {e}");
    }
    affinity::configure_current_thread("rx worker", config.rx_core, config.rx_priority, config.realtime);
    info!("rx worker started");

    let mut buf = [0u8; DEFAULT_SLOT_SIZE];
    let mut last_rx: Option<Instant> = None;

    while shared.running.load(Ordering::Acquire) {
        match socket.recv(&mut buf) {
            Ok(len) if len > 0 => {
                let rx_start = Instant::now();
                shared.rx_packets.fetch_add(1, Ordering::Relaxed);

                // Inter-arrival interval; nothing to measure on the first
                // packet of the run.
                if let Some(prev) = last_rx {
                    shared.interval_sampler.record_span(prev, rx_start);
                }
                last_rx = Some(rx_start);

                if !rx_ring.push(&buf[..len]) {
                    shared.rx_drops.fetch_add(1, Ordering::Relaxed);
                }

                handler.on_packet(&buf[..len]);

                shared.rx_sampler.record_span(rx_start, Instant::now());
            }
            Ok(_) => {} // zero-length datagram, nothing to do
            Err(e) if is_transient(e.kind()) => {}
            Err(e) => {
                error!("rx worker: receive failed: {e}");
                shared.rx_fatal.store(true, Ordering::Release);
                break;
            }
        }
    }

    info!("rx worker stopped");
}

fn tx_worker(
    socket: &UdpSocket,
    shared: &RuntimeShared,
    mut tx_ring: Consumer,
    config: &RuntimeConfig,
) {
    if let Err(e) = mask_shutdown_signals() {
        warn!("tx worker: failed to mask signals: {e}");
    }
    affinity::configure_current_thread("tx worker", config.tx_core, config.tx_priority, config.realtime);
    info!("tx worker started");

    let mut buf = [0u8; DEFAULT_SLOT_SIZE];

    while shared.running.load(Ordering::Acquire) {
        match tx_ring.pop(&mut buf) {
            Some(len) => {
                let tx_start = Instant::now();
                match socket.send(&buf[..len]) {
                    Ok(sent) if sent > 0 => {
                        shared.tx_packets.fetch_add(1, Ordering::Relaxed);
                        shared.tx_sampler.record_span(tx_start, Instant::now());
                    }
                    Ok(_) => {
                        shared.tx_drops.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        shared.tx_drops.fetch_add(1, Ordering::Relaxed);
                        if !is_transient(e.kind()) {
                            warn!("tx worker: send failed: {e}");
                        }
                    }
                }
            }
            None => thread::sleep(TX_IDLE_SLEEP),
        }
    }

    info!("tx worker stopped");
}
