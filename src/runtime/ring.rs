//! Lock-free SPSC ring buffer for packet slots.
//!
//! Wait-free for exactly one producer and one consumer. The producer and
//! consumer indices live on separate cache lines ([`CachePadded`]) so the
//! two sides never false-share. One slot is sacrificed to distinguish an
//! empty ring from a full one.
//!
//! Ordering contract:
//! - The producer reads its own index relaxed, reads the consumer index
//!   with `Acquire` to detect fullness, writes the slot, then publishes the
//!   advanced write index with `Release`.
//! - The consumer mirrors this: own index relaxed, producer index
//!   `Acquire`, slot read, `Release` publish of the advanced read index.
//!
//! The `Release` publish paired with the peer's `Acquire` load makes every
//! slot write happen-before the corresponding slot read.
//!
//! The SPSC restriction is enforced by construction: [`RingBuffer::new`]
//! returns a single `(Producer, Consumer)` pair over a shared allocation,
//! and neither handle is `Clone`.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// Default maximum packet size per slot.
pub const DEFAULT_SLOT_SIZE: usize = 2048;

/// Default ring capacity in slots.
pub const DEFAULT_CAPACITY: usize = 1024;

struct Slot<const SLOT: usize> {
    len: u16,
    data: [u8; SLOT],
}

struct Shared<const SLOT: usize, const CAP: usize> {
    slots: Box<[UnsafeCell<Slot<SLOT>>]>,
    write_idx: CachePadded<AtomicUsize>,
    read_idx: CachePadded<AtomicUsize>,
}

// The UnsafeCell slots are only ever written by the single producer and
// read by the single consumer, synchronized through the index atomics.
unsafe impl<const SLOT: usize, const CAP: usize> Sync for Shared<SLOT, CAP> {}
unsafe impl<const SLOT: usize, const CAP: usize> Send for Shared<SLOT, CAP> {}

/// SPSC packet ring, constructed as a handle pair.
pub struct RingBuffer;

impl RingBuffer {
    /// Create a ring with the default slot size and capacity.
    pub fn new() -> (
        Producer<DEFAULT_SLOT_SIZE, DEFAULT_CAPACITY>,
        Consumer<DEFAULT_SLOT_SIZE, DEFAULT_CAPACITY>,
    ) {
        Self::with_layout::<DEFAULT_SLOT_SIZE, DEFAULT_CAPACITY>()
    }

    /// Create a ring with an explicit slot size and capacity.
    pub fn with_layout<const SLOT: usize, const CAP: usize>(
    ) -> (Producer<SLOT, CAP>, Consumer<SLOT, CAP>) {
        assert!(CAP >= 2, "ring needs at least two slots");

        let slots = (0..CAP)
            .map(|_| {
                UnsafeCell::new(Slot {
                    len: 0,
                    data: [0u8; SLOT],
                })
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let shared = Arc::new(Shared::<SLOT, CAP> {
            slots,
            write_idx: CachePadded::new(AtomicUsize::new(0)),
            read_idx: CachePadded::new(AtomicUsize::new(0)),
        });

        (
            Producer {
                shared: Arc::clone(&shared),
            },
            Consumer { shared },
        )
    }
}

/// Producer handle: the only writer of ring slots.
pub struct Producer<const SLOT: usize = DEFAULT_SLOT_SIZE, const CAP: usize = DEFAULT_CAPACITY> {
    shared: Arc<Shared<SLOT, CAP>>,
}

/// Consumer handle: the only reader of ring slots.
pub struct Consumer<const SLOT: usize = DEFAULT_SLOT_SIZE, const CAP: usize = DEFAULT_CAPACITY> {
    shared: Arc<Shared<SLOT, CAP>>,
}

impl<const SLOT: usize, const CAP: usize> Producer<SLOT, CAP> {
    /// Push one packet into the ring.
    ///
    /// Returns `false` when the ring is full or `data` exceeds the slot
    /// size. Never allocates.
    pub fn push(&mut self, data: &[u8]) -> bool {
        if data.len() > SLOT {
            return false;
        }

        let shared = &*self.shared;
        let write = shared.write_idx.load(Ordering::Relaxed);
        let next = (write + 1) % CAP;

        if next == shared.read_idx.load(Ordering::Acquire) {
            return false; // full
        }

        // Sole producer: the consumer cannot touch this slot until the
        // write index advances past it.
        unsafe {
            let slot = &mut *shared.slots[write].get();
            slot.len = data.len() as u16;
            slot.data[..data.len()].copy_from_slice(data);
        }

        shared.write_idx.store(next, Ordering::Release);
        true
    }

    /// Approximate occupancy; advisory only under concurrent updates.
    pub fn len(&self) -> usize {
        ring_len(&self.shared)
    }

    /// Approximate emptiness check.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether a push would currently be rejected.
    pub fn is_full(&self) -> bool {
        let shared = &*self.shared;
        let next = (shared.write_idx.load(Ordering::Acquire) + 1) % CAP;
        next == shared.read_idx.load(Ordering::Acquire)
    }
}

impl<const SLOT: usize, const CAP: usize> Consumer<SLOT, CAP> {
    /// Pop one packet from the ring into `out`.
    ///
    /// Returns the packet length, or `None` when the ring is empty or
    /// `out` is smaller than the stored packet. Never allocates.
    pub fn pop(&mut self, out: &mut [u8]) -> Option<usize> {
        let shared = &*self.shared;
        let read = shared.read_idx.load(Ordering::Relaxed);

        if read == shared.write_idx.load(Ordering::Acquire) {
            return None; // empty
        }

        // Sole consumer: the producer cannot reuse this slot until the
        // read index advances past it.
        let len = unsafe {
            let slot = &*shared.slots[read].get();
            let len = slot.len as usize;
            if len > out.len() {
                return None;
            }
            out[..len].copy_from_slice(&slot.data[..len]);
            len
        };

        shared.read_idx.store((read + 1) % CAP, Ordering::Release);
        Some(len)
    }

    /// Approximate occupancy; advisory only under concurrent updates.
    pub fn len(&self) -> usize {
        ring_len(&self.shared)
    }

    /// Approximate emptiness check.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn ring_len<const SLOT: usize, const CAP: usize>(shared: &Shared<SLOT, CAP>) -> usize {
    let w = shared.write_idx.load(Ordering::Acquire);
    let r = shared.read_idx.load(Ordering::Acquire);
    if w >= r {
        w - r
    } else {
        CAP - r + w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_push_pop_single() {
        let (mut tx, mut rx) = RingBuffer::with_layout::<64, 8>();
        assert!(tx.push(b"hello"));

        let mut out = [0u8; 64];
        assert_eq!(rx.pop(&mut out), Some(5));
        assert_eq!(&out[..5], b"hello");
        assert_eq!(rx.pop(&mut out), None);
    }

    #[test]
    fn test_full_rejects_push() {
        let (mut tx, mut rx) = RingBuffer::with_layout::<16, 8>();

        // Capacity 8 means 7 usable slots.
        for i in 0..7u8 {
            assert!(tx.push(&[i]), "push {i} should succeed");
        }
        assert!(tx.is_full());
        assert!(!tx.push(&[7]), "8th push must be rejected");

        // Pops still return the earliest frames in order.
        let mut out = [0u8; 16];
        for i in 0..7u8 {
            assert_eq!(rx.pop(&mut out), Some(1));
            assert_eq!(out[0], i);
        }
        assert_eq!(rx.pop(&mut out), None);
    }

    #[test]
    fn test_default_layout_keeps_one_slot_free() {
        let (mut tx, _rx) = RingBuffer::new();
        for i in 0..1023u32 {
            assert!(tx.push(&i.to_le_bytes()), "push {i} should succeed");
        }
        assert!(!tx.push(&1023u32.to_le_bytes()));
        assert_eq!(tx.len(), 1023);
    }

    #[test]
    fn test_oversized_push_rejected() {
        let (mut tx, _rx) = RingBuffer::with_layout::<16, 8>();
        assert!(!tx.push(&[0u8; 17]));
        assert!(tx.is_empty());
    }

    #[test]
    fn test_undersized_pop_rejected() {
        let (mut tx, mut rx) = RingBuffer::with_layout::<64, 8>();
        assert!(tx.push(&[0u8; 32]));

        let mut small = [0u8; 16];
        assert_eq!(rx.pop(&mut small), None);

        // The slot stays intact for a big-enough consumer buffer.
        let mut big = [0u8; 64];
        assert_eq!(rx.pop(&mut big), Some(32));
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let (mut tx, mut rx) = RingBuffer::with_layout::<16, 4>();
        let mut out = [0u8; 16];

        // Cycle far past the capacity.
        for round in 0..100u32 {
            assert!(tx.push(&round.to_le_bytes()));
            assert_eq!(rx.pop(&mut out), Some(4));
            assert_eq!(u32::from_le_bytes(out[..4].try_into().unwrap()), round);
        }
    }

    #[test]
    fn test_concurrent_order_no_loss_no_dup() {
        const COUNT: u32 = 100_000;
        let (mut tx, mut rx) = RingBuffer::with_layout::<16, 64>();

        let producer = thread::spawn(move || {
            for i in 0..COUNT {
                // Spin on full: with retries, nothing may be lost.
                while !tx.push(&i.to_le_bytes()) {
                    std::hint::spin_loop();
                }
            }
        });

        let consumer = thread::spawn(move || {
            let mut out = [0u8; 16];
            let mut expected = 0u32;
            while expected < COUNT {
                if let Some(len) = rx.pop(&mut out) {
                    assert_eq!(len, 4);
                    let value = u32::from_le_bytes(out[..4].try_into().unwrap());
                    assert_eq!(value, expected, "out of order or duplicated");
                    expected += 1;
                } else {
                    std::hint::spin_loop();
                }
            }
        });

        producer.join().unwrap();
        consumer.join().unwrap();
    }
}
