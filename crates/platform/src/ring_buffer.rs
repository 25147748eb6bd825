//! Fixed-capacity single-producer / single-consumer byte queue.
//!
//! `RingBuffer<N>` decouples interrupt-time data movement from caller-time
//! consumption: the serial ISR fills the receive queue while `getc` drains
//! it, and the other way round for transmit.
//!
//! # Capacity
//!
//! One slot is kept free to tell "full" from "empty" with two indices and
//! no shared counter, so a `RingBuffer<N>` holds at most `N - 1` bytes.
//! `N < 2` fails to build.
//!
//! # Concurrency
//!
//! The producer owns the write index and the consumer owns the read index;
//! each index has exactly one writer. The producer stores the byte, then
//! publishes the write index with `Release`; the consumer loads the write
//! index with `Acquire` before reading the slot (and symmetrically for the
//! read index), so a byte is never observed before it is written. Slot
//! accesses are volatile.
//!
//! [`RingBuffer::split`] hands out one [`Producer`] and one [`Consumer`].
//! Neither is `Clone`, so the one-writer-per-index rule holds by
//! construction; both are `Send` and may live in different contexts.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// SPSC byte queue holding up to `N - 1` bytes.
pub struct RingBuffer<const N: usize> {
    buf: UnsafeCell<[u8; N]>,
    /// Next slot the producer writes. Written only by the producer.
    write: AtomicUsize,
    /// Next slot the consumer reads. Written only by the consumer.
    read: AtomicUsize,
}

// SAFETY: shared access is limited to the two halves returned by `split`
// (or to `&mut self`). The producer only writes slots the consumer cannot
// yet see, the consumer only reads slots already published, and each index
// has a single writer.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> RingBuffer<N> {
    const VALID: () = assert!(N >= 2, "RingBuffer needs at least two slots");

    /// Create an empty ring buffer.
    ///
    /// `const` so ring buffers may live in `static`s.
    pub const fn new() -> Self {
        let () = Self::VALID;
        Self {
            buf: UnsafeCell::new([0; N]),
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
        }
    }

    /// Split into the producer and consumer halves.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let rb: &Self = self;
        (Producer { rb }, Consumer { rb })
    }

    /// Enqueue `byte`; `false` if full (the byte is not stored).
    pub fn try_put(&mut self, byte: u8) -> bool {
        self.put(byte)
    }

    /// Dequeue the oldest byte, if any.
    pub fn try_get(&mut self) -> Option<u8> {
        self.get()
    }

    /// Bytes currently queued.
    pub fn available(&self) -> usize {
        Self::count(self.write.load(Ordering::Acquire), self.read.load(Ordering::Acquire))
    }

    /// Maximum number of bytes the buffer can hold (`N - 1`).
    pub const fn capacity(&self) -> usize {
        Self::CAPACITY
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// `true` when [`Self::capacity`] bytes are queued.
    pub fn is_full(&self) -> bool {
        self.available() == Self::CAPACITY
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: N >= 2 enforced at build time
    const CAPACITY: usize = N - 1;

    #[allow(clippy::arithmetic_side_effects)] // Safety: index < N, so index + 1 <= N cannot overflow
    const fn next(index: usize) -> usize {
        if index + 1 == N {
            0
        } else {
            index + 1
        }
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: both indices < N; wrap via % N
    const fn count(write: usize, read: usize) -> usize {
        (write + N - read) % N
    }

    fn slot(&self, index: usize) -> *mut u8 {
        self.buf.get().cast::<u8>().wrapping_add(index)
    }

    /// Producer side only.
    fn put(&self, byte: u8) -> bool {
        let write = self.write.load(Ordering::Relaxed);
        let next = Self::next(write);
        if next == self.read.load(Ordering::Acquire) {
            return false;
        }
        // SAFETY: `write < N`, and the consumer does not read slot `write`
        // until the store below publishes it.
        unsafe { self.slot(write).write_volatile(byte) };
        self.write.store(next, Ordering::Release);
        true
    }

    /// Consumer side only.
    fn get(&self) -> Option<u8> {
        let read = self.read.load(Ordering::Relaxed);
        if read == self.write.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: `read < N`, and the Acquire load above makes the
        // producer's write of this slot visible.
        let byte = unsafe { self.slot(read).read_volatile() };
        self.read.store(Self::next(read), Ordering::Release);
        Some(byte)
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writing half of a [`RingBuffer`].
pub struct Producer<'a, const N: usize> {
    rb: &'a RingBuffer<N>,
}

impl<const N: usize> Producer<'_, N> {
    /// Enqueue `byte`; `false` if full.
    #[inline]
    pub fn try_put(&mut self, byte: u8) -> bool {
        self.rb.put(byte)
    }

    /// `true` when no more bytes fit.
    pub fn is_full(&self) -> bool {
        self.rb.is_full()
    }

    /// `true` when the consumer has drained everything.
    pub fn is_empty(&self) -> bool {
        self.rb.is_empty()
    }

    /// Bytes currently queued.
    pub fn available(&self) -> usize {
        self.rb.available()
    }

    /// Maximum number of queued bytes.
    pub const fn capacity(&self) -> usize {
        self.rb.capacity()
    }
}

/// Reading half of a [`RingBuffer`].
pub struct Consumer<'a, const N: usize> {
    rb: &'a RingBuffer<N>,
}

impl<const N: usize> Consumer<'_, N> {
    /// Dequeue the oldest byte, if any.
    #[inline]
    pub fn try_get(&mut self) -> Option<u8> {
        self.rb.get()
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.rb.is_empty()
    }

    /// `true` when the producer cannot enqueue.
    pub fn is_full(&self) -> bool {
        self.rb.is_full()
    }

    /// Bytes currently queued.
    pub fn available(&self) -> usize {
        self.rb.available()
    }

    /// Maximum number of queued bytes.
    pub const fn capacity(&self) -> usize {
        self.rb.capacity()
    }
}
