//! Sample FIFO
//!
//! Single-producer/single-consumer ring of fixed-size mono blocks, written by
//! the audio thread and drained by the analysis thread.
//!
//! # Design
//!
//! - Write and read indices count blocks and only ever advance.
//! - When the ring is full the producer overwrites the oldest unread block
//!   and bumps an overrun counter. The producer never blocks and never fails.
//! - Every slot carries a sequence stamp (a per-slot seqlock). The producer
//!   marks a slot odd while writing and stamps it `2 * (index + 1)` when done.
//!   The consumer checks the stamp before and after copying, so a block that
//!   was overwritten mid-read is detected and skipped instead of returned torn.
//! - Samples are stored as `AtomicU32` bit patterns so the racy overwrite
//!   case is well-defined; relaxed atomic stores compile to plain stores.

use std::sync::atomic::{fence, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::DspError;

/// Default number of blocks in the ring
pub const DEFAULT_FIFO_CAPACITY: usize = 32;

struct Slot {
    stamp: AtomicUsize,
    samples: Box<[AtomicU32]>,
}

impl Slot {
    fn new(block_size: usize) -> Self {
        Self {
            stamp: AtomicUsize::new(0),
            samples: (0..block_size).map(|_| AtomicU32::new(0)).collect(),
        }
    }
}

struct Shared {
    slots: Box<[Slot]>,
    mask: usize,
    block_size: usize,
    /// Total blocks committed by the producer
    write: AtomicUsize,
    /// Total blocks consumed (or skipped) by the consumer
    read: AtomicUsize,
    overruns: AtomicU64,
}

impl Shared {
    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[inline]
fn complete_stamp(index: usize) -> usize {
    index.wrapping_add(1).wrapping_mul(2)
}

/// Create a FIFO holding `capacity` blocks of `block_size` samples
///
/// `capacity` must be a power of two.
pub fn sample_fifo(capacity: usize, block_size: usize) -> Result<(FifoProducer, FifoConsumer), DspError> {
    if capacity == 0 || !capacity.is_power_of_two() {
        return Err(DspError::InvalidFifoCapacity(capacity));
    }
    if block_size == 0 {
        return Err(DspError::InvalidBlockSize(block_size));
    }

    let shared = Arc::new(Shared {
        slots: (0..capacity).map(|_| Slot::new(block_size)).collect(),
        mask: capacity - 1,
        block_size,
        write: AtomicUsize::new(0),
        read: AtomicUsize::new(0),
        overruns: AtomicU64::new(0),
    });

    let producer = FifoProducer {
        shared: Arc::clone(&shared),
        pending: vec![0.0; block_size].into_boxed_slice(),
        filled: 0,
    };
    let consumer = FifoConsumer { shared };
    Ok((producer, consumer))
}

/// Audio-thread half of a [`sample_fifo`]
pub struct FifoProducer {
    shared: Arc<Shared>,
    /// Partial block being assembled by [`FifoProducer::write_samples`]
    pending: Box<[f32]>,
    filled: usize,
}

impl FifoProducer {
    pub fn block_size(&self) -> usize {
        self.shared.block_size
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Commit one complete block
    ///
    /// Blocks shorter than the FIFO block size are zero-padded, longer ones
    /// truncated.
    ///
    /// # Real-time Safety
    /// No allocations, no locks, O(block size).
    pub fn push(&mut self, block: &[f32]) {
        let shared = &*self.shared;
        let index = shared.write.load(Ordering::Relaxed);
        let slot = &shared.slots[index & shared.mask];

        // Open the slot: readers now see an odd stamp
        slot.stamp.store(complete_stamp(index).wrapping_sub(1), Ordering::Relaxed);
        fence(Ordering::Release);

        for (i, cell) in slot.samples.iter().enumerate() {
            let sample = block.get(i).copied().unwrap_or(0.0);
            cell.store(sample.to_bits(), Ordering::Relaxed);
        }

        slot.stamp.store(complete_stamp(index), Ordering::Release);

        let read = shared.read.load(Ordering::Acquire);
        if index.wrapping_sub(read) >= shared.capacity() {
            // Oldest unread block was just replaced
            shared.overruns.fetch_add(1, Ordering::Relaxed);
        }

        shared.write.store(index.wrapping_add(1), Ordering::Release);
    }

    /// Append samples of any length, committing a block each time one fills
    ///
    /// Host callbacks rarely line up with the FIFO block size; this packs
    /// them into FIFO-sized blocks.
    pub fn write_samples(&mut self, samples: &[f32]) {
        let mut remaining = samples;
        while !remaining.is_empty() {
            let space = self.pending.len() - self.filled;
            let take = space.min(remaining.len());
            self.pending[self.filled..self.filled + take].copy_from_slice(&remaining[..take]);
            self.filled += take;
            remaining = &remaining[take..];

            if self.filled == self.pending.len() {
                let block = std::mem::take(&mut self.pending);
                self.push(&block);
                self.pending = block;
                self.filled = 0;
            }
        }
    }

    /// Drop any partially assembled block
    pub fn clear_pending(&mut self) {
        self.filled = 0;
    }

    /// Blocks lost to overwrite since creation
    pub fn overruns(&self) -> u64 {
        self.shared.overruns.load(Ordering::Relaxed)
    }
}

/// Analysis-thread half of a [`sample_fifo`]
pub struct FifoConsumer {
    shared: Arc<Shared>,
}

impl FifoConsumer {
    pub fn block_size(&self) -> usize {
        self.shared.block_size
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Number of complete blocks waiting to be read
    pub fn available_blocks(&self) -> usize {
        let write = self.shared.write.load(Ordering::Acquire);
        let read = self.shared.read.load(Ordering::Relaxed);
        write.wrapping_sub(read).min(self.shared.capacity())
    }

    /// Copy the oldest complete block into `out`
    ///
    /// Returns false if no block is available. Never blocks. `out` should
    /// hold at least [`FifoConsumer::block_size`] samples; extra space is
    /// left untouched.
    pub fn pop(&mut self, out: &mut [f32]) -> bool {
        let shared = &*self.shared;
        let capacity = shared.capacity();
        let mut read = shared.read.load(Ordering::Relaxed);

        // Each pass consumes or skips one block, so this is bounded by the ring size
        for _ in 0..=capacity {
            let write = shared.write.load(Ordering::Acquire);
            if read == write {
                shared.read.store(read, Ordering::Release);
                return false;
            }

            if write.wrapping_sub(read) > capacity {
                // Producer lapped us; jump to the oldest block still in the ring
                read = write.wrapping_sub(capacity);
            }

            let slot = &shared.slots[read & shared.mask];
            let expected = complete_stamp(read);

            if slot.stamp.load(Ordering::Acquire) == expected {
                for (dst, cell) in out.iter_mut().zip(slot.samples.iter()) {
                    *dst = f32::from_bits(cell.load(Ordering::Relaxed));
                }
                fence(Ordering::Acquire);

                if slot.stamp.load(Ordering::Relaxed) == expected {
                    shared.read.store(read.wrapping_add(1), Ordering::Release);
                    return true;
                }
            }

            // Overwritten before or while we copied it
            read = read.wrapping_add(1);
        }

        shared.read.store(read, Ordering::Release);
        false
    }

    /// Discard every unread block
    pub fn clear(&mut self) {
        let write = self.shared.write.load(Ordering::Acquire);
        self.shared.read.store(write, Ordering::Release);
    }

    /// Blocks lost to overwrite since creation
    pub fn overruns(&self) -> u64 {
        self.shared.overruns.load(Ordering::Relaxed)
    }
}
