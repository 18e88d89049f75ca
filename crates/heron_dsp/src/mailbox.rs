//! Coefficient Mailbox
//!
//! Hands complete [`ChainUpdate`] snapshots from the control thread to the
//! audio thread over an `rtrb` SPSC ring. Each update replaces the whole
//! chain, so only the newest one matters: the receiver drains the ring and
//! keeps the last, and the sender holds on to an update that did not fit
//! and retries it before anything newer.

use rtrb::{Consumer, Producer, RingBuffer};

use crate::coefficients::ChainUpdate;

/// Default number of in-flight updates
pub const DEFAULT_MAILBOX_CAPACITY: usize = 16;

/// Create a connected sender/receiver pair
pub fn coefficient_mailbox(capacity: usize) -> (CoefficientSender, CoefficientReceiver) {
    let (producer, consumer) = RingBuffer::<ChainUpdate>::new(capacity.max(1));
    (
        CoefficientSender {
            producer,
            pending: None,
            dropped: 0,
        },
        CoefficientReceiver { consumer },
    )
}

/// Control-thread side
pub struct CoefficientSender {
    producer: Producer<ChainUpdate>,
    /// Newest update that did not fit into the ring yet
    pending: Option<ChainUpdate>,
    dropped: u64,
}

impl CoefficientSender {
    /// Post a new update
    ///
    /// Returns true if it is now in the ring. When the ring is full the
    /// update is parked and replaces any previously parked one; call
    /// [`CoefficientSender::flush`] on the next tick to retry.
    pub fn send(&mut self, update: ChainUpdate) -> bool {
        if self.pending.replace(update).is_some() {
            self.dropped += 1;
        }
        self.flush()
    }

    /// Retry a parked update. Returns true when nothing is left pending.
    pub fn flush(&mut self) -> bool {
        match self.pending.take() {
            None => true,
            Some(update) => match self.producer.push(update) {
                Ok(()) => true,
                Err(rtrb::PushError::Full(update)) => {
                    self.pending = Some(update);
                    false
                }
            },
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Updates superseded while parked
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Whether the audio side has gone away
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Audio-thread side
pub struct CoefficientReceiver {
    consumer: Consumer<ChainUpdate>,
}

impl CoefficientReceiver {
    /// Drain the ring and return the newest update, if any
    ///
    /// # Real-time Safety
    /// Lock-free, no allocations, bounded by the ring capacity.
    #[inline]
    pub fn latest(&mut self) -> Option<ChainUpdate> {
        let mut newest = None;
        while let Ok(update) = self.consumer.pop() {
            newest = Some(update);
        }
        newest
    }
}
