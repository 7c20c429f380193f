//! Bounded single-producer/single-consumer sample queue shared between the
//! render thread and the real-time output callback.
//!
//! Thin wrapper over an `rtrb` ring: neither side takes a lock, and a pushed
//! sample is fully visible to the consumer once it can be popped. A ring of
//! nominal capacity `C` holds at most `C - 1` samples, keeping one slot in
//! reserve the way a two-cursor circular buffer does.

use tracing::debug;

/// Normalised amplitude in `[-1.0, 1.0]`.
pub type Sample = f32;

/// Constructor namespace for the producer/consumer pair.
pub struct RingBuffer;

impl RingBuffer {
    /// Allocates a ring with nominal `capacity` (at least two) and splits it
    /// into its two endpoints. Usable capacity is `capacity - 1`.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(capacity: usize) -> (RingProducer, RingConsumer) {
        let capacity = capacity.max(2);
        debug!(capacity, "creating sample ring");
        let (producer, consumer) = rtrb::RingBuffer::<Sample>::new(capacity - 1);
        (
            RingProducer { producer, capacity },
            RingConsumer { consumer, capacity },
        )
    }
}

/// Write side, owned by the render thread.
pub struct RingProducer {
    producer: rtrb::Producer<Sample>,
    capacity: usize,
}

impl RingProducer {
    /// Appends a sample. Returns `false` and drops the sample when the ring is
    /// full; callers treat that as backpressure.
    pub fn push(&mut self, sample: Sample) -> bool {
        self.producer.push(sample).is_ok()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.producer.buffer().capacity() - self.producer.slots()
    }

    pub fn available_space(&self) -> usize {
        self.producer.slots()
    }
}

/// Read side, moved into the output callback.
pub struct RingConsumer {
    consumer: rtrb::Consumer<Sample>,
    capacity: usize,
}

impl RingConsumer {
    /// Removes the oldest sample, or `None` when the ring is empty. Never
    /// blocks.
    pub fn pop(&mut self) -> Option<Sample> {
        self.consumer.pop().ok()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.consumer.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

impl std::fmt::Debug for RingProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingProducer")
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .finish()
    }
}

impl std::fmt::Debug for RingConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingConsumer")
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .finish()
    }
}
