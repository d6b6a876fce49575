//! Lock-free ring buffer between a capture thread and the monitor
//!
//! The producer half lives on the capture side (a cpal callback, a replay
//! thread). The consumer half is a [`SampleSource`] for the control loop.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::source::{ReadOutcome, SampleSource};

/// Interleaved sample ring, not yet split
pub struct RingBuffer {
    producer: HeapProducer<f64>,
    consumer: HeapConsumer<f64>,
}

impl RingBuffer {
    /// Create a ring holding `capacity` samples (all channels together)
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::<f64>::new(capacity);
        let (producer, consumer) = rb.split();

        Self { producer, consumer }
    }

    /// Split into the capture end and a source carrying `channels` channels
    pub fn split(self, channels: usize) -> (RingProducer, RingSource) {
        let closed = Arc::new(AtomicBool::new(false));
        (
            RingProducer {
                producer: self.producer,
                closed: Arc::clone(&closed),
            },
            RingSource {
                consumer: self.consumer,
                channels: channels.max(1),
                closed,
            },
        )
    }
}

/// Capture end. Dropping it closes the source once the ring drains.
pub struct RingProducer {
    producer: HeapProducer<f64>,
    closed: Arc<AtomicBool>,
}

impl RingProducer {
    /// Returns how many samples fit; the rest are dropped
    pub fn push(&mut self, samples: &[f64]) -> usize {
        self.producer.push_slice(samples)
    }

    pub fn free_len(&self) -> usize {
        self.producer.free_len()
    }
}

impl Drop for RingProducer {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

pub struct RingSource {
    consumer: HeapConsumer<f64>,
    channels: usize,
    closed: Arc<AtomicBool>,
}

impl RingSource {
    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

impl SampleSource for RingSource {
    fn channels(&self) -> usize {
        self.channels
    }

    fn read(&mut self, out: &mut [f64]) -> io::Result<ReadOutcome> {
        // Read the flag first so samples pushed just before the drop are not lost
        let closed = self.closed.load(Ordering::Acquire);
        let n = self.consumer.pop_slice(out);
        Ok(match n {
            0 if closed => ReadOutcome::Closed,
            0 => ReadOutcome::Empty,
            n => ReadOutcome::Samples(n),
        })
    }
}
