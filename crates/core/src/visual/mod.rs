//! Lock-free waveform mirror shared between the audio path and the renderer.
//!
//! Every produced (or played) sample is copied into a fixed-length circular
//! buffer of atomics; the render thread copies it out once per frame as the
//! `iAudio` uniform, oldest sample first.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::ring::Sample;

/// Fixed-length mirror of the most recent samples, read once per frame by the
/// render thread.
///
/// The mirror is separate from the ring buffer so the renderer never touches
/// the output callback's cursors. Reads are eventually consistent: a snapshot
/// may lag the writer by a few samples but never observes a torn value.
#[derive(Debug)]
pub struct VisualizationSampler {
    slots: Box<[AtomicU32]>,
    cursor: AtomicUsize,
}

impl VisualizationSampler {
    /// Creates a zero-filled mirror holding `len` samples (at least one).
    pub fn new(len: usize) -> Self {
        let slots = (0..len.max(1))
            .map(|_| AtomicU32::new(0.0_f32.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false: the mirror holds at least one slot.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Overwrites the oldest slot with `sample`. Only one thread mirrors at a
    /// time; see [`crate::MirrorPoint`].
    pub fn mirror(&self, sample: Sample) {
        let index = self.cursor.load(Ordering::Relaxed);
        self.slots[index].store(sample.to_bits(), Ordering::Release);
        let next = if index + 1 == self.slots.len() { 0 } else { index + 1 };
        self.cursor.store(next, Ordering::Release);
    }

    /// Copies the mirror into `out`, oldest sample first. `out` is resized to
    /// exactly [`len`](Self::len) samples.
    pub fn snapshot_into(&self, out: &mut Vec<Sample>) {
        let start = self.cursor.load(Ordering::Acquire);
        out.clear();
        out.extend(
            self.slots[start..]
                .iter()
                .chain(&self.slots[..start])
                .map(|slot| Sample::from_bits(slot.load(Ordering::Acquire))),
        );
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        let mut out = Vec::with_capacity(self.len());
        self.snapshot_into(&mut out);
        out
    }
}
