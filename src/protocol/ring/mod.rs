//! Fixed-capacity frame ring between receive capture (producer, interrupt
//! context) and the consumer loop (main context).
//!
//! There is no backpressure. When the consumer falls behind, the producer
//! keeps writing and the oldest unread frames are overwritten: memory stays
//! bounded and the interrupt handler never waits. The consumer notices it was
//! lapped, resumes at the oldest frame still stored and counts what it lost
//! (see [`FrameRing::take_overwritten`]).
//!
//! Indices are free-running counters, reduced modulo `N` only to pick a slot.
//! The producer index is written only by [`FrameRing::push`], the consumer
//! index only by [`FrameRing::try_pop`]. Slot copies happen under a critical
//! section, so an overwrite can never tear a frame the consumer is reading.
use core::cell::RefCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::protocol::frame::Frame;

/// Capacity used by the board firmware.
pub const DEFAULT_RING_CAPACITY: usize = 8;

pub struct FrameRing<const N: usize> {
    slots: Mutex<CriticalSectionRawMutex, RefCell<[Frame; N]>>,
    /// Frames ever pushed. Producer-owned.
    head: AtomicUsize,
    /// Frames ever consumed or skipped. Consumer-owned.
    tail: AtomicUsize,
    /// Frames skipped since the last `take_overwritten`. Consumer-owned.
    overwritten: AtomicUsize,
}

impl<const N: usize> Default for FrameRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameRing<N> {
    /// Empty ring. Panics (at compile time in a `static`) unless `N` is a
    /// power of two.
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "ring capacity must be a power of two");
        Self {
            slots: Mutex::new(RefCell::new([Frame::EMPTY; N])),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            overwritten: AtomicUsize::new(0),
        }
    }

    #[inline]
    const fn slot(index: usize) -> usize {
        index & (N - 1)
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    //==================================================================================PRODUCER
    /// Store a frame. Never blocks, never fails; overwrites the oldest unread
    /// frame when full. Producer side only.
    pub fn push(&self, frame: Frame) {
        self.slots.lock(|slots| {
            let head = self.head.load(Ordering::Relaxed);
            slots.borrow_mut()[Self::slot(head)] = frame;
            // Slot contents are in place before the new index is published.
            self.head.store(head.wrapping_add(1), Ordering::Release);
        });
    }

    //==================================================================================CONSUMER
    /// Take the oldest frame, if any. Never blocks. Consumer side only.
    pub fn try_pop(&self) -> Option<Frame> {
        self.slots.lock(|slots| {
            let head = self.head.load(Ordering::Acquire);
            let mut tail = self.tail.load(Ordering::Relaxed);
            if head == tail {
                return None;
            }

            let pending = head.wrapping_sub(tail);
            if pending > N {
                let lost = pending - N;
                let total = self.overwritten.load(Ordering::Relaxed).saturating_add(lost);
                self.overwritten.store(total, Ordering::Relaxed);
                tail = head.wrapping_sub(N);

                #[cfg(feature = "defmt")]
                defmt::warn!("Frame ring lapped, {} frames lost", lost);
            }

            let frame = slots.borrow()[Self::slot(tail)];
            self.tail.store(tail.wrapping_add(1), Ordering::Release);
            Some(frame)
        })
    }

    /// Number of frames lost to overwrites since the previous call, then reset
    /// to zero. Consumer side only.
    pub fn take_overwritten(&self) -> usize {
        let lost = self.overwritten.load(Ordering::Relaxed);
        if lost != 0 {
            self.overwritten.store(0, Ordering::Relaxed);
        }
        lost
    }

    //==================================================================================STATE
    /// Frames currently readable (at most `N`).
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail).min(N)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once the producer is `N` frames ahead: the next push overwrites.
    pub fn is_full(&self) -> bool {
        self.len() == N
    }
}
