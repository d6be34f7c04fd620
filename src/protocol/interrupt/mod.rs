//! Hand-off from the INT pin handler to the consumer context.
//!
//! With deferred receive the edge handler performs no SPI traffic at all: it
//! raises the latch and returns. The consumer side waits on the latch and
//! runs [`ReceiveCapture::service`](crate::protocol::receive::ReceiveCapture::service)
//! itself, so the bus is only ever driven from one context.
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};

/// Edge latch shared between the interrupt handler and the consumer.
///
/// Several edges before the consumer wakes collapse into one wake-up; the
/// consumer drains every pending buffer anyway.
pub struct InterruptLatch {
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for InterruptLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptLatch {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Call from the falling-edge handler. Never blocks.
    pub fn on_falling_edge(&self) {
        self.signal.signal(());
    }

    /// Wait for the next edge, consuming it.
    pub async fn wait(&self) {
        self.signal.wait().await
    }

    /// Consume a pending edge without waiting. `true` if one was latched.
    pub fn take(&self) -> bool {
        self.signal.try_take().is_some()
    }

    /// `true` if an edge is latched and not yet consumed.
    pub fn is_pending(&self) -> bool {
        self.signal.signaled()
    }
}
