//! Consumer side: pull frames out of the ring and hand them to the
//! application's reporting collaborator.
use core::convert::Infallible;

use crate::error::Error;
use crate::infra::spi::RegisterAccess;
use crate::protocol::frame::Frame;
use crate::protocol::interrupt::InterruptLatch;
use crate::protocol::receive::ReceiveCapture;
use crate::protocol::ring::FrameRing;

use embedded_hal::digital::OutputPin;

//==================================================================================FRAME_SINK
/// Destination of received frames (console, telemetry, application logic).
pub trait FrameSink<E: core::fmt::Debug = Infallible> {
    /// Called once per frame, in arrival order.
    fn on_frame(&mut self, frame: &Frame);

    /// Called for lost frames and receive errors. Ignored unless overridden.
    fn on_error(&mut self, error: Error<E>) {
        let _ = error;
    }
}

impl<E: core::fmt::Debug, F: FnMut(&Frame)> FrameSink<E> for F {
    fn on_frame(&mut self, frame: &Frame) {
        self(frame)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Result of one [`ConsumerLoop::poll_once`].
pub enum Polled {
    /// A frame went to the sink.
    Dispatched,
    /// Nothing to do; the caller may idle.
    Idle,
}

//==================================================================================CONSUMER_LOOP
/// Polling consumer for the direct mode, where receive capture runs in the
/// interrupt handler and only the ring is shared. Capture errors stay on the
/// interrupt side, so the sink only ever sees [`Error::RingOverwrite`].
pub struct ConsumerLoop<'a, S, const N: usize> {
    ring: &'a FrameRing<N>,
    sink: S,
}

impl<'a, S: FrameSink, const N: usize> ConsumerLoop<'a, S, N> {
    pub fn new(ring: &'a FrameRing<N>, sink: S) -> Self {
        Self { ring, sink }
    }

    pub fn sink(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Pop at most one frame and dispatch it.
    pub fn poll_once(&mut self) -> Polled {
        let popped = self.ring.try_pop();
        report_overwrites::<Infallible, _, N>(self.ring, &mut self.sink);
        match popped {
            Some(frame) => {
                self.sink.on_frame(&frame);
                Polled::Dispatched
            }
            None => Polled::Idle,
        }
    }

    /// Dispatch everything currently in the ring. Returns the frame count.
    pub fn drain(&mut self) -> usize {
        let mut dispatched = 0;
        while let Polled::Dispatched = self.poll_once() {
            dispatched += 1;
        }
        dispatched
    }

    /// Poll forever, calling `idle` whenever the ring is empty.
    pub fn run(&mut self, mut idle: impl FnMut()) -> ! {
        loop {
            if let Polled::Idle = self.poll_once() {
                idle();
            }
        }
    }
}

fn report_overwrites<E: core::fmt::Debug, S: FrameSink<E>, const N: usize>(
    ring: &FrameRing<N>,
    sink: &mut S,
) {
    let lost = ring.take_overwritten();
    if lost > 0 {
        sink.on_error(Error::RingOverwrite { lost });
    }
}

//==================================================================================DEFERRED_RECEIVER
/// Consumer for the deferred mode: the edge handler only raises the
/// [`InterruptLatch`], and this task performs capture and dispatch.
pub struct DeferredReceiver<'a, R, P, S, const N: usize> {
    regs: R,
    capture: ReceiveCapture<P>,
    latch: &'a InterruptLatch,
    ring: &'a FrameRing<N>,
    sink: S,
}

impl<'a, R, P, S, const N: usize> DeferredReceiver<'a, R, P, S, N>
where
    R: RegisterAccess,
    P: OutputPin,
    S: FrameSink<R::Error>,
{
    pub fn new(
        regs: R,
        capture: ReceiveCapture<P>,
        latch: &'a InterruptLatch,
        ring: &'a FrameRing<N>,
        sink: S,
    ) -> Self {
        Self {
            regs,
            capture,
            latch,
            ring,
            sink,
        }
    }

    /// Register access, e.g. to transmit between two receive rounds.
    pub fn regs(&mut self) -> &mut R {
        &mut self.regs
    }

    pub fn sink(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Service the chip and dispatch what it had. Returns the frames dispatched.
    ///
    /// When the chip still holds frames after the capture budget, the latch
    /// is raised again: INT stays low, so no edge would ever wake the next
    /// round.
    pub fn process(&mut self) -> usize {
        let sink = &mut self.sink;
        let serviced = self
            .capture
            .service(&mut self.regs, self.ring, |err| sink.on_error(err));
        if serviced.pending {
            self.latch.on_falling_edge();
        }

        let mut dispatched = 0;
        loop {
            let popped = self.ring.try_pop();
            report_overwrites::<R::Error, _, N>(self.ring, &mut self.sink);
            match popped {
                Some(frame) => {
                    self.sink.on_frame(&frame);
                    dispatched += 1;
                }
                None => break dispatched,
            }
        }
    }

    /// Wait for one edge, then process it.
    pub async fn run_once(&mut self) -> usize {
        self.latch.wait().await;
        self.process()
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.run_once().await;
        }
    }
}
