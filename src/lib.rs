//! `spican` library: `no_std` driver for the MCP2515 stand-alone CAN
//! controller behind an SPI bus. The crate exposes the register access layer
//! (instruction set, SPI transactions, shared bus wrapper), the driver logic
//! (bring-up, transmit, interrupt-driven receive, frame ring, consumer loop)
//! and its configuration.
#![no_std]
#[cfg(test)]
extern crate std;
//==================================================================================
/// Driver configuration: bit timing, operating mode, poll bound, length policy.
pub mod config;
/// Driver errors, generic over the register access error.
pub mod error;
/// Register map, SPI register transactions and shared bus access.
pub mod infra;
/// Frames, controller bring-up, transmit and receive paths, ring buffer and
/// consumer loop.
pub mod protocol;
#[cfg(test)]
mod testing;
//==================================================================================
pub use config::{BitTiming, DlcPolicy, DriverConfig, OperationMode, PollBound};
pub use error::Error;
pub use infra::shared::SharedRegisters;
pub use infra::spi::{RegisterAccess, SpiRegisters};
pub use protocol::consumer::{ConsumerLoop, DeferredReceiver, FrameSink, Polled};
pub use protocol::controller::Controller;
pub use protocol::frame::Frame;
pub use protocol::interrupt::InterruptLatch;
pub use protocol::receive::{CaptureOutcome, ReceiveCapture, Serviced};
pub use protocol::ring::FrameRing;
pub use protocol::transmit::Transmitter;
//==================================================================================
