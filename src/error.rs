//! Error definitions shared across the driver.
//!
//! `E` is the error type of the underlying register access (usually the SPI
//! device error). Spurious interrupts are not errors: they are reported as
//! [`CaptureOutcome`](crate::protocol::receive::CaptureOutcome) values.
use thiserror_no_std::Error;

#[derive(Error, Debug, PartialEq, Eq)]
/// Everything the driver can report.
pub enum Error<E: core::fmt::Debug> {
    /// The SPI layer failed a register transaction.
    #[error("SPI bus error: {0:?}")]
    Bus(E),

    /// The transmit buffer stayed pending for the whole poll bound.
    #[error("Transmission still pending after {polls} polls")]
    Timeout { polls: u32 },

    /// A requested abort never cleared TXREQ. ABAT is left set, so the
    /// controller needs a reconfigure before the next send.
    #[error("Transmit abort still pending after {polls} polls")]
    AbortStalled { polls: u32 },

    /// The final TXB0CTRL read reported a failed transmission.
    #[error(
        "Transmission failed (aborted: {aborted}, arbitration lost: {arbitration_lost}, bus error: {bus_error})"
    )]
    Transmit {
        aborted: bool,
        arbitration_lost: bool,
        bus_error: bool,
    },

    /// A receive buffer reported a data length code above 8.
    #[error("Receive slot {slot} reported DLC {dlc}")]
    MalformedLength { slot: u8, dlc: u8 },

    /// A receive buffer holds an extended (29-bit) frame, which is not supported.
    #[error("Receive slot {slot} holds an extended frame")]
    ExtendedFrame { slot: u8 },

    /// The consumer fell behind and unread frames were overwritten.
    #[error("{lost} unread frames overwritten")]
    RingOverwrite { lost: usize },

    /// Identifier does not fit in 11 bits.
    #[error("Identifier {id:#x} exceeds 11 bits")]
    InvalidId { id: u16 },

    /// Payload longer than 8 bytes.
    #[error("Data length {len} exceeds 8 bytes")]
    InvalidLength { len: usize },

    /// The chip did not enter the requested operating mode.
    #[error("Mode change failed: requested {requested:#04x}, CANSTAT reports {actual:#04x}")]
    ModeChange { requested: u8, actual: u8 },
}

impl<E: core::fmt::Debug> embedded_can::Error for Error<E> {
    fn kind(&self) -> embedded_can::ErrorKind {
        match self {
            Error::RingOverwrite { .. } => embedded_can::ErrorKind::Overrun,
            Error::MalformedLength { .. } | Error::ExtendedFrame { .. } => {
                embedded_can::ErrorKind::Form
            }
            _ => embedded_can::ErrorKind::Other,
        }
    }
}
