//! Receive capture: the routine run when the chip's INT line falls.
//!
//! One invocation services at most one receive buffer, RXB0 before RXB1. The
//! slot's flag is cleared only after every register of the slot has been read,
//! since clearing it lets the chip reuse the buffer for the next frame.
//! Nothing here polls or waits: the routine is safe to call from an interrupt
//! handler.
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::config::DlcPolicy;
use crate::error::Error;
use crate::infra::registers::{dlc as dlc_bits, sidl as sidl_bits, Register, RxSlot};
use crate::infra::spi::RegisterAccess;
use crate::protocol::frame::{Frame, PackedId, MAX_DLC};
use crate::protocol::ring::FrameRing;

/// Upper bound on captures performed by one [`ReceiveCapture::service`] call.
///
/// Two covers both buffers; the margin absorbs frames that land while the
/// first ones are being read. Keeps the time spent in the edge handler
/// bounded under sustained traffic; see [`Serviced::pending`].
pub const MAX_CAPTURES_PER_SERVICE: usize = 4;

//==================================================================================OUTCOME
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Result of one capture attempt.
pub enum CaptureOutcome {
    /// CANINTF read zero: the edge had no pending flag behind it.
    Spurious,
    /// Some flag was set, but neither receive buffer is full.
    NoPendingSlot,
    /// A frame was read from `slot` and pushed into the ring.
    Captured { slot: RxSlot },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Result of one [`ReceiveCapture::service`] call.
pub struct Serviced {
    /// Frames pushed into the ring.
    pub captured: usize,
    /// A receive flag was still set when the capture budget ran out. INT is
    /// held low, so no new edge will arrive: the caller must service again.
    pub pending: bool,
}

//==================================================================================STATUS_INDICATOR
/// Status indicator for boards without one.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoIndicator;

impl ErrorType for NoIndicator {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoIndicator {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Holds the indicator high; releases it on every exit path.
struct Busy<'a, P: OutputPin>(&'a mut P);

impl<'a, P: OutputPin> Busy<'a, P> {
    fn assert(pin: &'a mut P) -> Self {
        // An indicator fault must not stop frame capture.
        let _ = pin.set_high();
        Self(pin)
    }
}

impl<P: OutputPin> Drop for Busy<'_, P> {
    fn drop(&mut self) {
        let _ = self.0.set_low();
    }
}

//==================================================================================RECEIVE_CAPTURE
/// Interrupt-side receive routine.
pub struct ReceiveCapture<P = NoIndicator> {
    indicator: P,
    dlc_policy: DlcPolicy,
}

impl ReceiveCapture<NoIndicator> {
    pub const fn new(dlc_policy: DlcPolicy) -> Self {
        Self {
            indicator: NoIndicator,
            dlc_policy,
        }
    }
}

impl<P: OutputPin> ReceiveCapture<P> {
    /// Capture routine driving `indicator` high while it works.
    pub const fn with_indicator(indicator: P, dlc_policy: DlcPolicy) -> Self {
        Self {
            indicator,
            dlc_policy,
        }
    }

    pub fn into_indicator(self) -> P {
        self.indicator
    }

    /// Service one receive buffer, if any is pending.
    ///
    /// Malformed or extended frames still get their flag cleared (the buffer
    /// is released) before the error is returned; the frame is dropped.
    pub fn capture<R: RegisterAccess, const N: usize>(
        &mut self,
        regs: &mut R,
        ring: &FrameRing<N>,
    ) -> Result<CaptureOutcome, Error<R::Error>> {
        let intf_addr = Register::CanIntf.addr();
        if regs.read_register(intf_addr).map_err(Error::Bus)? == 0 {
            #[cfg(feature = "defmt")]
            defmt::trace!("Spurious INT edge");
            return Ok(CaptureOutcome::Spurious);
        }

        let policy = self.dlc_policy;
        let _busy = Busy::assert(&mut self.indicator);

        let intf = regs.read_register(intf_addr).map_err(Error::Bus)?;
        let Some(slot) = RxSlot::ALL
            .into_iter()
            .find(|slot| intf & slot.intf_bit() != 0)
        else {
            return Ok(CaptureOutcome::NoPendingSlot);
        };

        let frame = match read_slot(regs, slot, policy) {
            Err(Error::Bus(err)) => return Err(Error::Bus(err)),
            other => other,
        };
        regs.modify_register(intf_addr, slot.intf_bit(), 0x00)
            .map_err(Error::Bus)?;
        let frame = frame?;

        #[cfg(feature = "defmt")]
        defmt::trace!("RX{=u8} id={=u16:#x} dlc={=u8}", slot.index(), frame.id, frame.dlc);

        ring.push(frame);
        Ok(CaptureOutcome::Captured { slot })
    }

    /// Capture until no receive buffer is pending.
    ///
    /// The INT line is level-low while any flag is set, so an edge-triggered
    /// input sees no new edge for a frame that was already waiting in RXB1
    /// when RXB0 got serviced. Calling this from the edge handler drains both.
    /// Non-bus errors are handed to `on_error` and servicing continues; a bus
    /// error is handed over and ends the call.
    ///
    /// After [`MAX_CAPTURES_PER_SERVICE`] captures CANINTF is checked once
    /// more. If a receive flag is still set the result has
    /// [`Serviced::pending`] set, and the caller must call again (or re-pend
    /// its interrupt) since the line stays low.
    pub fn service<R: RegisterAccess, const N: usize>(
        &mut self,
        regs: &mut R,
        ring: &FrameRing<N>,
        mut on_error: impl FnMut(Error<R::Error>),
    ) -> Serviced {
        let mut serviced = Serviced::default();
        for _ in 0..MAX_CAPTURES_PER_SERVICE {
            match self.capture(regs, ring) {
                Ok(CaptureOutcome::Captured { .. }) => serviced.captured += 1,
                Ok(_) => return serviced,
                Err(err @ Error::Bus(_)) => {
                    on_error(err);
                    return serviced;
                }
                Err(err) => on_error(err),
            }
        }

        match regs.read_register(Register::CanIntf.addr()) {
            Ok(intf) => {
                serviced.pending = RxSlot::ALL
                    .into_iter()
                    .any(|slot| intf & slot.intf_bit() != 0);
            }
            Err(err) => on_error(Error::Bus(err)),
        }
        #[cfg(feature = "defmt")]
        if serviced.pending {
            defmt::debug!("Receive budget spent with frames still pending");
        }
        serviced
    }
}

/// Read identifier, length and data of `slot`. Does not touch CANINTF.
fn read_slot<R: RegisterAccess>(
    regs: &mut R,
    slot: RxSlot,
    policy: DlcPolicy,
) -> Result<Frame, Error<R::Error>> {
    let sidh = regs.read_register(slot.sidh()).map_err(Error::Bus)?;
    let sidl = regs.read_register(slot.sidl()).map_err(Error::Bus)?;
    if sidl & sidl_bits::IDE != 0 {
        return Err(Error::ExtendedFrame { slot: slot.index() });
    }
    let id = PackedId { sidh, sidl }.id();
    let rtr = sidl & sidl_bits::SRR != 0;

    let raw_dlc = regs.read_register(slot.dlc()).map_err(Error::Bus)? & dlc_bits::DLC_MASK;
    let dlc = if raw_dlc <= MAX_DLC {
        raw_dlc
    } else {
        match policy {
            DlcPolicy::Reject => {
                return Err(Error::MalformedLength {
                    slot: slot.index(),
                    dlc: raw_dlc,
                })
            }
            DlcPolicy::Clamp => {
                #[cfg(feature = "defmt")]
                defmt::warn!("RX{=u8} DLC {=u8} clamped to 8", slot.index(), raw_dlc);
                MAX_DLC
            }
        }
    };

    // Remote frames carry a length but no data bytes.
    let mut data = [0u8; 8];
    if dlc > 0 && !rtr {
        regs.read_registers(slot.data(), &mut data[..dlc as usize])
            .map_err(Error::Bus)?;
    }

    Ok(Frame { id, rtr, dlc, data })
}
