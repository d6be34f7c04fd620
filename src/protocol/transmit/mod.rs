//! Transmit state machine for the single transmit buffer (TXB0).
//!
//! Sequence: load identifier, length and data; request send; poll TXREQ,
//! requesting an abort when the chip reports a transmit error or lost
//! arbitration; clear TX0IF; read TXB0CTRL one last time to decide success.
//! The final check must come after the flag clear and the poll, otherwise the
//! error bits of the attempt would be lost.
//!
//! An abort is requested on a transmit error and also on lost arbitration.
//! Left alone the chip would retry a lost arbitration indefinitely; here it
//! ends the send with [`Error::Transmit`] and the caller decides whether to
//! resend.
//!
//! Once an abort is requested, TXB0CTRL is polled until TXREQ clears before
//! ABAT is released. A frame already on the wire finishes (or fails) first,
//! and the buffer must not be reloaded while its request is still pending.
//!
//! Runs in the consumer context only: the poll loop may busy-wait.
use embassy_time::Instant;

use crate::config::PollBound;
use crate::error::Error;
use crate::infra::registers::{canctrl, dlc, txbctrl, Register, TxSlot};
use crate::infra::spi::RegisterAccess;
use crate::protocol::frame::{Frame, PackedId, MAX_DLC, MAX_STANDARD_ID};

/// TXB0CTRL reads allowed for a requested abort to take effect.
///
/// The chip lets a frame already on the wire finish first: at most one frame
/// time, about 1 ms at 125 kbit/s, which is a few hundred register reads.
pub const ABORT_POLLS: u32 = 1024;

#[derive(Clone, Copy, Debug, Default)]
/// Loads and sends frames through TXB0.
pub struct Transmitter {
    bound: PollBound,
}

impl Transmitter {
    pub const fn new(bound: PollBound) -> Self {
        Self { bound }
    }

    pub fn poll_bound(&self) -> PollBound {
        self.bound
    }

    /// Send a data frame. `Ok(())` means the chip reported a clean transmission.
    pub fn send<R: RegisterAccess>(
        &self,
        regs: &mut R,
        id: u16,
        data: &[u8],
    ) -> Result<(), Error<R::Error>> {
        if data.len() > MAX_DLC as usize {
            return Err(Error::InvalidLength { len: data.len() });
        }
        let frame = Frame::new(id, data).ok_or(Error::InvalidId { id })?;
        self.transmit(regs, &frame)
    }

    /// Send a data or remote frame.
    pub fn transmit<R: RegisterAccess>(
        &self,
        regs: &mut R,
        frame: &Frame,
    ) -> Result<(), Error<R::Error>> {
        if frame.id > MAX_STANDARD_ID {
            return Err(Error::InvalidId { id: frame.id });
        }
        if frame.dlc > MAX_DLC {
            return Err(Error::InvalidLength {
                len: frame.dlc as usize,
            });
        }

        let slot = TxSlot::Txb0;
        load(regs, slot, frame).map_err(Error::Bus)?;

        #[cfg(feature = "defmt")]
        defmt::trace!("TX request id={=u16:#x} dlc={=u8}", frame.id, frame.dlc);

        regs.write_register(slot.ctrl(), txbctrl::TXREQ)
            .map_err(Error::Bus)?;

        let wait = self.wait_for_completion(regs, slot)?;

        regs.modify_register(Register::CanIntf.addr(), slot.intf_bit(), 0x00)
            .map_err(Error::Bus)?;

        if let Wait::TimedOut { polls } = wait {
            #[cfg(feature = "defmt")]
            defmt::warn!("TX still pending after {} polls, aborted", polls);
            return Err(Error::Timeout { polls });
        }

        let ctrl = regs.read_register(slot.ctrl()).map_err(Error::Bus)?;
        if ctrl & txbctrl::ERROR_MASK != 0 {
            #[cfg(feature = "defmt")]
            defmt::warn!("TX failed, TXB0CTRL={=u8:#x}", ctrl);
            return Err(Error::Transmit {
                aborted: ctrl & txbctrl::ABTF != 0,
                arbitration_lost: ctrl & txbctrl::MLOA != 0,
                bus_error: ctrl & txbctrl::TXERR != 0,
            });
        }
        Ok(())
    }

    /// Poll TXREQ until it clears or the bound runs out.
    fn wait_for_completion<R: RegisterAccess>(
        &self,
        regs: &mut R,
        slot: TxSlot,
    ) -> Result<Wait, Error<R::Error>> {
        let started = match self.bound {
            PollBound::Deadline(_) => Some(Instant::now()),
            _ => None,
        };
        let mut polls: u32 = 0;
        let mut abort_requested = false;

        let outcome = loop {
            let ctrl = regs.read_register(slot.ctrl()).map_err(Error::Bus)?;
            polls = polls.saturating_add(1);
            if ctrl & txbctrl::TXREQ == 0 {
                break Wait::Done;
            }

            if ctrl & (txbctrl::TXERR | txbctrl::MLOA) != 0 && !abort_requested {
                #[cfg(feature = "defmt")]
                defmt::debug!("TX error or arbitration loss, requesting abort");
                request_abort(regs).map_err(Error::Bus)?;
                abort_requested = true;
            }

            let exhausted = match (self.bound, started) {
                (PollBound::Iterations(max), _) => polls >= max,
                (PollBound::Deadline(limit), Some(t0)) => t0.elapsed() >= limit,
                _ => false,
            };
            if exhausted {
                break Wait::TimedOut { polls };
            }
        };

        if let Wait::TimedOut { .. } = outcome {
            if !abort_requested {
                request_abort(regs).map_err(Error::Bus)?;
                abort_requested = true;
            }
            // ABAT stays set on failure so the chip still drops the request.
            wait_for_abort(regs, slot)?;
        }

        // ABAT stays latched until cleared and would abort every later send.
        if abort_requested {
            regs.modify_register(Register::CanCtrl.addr(), canctrl::ABAT, 0x00)
                .map_err(Error::Bus)?;
        }
        Ok(outcome)
    }
}

enum Wait {
    Done,
    TimedOut { polls: u32 },
}

/// Write identifier, length and payload into the buffer registers.
fn load<R: RegisterAccess>(regs: &mut R, slot: TxSlot, frame: &Frame) -> Result<(), R::Error> {
    let packed = PackedId::pack(frame.id);
    regs.write_register(slot.sidh(), packed.sidh)?;
    regs.write_register(slot.sidl(), packed.sidl)?;
    regs.write_register(slot.eid8(), 0x00)?;
    regs.write_register(slot.eid0(), 0x00)?;

    let rtr = if frame.rtr { dlc::RTR } else { 0x00 };
    regs.write_register(slot.dlc(), frame.dlc | rtr)?;

    let payload = frame.payload();
    if !payload.is_empty() {
        regs.write_registers(slot.data(), payload)?;
    }
    Ok(())
}

/// Poll until a requested abort has cleared TXREQ.
fn wait_for_abort<R: RegisterAccess>(regs: &mut R, slot: TxSlot) -> Result<(), Error<R::Error>> {
    for _ in 0..ABORT_POLLS {
        let ctrl = regs.read_register(slot.ctrl()).map_err(Error::Bus)?;
        if ctrl & txbctrl::TXREQ == 0 {
            return Ok(());
        }
    }
    #[cfg(feature = "defmt")]
    defmt::error!("TX abort not acknowledged after {} polls", ABORT_POLLS);
    Err(Error::AbortStalled {
        polls: ABORT_POLLS,
    })
}

fn request_abort<R: RegisterAccess>(regs: &mut R) -> Result<(), R::Error> {
    regs.modify_register(Register::CanCtrl.addr(), canctrl::ABAT, canctrl::ABAT)
}
