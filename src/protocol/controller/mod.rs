//! Chip bring-up and operating mode control.
//!
//! [`Controller`] owns the [`DriverConfig`] and turns it into register
//! writes. It also builds the [`Transmitter`] and [`ReceiveCapture`] matching
//! that configuration, so every part of the driver agrees on the same poll
//! bound and length policy.
use embedded_hal::delay::DelayNs;

use crate::config::{DriverConfig, OperationMode};
use crate::error::Error;
use crate::infra::registers::{canctrl, canstat, rxbctrl, Register, RxSlot};
use crate::infra::spi::RegisterAccess;
use crate::protocol::receive::ReceiveCapture;
use crate::protocol::transmit::Transmitter;

/// Oscillator start-up time to wait after a reset, in microseconds.
///
/// The datasheet asks for 128 oscillator cycles; this leaves a wide margin
/// for slow-starting crystals.
pub const RESET_SETTLE_US: u32 = 100;

/// CANSTAT reads allowed for a mode change to take effect.
///
/// Leaving normal mode waits for the bus to go idle, which is a few bit times
/// at most.
pub const MODE_CHANGE_POLLS: u32 = 32;

//==================================================================================CONTROLLER
#[derive(Clone, Copy, Debug, Default)]
/// Bring-up sequence and mode switching for one chip.
pub struct Controller {
    config: DriverConfig,
}

impl Controller {
    pub const fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Transmit path using the configured poll bound.
    pub fn transmitter(&self) -> Transmitter {
        Transmitter::new(self.config.tx_poll)
    }

    /// Receive routine using the configured length policy, without indicator.
    pub fn receive_capture(&self) -> ReceiveCapture {
        ReceiveCapture::new(self.config.dlc_policy)
    }

    /// Reset and configure the chip, then enter the configured mode.
    ///
    /// Bit timing, receive interrupts on both buffers, RXnBF/TXnRTS pins off,
    /// and both receive buffers accepting every frame (masks and filters off).
    pub fn configure<R: RegisterAccess>(
        &self,
        regs: &mut R,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<R::Error>> {
        #[cfg(feature = "defmt")]
        defmt::info!("Resetting CAN controller");

        regs.reset().map_err(Error::Bus)?;
        delay.delay_us(RESET_SETTLE_US);

        self.set_mode(regs, OperationMode::Configuration)?;

        let timing = self.config.bit_timing;
        regs.write_register(Register::Cnf1.addr(), timing.cnf1)
            .map_err(Error::Bus)?;
        regs.write_register(Register::Cnf2.addr(), timing.cnf2)
            .map_err(Error::Bus)?;
        regs.write_register(Register::Cnf3.addr(), timing.cnf3)
            .map_err(Error::Bus)?;

        let inte = RxSlot::ALL
            .into_iter()
            .fold(0, |mask, slot| mask | slot.inte_bit());
        regs.write_register(Register::CanInte.addr(), inte)
            .map_err(Error::Bus)?;

        regs.write_register(Register::BfpCtrl.addr(), 0x00)
            .map_err(Error::Bus)?;
        regs.write_register(Register::TxRtsCtrl.addr(), 0x00)
            .map_err(Error::Bus)?;
        for slot in RxSlot::ALL {
            regs.write_register(slot.ctrl(), rxbctrl::RXM_ACCEPT_ALL)
                .map_err(Error::Bus)?;
        }

        self.set_mode(regs, self.config.mode)?;

        #[cfg(feature = "defmt")]
        defmt::info!("CAN controller up in {} mode", self.config.mode);
        Ok(())
    }

    /// Request `mode` and wait until CANSTAT reports it.
    pub fn set_mode<R: RegisterAccess>(
        &self,
        regs: &mut R,
        mode: OperationMode,
    ) -> Result<(), Error<R::Error>> {
        let requested = mode.bits();
        regs.modify_register(Register::CanCtrl.addr(), canctrl::REQOP_MASK, requested)
            .map_err(Error::Bus)?;

        let mut actual = 0;
        for _ in 0..MODE_CHANGE_POLLS {
            actual = regs.read_register(Register::CanStat.addr()).map_err(Error::Bus)?
                & canstat::OPMOD_MASK;
            if actual == requested {
                return Ok(());
            }
        }

        #[cfg(feature = "defmt")]
        defmt::warn!(
            "Mode change refused: requested {=u8:#x}, CANSTAT {=u8:#x}",
            requested,
            actual
        );
        Err(Error::ModeChange { requested, actual })
    }

    /// Current operating mode. `None` while the chip sleeps.
    pub fn mode<R: RegisterAccess>(
        &self,
        regs: &mut R,
    ) -> Result<Option<OperationMode>, Error<R::Error>> {
        let stat = regs
            .read_register(Register::CanStat.addr())
            .map_err(Error::Bus)?;
        Ok(OperationMode::from_bits(stat & canstat::OPMOD_MASK))
    }
}
