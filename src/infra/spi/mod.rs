//! Register transactions over SPI.
//!
//! Every method is one complete chip-select framed transaction: the
//! [`SpiDevice`] asserts CS before the first byte and releases it after the
//! last one, which is what keeps two transactions from interleaving on the
//! wire.
use embedded_hal::spi::{Operation, SpiDevice};

use crate::infra::registers::Instruction;

//==================================================================================REGISTER_ACCESS
/// Primitive register operations of the chip.
///
/// Higher layers (transmit, receive capture, bring-up) are written against
/// this trait so they can run over a plain SPI device, over a bus shared
/// between interrupt and main context, or over a test double.
pub trait RegisterAccess {
    type Error: core::fmt::Debug;

    /// Send the reset instruction. The chip returns to configuration mode.
    fn reset(&mut self) -> Result<(), Self::Error>;

    /// Read a single register.
    fn read_register(&mut self, addr: u8) -> Result<u8, Self::Error>;

    /// Write a single register.
    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Self::Error>;

    /// Change only the bits of `addr` selected by `mask`.
    fn modify_register(&mut self, addr: u8, mask: u8, value: u8) -> Result<(), Self::Error>;

    /// Read consecutive registers starting at `addr`.
    fn read_registers(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        for (offset, byte) in buf.iter_mut().enumerate() {
            *byte = self.read_register(addr.wrapping_add(offset as u8))?;
        }
        Ok(())
    }

    /// Write consecutive registers starting at `addr`.
    fn write_registers(&mut self, addr: u8, data: &[u8]) -> Result<(), Self::Error> {
        for (offset, byte) in data.iter().enumerate() {
            self.write_register(addr.wrapping_add(offset as u8), *byte)?;
        }
        Ok(())
    }
}

impl<R: RegisterAccess + ?Sized> RegisterAccess for &mut R {
    type Error = R::Error;

    fn reset(&mut self) -> Result<(), Self::Error> {
        (**self).reset()
    }
    fn read_register(&mut self, addr: u8) -> Result<u8, Self::Error> {
        (**self).read_register(addr)
    }
    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Self::Error> {
        (**self).write_register(addr, value)
    }
    fn modify_register(&mut self, addr: u8, mask: u8, value: u8) -> Result<(), Self::Error> {
        (**self).modify_register(addr, mask, value)
    }
    fn read_registers(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_registers(addr, buf)
    }
    fn write_registers(&mut self, addr: u8, data: &[u8]) -> Result<(), Self::Error> {
        (**self).write_registers(addr, data)
    }
}

//==================================================================================SPI_REGISTERS
/// [`RegisterAccess`] over an `embedded-hal` SPI device.
///
/// The device must be configured for SPI mode 0 (or 3), MSB first, at a clock
/// the board wiring tolerates (the chip accepts up to 10 MHz).
pub struct SpiRegisters<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> SpiRegisters<SPI> {
    pub const fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Give the SPI device back.
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> RegisterAccess for SpiRegisters<SPI> {
    type Error = SPI::Error;

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.spi.write(&[Instruction::Reset as u8])
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, Self::Error> {
        // The response is clocked in while the dummy third byte goes out.
        let mut frame = [Instruction::Read as u8, addr, 0x00];
        self.spi.transfer_in_place(&mut frame)?;
        Ok(frame[2])
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Self::Error> {
        self.spi.write(&[Instruction::Write as u8, addr, value])
    }

    fn modify_register(&mut self, addr: u8, mask: u8, value: u8) -> Result<(), Self::Error> {
        self.spi
            .write(&[Instruction::BitModify as u8, addr, mask, value])
    }

    fn read_registers(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        let header = [Instruction::Read as u8, addr];
        self.spi
            .transaction(&mut [Operation::Write(&header), Operation::Read(buf)])
    }

    fn write_registers(&mut self, addr: u8, data: &[u8]) -> Result<(), Self::Error> {
        let header = [Instruction::Write as u8, addr];
        self.spi
            .transaction(&mut [Operation::Write(&header), Operation::Write(data)])
    }
}
