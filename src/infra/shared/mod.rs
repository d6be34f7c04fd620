//! Register access shared between interrupt context and main context.
//!
//! Receive capture may run inside the INT pin handler while the main loop is
//! in the middle of a transmit. Both sides go through the same
//! [`SharedRegisters`], which holds a critical section for exactly one
//! register transaction at a time. The lock is never held across the transmit
//! poll loop, so interrupt latency stays bounded by one SPI transaction.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::infra::spi::RegisterAccess;

/// Critical-section protected wrapper around a [`RegisterAccess`] implementation.
///
/// `&SharedRegisters<R>` implements [`RegisterAccess`] itself, so a single
/// `static` instance can be handed to both the interrupt handler and the
/// consumer loop.
pub struct SharedRegisters<R> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<R>>,
}

impl<R> SharedRegisters<R> {
    pub const fn new(regs: R) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(regs)),
        }
    }

    /// Run `f` with exclusive access to the wrapped registers.
    ///
    /// Interrupts stay masked for the whole closure: keep it to a handful of
    /// transactions.
    pub fn with<U>(&self, f: impl FnOnce(&mut R) -> U) -> U {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner().into_inner()
    }
}

impl<R: RegisterAccess> RegisterAccess for &SharedRegisters<R> {
    type Error = R::Error;

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.with(|regs| regs.reset())
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, Self::Error> {
        self.with(|regs| regs.read_register(addr))
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Self::Error> {
        self.with(|regs| regs.write_register(addr, value))
    }

    fn modify_register(&mut self, addr: u8, mask: u8, value: u8) -> Result<(), Self::Error> {
        self.with(|regs| regs.modify_register(addr, mask, value))
    }

    fn read_registers(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.with(|regs| regs.read_registers(addr, buf))
    }

    fn write_registers(&mut self, addr: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.with(|regs| regs.write_registers(addr, data))
    }
}
