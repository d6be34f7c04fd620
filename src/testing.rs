//! In-memory register file standing in for the chip in unit tests.
use core::convert::Infallible;
use std::vec::Vec;

use crate::infra::registers::{canctrl, canintf, canstat, txbctrl, Register, RxSlot, TxSlot};
use crate::infra::spi::RegisterAccess;
use crate::protocol::frame::{Frame, PackedId};

/// How the simulated transmit buffer reacts to TXREQ.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TxScript {
    /// TXREQ clears after this many TXB0CTRL reads, TX0IF is raised.
    CompleteAfter(u32),
    /// TXERR and MLOA are raised, TXREQ stays set until ABAT.
    LoseArbitration,
    /// TXREQ never clears on its own; ABAT still aborts it.
    Stuck,
}

/// One logged register transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Access {
    Reset,
    Read(u8),
    Write(u8, u8),
    Modify(u8, u8, u8),
}

pub(crate) struct FakeRegisters {
    pub regs: [u8; 0x80],
    pub log: Vec<Access>,
    pub tx_script: TxScript,
    /// TXB0CTRL reads between ABAT and the abort taking effect; `None` never aborts.
    pub abort_latency: Option<u32>,
    pending_polls: u32,
    abort_countdown: Option<u32>,
}

impl FakeRegisters {
    pub fn new() -> Self {
        Self {
            regs: [0; 0x80],
            log: Vec::new(),
            tx_script: TxScript::CompleteAfter(0),
            abort_latency: Some(0),
            pending_polls: 0,
            abort_countdown: None,
        }
    }

    pub fn with_tx_script(tx_script: TxScript) -> Self {
        Self {
            tx_script,
            ..Self::new()
        }
    }

    pub fn with_abort_latency(mut self, abort_latency: Option<u32>) -> Self {
        self.abort_latency = abort_latency;
        self
    }

    pub fn reg(&self, addr: u8) -> u8 {
        self.regs[addr as usize]
    }

    /// Load a received frame into `slot` and raise its flag, like the chip does.
    pub fn inject(&mut self, slot: RxSlot, frame: &Frame) {
        let packed = PackedId::pack(frame.id);
        let srr = if frame.rtr { 0x10 } else { 0x00 };
        self.regs[slot.sidh() as usize] = packed.sidh;
        self.regs[slot.sidl() as usize] = packed.sidl | srr;
        self.regs[slot.dlc() as usize] = frame.dlc;
        for (i, byte) in frame.data.iter().enumerate() {
            self.regs[slot.data() as usize + i] = *byte;
        }
        self.regs[Register::CanIntf as usize] |= slot.intf_bit();
    }

    /// Number of logged writes/modifies (anything that changes chip state).
    pub fn mutations(&self) -> usize {
        self.log
            .iter()
            .filter(|a| matches!(a, Access::Write(..) | Access::Modify(..)))
            .count()
    }

    fn store(&mut self, addr: u8, value: u8) {
        self.regs[addr as usize] = value;
        let tx = TxSlot::Txb0;

        if addr == Register::CanCtrl.addr() {
            let opmod = value & canctrl::REQOP_MASK;
            let stat = self.regs[Register::CanStat as usize] & !canstat::OPMOD_MASK;
            self.regs[Register::CanStat as usize] = stat | opmod;

            let pending = self.regs[tx.ctrl() as usize] & txbctrl::TXREQ != 0;
            if value & canctrl::ABAT != 0 && pending && self.abort_countdown.is_none() {
                match self.abort_latency {
                    Some(0) => self.abort_now(),
                    Some(reads) => self.abort_countdown = Some(reads),
                    None => {}
                }
            }
        }

        if addr == tx.ctrl() && value & txbctrl::TXREQ != 0 {
            match self.tx_script {
                TxScript::CompleteAfter(polls) => self.pending_polls = polls,
                TxScript::LoseArbitration => {
                    self.regs[tx.ctrl() as usize] |= txbctrl::TXERR | txbctrl::MLOA;
                }
                TxScript::Stuck => {}
            }
            self.complete_if_due();
        }
    }

    fn abort_now(&mut self) {
        let ctrl = self.regs[TxSlot::Txb0.ctrl() as usize];
        self.regs[TxSlot::Txb0.ctrl() as usize] = (ctrl & !txbctrl::TXREQ) | txbctrl::ABTF;
        self.abort_countdown = None;
    }

    fn complete_if_due(&mut self) {
        let tx = TxSlot::Txb0;
        if let TxScript::CompleteAfter(_) = self.tx_script {
            if self.pending_polls == 0 && self.regs[tx.ctrl() as usize] & txbctrl::TXREQ != 0 {
                self.regs[tx.ctrl() as usize] &= !txbctrl::TXREQ;
                self.regs[Register::CanIntf as usize] |= canintf::TX0IF;
            }
        }
    }
}

impl RegisterAccess for FakeRegisters {
    type Error = Infallible;

    fn reset(&mut self) -> Result<(), Infallible> {
        self.log.push(Access::Reset);
        self.pending_polls = 0;
        self.abort_countdown = None;
        self.regs = [0; 0x80];
        self.regs[Register::CanStat as usize] = 0x80;
        self.regs[Register::CanCtrl as usize] = 0x87;
        Ok(())
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, Infallible> {
        self.log.push(Access::Read(addr));
        let value = self.regs[addr as usize];
        if addr == TxSlot::Txb0.ctrl() {
            if self.pending_polls > 0 {
                self.pending_polls -= 1;
                self.complete_if_due();
            }
            match self.abort_countdown {
                Some(1) => self.abort_now(),
                Some(reads) => self.abort_countdown = Some(reads - 1),
                None => {}
            }
        }
        Ok(value)
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Infallible> {
        self.log.push(Access::Write(addr, value));
        self.store(addr, value);
        Ok(())
    }

    fn modify_register(&mut self, addr: u8, mask: u8, value: u8) -> Result<(), Infallible> {
        self.log.push(Access::Modify(addr, mask, value));
        let current = self.regs[addr as usize];
        self.store(addr, (current & !mask) | (value & mask));
        Ok(())
    }
}

/// Chip under sustained traffic: every cleared receive flag is followed by a
/// new frame in RXB0. Starts with frame id 0 pending; ids count up.
pub(crate) struct Refilling {
    pub regs: FakeRegisters,
    pub refill: bool,
    next_id: u16,
}

impl Refilling {
    pub fn new() -> Self {
        let mut regs = FakeRegisters::new();
        regs.inject(RxSlot::Rxb0, &Frame::EMPTY);
        Self {
            regs,
            refill: true,
            next_id: 1,
        }
    }
}

impl RegisterAccess for Refilling {
    type Error = Infallible;

    fn reset(&mut self) -> Result<(), Infallible> {
        self.regs.reset()
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, Infallible> {
        self.regs.read_register(addr)
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Infallible> {
        self.regs.write_register(addr, value)
    }

    fn modify_register(&mut self, addr: u8, mask: u8, value: u8) -> Result<(), Infallible> {
        self.regs.modify_register(addr, mask, value)?;
        let rx_flags = canintf::RX0IF | canintf::RX1IF;
        if self.refill && addr == Register::CanIntf.addr() && mask & rx_flags != 0 {
            let frame = Frame {
                id: self.next_id,
                ..Frame::EMPTY
            };
            self.next_id += 1;
            self.regs.inject(RxSlot::Rxb0, &frame);
        }
        Ok(())
    }
}
