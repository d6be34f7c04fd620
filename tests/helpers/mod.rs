/// Test double simulating an MCP2515 behind an `SpiDevice`.
///
/// Every SPI transaction is decoded byte by byte like the chip does it
/// (instruction, address, then auto-incremented data), so the tests exercise
/// the real `SpiRegisters` framing.
use core::convert::Infallible;
use embedded_hal::spi::{ErrorType, Operation, SpiDevice};
use spican::protocol::frame::{Frame, PackedId};
use std::sync::{Arc, Mutex};

const RESET: u8 = 0xC0;
const READ: u8 = 0x03;
const WRITE: u8 = 0x02;
const BITMOD: u8 = 0x05;

const CANSTAT: u8 = 0x0E;
const CANCTRL: u8 = 0x0F;
const CANINTF: u8 = 0x2C;
const TXB0CTRL: u8 = 0x30;
const TXREQ: u8 = 0x08;
const ABAT: u8 = 0x10;
const ABTF: u8 = 0x40;
const TXERR: u8 = 0x10;
const MLOA: u8 = 0x20;
const LOOPBACK: u8 = 0x40;

#[allow(dead_code)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// How the simulated chip answers a transmit request.
pub enum TxBehavior {
    /// TXREQ clears after this many TXB0CTRL reads.
    CompleteAfter(u32),
    /// TXERR and MLOA raised, TXREQ held until ABAT.
    LoseArbitration,
}

/// Chip state shared by every clone of a [`FakeSpi`].
pub struct ChipState {
    pub regs: [u8; 0x80],
    /// MOSI bytes of every transaction, in order.
    pub transactions: Vec<Vec<u8>>,
    /// Frames that left TXB0 successfully.
    pub sent: Vec<Frame>,
    pub tx_behavior: TxBehavior,
    pending_polls: u32,
    /// ABAT seen with TXREQ set; the abort lands on the next TXB0CTRL read.
    abort_pending: bool,
}

impl ChipState {
    fn new() -> Self {
        let mut state = Self {
            regs: [0; 0x80],
            transactions: Vec::new(),
            sent: Vec::new(),
            tx_behavior: TxBehavior::CompleteAfter(1),
            pending_polls: 0,
            abort_pending: false,
        };
        state.power_on();
        state
    }

    fn power_on(&mut self) {
        self.pending_polls = 0;
        self.abort_pending = false;
        self.regs = [0; 0x80];
        self.regs[CANSTAT as usize] = 0x80;
        self.regs[CANCTRL as usize] = 0x87;
    }

    /// Load a frame into receive buffer `slot` and raise its flag.
    pub fn inject(&mut self, slot: u8, frame: &Frame) {
        let base = 0x60 + slot as usize * 0x10;
        let packed = PackedId::pack(frame.id);
        self.regs[base + 1] = packed.sidh;
        self.regs[base + 2] = packed.sidl | if frame.rtr { 0x10 } else { 0x00 };
        self.regs[base + 5] = frame.dlc;
        self.regs[base + 6..base + 14].copy_from_slice(&frame.data);
        self.regs[CANINTF as usize] |= 1 << slot;
    }

    /// `true` while receive buffer `slot` still holds an unread frame.
    pub fn rx_pending(&self, slot: u8) -> bool {
        self.regs[CANINTF as usize] & (1 << slot) != 0
    }

    fn read(&mut self, addr: u8) -> u8 {
        let value = self.regs[addr as usize & 0x7F];
        if addr == TXB0CTRL && self.pending_polls > 0 {
            self.pending_polls -= 1;
            self.complete_if_due();
        }
        if addr == TXB0CTRL && self.abort_pending {
            let ctrl = self.regs[TXB0CTRL as usize];
            self.regs[TXB0CTRL as usize] = (ctrl & !TXREQ) | ABTF;
            self.abort_pending = false;
        }
        value
    }

    fn store(&mut self, addr: u8, value: u8) {
        let addr = addr & 0x7F;
        self.regs[addr as usize] = value;

        if addr == CANCTRL {
            self.regs[CANSTAT as usize] = (self.regs[CANSTAT as usize] & 0x1F) | (value & 0xE0);
            if value & ABAT != 0 && self.regs[TXB0CTRL as usize] & TXREQ != 0 {
                self.abort_pending = true;
            }
        }

        if addr == TXB0CTRL && value & TXREQ != 0 {
            match self.tx_behavior {
                TxBehavior::CompleteAfter(polls) => {
                    self.pending_polls = polls;
                    self.complete_if_due();
                }
                TxBehavior::LoseArbitration => {
                    self.regs[TXB0CTRL as usize] |= TXERR | MLOA;
                }
            }
        }
    }

    fn complete_if_due(&mut self) {
        if self.pending_polls != 0 || self.regs[TXB0CTRL as usize] & TXREQ == 0 {
            return;
        }
        self.regs[TXB0CTRL as usize] &= !TXREQ;
        self.regs[CANINTF as usize] |= 0x04;

        let b = TXB0CTRL as usize;
        let dlc = self.regs[b + 5] & 0x0F;
        let rtr = self.regs[b + 5] & 0x40 != 0;
        let mut data = [0u8; 8];
        if !rtr {
            let len = dlc.min(8) as usize;
            data[..len].copy_from_slice(&self.regs[b + 6..b + 6 + len]);
        }
        let frame = Frame {
            id: PackedId {
                sidh: self.regs[b + 1],
                sidl: self.regs[b + 2],
            }
            .id(),
            rtr,
            dlc,
            data,
        };
        self.sent.push(frame);

        // Loopback hands the frame straight to the first free receive buffer.
        if self.regs[CANSTAT as usize] & 0xE0 == LOOPBACK {
            if let Some(slot) = (0..2).find(|s| !self.rx_pending(*s)) {
                self.inject(slot, &frame);
            }
        }
    }

    /// Feed one decoded transaction through the instruction decoder.
    fn execute(&mut self, mosi: &[u8]) -> Vec<u8> {
        let mut miso = vec![0u8; mosi.len()];
        match mosi.first() {
            Some(&RESET) => self.power_on(),
            Some(&READ) if mosi.len() > 2 => {
                for (i, out) in miso.iter_mut().enumerate().skip(2) {
                    *out = self.read(mosi[1].wrapping_add(i as u8 - 2));
                }
            }
            Some(&WRITE) if mosi.len() > 2 => {
                for (i, byte) in mosi.iter().enumerate().skip(2) {
                    self.store(mosi[1].wrapping_add(i as u8 - 2), *byte);
                }
            }
            Some(&BITMOD) if mosi.len() == 4 => {
                let (addr, mask, data) = (mosi[1], mosi[2], mosi[3]);
                let current = self.regs[addr as usize & 0x7F];
                self.store(addr, (current & !mask) | (data & mask));
            }
            _ => panic!("malformed SPI transaction: {mosi:02x?}"),
        }
        self.transactions.push(mosi.to_vec());
        miso
    }
}

#[derive(Clone)]
/// SPI device wired to a simulated chip. Clones share the same chip.
pub struct FakeSpi {
    state: Arc<Mutex<ChipState>>,
}

#[allow(dead_code)]
impl FakeSpi {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ChipState::new())),
        }
    }

    /// Inspect or poke the chip from the test body.
    pub fn chip<U>(&self, f: impl FnOnce(&mut ChipState) -> U) -> U {
        f(&mut self.state.lock().unwrap())
    }
}

impl ErrorType for FakeSpi {
    type Error = Infallible;
}

impl SpiDevice for FakeSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        // Chip select stays low for the whole transaction: gather every
        // clocked byte first, then decode them as one instruction.
        let mut mosi = Vec::new();
        for op in operations.iter() {
            match op {
                Operation::Read(buf) => mosi.extend(std::iter::repeat(0).take(buf.len())),
                Operation::Write(buf) => mosi.extend_from_slice(buf),
                Operation::Transfer(read, write) => {
                    let len = read.len().max(write.len());
                    mosi.extend((0..len).map(|i| write.get(i).copied().unwrap_or(0)));
                }
                Operation::TransferInPlace(buf) => mosi.extend_from_slice(buf),
                Operation::DelayNs(_) => {}
            }
        }

        let miso = self.state.lock().unwrap().execute(&mosi);

        let mut pos = 0;
        for op in operations.iter_mut() {
            match op {
                Operation::Read(buf) => {
                    buf.copy_from_slice(&miso[pos..pos + buf.len()]);
                    pos += buf.len();
                }
                Operation::Write(buf) => pos += buf.len(),
                Operation::Transfer(read, write) => {
                    let len = read.len().max(write.len());
                    for (i, out) in read.iter_mut().enumerate() {
                        *out = miso[pos + i];
                    }
                    pos += len;
                }
                Operation::TransferInPlace(buf) => {
                    let len = buf.len();
                    buf.copy_from_slice(&miso[pos..pos + len]);
                    pos += len;
                }
                Operation::DelayNs(_) => {}
            }
        }
        Ok(())
    }
}

#[allow(dead_code)]
/// Delay provider that returns immediately.
pub struct NoDelay;

impl embedded_hal::delay::DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
