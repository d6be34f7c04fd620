//! MCP2515 SPI instruction set, register map and bit masks.
//!
//! Addresses and masks carry the datasheet values; the names follow the
//! datasheet register names so they can be cross-checked against it.

//==================================================================================INSTRUCTIONS
/// Single-byte SPI instructions understood by the chip.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Reset internal registers to their default state (configuration mode).
    Reset = 0xC0,
    /// Read data starting at the selected address.
    Read = 0x03,
    /// Write data starting at the selected address.
    Write = 0x02,
    /// Masked write of a single register.
    BitModify = 0x05,
}

//==================================================================================CONTROL_REGISTERS
/// Fixed-address control and configuration registers.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    /// RXnBF pin control and status.
    BfpCtrl = 0x0C,
    /// TXnRTS pin control and status.
    TxRtsCtrl = 0x0D,
    /// CAN status (current operating mode in bits 7..5).
    CanStat = 0x0E,
    /// CAN control (requested operating mode, abort-all).
    CanCtrl = 0x0F,
    /// Bit-timing configuration 3.
    Cnf3 = 0x28,
    /// Bit-timing configuration 2.
    Cnf2 = 0x29,
    /// Bit-timing configuration 1.
    Cnf1 = 0x2A,
    /// Interrupt enable.
    CanInte = 0x2B,
    /// Interrupt flags.
    CanIntf = 0x2C,
}

impl Register {
    /// Raw register address.
    #[inline]
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

//==================================================================================BUFFERS
/// Distance between two consecutive buffer register blocks.
pub const BUFFER_STRIDE: u8 = 0x10;

/// Transmit buffer used by the driver. Only the first of the three hardware
/// buffers is scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxSlot {
    Txb0,
}

impl TxSlot {
    const fn base(self) -> u8 {
        match self {
            TxSlot::Txb0 => 0x30,
        }
    }

    pub const fn ctrl(self) -> u8 {
        self.base()
    }
    pub const fn sidh(self) -> u8 {
        self.base() + 0x01
    }
    pub const fn sidl(self) -> u8 {
        self.base() + 0x02
    }
    pub const fn eid8(self) -> u8 {
        self.base() + 0x03
    }
    pub const fn eid0(self) -> u8 {
        self.base() + 0x04
    }
    pub const fn dlc(self) -> u8 {
        self.base() + 0x05
    }
    /// First data register; the remaining seven follow contiguously.
    pub const fn data(self) -> u8 {
        self.base() + 0x06
    }

    /// Transmit-complete flag of this buffer in CANINTF.
    pub const fn intf_bit(self) -> u8 {
        match self {
            TxSlot::Txb0 => canintf::TX0IF,
        }
    }
}

/// Receive buffers, in servicing priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxSlot {
    Rxb0,
    Rxb1,
}

impl RxSlot {
    /// Both receive buffers, slot 0 first.
    pub const ALL: [RxSlot; 2] = [RxSlot::Rxb0, RxSlot::Rxb1];

    /// Slot number (0 or 1).
    pub const fn index(self) -> u8 {
        match self {
            RxSlot::Rxb0 => 0,
            RxSlot::Rxb1 => 1,
        }
    }

    const fn base(self) -> u8 {
        0x60 + self.index() * BUFFER_STRIDE
    }

    pub const fn ctrl(self) -> u8 {
        self.base()
    }
    pub const fn sidh(self) -> u8 {
        self.base() + 0x01
    }
    pub const fn sidl(self) -> u8 {
        self.base() + 0x02
    }
    pub const fn dlc(self) -> u8 {
        self.base() + 0x05
    }
    /// First data register; the remaining seven follow contiguously.
    pub const fn data(self) -> u8 {
        self.base() + 0x06
    }

    /// Receive-full flag of this buffer in CANINTF.
    pub const fn intf_bit(self) -> u8 {
        canintf::RX0IF << self.index()
    }

    /// Receive interrupt-enable bit of this buffer in CANINTE.
    pub const fn inte_bit(self) -> u8 {
        caninte::RX0IE << self.index()
    }
}

//==================================================================================BIT_MASKS
/// CANCTRL bits.
pub mod canctrl {
    /// Requested operating mode field.
    pub const REQOP_MASK: u8 = 0xE0;
    /// Abort all pending transmissions.
    pub const ABAT: u8 = 0x10;
}

/// CANSTAT bits.
pub mod canstat {
    /// Current operating mode field.
    pub const OPMOD_MASK: u8 = 0xE0;
}

/// CANINTE bits.
pub mod caninte {
    pub const RX0IE: u8 = 0x01;
    pub const RX1IE: u8 = 0x02;
}

/// CANINTF bits.
pub mod canintf {
    pub const RX0IF: u8 = 0x01;
    pub const RX1IF: u8 = 0x02;
    pub const TX0IF: u8 = 0x04;
}

/// TXBnCTRL bits.
pub mod txbctrl {
    /// Transmission pending.
    pub const TXREQ: u8 = 0x08;
    /// Bus error detected during transmission.
    pub const TXERR: u8 = 0x10;
    /// Message lost arbitration.
    pub const MLOA: u8 = 0x20;
    /// Message aborted.
    pub const ABTF: u8 = 0x40;
    /// Any of the failure flags.
    pub const ERROR_MASK: u8 = ABTF | MLOA | TXERR;
}

/// RXBnCTRL bits.
pub mod rxbctrl {
    /// Receive buffer operating mode: `11` turns masks and filters off.
    pub const RXM_ACCEPT_ALL: u8 = 0x60;
}

/// SIDL bits (shared layout for TX and RX buffers).
pub mod sidl {
    /// Standard frame remote transmit request (receive buffers).
    pub const SRR: u8 = 0x10;
    /// Extended identifier flag.
    pub const IDE: u8 = 0x08;
}

/// DLC register bits.
pub mod dlc {
    /// Remote transmission request (transmit buffers).
    pub const RTR: u8 = 0x40;
    /// Data length code field.
    pub const DLC_MASK: u8 = 0x0F;
}
