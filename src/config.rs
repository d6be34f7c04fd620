//! Driver configuration: fixed bit-timing sets, operating mode, transmit poll
//! bound and receive length policy.
use embassy_time::Duration;

//==================================================================================BIT_TIMING
/// Raw CNF1/CNF2/CNF3 values for one oscillator/bitrate pair.
///
/// The driver never computes bit timing; pick one of the constants or supply
/// values from the datasheet tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    pub cnf1: u8,
    pub cnf2: u8,
    pub cnf3: u8,
}

impl BitTiming {
    /// 16 MHz crystal, 125 kbit/s (PiCAN2 default wiring).
    pub const MHZ16_125KBPS: BitTiming = BitTiming {
        cnf1: 0x03,
        cnf2: 0xF0,
        cnf3: 0x86,
    };
    /// 16 MHz crystal, 250 kbit/s.
    pub const MHZ16_250KBPS: BitTiming = BitTiming {
        cnf1: 0x01,
        cnf2: 0xF0,
        cnf3: 0x86,
    };
    /// 16 MHz crystal, 500 kbit/s.
    pub const MHZ16_500KBPS: BitTiming = BitTiming {
        cnf1: 0x00,
        cnf2: 0xF0,
        cnf3: 0x86,
    };
}

impl Default for BitTiming {
    fn default() -> Self {
        Self::MHZ16_125KBPS
    }
}

//==================================================================================OPERATION_MODE
/// Operating modes the driver can request after configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperationMode {
    #[default]
    Normal,
    /// Internal loopback: frames sent are received locally, nothing reaches the bus.
    Loopback,
    /// Receive only, no acknowledgements.
    ListenOnly,
    /// Required to write the bit-timing and filter registers.
    Configuration,
}

impl OperationMode {
    /// Value of the REQOP/OPMOD field (bits 7..5).
    pub const fn bits(self) -> u8 {
        match self {
            OperationMode::Normal => 0x00,
            OperationMode::Loopback => 0x40,
            OperationMode::ListenOnly => 0x60,
            OperationMode::Configuration => 0x80,
        }
    }

    /// Decode an OPMOD field. Sleep mode (0x20) has no counterpart and yields `None`.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0xE0 {
            0x00 => Some(OperationMode::Normal),
            0x40 => Some(OperationMode::Loopback),
            0x60 => Some(OperationMode::ListenOnly),
            0x80 => Some(OperationMode::Configuration),
            _ => None,
        }
    }
}

//==================================================================================POLL_BOUND
/// How long the transmit path waits for TXREQ to clear.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PollBound {
    /// Busy-wait until the chip finishes, however long that takes.
    #[default]
    Unbounded,
    /// Give up after this many reads of TXB0CTRL.
    Iterations(u32),
    /// Give up once this much time has elapsed since the send request.
    Deadline(Duration),
}

/// Suggested deadline for [`PollBound::Deadline`].
///
/// One 8-byte standard frame takes about 1 ms at 125 kbit/s; a few arbitration
/// rounds and automatic retransmissions fit comfortably in 100 ms.
pub const TX_DEADLINE_MS: u64 = 100;

//==================================================================================DLC_POLICY
/// What receive capture does with a length field above 8.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DlcPolicy {
    /// Drop the frame and report [`Error::MalformedLength`](crate::error::Error::MalformedLength).
    #[default]
    Reject,
    /// Keep the frame with its length clamped to 8.
    Clamp,
}

//==================================================================================DRIVER_CONFIG
/// Complete driver configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriverConfig {
    pub bit_timing: BitTiming,
    /// Mode entered at the end of bring-up.
    pub mode: OperationMode,
    pub tx_poll: PollBound,
    pub dlc_policy: DlcPolicy,
}

impl DriverConfig {
    pub fn with_bit_timing(mut self, bit_timing: BitTiming) -> Self {
        self.bit_timing = bit_timing;
        self
    }

    pub fn with_mode(mut self, mode: OperationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_tx_poll(mut self, tx_poll: PollBound) -> Self {
        self.tx_poll = tx_poll;
        self
    }

    pub fn with_dlc_policy(mut self, dlc_policy: DlcPolicy) -> Self {
        self.dlc_policy = dlc_policy;
        self
    }
}
