//! Standard CAN frame and the chip's two-register identifier layout.
use embedded_can::{Id, StandardId};

/// Largest 11-bit identifier.
pub const MAX_STANDARD_ID: u16 = 0x7FF;
/// Largest classic CAN data length.
pub const MAX_DLC: u8 = 8;

//==================================================================================FRAME
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// One standard CAN frame as exchanged with the controller.
pub struct Frame {
    /// 11-bit identifier.
    pub id: u16,
    /// Remote transmission request.
    pub rtr: bool,
    /// Data length code, 0 to 8.
    pub dlc: u8,
    /// Payload buffer; bytes past `dlc` are unspecified.
    pub data: [u8; 8],
}

impl Default for Frame {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Frame {
    /// All-zero data frame with id 0, used to initialise buffers.
    pub const EMPTY: Frame = Frame {
        id: 0,
        rtr: false,
        dlc: 0,
        data: [0; 8],
    };

    /// Data frame. `None` when `id` exceeds 11 bits or `data` exceeds 8 bytes.
    pub fn new(id: u16, data: &[u8]) -> Option<Self> {
        if id > MAX_STANDARD_ID || data.len() > MAX_DLC as usize {
            return None;
        }
        let mut frame = Frame {
            id,
            dlc: data.len() as u8,
            ..Self::EMPTY
        };
        frame.data[..data.len()].copy_from_slice(data);
        Some(frame)
    }

    /// Remote frame requesting `dlc` bytes.
    pub fn new_remote(id: u16, dlc: u8) -> Option<Self> {
        if id > MAX_STANDARD_ID || dlc > MAX_DLC {
            return None;
        }
        Some(Frame {
            id,
            rtr: true,
            dlc,
            ..Self::EMPTY
        })
    }

    /// The valid payload bytes. Empty for remote frames.
    pub fn payload(&self) -> &[u8] {
        if self.rtr {
            return &[];
        }
        &self.data[..self.dlc.min(MAX_DLC) as usize]
    }
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Standard(id) => Frame::new(id.as_raw(), data),
            Id::Extended(_) => None,
        }
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        match id.into() {
            Id::Standard(id) if dlc <= MAX_DLC as usize => Frame::new_remote(id.as_raw(), dlc as u8),
            _ => None,
        }
    }

    fn is_extended(&self) -> bool {
        false
    }

    fn is_remote_frame(&self) -> bool {
        self.rtr
    }

    fn id(&self) -> Id {
        Id::Standard(StandardId::new(self.id & MAX_STANDARD_ID).unwrap_or(StandardId::ZERO))
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}

//==================================================================================PACKED_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// An 11-bit identifier split across the SIDH/SIDL register pair.
///
/// SIDH holds bits 10..3, the top three bits of SIDL hold bits 2..0. The low
/// five bits of SIDL (SRR, IDE, extended id bits) are left at zero.
pub struct PackedId {
    pub sidh: u8,
    pub sidl: u8,
}

impl PackedId {
    /// Split an identifier. Bits above 10 are discarded.
    pub fn pack(id: u16) -> Self {
        let id = id & MAX_STANDARD_ID;
        Self {
            sidh: (id >> 3) as u8,
            sidl: (id << 5) as u8,
        }
    }

    /// Rebuild the identifier, ignoring the low five bits of SIDL.
    pub fn id(&self) -> u16 {
        (((self.sidh as u16) << 3) | ((self.sidl as u16) >> 5)) & MAX_STANDARD_ID
    }
}
