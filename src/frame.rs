//! Classic CAN frame carried between the transport and the slot tables

use embedded_can::{Id, StandardId};

/// Mask of the 11-bit standard identifier space.
pub const CANID_MASK: u16 = 0x07FF;

/// Remote-frame marker folded into identifiers used for matching.
pub const FLAG_RTR: u16 = 0x8000;

/// Maximum payload of a classic CAN frame.
pub const MAX_DLC: usize = 8;

/// A received or transmitted classic CAN frame with a standard identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanFrame {
    /// Identifier, 0-0x7FF
    id: u16,
    /// Remote transmission request
    rtr: bool,
    /// Message length in bytes, 0-8
    dlc: u8,
    /// Message data up to `dlc` bytes, 0 after that
    data: [u8; MAX_DLC],
}

impl CanFrame {
    /// Creates a data frame. Returns `None` if `data` is longer than 8 bytes.
    pub fn new_data(ident: u16, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_DLC {
            return None;
        }
        let mut bytes = [0; MAX_DLC];
        bytes[..data.len()].copy_from_slice(data);

        Some(Self {
            id: ident & CANID_MASK,
            rtr: false,
            dlc: data.len() as u8,
            data: bytes,
        })
    }

    /// Creates a remote frame requesting `dlc` bytes.
    pub fn new_rtr(ident: u16, dlc: usize) -> Option<Self> {
        if dlc > MAX_DLC {
            return None;
        }
        Some(Self {
            id: ident & CANID_MASK,
            rtr: true,
            dlc: dlc as u8,
            data: [0; MAX_DLC],
        })
    }

    /// Builds a frame from an identifier already encoded with [`FLAG_RTR`].
    pub(crate) fn from_encoded(encoded: u16, dlc: u8, payload: &[u8; MAX_DLC]) -> Self {
        let dlc = dlc.min(MAX_DLC as u8);
        let mut data = [0; MAX_DLC];
        data[..dlc as usize].copy_from_slice(&payload[..dlc as usize]);

        Self {
            id: encoded & CANID_MASK,
            rtr: encoded & FLAG_RTR != 0,
            dlc,
            data,
        }
    }

    /// 11-bit identifier without flags.
    pub fn ident(&self) -> u16 {
        self.id
    }

    /// Identifier with the remote-frame marker folded in, as compared by the routing table.
    pub fn match_ident(&self) -> u16 {
        (self.id & CANID_MASK) | if self.rtr { FLAG_RTR } else { 0 }
    }

    pub fn is_rtr(&self) -> bool {
        self.rtr
    }

    pub fn dlc(&self) -> u8 {
        self.dlc
    }

    /// Payload bytes, `dlc` long. Empty for remote frames.
    pub fn data(&self) -> &[u8] {
        if self.rtr {
            &[]
        } else {
            &self.data[..self.dlc as usize]
        }
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Standard(id) => Self::new_data(id.as_raw(), data),
            Id::Extended(_) => None,
        }
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        match id.into() {
            Id::Standard(id) => Self::new_rtr(id.as_raw(), dlc),
            Id::Extended(_) => None,
        }
    }

    fn is_extended(&self) -> bool {
        false
    }

    fn is_remote_frame(&self) -> bool {
        self.rtr
    }

    fn id(&self) -> Id {
        // id is always masked to 11 bits on construction
        Id::Standard(StandardId::new(self.id).unwrap_or(StandardId::ZERO))
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        CanFrame::data(self)
    }
}
