use core::fmt;

/// Failure reported synchronously by the module operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Slot index out of range, or a configuration the hardware cannot honour
    IllegalArgument,
    /// Frame wasn't sent, either because its slot is still full or because the
    /// controller refused it
    TxOverflow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IllegalArgument => f.write_str("illegal argument"),
            Error::TxOverflow => f.write_str("transmit buffer overflow"),
        }
    }
}

impl core::error::Error for Error {}

bitflags::bitflags! {
    /// Sticky bus health flags read by the health monitor above the core.
    ///
    /// Values follow the CANopen driver error status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ErrorStatus: u16 {
        const TX_WARNING = 0x0001;
        const TX_PASSIVE = 0x0002;
        const TX_BUS_OFF = 0x0004;
        const TX_OVERFLOW = 0x0008;
        /// A synchronous PDO was cancelled because it could not go out in its window
        const TX_PDO_LATE = 0x0080;
        const RX_WARNING = 0x0100;
        const RX_PASSIVE = 0x0200;
        /// Received frames were dropped because the receive queue was full
        const RX_OVERFLOW = 0x0800;

        const WARNING = Self::TX_WARNING.bits() | Self::RX_WARNING.bits();
        const PASSIVE = Self::TX_PASSIVE.bits() | Self::RX_PASSIVE.bits();
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ErrorStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ErrorStatus({=u16:#06x})", self.bits())
    }
}
