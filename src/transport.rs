//! Hardware boundary of the core
//!
//! Any peripheral driver that can start and stop the controller, write a frame and report
//! its protocol error state can carry a [`CanModule`](crate::CanModule).

use crate::frame::CanFrame;

/// Controller operating mode requested when leaving configuration mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanMode {
    #[default]
    Normal,
    Silent,
    Loopback,
    SilentLoopback,
}

impl CanMode {
    /// Loopback mode setting
    pub fn loopback(&self) -> bool {
        matches!(self, CanMode::Loopback | CanMode::SilentLoopback)
    }

    /// Silent mode setting
    pub fn silent(&self) -> bool {
        matches!(self, CanMode::Silent | CanMode::SilentLoopback)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanFifo {
    #[default]
    Fifo0,
    Fifo1,
}

/// Filter bank programming request handed to the peripheral when receive filtering is
/// delegated to hardware.
///
/// Banks always work in identifier mask mode: an incoming frame passes when it equals
/// `id_value` on every bit set in `id_mask` and its remote-frame bit equals `rtr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanFilter {
    /// Filter bank number, equal to the receive slot index
    pub bank: usize,
    /// 11-bit identifier to be matched with an incoming message's identifier.
    pub id_value: u16,
    /// Bit mask applied to the incoming identifier before comparing it to `id_value`.
    pub id_mask: u16,
    /// Accept remote frames instead of data frames. The remote-frame bit is always compared.
    pub rtr: bool,
    /// FIFO receiving the frames accepted by this bank
    pub fifo: CanFifo,
}

impl CanFilter {
    pub fn id_mask(bank: usize, id_value: u16, id_mask: u16, rtr: bool, fifo: CanFifo) -> Self {
        Self {
            bank,
            id_value,
            id_mask,
            rtr,
            fifo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterError {
    /// The peripheral cannot filter in hardware
    Unsupported,
    /// Filter bank does not exist on the peripheral
    BankOutOfRange,
    /// The peripheral refused the filter configuration
    Rejected,
}

bitflags::bitflags! {
    /// Raw protocol error snapshot reported by the transport.
    ///
    /// Drivers translate their status register into these bits. Bits outside the three
    /// named conditions may be kept with `from_bits_retain` and are ignored by the error
    /// aggregator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ErrorRegister: u32 {
        /// Error warning limit reached (a counter went above 96)
        const ERROR_WARNING = 1 << 0;
        /// Error passive (a counter went above 127)
        const ERROR_PASSIVE = 1 << 1;
        /// Bus off (transmit counter went above 255)
        const BUS_OFF = 1 << 2;
    }
}

/// Narrow contract the core needs from a CAN peripheral driver.
pub trait Transport {
    type Error: embedded_can::Error;

    /// Brings the peripheral up into configuration mode.
    fn begin(&mut self);

    /// Bit rate in bit/s.
    fn set_baud_rate(&mut self, bit_rate: u32);

    /// Leaves configuration mode and starts taking part in bus traffic.
    fn start(&mut self, mode: CanMode) -> Result<(), Self::Error>;

    /// Returns to configuration mode.
    fn stop(&mut self);

    /// Hands a frame to the controller. Any error, `WouldBlock` included, means the frame
    /// did not go out.
    fn write(&mut self, frame: &CanFrame) -> nb::Result<(), Self::Error>;

    fn error_register(&self) -> ErrorRegister;

    /// Programs a hardware acceptance filter bank.
    fn add_filter(&mut self, filter: &CanFilter) -> Result<(), FilterError> {
        let _ = filter;
        Err(FilterError::Unsupported)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn begin(&mut self) {
        (**self).begin()
    }

    fn set_baud_rate(&mut self, bit_rate: u32) {
        (**self).set_baud_rate(bit_rate)
    }

    fn start(&mut self, mode: CanMode) -> Result<(), Self::Error> {
        (**self).start(mode)
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn write(&mut self, frame: &CanFrame) -> nb::Result<(), Self::Error> {
        (**self).write(frame)
    }

    fn error_register(&self) -> ErrorRegister {
        (**self).error_register()
    }

    fn add_filter(&mut self, filter: &CanFilter) -> Result<(), FilterError> {
        (**self).add_filter(filter)
    }
}
