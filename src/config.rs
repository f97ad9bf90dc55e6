use crate::transport::{CanFifo, CanMode};

/// Where receive acceptance filtering happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFiltering {
    /// Every frame reaches the routing table
    #[default]
    Software,
    /// Each receive slot is also programmed into the controller filter bank of the same
    /// index, routing accepted frames to the given FIFO
    Hardware(CanFifo),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Bus bit rate in bit/s
    pub bit_rate: u32,
    /// Mode entered by `set_normal_mode`
    pub mode: CanMode,
    pub rx_filtering: RxFiltering,
}

impl Config {
    pub const DEFAULT_BIT_RATE: u32 = 125_000;

    /// Bit rate given in kbit/s, as stored in the CANopen object dictionary.
    pub fn with_bit_rate_kbps(mut self, kbps: u16) -> Self {
        self.bit_rate = u32::from(kbps) * 1000;
        self
    }

    pub fn with_mode(mut self, mode: CanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_rx_filtering(mut self, rx_filtering: RxFiltering) -> Self {
        self.rx_filtering = rx_filtering;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bit_rate: Self::DEFAULT_BIT_RATE,
            mode: CanMode::Normal,
            rx_filtering: RxFiltering::Software,
        }
    }
}
