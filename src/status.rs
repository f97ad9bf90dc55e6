//! Bus error status aggregation
//!
//! Folds the controller's protocol error snapshot into the sticky [`ErrorStatus`] word. Only a
//! change of the snapshot updates the word. Bus-off is latched and left to the controller's
//! automatic recovery; nothing here re-arms it.

use crate::error::ErrorStatus;
use crate::transport::ErrorRegister;

const WATCHED: ErrorRegister = ErrorRegister::BUS_OFF
    .union(ErrorRegister::ERROR_PASSIVE)
    .union(ErrorRegister::ERROR_WARNING);

const RECOMPUTED: ErrorStatus = ErrorStatus::TX_BUS_OFF
    .union(ErrorStatus::WARNING)
    .union(ErrorStatus::PASSIVE);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusAggregator {
    status: ErrorStatus,
    /// Watched bits of the last snapshot
    previous: ErrorRegister,
}

impl StatusAggregator {
    pub const fn new() -> Self {
        Self {
            status: ErrorStatus::empty(),
            previous: ErrorRegister::empty(),
        }
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    pub fn set(&mut self, flags: ErrorStatus) {
        self.status |= flags;
    }

    pub fn clear(&mut self, flags: ErrorStatus) {
        self.status &= !flags;
    }

    /// Applies a new snapshot. Returns `true` if it differed from the previous one.
    pub fn poll(&mut self, raw: ErrorRegister) -> bool {
        let err = raw & WATCHED;
        if err == self.previous {
            return false;
        }
        self.previous = err;

        if err.contains(ErrorRegister::BUS_OFF) {
            self.status |= ErrorStatus::TX_BUS_OFF;
            log::warn!("CAN bus off");
        } else {
            self.status &= !RECOMPUTED;
            if err.contains(ErrorRegister::ERROR_WARNING) {
                self.status |= ErrorStatus::WARNING;
            }
            if err.contains(ErrorRegister::ERROR_PASSIVE) {
                self.status |= ErrorStatus::PASSIVE;
            }
            log::debug!("CAN error state {:?} -> status {:#06x}", err, self.status.bits());
        }
        true
    }
}

impl Default for StatusAggregator {
    fn default() -> Self {
        Self::new()
    }
}
