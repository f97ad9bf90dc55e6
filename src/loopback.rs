//! In-memory transport
//!
//! Stands in for a controller in silent loopback mode: written frames are kept in a small
//! mailbox queue instead of going to a bus, and the error register is whatever the owner
//! sets. The transport is shared by reference so the owner can inspect it while a
//! [`CanModule`](crate::CanModule) holds it.

use core::cell::RefCell;
use critical_section::Mutex;
use embedded_can::ErrorKind;
use heapless::{Deque, Vec};

use crate::frame::CanFrame;
use crate::transport::{CanFilter, CanMode, ErrorRegister, FilterError, Transport};

/// Capacity of the sent-frame queue. Writes fail once it is full.
pub const MAILBOX_DEPTH: usize = 16;

/// Number of filter banks the loopback accepts, 0-27
pub const FILTER_BANKS: usize = 28;

struct State {
    began: bool,
    bit_rate: u32,
    mode: Option<CanMode>,
    fail_writes: bool,
    fail_start: bool,
    write_attempts: usize,
    sent: Deque<CanFrame, MAILBOX_DEPTH>,
    error_register: ErrorRegister,
    filters: Vec<CanFilter, FILTER_BANKS>,
}

pub struct Loopback {
    state: Mutex<RefCell<State>>,
}

impl Loopback {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                began: false,
                bit_rate: 0,
                mode: None,
                fail_writes: false,
                fail_start: false,
                write_attempts: 0,
                sent: Deque::new(),
                error_register: ErrorRegister::empty(),
                filters: Vec::new(),
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs)))
    }

    /// Makes every following write fail as if no mailbox were free.
    pub fn set_fail_writes(&self, fail: bool) {
        self.with(|state| state.fail_writes = fail)
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.with(|state| state.fail_start = fail)
    }

    pub fn set_error_register(&self, value: ErrorRegister) {
        self.with(|state| state.error_register = value)
    }

    /// Oldest frame written and not yet taken.
    pub fn pop_sent(&self) -> Option<CanFrame> {
        self.with(|state| state.sent.pop_front())
    }

    pub fn sent_len(&self) -> usize {
        self.with(|state| state.sent.len())
    }

    /// Number of `write` calls, successful or not.
    pub fn write_attempts(&self) -> usize {
        self.with(|state| state.write_attempts)
    }

    pub fn began(&self) -> bool {
        self.with(|state| state.began)
    }

    pub fn bit_rate(&self) -> u32 {
        self.with(|state| state.bit_rate)
    }

    /// Mode the transport was started in, `None` while in configuration mode.
    pub fn mode(&self) -> Option<CanMode> {
        self.with(|state| state.mode)
    }

    pub fn filter(&self, bank: usize) -> Option<CanFilter> {
        self.with(|state| state.filters.iter().find(|f| f.bank == bank).copied())
    }
}

impl Default for Loopback {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for &Loopback {
    type Error = ErrorKind;

    fn begin(&mut self) {
        self.with(|state| {
            state.began = true;
            state.mode = None;
        })
    }

    fn set_baud_rate(&mut self, bit_rate: u32) {
        self.with(|state| state.bit_rate = bit_rate)
    }

    fn start(&mut self, mode: CanMode) -> Result<(), Self::Error> {
        self.with(|state| {
            if state.fail_start || !state.began {
                return Err(ErrorKind::Other);
            }
            state.mode = Some(mode);
            Ok(())
        })
    }

    fn stop(&mut self) {
        self.with(|state| state.mode = None)
    }

    fn write(&mut self, frame: &CanFrame) -> nb::Result<(), Self::Error> {
        self.with(|state| {
            state.write_attempts += 1;
            if state.fail_writes {
                return Err(nb::Error::WouldBlock);
            }
            state
                .sent
                .push_back(*frame)
                .map_err(|_| nb::Error::WouldBlock)
        })
    }

    fn error_register(&self) -> ErrorRegister {
        self.with(|state| state.error_register)
    }

    fn add_filter(&mut self, filter: &CanFilter) -> Result<(), FilterError> {
        if filter.bank >= FILTER_BANKS {
            return Err(FilterError::BankOutOfRange);
        }
        self.with(|state| {
            if let Some(existing) = state.filters.iter_mut().find(|f| f.bank == filter.bank) {
                *existing = *filter;
                return Ok(());
            }
            state
                .filters
                .push(*filter)
                .map_err(|_| FilterError::Rejected)
        })
    }
}
