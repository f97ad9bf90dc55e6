//! Transmit slot pool
//!
//! One slot per outgoing message stream. A slot whose frame the controller refused is marked
//! full and counted as pending; it stays full until the stream allocates it again or, for
//! sync-gated slots, until [`TxPool::cancel_sync_gated`] drops it.

use crate::error::Error;
use crate::frame::{CanFrame, CANID_MASK, FLAG_RTR, MAX_DLC};
use crate::transport::Transport;

/// Reference to an allocated transmit slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxHandle(usize);

impl TxHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxSlot {
    /// Identifier with the remote-frame marker folded in
    ident: u16,
    /// Message length in bytes, 0-8
    dlc: u8,
    data: [u8; MAX_DLC],
    /// Last write of this slot failed and the frame is still waiting
    full: bool,
    /// Frame belongs to a synchronous window and may be cancelled in bulk
    sync: bool,
}

impl TxSlot {
    pub const EMPTY: Self = Self {
        ident: 0,
        dlc: 0,
        data: [0; MAX_DLC],
        full: false,
        sync: false,
    };

    pub fn ident(&self) -> u16 {
        self.ident
    }

    pub fn dlc(&self) -> u8 {
        self.dlc
    }

    pub fn data(&self) -> &[u8; MAX_DLC] {
        &self.data
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn is_sync(&self) -> bool {
        self.sync
    }

    pub fn frame(&self) -> CanFrame {
        CanFrame::from_encoded(self.ident, self.dlc, &self.data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxError {
    /// Handle does not address a slot of this pool
    BadHandle,
    /// Slot still holds a frame that failed to go out
    SlotFull,
    /// Controller refused the frame
    WriteFailed,
}

impl From<TxError> for Error {
    fn from(value: TxError) -> Self {
        match value {
            TxError::BadHandle => Error::IllegalArgument,
            TxError::SlotFull | TxError::WriteFailed => Error::TxOverflow,
        }
    }
}

/// What [`TxPool::cancel_sync_gated`] dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CancelOutcome {
    /// A sync-gated frame had been handed to the controller in the current window
    pub inhibit_cancelled: bool,
    /// Number of full sync-gated slots freed
    pub slots_cleared: usize,
}

impl CancelOutcome {
    pub fn is_empty(&self) -> bool {
        !self.inhibit_cancelled && self.slots_cleared == 0
    }
}

pub struct TxPool<const N: usize> {
    slots: [TxSlot; N],
    /// Number of full slots
    pending: usize,
    /// Last frame handed to the controller was sync-gated
    inhibit_pending: bool,
    /// No frame has been handed to the controller yet
    first_tx: bool,
}

impl<const N: usize> TxPool<N> {
    pub const fn new() -> Self {
        Self {
            slots: [TxSlot::EMPTY; N],
            pending: 0,
            inhibit_pending: false,
            first_tx: true,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn inhibit_pending(&self) -> bool {
        self.inhibit_pending
    }

    pub fn is_first_tx(&self) -> bool {
        self.first_tx
    }

    pub fn slot(&self, handle: TxHandle) -> Option<&TxSlot> {
        self.slots.get(handle.0)
    }

    /// Assigns the slot at `index` to a message stream and clears its full flag.
    ///
    /// Returns `None` if `index` is out of range or `dlc` exceeds 8.
    pub fn allocate(
        &mut self,
        index: usize,
        ident: u16,
        rtr: bool,
        dlc: u8,
        sync: bool,
    ) -> Option<TxHandle> {
        if dlc as usize > MAX_DLC {
            return None;
        }
        let slot = self.slots.get_mut(index)?;

        if slot.full {
            self.pending -= 1;
        }
        slot.ident = (ident & CANID_MASK) | if rtr { FLAG_RTR } else { 0 };
        slot.dlc = dlc;
        slot.full = false;
        slot.sync = sync;
        Some(TxHandle(index))
    }

    /// Payload buffer of the slot, filled by the stream before [`TxPool::send`].
    pub fn data_mut(&mut self, handle: TxHandle) -> Option<&mut [u8; MAX_DLC]> {
        self.slots.get_mut(handle.0).map(|slot| &mut slot.data)
    }

    /// Writes the slot's frame to the controller.
    ///
    /// A full slot is refused without touching the controller once any frame of the pool has
    /// gone out; until then full slots are written again. A refused write marks the slot full.
    /// A successful write never clears it: only [`TxPool::allocate`] and
    /// [`TxPool::cancel_sync_gated`] free a full slot.
    pub fn send<T: Transport>(
        &mut self,
        transport: &mut T,
        handle: TxHandle,
    ) -> Result<(), TxError> {
        let slot = self.slots.get_mut(handle.0).ok_or(TxError::BadHandle)?;

        if slot.full && !self.first_tx {
            return Err(TxError::SlotFull);
        }

        match transport.write(&slot.frame()) {
            Ok(()) => {
                self.first_tx = false;
                self.inhibit_pending = slot.sync;
                Ok(())
            }
            Err(_) => {
                if !slot.full {
                    slot.full = true;
                    self.pending += 1;
                }
                Err(TxError::WriteFailed)
            }
        }
    }

    /// Drops the sync-gated frames that did not make it out of the synchronous window.
    pub fn cancel_sync_gated(&mut self) -> CancelOutcome {
        let mut outcome = CancelOutcome::default();

        if self.inhibit_pending {
            self.inhibit_pending = false;
            outcome.inhibit_cancelled = true;
        }

        if self.pending != 0 {
            for slot in self.slots.iter_mut().filter(|slot| slot.full && slot.sync) {
                slot.full = false;
                self.pending -= 1;
                outcome.slots_cleared += 1;
            }
        }

        outcome
    }

    /// Controller reported that the last written frame left the mailbox.
    pub fn transmit_complete(&mut self) {
        self.first_tx = false;
        self.inhibit_pending = false;
    }
}

impl<const N: usize> Default for TxPool<N> {
    fn default() -> Self {
        Self::new()
    }
}
