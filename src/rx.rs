//! Receive routing table
//!
//! Each slot holds an identifier, a mask and a handler. An incoming frame is routed to the
//! first slot, in index order, whose identifier equals the frame identifier on every bit set
//! in the slot mask. The remote-frame marker is always part of the mask, so a slot
//! configured for data frames never sees remote frames with the same identifier and vice
//! versa.
//!
//! Slot order is a priority order: when configured slots overlap, the lower index wins and
//! the overlap is not reported.

use crate::error::Error;
use crate::frame::{CanFrame, CANID_MASK, FLAG_RTR};

/// Receiver of the frames routed to a slot.
///
/// The handler runs inside the receive interrupt, so it should only copy the frame out or
/// set flags for the protocol engine.
pub trait FrameHandler {
    fn handle(&self, frame: &CanFrame);
}

impl<F: Fn(&CanFrame)> FrameHandler for F {
    fn handle(&self, frame: &CanFrame) {
        self(frame)
    }
}

#[derive(Clone, Copy)]
pub struct RxSlot<'d> {
    /// Identifier with the remote-frame marker folded in
    ident: u16,
    /// Comparison mask, the remote-frame marker is always set
    mask: u16,
    handler: Option<&'d (dyn FrameHandler + Sync)>,
}

impl<'d> RxSlot<'d> {
    pub const UNCONFIGURED: Self = Self {
        ident: 0,
        mask: 0xFFFF,
        handler: None,
    };

    pub fn ident(&self) -> u16 {
        self.ident
    }

    pub fn mask(&self) -> u16 {
        self.mask
    }

    pub fn is_configured(&self) -> bool {
        self.handler.is_some()
    }

    fn matches(&self, match_ident: u16) -> bool {
        self.handler.is_some() && ((match_ident ^ self.ident) & self.mask) == 0
    }
}

impl core::fmt::Debug for RxSlot<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RxSlot")
            .field("ident", &format_args!("{:#06x}", self.ident))
            .field("mask", &format_args!("{:#06x}", self.mask))
            .field("configured", &self.is_configured())
            .finish()
    }
}

pub struct RoutingTable<'d, const N: usize> {
    slots: [RxSlot<'d>; N],
}

impl<'d, const N: usize> RoutingTable<'d, N> {
    pub const fn new() -> Self {
        Self {
            slots: [RxSlot::UNCONFIGURED; N],
        }
    }

    pub fn slot(&self, index: usize) -> Option<&RxSlot<'d>> {
        self.slots.get(index)
    }

    /// Binds `handler` to the slot at `index`.
    ///
    /// Only the low 11 bits of `ident` and `mask` are kept; the remote-frame marker is added
    /// to the mask unconditionally and to the identifier when `rtr` is set.
    pub fn configure(
        &mut self,
        index: usize,
        ident: u16,
        mask: u16,
        rtr: bool,
        handler: &'d (dyn FrameHandler + Sync),
    ) -> Result<(), Error> {
        let slot = self.slots.get_mut(index).ok_or(Error::IllegalArgument)?;

        slot.ident = (ident & CANID_MASK) | if rtr { FLAG_RTR } else { 0 };
        slot.mask = (mask & CANID_MASK) | FLAG_RTR;
        slot.handler = Some(handler);
        Ok(())
    }

    /// Index of the first configured slot accepting `match_ident`.
    pub fn find(&self, match_ident: u16) -> Option<usize> {
        self.slots.iter().position(|slot| slot.matches(match_ident))
    }

    /// Runs the handler of the first matching slot. Returns its index, or `None` if the
    /// frame was dropped.
    pub fn dispatch(&self, frame: &CanFrame) -> Option<usize> {
        let index = self.find(frame.match_ident())?;
        if let Some(handler) = self.slots[index].handler {
            handler.handle(frame);
        }
        Some(index)
    }
}

impl<const N: usize> Default for RoutingTable<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}
