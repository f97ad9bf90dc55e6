//! CAN module: routing table, transmit pool and bus status around one transport
//!
//! Configuration (`new`, `configure_rx_slot`) needs `&mut self` and is meant to happen before
//! the receive interrupt is enabled. Everything else takes `&self` so the module can be
//! shared between the interrupt handlers and the main loop.
//!
//! Transmit bookkeeping, the transport and the status word live behind one critical section.
//! The routing table is read-only once shared and is read without locking.

use core::cell::RefCell;
use critical_section::Mutex;

use crate::config::{Config, RxFiltering};
use crate::error::{Error, ErrorStatus};
use crate::frame::{CanFrame, CANID_MASK, MAX_DLC};
use crate::queue::RxQueue;
use crate::rx::{FrameHandler, RoutingTable, RxSlot};
use crate::status::StatusAggregator;
use crate::transport::{CanFilter, ErrorRegister, Transport};
use crate::tx::{CancelOutcome, TxError, TxHandle, TxPool, TxSlot};

struct Shared<T, const TX: usize> {
    transport: T,
    tx: TxPool<TX>,
    status: StatusAggregator,
    normal: bool,
    /// Receive queue overflow count already folded into the status
    rx_overflows_seen: u32,
}

/// `RX` receive slots, `TX` transmit slots and a receive queue of `Q` frames.
pub struct CanModule<'d, T, const RX: usize, const TX: usize, const Q: usize = 4> {
    config: Config,
    rx: RoutingTable<'d, RX>,
    rx_queue: RxQueue<Q>,
    shared: Mutex<RefCell<Shared<T, TX>>>,
}

impl<'d, T: Transport, const RX: usize, const TX: usize, const Q: usize>
    CanModule<'d, T, RX, TX, Q>
{
    /// Brings the transport up in configuration mode with every slot unconfigured.
    pub fn new(mut transport: T, config: Config) -> Self {
        transport.begin();
        transport.set_baud_rate(config.bit_rate);
        log::debug!(
            "CAN module init: {} bit/s, {} rx slots, {} tx slots, {:?}",
            config.bit_rate,
            RX,
            TX,
            config.rx_filtering
        );

        Self {
            config,
            rx: RoutingTable::new(),
            rx_queue: RxQueue::new(),
            shared: Mutex::new(RefCell::new(Shared {
                transport,
                tx: TxPool::new(),
                status: StatusAggregator::new(),
                normal: false,
                rx_overflows_seen: 0,
            })),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn with<R>(&self, f: impl FnOnce(&mut Shared<T, TX>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.shared.borrow_ref_mut(cs)))
    }

    /// Starts bus traffic in the configured mode.
    pub fn set_normal_mode(&self) -> Result<(), T::Error> {
        let mode = self.config.mode;
        self.with(|shared| match shared.transport.start(mode) {
            Ok(()) => {
                shared.normal = true;
                log::debug!("CAN normal mode ({:?})", mode);
                Ok(())
            }
            Err(e) => {
                log::warn!("CAN start failed: {:?}", e);
                Err(e)
            }
        })
    }

    /// Stops bus traffic and returns the controller to configuration mode.
    pub fn set_configuration_mode(&self) {
        self.with(|shared| {
            shared.transport.stop();
            shared.normal = false;
        });
        log::debug!("CAN configuration mode");
    }

    pub fn disable(&self) {
        self.set_configuration_mode()
    }

    pub fn is_normal(&self) -> bool {
        self.with(|shared| shared.normal)
    }

    /// Routes frames matching `ident` under `mask` to `handler`.
    ///
    /// Slots are searched in index order and the first match wins, so a lower index takes
    /// priority over overlapping slots. With hardware filtering the slot is also programmed
    /// into filter bank `index`; if the controller refuses it the slot is left untouched.
    pub fn configure_rx_slot(
        &mut self,
        index: usize,
        ident: u16,
        mask: u16,
        rtr: bool,
        handler: &'d (dyn FrameHandler + Sync),
    ) -> Result<(), Error> {
        if index >= RX {
            return Err(Error::IllegalArgument);
        }

        if let RxFiltering::Hardware(fifo) = self.config.rx_filtering {
            let filter =
                CanFilter::id_mask(index, ident & CANID_MASK, mask & CANID_MASK, rtr, fifo);
            self.with(|shared| shared.transport.add_filter(&filter))
                .map_err(|e| {
                    log::warn!("CAN filter bank {} rejected: {:?}", index, e);
                    Error::IllegalArgument
                })?;
        }

        self.rx.configure(index, ident, mask, rtr, handler)?;
        log::debug!(
            "CAN rx slot {}: ident {:#05x} mask {:#05x} rtr {}",
            index,
            ident & CANID_MASK,
            mask & CANID_MASK,
            rtr
        );
        Ok(())
    }

    pub fn rx_slot(&self, index: usize) -> Option<&RxSlot<'d>> {
        self.rx.slot(index)
    }

    /// Claims transmit slot `index` for a message stream and clears its full flag.
    pub fn allocate_tx_slot(
        &self,
        index: usize,
        ident: u16,
        rtr: bool,
        dlc: u8,
        sync: bool,
    ) -> Option<TxHandle> {
        self.with(|shared| shared.tx.allocate(index, ident, rtr, dlc, sync))
    }

    /// Copies `data` into the start of the slot's payload buffer.
    pub fn write_tx_data(&self, handle: TxHandle, data: &[u8]) -> Result<(), Error> {
        if data.len() > MAX_DLC {
            return Err(Error::IllegalArgument);
        }
        self.with(|shared| {
            let buffer = shared.tx.data_mut(handle).ok_or(Error::IllegalArgument)?;
            buffer[..data.len()].copy_from_slice(data);
            Ok(())
        })
    }

    pub fn tx_slot(&self, handle: TxHandle) -> Option<TxSlot> {
        self.with(|shared| shared.tx.slot(handle).copied())
    }

    /// Hands the slot's frame to the controller.
    ///
    /// The full check, the write and the bookkeeping happen in one critical section.
    pub fn send(&self, handle: TxHandle) -> Result<(), Error> {
        self.with(|shared| {
            let Shared { transport, tx, status, .. } = shared;
            tx.send(transport, handle).map_err(|e| {
                match e {
                    TxError::SlotFull => {
                        status.set(ErrorStatus::TX_OVERFLOW);
                        log::warn!("CAN tx overflow on slot {}", handle.index());
                    }
                    TxError::WriteFailed => {
                        log::debug!("CAN write failed, slot {} pending", handle.index());
                    }
                    TxError::BadHandle => {}
                }
                Error::from(e)
            })
        })
    }

    /// Drops sync-gated frames still waiting after the synchronous window closed.
    ///
    /// Flags `TX_PDO_LATE` if anything was dropped.
    pub fn cancel_pending_sync_gated(&self) -> CancelOutcome {
        let outcome = self.with(|shared| {
            let outcome = shared.tx.cancel_sync_gated();
            if !outcome.is_empty() {
                shared.status.set(ErrorStatus::TX_PDO_LATE);
            }
            outcome
        });
        if !outcome.is_empty() {
            log::debug!("CAN sync-gated frames cancelled: {:?}", outcome);
        }
        outcome
    }

    pub fn tx_pending(&self) -> usize {
        self.with(|shared| shared.tx.pending())
    }

    /// Transmit-complete interrupt entry.
    pub fn interrupt_tx(&self) {
        self.with(|shared| shared.tx.transmit_complete())
    }

    /// Receive interrupt entry: queues a frame read from the controller.
    ///
    /// Returns `false` if the queue was full and the frame was dropped.
    pub fn on_frame_received(&self, frame: CanFrame) -> bool {
        let queued = self.rx_queue.push(frame);
        if !queued {
            log::trace!("CAN rx queue full, {:#05x} dropped", frame.ident());
        }
        queued
    }

    /// Routes the oldest queued frame. Returns `false` if nothing was queued.
    ///
    /// A frame no slot accepts is dropped silently.
    pub fn dispatch_one(&self) -> bool {
        let Some(frame) = self.rx_queue.pop() else {
            return false;
        };
        match self.rx.dispatch(&frame) {
            Some(index) => log::trace!("CAN rx {:#05x} -> slot {}", frame.ident(), index),
            None => log::trace!("CAN rx {:#05x} unmatched", frame.ident()),
        }
        true
    }

    /// Routes every queued frame in arrival order. Returns the number of frames consumed.
    pub fn interrupt_rx(&self) -> usize {
        let mut count = 0;
        while self.dispatch_one() {
            count += 1;
        }
        count
    }

    pub fn rx_queued(&self) -> usize {
        self.rx_queue.len()
    }

    /// Total number of received frames dropped on a full queue.
    pub fn rx_overflows(&self) -> u32 {
        self.rx_queue.overflows()
    }

    /// Folds an error register snapshot into the status. Returns `true` on a change.
    pub fn poll_errors(&self, raw: ErrorRegister) -> bool {
        self.with(|shared| shared.status.poll(raw))
    }

    /// Periodic bus health update, called from the main loop.
    ///
    /// Reads the transport's error register and latches receive queue overflows.
    pub fn process(&self) {
        let overflows = self.rx_queue.overflows();
        self.with(|shared| {
            let raw = shared.transport.error_register();
            shared.status.poll(raw);

            if overflows != shared.rx_overflows_seen {
                log::warn!(
                    "CAN rx queue overflow, {} frames lost",
                    overflows.wrapping_sub(shared.rx_overflows_seen)
                );
                shared.rx_overflows_seen = overflows;
                shared.status.set(ErrorStatus::RX_OVERFLOW);
            }
        });
    }

    pub fn error_status(&self) -> ErrorStatus {
        self.with(|shared| shared.status.status())
    }

    /// Acknowledges status flags.
    pub fn clear_error_status(&self, flags: ErrorStatus) {
        self.with(|shared| shared.status.clear(flags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::Loopback;
    use crate::transport::CanMode;

    type Module<'d> = CanModule<'d, &'d Loopback, 2, 2>;

    #[test]
    fn test_new_starts_transport() {
        let lb = Loopback::new();
        let module: Module = CanModule::new(&lb, Config::default().with_bit_rate_kbps(250));

        assert!(lb.began());
        assert_eq!(lb.bit_rate(), 250_000);
        assert!(!module.is_normal());
        assert_eq!(module.error_status(), ErrorStatus::empty());
        assert_eq!(module.tx_pending(), 0);
        assert!(!module.rx_slot(0).unwrap().is_configured());
    }

    #[test]
    fn test_mode_changes() {
        let lb = Loopback::new();
        let module: Module =
            CanModule::new(&lb, Config::default().with_mode(CanMode::SilentLoopback));

        module.set_normal_mode().unwrap();
        assert!(module.is_normal());
        assert_eq!(lb.mode(), Some(CanMode::SilentLoopback));

        module.disable();
        assert!(!module.is_normal());
        assert_eq!(lb.mode(), None);

        lb.set_fail_start(true);
        assert!(module.set_normal_mode().is_err());
        assert!(!module.is_normal());
    }

    #[test]
    fn test_write_tx_data_bounds() {
        let lb = Loopback::new();
        let module: Module = CanModule::new(&lb, Config::default());
        let handle = module.allocate_tx_slot(0, 0x181, false, 2, false).unwrap();

        assert_eq!(
            module.write_tx_data(handle, &[0; 9]),
            Err(Error::IllegalArgument)
        );
        module.write_tx_data(handle, &[0xDE, 0xAD]).unwrap();
        assert_eq!(&module.tx_slot(handle).unwrap().data()[..2], &[0xDE, 0xAD]);
    }

    #[test]
    fn test_process_latches_rx_overflow() {
        let lb = Loopback::new();
        let module: CanModule<&Loopback, 1, 1, 1> = CanModule::new(&lb, Config::default());
        let frame = CanFrame::new_data(0x181, &[]).unwrap();

        assert!(module.on_frame_received(frame));
        assert!(!module.on_frame_received(frame));
        module.process();
        assert_eq!(module.error_status(), ErrorStatus::RX_OVERFLOW);

        module.clear_error_status(ErrorStatus::RX_OVERFLOW);
        module.process();
        assert_eq!(module.error_status(), ErrorStatus::empty());
    }
}
