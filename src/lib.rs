//! Frame routing and transmit buffering for a CANopen node
//!
//! The crate sits between a CANopen protocol engine and a CAN peripheral driver:
//! * the routing table hands each received frame to the handler of the first slot whose
//!   identifier matches under its mask
//! * the transmit pool keeps one slot per outgoing stream and tracks frames the controller
//!   refused
//! * the status aggregator turns the controller's error state into a sticky status word
//!
//! The peripheral driver implements [`Transport`]; the receive interrupt feeds frames through
//! [`CanModule::on_frame_received`] and [`CanModule::interrupt_rx`].

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod frame;
pub mod loopback;
pub mod module;
pub mod queue;
pub mod rx;
pub mod status;
pub mod transport;
pub mod tx;

pub use config::{Config, RxFiltering};
pub use error::{Error, ErrorStatus};
pub use frame::CanFrame;
pub use module::CanModule;
pub use rx::FrameHandler;
pub use transport::{CanFifo, CanFilter, CanMode, ErrorRegister, Transport};
pub use tx::{CancelOutcome, TxHandle};
