use canopen_can_core::loopback::Loopback;
use canopen_can_core::{CanModule, Config, Error, ErrorStatus};

type Module<'d> = CanModule<'d, &'d Loopback, 1, 4>;

#[test]
fn test_send_goes_out() {
    let lb = Loopback::new();
    let module: Module = CanModule::new(&lb, Config::default());
    let handle = module.allocate_tx_slot(0, 0x181, false, 4, false).unwrap();
    module.write_tx_data(handle, &[1, 2, 3, 4]).unwrap();

    module.send(handle).unwrap();

    let frame = lb.pop_sent().unwrap();
    assert_eq!(frame.ident(), 0x181);
    assert_eq!(frame.data(), &[1, 2, 3, 4]);
    assert_eq!(module.tx_pending(), 0);
}

#[test]
fn test_failed_write_marks_slot_full() {
    let lb = Loopback::new();
    lb.set_fail_writes(true);
    let module: Module = CanModule::new(&lb, Config::default());
    let handle = module.allocate_tx_slot(0, 0x281, false, 8, false).unwrap();

    assert_eq!(module.send(handle), Err(Error::TxOverflow));
    assert!(module.tx_slot(handle).unwrap().is_full());
    assert_eq!(module.tx_pending(), 1);
    assert_eq!(module.error_status(), ErrorStatus::empty());
}

#[test]
fn test_full_slot_overflows_without_touching_hardware() {
    let lb = Loopback::new();
    let module: Module = CanModule::new(&lb, Config::default());
    let first = module.allocate_tx_slot(0, 0x181, false, 1, false).unwrap();
    let stuck = module.allocate_tx_slot(1, 0x281, false, 1, false).unwrap();
    module.send(first).unwrap();

    lb.set_fail_writes(true);
    module.send(stuck).unwrap_err();
    let attempts = lb.write_attempts();

    lb.set_fail_writes(false);
    assert_eq!(module.send(stuck), Err(Error::TxOverflow));
    assert_eq!(lb.write_attempts(), attempts);
    assert!(module.error_status().contains(ErrorStatus::TX_OVERFLOW));
    assert_eq!(module.tx_pending(), 1);

    // the stream takes its slot again
    let stuck = module.allocate_tx_slot(1, 0x281, false, 1, false).unwrap();
    assert_eq!(module.tx_pending(), 0);
    module.send(stuck).unwrap();
}

#[test]
fn test_first_transmit_is_exempt() {
    let lb = Loopback::new();
    lb.set_fail_writes(true);
    let module: Module = CanModule::new(&lb, Config::default());
    let handle = module.allocate_tx_slot(0, 0x701, false, 1, false).unwrap();

    module.send(handle).unwrap_err();
    module.send(handle).unwrap_err();
    assert_eq!(lb.write_attempts(), 2);
    assert!(!module.error_status().contains(ErrorStatus::TX_OVERFLOW));

    lb.set_fail_writes(false);
    module.send(handle).unwrap();
    assert_eq!(lb.sent_len(), 1);
}

#[test]
fn test_successful_send_does_not_free_full_slot() {
    let lb = Loopback::new();
    lb.set_fail_writes(true);
    let module: Module = CanModule::new(&lb, Config::default());
    let handle = module.allocate_tx_slot(0, 0x181, false, 8, false).unwrap();

    assert_eq!(module.send(handle), Err(Error::TxOverflow));
    assert_eq!(module.send(handle), Err(Error::TxOverflow));
    assert_eq!(lb.write_attempts(), 2);

    lb.set_fail_writes(false);
    module.send(handle).unwrap();
    assert!(module.tx_slot(handle).unwrap().is_full());
    assert_eq!(module.tx_pending(), 1);

    // the exemption is over; the slot stays full until the stream allocates it again
    assert_eq!(module.send(handle), Err(Error::TxOverflow));
    assert_eq!(lb.write_attempts(), 3);

    let handle = module.allocate_tx_slot(0, 0x181, false, 8, false).unwrap();
    assert_eq!(module.tx_pending(), 0);
    module.send(handle).unwrap();
}

#[test]
fn test_bad_handle_is_illegal_argument() {
    let lb = Loopback::new();
    let big: CanModule<&Loopback, 1, 8> = CanModule::new(&lb, Config::default());
    let small: CanModule<&Loopback, 1, 1> = CanModule::new(&lb, Config::default());
    let handle = big.allocate_tx_slot(7, 0x181, false, 0, false).unwrap();

    assert_eq!(small.send(handle), Err(Error::IllegalArgument));
    assert_eq!(small.write_tx_data(handle, &[1]), Err(Error::IllegalArgument));
    assert!(small.allocate_tx_slot(1, 0x181, false, 0, false).is_none());
}

#[test]
fn test_cancel_sync_gated() {
    let lb = Loopback::new();
    lb.set_fail_writes(true);
    let module: Module = CanModule::new(&lb, Config::default());
    let tpdo_a = module.allocate_tx_slot(0, 0x181, false, 8, true).unwrap();
    let tpdo_b = module.allocate_tx_slot(1, 0x281, false, 8, true).unwrap();
    let emcy = module.allocate_tx_slot(2, 0x081, false, 8, false).unwrap();
    for handle in [tpdo_a, tpdo_b, emcy] {
        module.send(handle).unwrap_err();
    }
    assert_eq!(module.tx_pending(), 3);

    let outcome = module.cancel_pending_sync_gated();
    assert_eq!(outcome.slots_cleared, 2);
    assert!(!outcome.inhibit_cancelled);
    assert_eq!(module.tx_pending(), 1);
    assert!(module.tx_slot(emcy).unwrap().is_full());
    assert!(!module.tx_slot(tpdo_a).unwrap().is_full());
    assert!(module.error_status().contains(ErrorStatus::TX_PDO_LATE));
}

#[test]
fn test_cancel_inhibit_pending() {
    let lb = Loopback::new();
    let module: Module = CanModule::new(&lb, Config::default());
    let tpdo = module.allocate_tx_slot(0, 0x181, false, 2, true).unwrap();
    module.send(tpdo).unwrap();

    let outcome = module.cancel_pending_sync_gated();
    assert!(outcome.inhibit_cancelled);
    assert_eq!(outcome.slots_cleared, 0);
    assert!(module.error_status().contains(ErrorStatus::TX_PDO_LATE));

    // nothing left to cancel the second time
    module.clear_error_status(ErrorStatus::TX_PDO_LATE);
    assert!(module.cancel_pending_sync_gated().is_empty());
    assert_eq!(module.error_status(), ErrorStatus::empty());
}

#[test]
fn test_cancel_with_nothing_pending() {
    let lb = Loopback::new();
    let module: Module = CanModule::new(&lb, Config::default());
    let plain = module.allocate_tx_slot(0, 0x181, false, 2, false).unwrap();
    module.send(plain).unwrap();

    assert!(module.cancel_pending_sync_gated().is_empty());
    assert_eq!(module.error_status(), ErrorStatus::empty());
}

#[test]
fn test_transmit_complete_ends_sync_window() {
    let lb = Loopback::new();
    let module: Module = CanModule::new(&lb, Config::default());
    let tpdo = module.allocate_tx_slot(0, 0x181, false, 2, true).unwrap();
    module.send(tpdo).unwrap();

    module.interrupt_tx();
    assert!(module.cancel_pending_sync_gated().is_empty());
    assert!(!module.error_status().contains(ErrorStatus::TX_PDO_LATE));
}
