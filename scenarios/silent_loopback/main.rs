use canopen_can_core::loopback::Loopback;
use canopen_can_core::{CanFrame, CanMode, CanModule, Config};
use std::sync::atomic::{AtomicU32, Ordering};

/// Counts heartbeats and keeps the last producer state.
struct Heartbeat {
    count: AtomicU32,
    last_state: AtomicU32,
}

impl canopen_can_core::FrameHandler for Heartbeat {
    fn handle(&self, frame: &CanFrame) {
        self.count.fetch_add(1, Ordering::Relaxed);
        if let Some(state) = frame.data().first() {
            self.last_state.store(u32::from(*state), Ordering::Relaxed);
        }
    }
}

fn main() {
    let heartbeat = Heartbeat {
        count: AtomicU32::new(0),
        last_state: AtomicU32::new(0),
    };
    let lb = Loopback::new();

    println!("Starting init CAN silent loopback mode.");

    let config = Config::default()
        .with_bit_rate_kbps(500)
        .with_mode(CanMode::SilentLoopback);
    let mut can: CanModule<&Loopback, 4, 4> = CanModule::new(&lb, config);

    // heartbeats of every node, 0x701..=0x77F
    can.configure_rx_slot(0, 0x700, 0x780, false, &heartbeat)
        .expect("rx slot");

    match can.set_normal_mode() {
        Ok(_) => println!("Initialized CAN in silent loopback mode."),
        Err(e) => {
            println!("Error initializing CAN: {e:?}");
            return;
        }
    }

    let tx = can.allocate_tx_slot(0, 0x705, false, 1, false).expect("tx slot");
    let mut state: u8 = 0x7F;

    for _ in 0..5 {
        can.write_tx_data(tx, &[state]).expect("payload");
        let tx_result = can.send(tx);
        println!("Sent heartbeat {state:#04x}: {tx_result:?}");
        can.interrupt_tx();

        // loop the written frame back into the receive path
        while let Some(frame) = lb.pop_sent() {
            can.on_frame_received(frame);
        }
        can.interrupt_rx();
        can.process();

        state = if state == 0x7F { 0x05 } else { 0x7F };
    }

    println!(
        "Received {} heartbeats, last state {:#04x}, status {:?}",
        heartbeat.count.load(Ordering::Relaxed),
        heartbeat.last_state.load(Ordering::Relaxed),
        can.error_status()
    );
}
