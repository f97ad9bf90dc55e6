use core::cell::RefCell;
use critical_section::Mutex;
use heapless::Deque;

use crate::frame::CanFrame;

struct State<const N: usize> {
    frames: Deque<CanFrame, N>,
    /// Frames dropped because the queue was full, wrapping
    overflows: u32,
}

/// Bounded hand-off of received frames from the receive interrupt to the dispatcher.
///
/// Pushing never blocks: when the queue is full the new frame is dropped and counted.
pub struct RxQueue<const N: usize> {
    state: Mutex<RefCell<State<N>>>,
}

impl<const N: usize> RxQueue<N> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                frames: Deque::new(),
                overflows: 0,
            })),
        }
    }

    /// Returns `false` if the frame was dropped.
    pub fn push(&self, frame: CanFrame) -> bool {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            match state.frames.push_back(frame) {
                Ok(()) => true,
                Err(_) => {
                    state.overflows = state.overflows.wrapping_add(1);
                    false
                }
            }
        })
    }

    pub fn pop(&self) -> Option<CanFrame> {
        critical_section::with(|cs| self.state.borrow_ref_mut(cs).frames.pop_front())
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).frames.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of dropped frames since creation.
    pub fn overflows(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow_ref(cs).overflows)
    }
}

impl<const N: usize> Default for RxQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
