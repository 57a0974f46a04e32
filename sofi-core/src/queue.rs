//! Bounded blocking queue delivering whole received messages.
//!
//! The demodulator worker is the only producer and the application's
//! receive loop the only consumer. A full queue drops the incoming message
//! rather than stalling the demodulator.

use std::collections::VecDeque;

use log::warn;
use parking_lot::{Condvar, Mutex};

use crate::frame::RawMessage;

pub struct PacketQueue {
    state: Mutex<State>,
    ready: Condvar,
    capacity: usize,
}

struct State {
    slots: VecDeque<RawMessage>,
    closed: bool,
}

impl PacketQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                slots: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            ready: Condvar::new(),
            capacity,
        }
    }

    /// Enqueues a received message, returning `false` when the consumer has
    /// fallen behind and the message was dropped.
    pub fn enqueue(&self, message: &RawMessage) -> bool {
        let mut state = self.state.lock();
        if state.slots.len() >= self.capacity {
            drop(state);
            warn!(
                "receive queue full ({} messages), dropping a packet",
                self.capacity
            );
            return false;
        }
        state.slots.push_back(*message);
        drop(state);
        self.ready.notify_one();
        true
    }

    /// Blocks until a message arrives. Returns `None` once the queue is
    /// closed and drained.
    pub fn dequeue(&self) -> Option<RawMessage> {
        let mut state = self.state.lock();
        loop {
            if let Some(message) = state.slots.pop_front() {
                return Some(message);
            }
            if state.closed {
                return None;
            }
            self.ready.wait(&mut state);
        }
    }

    /// Non-blocking dequeue for drain paths.
    pub fn try_dequeue(&self) -> Option<RawMessage> {
        self.state.lock().slots.pop_front()
    }

    /// Marks the queue closed and wakes blocked consumers; messages already
    /// queued remain dequeueable.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
