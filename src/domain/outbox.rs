//! Outbound FIFO shared between the core and one transport task.
//!
//! The core pushes serialized frames; the transport task waits on
//! [`Outbox::ready`], writes one frame, and re-arms the signal while more
//! frames remain. Each connection (inbound session or plugin link) owns
//! exactly one outbox.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Per-connection outbound message queue with a writable-ready signal.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Mutex<VecDeque<String>>,
    ready: Notify,
}

impl Outbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame and signals the transport that output is ready.
    pub fn push(&self, frame: String) {
        self.queue.lock().push_back(frame);
        self.ready.notify_one();
    }

    /// Returns `true` if at least one frame is waiting.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    /// Removes and returns the oldest frame.
    #[must_use]
    pub fn pop(&self) -> Option<String> {
        self.queue.lock().pop_front()
    }

    /// Returns the number of queued frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Requests another writable-ready wakeup.
    pub fn rearm(&self) {
        self.ready.notify_one();
    }

    /// Waits until output is signalled as ready.
    ///
    /// A signal raised while nobody is waiting is kept, so a push that
    /// happens between two waits is never lost.
    pub async fn ready(&self) {
        self.ready.notified().await;
    }

    /// Pops one frame and re-arms the signal if more remain.
    ///
    /// This is the drain step a transport runs on each wakeup.
    #[must_use]
    pub fn take_next(&self) -> Option<String> {
        let mut queue = self.queue.lock();
        let frame = queue.pop_front();
        if !queue.is_empty() {
            self.ready.notify_one();
        }
        frame
    }
}
