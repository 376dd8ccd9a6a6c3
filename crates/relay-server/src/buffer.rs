use std::collections::VecDeque;

use relay_core::NotificationEvent;

/// Events held back while nobody is there to receive them.
#[derive(Debug, Default)]
pub struct NotificationBuffer {
    queue: VecDeque<NotificationEvent>,
}

impl NotificationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: NotificationEvent) {
        self.queue.push_back(event);
    }

    /// Take every buffered event in insertion order, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<NotificationEvent> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
