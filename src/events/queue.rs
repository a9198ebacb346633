//! Bounded FIFO queue feeding the batch processor.
use std::collections::VecDeque;
use std::sync::Mutex;

use super::event::UserEvent;

/// A thread-safe bounded FIFO of user events.
///
/// `add` on a full queue fails instead of blocking; no producer ever
/// suspends on the queue.
pub trait EventQueue: Send + Sync {
    /// Append an event. Returns `false` when the queue is at capacity.
    fn add(&self, event: UserEvent) -> bool;
    /// Pop up to `count` events in FIFO order.
    fn remove(&self, count: usize) -> Vec<UserEvent>;
    /// Peek at up to `count` events in FIFO order without removing them.
    fn get(&self, count: usize) -> Vec<UserEvent>;
    /// Current queue length.
    fn size(&self) -> usize;
}

/// The default in-memory queue.
pub struct InMemoryQueue {
    capacity: usize,
    items: Mutex<VecDeque<UserEvent>>,
}

impl InMemoryQueue {
    pub fn new(capacity: usize) -> InMemoryQueue {
        InMemoryQueue {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }
}

impl EventQueue for InMemoryQueue {
    fn add(&self, event: UserEvent) -> bool {
        let mut items = self.items.lock().unwrap();
        if items.len() >= self.capacity {
            return false;
        }
        items.push_back(event);
        true
    }

    fn remove(&self, count: usize) -> Vec<UserEvent> {
        let mut items = self.items.lock().unwrap();
        let count = count.min(items.len());
        items.drain(..count).collect()
    }

    fn get(&self, count: usize) -> Vec<UserEvent> {
        let items = self.items.lock().unwrap();
        items.iter().take(count).cloned().collect()
    }

    fn size(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}
