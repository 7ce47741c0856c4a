//! Bounded FIFO of messages awaiting submission.

use std::collections::VecDeque;

use crate::message::ChatMessage;

#[derive(Debug, Clone)]
pub struct MessageQueue {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
    // Count of messages ever removed from the front, by eviction or commit.
    head: u64,
}

impl MessageQueue {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// Append a message, evicting the oldest entry first when the queue is full.
    ///
    /// Returns the evicted message, if any.
    pub fn enqueue(&mut self, message: ChatMessage) -> Option<ChatMessage> {
        let evicted = if self.messages.len() >= self.capacity {
            self.pop_front()
        } else {
            None
        };
        self.messages.push_back(message);
        evicted
    }

    /// Copy of the current contents. The queue itself is left untouched so
    /// messages can keep arriving while a batch is in flight.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    /// Position just past the current tail. Taken together with a snapshot,
    /// it marks which messages a later [`commit_through`](Self::commit_through)
    /// may remove.
    pub fn tail_position(&self) -> u64 {
        self.head + self.messages.len() as u64
    }

    /// Drop the first `n` messages after they were accepted by the service.
    pub fn commit(&mut self, n: usize) {
        self.commit_through(self.head + n as u64);
    }

    /// Drop every message positioned before `end`. Messages evicted while a
    /// batch was in flight are already gone and are not counted twice.
    pub fn commit_through(&mut self, end: u64) {
        while self.head < end && self.pop_front().is_some() {}
    }

    fn pop_front(&mut self) -> Option<ChatMessage> {
        let message = self.messages.pop_front()?;
        self.head += 1;
        Some(message)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.messages.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.head += self.messages.len() as u64;
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(queue: &MessageQueue) -> Vec<String> {
        queue.snapshot().into_iter().map(|m| m.content).collect()
    }

    #[test]
    fn keeps_most_recent_messages_on_overflow() {
        let mut queue = MessageQueue::new(3);
        for i in 0..10 {
            queue.enqueue(ChatMessage::user(format!("m{}", i)));
            assert!(queue.len() <= 3);
        }
        assert_eq!(contents(&queue), vec!["m7", "m8", "m9"]);
    }

    #[test]
    fn reports_evicted_message() {
        let mut queue = MessageQueue::new(2);
        assert!(queue.enqueue(ChatMessage::user("a")).is_none());
        assert!(queue.enqueue(ChatMessage::user("b")).is_none());
        let evicted = queue.enqueue(ChatMessage::user("c")).unwrap();
        assert_eq!(evicted.content, "a");
        assert_eq!(contents(&queue), vec!["b", "c"]);
        assert!(queue.is_full());
    }

    #[test]
    fn snapshot_does_not_drain() {
        let mut queue = MessageQueue::new(4);
        queue.enqueue(ChatMessage::user("a"));
        queue.enqueue(ChatMessage::assistant("b"));
        let snapshot = queue.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn commit_keeps_messages_added_after_snapshot() {
        let mut queue = MessageQueue::new(4);
        queue.enqueue(ChatMessage::user("a"));
        queue.enqueue(ChatMessage::user("b"));
        let snapshot = queue.snapshot();
        queue.enqueue(ChatMessage::user("late"));

        queue.commit(snapshot.len());
        assert_eq!(contents(&queue), vec!["late"]);

        queue.commit(10);
        assert!(queue.is_empty());
    }

    #[test]
    fn commit_through_skips_messages_evicted_in_flight() {
        let mut queue = MessageQueue::new(2);
        queue.enqueue(ChatMessage::user("a"));
        queue.enqueue(ChatMessage::user("b"));
        let end = queue.tail_position();

        // Both snapshotted messages get pushed out while the batch is pending.
        queue.enqueue(ChatMessage::user("c"));
        queue.enqueue(ChatMessage::user("d"));

        queue.commit_through(end);
        assert_eq!(contents(&queue), vec!["c", "d"]);
    }
}
