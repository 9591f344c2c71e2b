use std::collections::VecDeque;

use log::debug;

use crate::common_types::Pid;

/// Counting semaphore with a FIFO queue of blocked pids
///
/// `try_wait` never suspends the caller; a failed acquisition only records
/// the pid so the scheduler can retry it on a later tick.
#[derive(Clone, Debug)]
pub struct Semaphore {
    value: usize,
    waiting: VecDeque<Pid>,
    name: Option<String>,
}

impl Semaphore {
    pub fn new(value: usize) -> Semaphore {
        Semaphore {
            value,
            waiting: VecDeque::new(),
            name: None,
        }
    }

    pub fn with_name(value: usize, name: &str) -> Semaphore {
        Semaphore {
            value,
            waiting: VecDeque::new(),
            name: Some(name.to_string()),
        }
    }

    /// Tries to acquire one unit
    ///
    /// On failure the pid is appended to the waiter queue and `false` is
    /// returned; the caller is expected to transition to Waiting. A pid
    /// already queued is not recorded again, so the per-tick retries of a
    /// blocked process keep a single entry.
    pub fn try_wait(&mut self, pid: Pid) -> bool {
        if self.value > 0 {
            self.value -= 1;
            true
        } else {
            if !self.waiting.contains(&pid) {
                self.waiting.push_back(pid);
            }
            false
        }
    }

    /// Releases one unit and reports the oldest waiter, if any
    ///
    /// The notified pid is dequeued but must re-acquire through `try_wait`;
    /// the scheduler's unblock sweep does that retry.
    pub fn signal(&mut self) -> Option<Pid> {
        self.value += 1;
        self.waiting.pop_front()
    }

    pub fn value(&self) -> usize {
        self.value
    }

    pub fn has_waiting(&self) -> bool {
        !self.waiting.is_empty()
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Outcome of a produce attempt
///
/// `Blocked` carries the semaphore slot the scheduler records in
/// `blocked_on_semaphore`: 0 for the gate semaphore (`empty`), 1 for the
/// mutex.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProduceResult {
    Produced(u64),
    Blocked(usize),
}

/// Outcome of a consume attempt, symmetric to [`ProduceResult`]
/// (the gate semaphore is `full`)
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConsumeResult {
    Consumed(u64),
    Blocked(usize),
}

/// Bounded buffer guarded by the classic three-semaphore construction
///
/// `empty` counts free slots, `full` counts occupied slots, `mutex` guards
/// the buffer itself. Item values are minted from a monotonic counter.
#[derive(Clone, Debug)]
pub struct ProducerConsumer {
    buffer: VecDeque<u64>,
    capacity: usize,
    empty: Semaphore,
    full: Semaphore,
    mutex: Semaphore,
    next_item: u64,
}

impl ProducerConsumer {
    pub fn new(capacity: usize) -> ProducerConsumer {
        ProducerConsumer {
            buffer: VecDeque::new(),
            capacity,
            empty: Semaphore::with_name(capacity, "empty"),
            full: Semaphore::with_name(0, "full"),
            mutex: Semaphore::with_name(1, "mutex"),
            next_item: 0,
        }
    }

    /// Attempts to append a freshly minted item to the buffer tail
    pub fn try_produce(&mut self, pid: Pid) -> ProduceResult {
        if !self.empty.try_wait(pid) {
            return ProduceResult::Blocked(0);
        }
        if !self.mutex.try_wait(pid) {
            self.empty.signal();
            return ProduceResult::Blocked(1);
        }

        self.next_item += 1;
        let item = self.next_item;
        self.buffer.push_back(item);
        self.mutex.signal();
        self.full.signal();
        debug!("pid {} produced item {}", pid, item);
        ProduceResult::Produced(item)
    }

    /// Attempts to remove the item at the buffer head
    pub fn try_consume(&mut self, pid: Pid) -> ConsumeResult {
        if !self.full.try_wait(pid) {
            return ConsumeResult::Blocked(0);
        }
        if !self.mutex.try_wait(pid) {
            self.full.signal();
            return ConsumeResult::Blocked(1);
        }

        let item = self.buffer.pop_front().unwrap_or_default();
        self.mutex.signal();
        self.empty.signal();
        debug!("pid {} consumed item {}", pid, item);
        ConsumeResult::Consumed(item)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current buffer contents, head first
    pub fn items(&self) -> impl Iterator<Item = &u64> {
        self.buffer.iter()
    }

    pub fn empty_value(&self) -> usize {
        self.empty.value()
    }

    pub fn full_value(&self) -> usize {
        self.full.value()
    }

    pub fn mutex_value(&self) -> usize {
        self.mutex.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semaphore_counts_down_then_queues() {
        let mut sem = Semaphore::new(2);
        assert!(sem.try_wait(Pid::new(1)));
        assert!(sem.try_wait(Pid::new(2)));
        assert_eq!(sem.value(), 0);

        assert!(!sem.try_wait(Pid::new(3)));
        assert!(!sem.try_wait(Pid::new(4)));
        assert_eq!(sem.waiting_len(), 2);
    }

    #[test]
    fn signal_notifies_the_oldest_waiter() {
        let mut sem = Semaphore::new(1);
        assert!(sem.try_wait(Pid::new(1)));
        assert!(!sem.try_wait(Pid::new(2)));
        assert!(!sem.try_wait(Pid::new(3)));

        assert_eq!(sem.signal(), Some(Pid::new(2)));
        assert_eq!(sem.value(), 1);

        // the notified pid re-acquires on retry
        assert!(sem.try_wait(Pid::new(2)));
        assert_eq!(sem.signal(), Some(Pid::new(3)));
        assert_eq!(sem.signal(), None);
        assert_eq!(sem.value(), 2);
    }

    #[test]
    fn repeated_failed_waits_record_a_pid_once() {
        let mut sem = Semaphore::new(0);
        let pid = Pid::new(4);

        // a blocked process retries every tick; the waiter queue must not
        // grow with each attempt
        assert!(!sem.try_wait(pid));
        assert!(!sem.try_wait(pid));
        assert!(!sem.try_wait(pid));
        assert_eq!(sem.waiting_len(), 1);

        assert!(!sem.try_wait(Pid::new(5)));
        assert_eq!(sem.waiting_len(), 2);

        assert_eq!(sem.signal(), Some(pid));
        assert_eq!(sem.signal(), Some(Pid::new(5)));
        assert!(!sem.has_waiting());
    }

    #[test]
    fn produce_and_consume_keep_fifo_order() {
        let mut pc = ProducerConsumer::new(3);
        let p = Pid::new(1);
        let c = Pid::new(2);

        assert_eq!(pc.try_produce(p), ProduceResult::Produced(1));
        assert_eq!(pc.try_produce(p), ProduceResult::Produced(2));
        assert_eq!(pc.try_consume(c), ConsumeResult::Consumed(1));
        assert_eq!(pc.try_produce(p), ProduceResult::Produced(3));
        assert_eq!(pc.try_consume(c), ConsumeResult::Consumed(2));
        assert_eq!(pc.try_consume(c), ConsumeResult::Consumed(3));
        assert!(pc.is_empty());
    }

    #[test]
    fn produce_blocks_on_a_full_buffer() {
        let mut pc = ProducerConsumer::new(1);
        let p = Pid::new(1);

        assert_eq!(pc.try_produce(p), ProduceResult::Produced(1));
        assert_eq!(pc.try_produce(p), ProduceResult::Blocked(0));
        assert!(pc.is_full());
        assert_eq!(pc.empty_value(), 0);
    }

    #[test]
    fn consume_blocks_on_an_empty_buffer() {
        let mut pc = ProducerConsumer::new(2);
        assert_eq!(pc.try_consume(Pid::new(7)), ConsumeResult::Blocked(0));
        assert_eq!(pc.full_value(), 0);
    }

    #[test]
    fn semaphore_values_track_buffer_occupancy() {
        let mut pc = ProducerConsumer::new(4);
        let p = Pid::new(1);

        for expected in 1..=3u64 {
            assert_eq!(pc.try_produce(p), ProduceResult::Produced(expected));
            assert_eq!(pc.empty_value() + pc.full_value(), pc.capacity());
            assert_eq!(pc.full_value(), pc.len());
            assert_eq!(pc.mutex_value(), 1);
        }

        pc.try_consume(p);
        assert_eq!(pc.empty_value() + pc.full_value(), pc.capacity());
        assert_eq!(pc.full_value(), pc.len());
    }
}
