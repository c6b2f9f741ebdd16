use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-protected FIFO that evicts its oldest item when full
///
/// One side enqueues (caller or transport thread), the other drains; both
/// take the same mutex, so a drain never observes a half-applied push.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl<T> BoundedQueue<T> {
    /// Capacity is clamped to at least one slot
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Append `item`, returning the evicted oldest item if the queue was full
    pub fn push(&self, item: T) -> Option<T> {
        let mut items = self.items.lock();
        let evicted = if items.len() >= self.capacity {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            items.pop_front()
        } else {
            None
        };
        items.push_back(item);
        evicted
    }

    pub fn pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Take everything currently queued, oldest first
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    /// Discard everything currently queued, returning how many items went
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let count = items.len();
        items.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total items evicted by overflow since creation
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<T: Clone> BoundedQueue<T> {
    /// Copy of the queued items, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_overflow_keeps_most_recent() {
        let queue = BoundedQueue::new(3);
        for i in 0..10 {
            queue.push(i);
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 7);
        assert_eq!(queue.snapshot(), vec![7, 8, 9]);
    }

    #[test]
    fn test_push_returns_evicted_item() {
        let queue = BoundedQueue::new(2);
        assert_eq!(queue.push("a"), None);
        assert_eq!(queue.push("b"), None);
        assert_eq!(queue.push("c"), Some("a"));
        assert_eq!(queue.pop(), Some("b"));
    }

    #[test]
    fn test_drain_empties_in_fifo_order() {
        let queue = BoundedQueue::new(8);
        queue.push(1);
        queue.push(2);
        queue.push(3);

        assert_eq!(queue.drain(), vec![1, 2, 3]);
        assert!(queue.is_empty());
        assert_eq!(queue.clear(), 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = BoundedQueue::new(0);
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.snapshot(), vec![2]);
    }

    #[test]
    fn test_concurrent_producer_preserves_order() {
        let queue = Arc::new(BoundedQueue::new(10_000));
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..5_000u32 {
                    queue.push(i);
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < 5_000 {
            seen.extend(queue.drain());
            thread::yield_now();
        }
        producer.join().unwrap();

        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }
}
