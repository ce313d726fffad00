use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use crossbeam_queue::ArrayQueue;

/// Outcome of [`BlockingQueue::enqueue`].
#[derive(Debug, PartialEq, Eq)]
pub enum Enqueued<T> {
    /// The item was appended.
    Added,
    /// The item was appended and the oldest item, returned here, was pushed
    /// out to make room.
    Evicted(T),
}

struct Ring<T> {
    items: ArrayQueue<T>,
    // Doorbell for consumers parked on an empty ring. Never holds more tokens
    // than the ring holds slots, so a stale token only costs a spurious wakeup.
    ready_tx: Sender<()>,
    ready_rx: Receiver<()>,
}

/// Multi-producer FIFO whose consumers block until an item is available.
///
/// Producers never wait for space. Without a capacity items travel over an
/// unbounded channel; with one they sit in a fixed ring where the newest
/// item always gets in and the oldest is handed back to the producer.
pub struct BlockingQueue<T> {
    // All items of an unbounded queue; in a bounded queue only the items
    // pushed with `enqueue_unbounded`.
    tx: Sender<T>,
    rx: Receiver<T>,
    ring: Option<Ring<T>>,
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockingQueue<T> {
    /// Create an unbounded queue.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx, ring: None }
    }

    /// Create a queue that keeps at most `capacity` items (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(capacity);
        Self {
            tx,
            rx,
            ring: Some(Ring {
                items: ArrayQueue::new(capacity),
                ready_tx,
                ready_rx,
            }),
        }
    }

    /// Configured capacity, if bounded.
    pub fn capacity(&self) -> Option<usize> {
        self.ring.as_ref().map(|ring| ring.items.capacity())
    }

    /// Append an item and wake one waiting consumer.
    pub fn enqueue(&self, item: T) -> Enqueued<T> {
        let Some(ring) = &self.ring else {
            self.send(item);
            return Enqueued::Added;
        };
        let evicted = ring.items.force_push(item);
        // A full doorbell already guarantees a wakeup.
        let _ = ring.ready_tx.try_send(());
        match evicted {
            Some(oldest) => Enqueued::Evicted(oldest),
            None => Enqueued::Added,
        }
    }

    /// Append an item even if the queue is at capacity.
    ///
    /// Used for control sentinels that must never be evicted or evict work.
    pub fn enqueue_unbounded(&self, item: T) {
        self.send(item);
    }

    /// Remove the oldest item, blocking until one is available.
    pub fn dequeue(&self) -> T {
        loop {
            if let Some(item) = self.try_dequeue() {
                return item;
            }
            match &self.ring {
                None => {
                    if let Ok(item) = self.rx.recv() {
                        return item;
                    }
                }
                Some(ring) => select! {
                    recv(self.rx) -> item => {
                        if let Ok(item) = item {
                            return item;
                        }
                    }
                    recv(ring.ready_rx) -> _ => {}
                },
            }
        }
    }

    /// Remove the oldest item, waiting at most `timeout`.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<T> {
        let Some(ring) = &self.ring else {
            return self.rx.recv_timeout(timeout).ok();
        };
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = self.try_dequeue() {
                return Some(item);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            select! {
                recv(self.rx) -> item => {
                    if let Ok(item) = item {
                        return Some(item);
                    }
                }
                recv(ring.ready_rx) -> _ => {}
                default(remaining) => return None,
            }
        }
    }

    /// Remove the oldest item without blocking.
    pub fn try_dequeue(&self) -> Option<T> {
        self.rx
            .try_recv()
            .ok()
            .or_else(|| self.ring.as_ref().and_then(|ring| ring.items.pop()))
    }

    /// Drop every queued item and return how many were removed.
    pub fn clear(&self) -> usize {
        std::iter::from_fn(|| self.try_dequeue()).count()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.rx.len() + self.ring.as_ref().map_or(0, |ring| ring.items.len())
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn send(&self, item: T) {
        // The queue owns a receiver, so the channel never disconnects.
        let _ = self.tx.send(item);
    }
}

impl<T> std::fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn fifo_order() {
        let queue = BlockingQueue::new();
        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue(3);
        assert_eq!(queue.dequeue(), 1);
        assert_eq!(queue.dequeue(), 2);
        assert_eq!(queue.dequeue(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn dequeue_blocks_until_enqueue() {
        let queue = Arc::new(BlockingQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue())
        };

        thread::sleep(Duration::from_millis(30));
        queue.enqueue("late");
        assert_eq!(consumer.join().expect("consumer should finish"), "late");
    }

    #[test]
    fn dequeue_timeout_returns_none_when_idle() {
        let queue: BlockingQueue<u8> = BlockingQueue::new();
        assert_eq!(queue.dequeue_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn bounded_queue_evicts_oldest() {
        let queue = BlockingQueue::with_capacity(2);
        assert_eq!(queue.enqueue('a'), Enqueued::Added);
        assert_eq!(queue.enqueue('b'), Enqueued::Added);
        assert_eq!(queue.enqueue('c'), Enqueued::Evicted('a'));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_dequeue(), Some('b'));
        assert_eq!(queue.try_dequeue(), Some('c'));
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn bounded_dequeue_blocks_until_enqueue() {
        let queue = Arc::new(BlockingQueue::with_capacity(1));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue_timeout(Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(30));
        queue.enqueue(9);
        assert_eq!(consumer.join().expect("consumer should finish"), Some(9));
        assert_eq!(
            queue.dequeue_timeout(Duration::from_millis(10)),
            None,
            "a spent doorbell token must not produce an item"
        );
    }

    #[test]
    fn bounded_consumer_wakes_for_sentinel() {
        let queue = Arc::new(BlockingQueue::with_capacity(1));
        queue.enqueue("work");
        assert_eq!(queue.try_dequeue(), Some("work"));

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue())
        };
        thread::sleep(Duration::from_millis(30));
        queue.enqueue_unbounded("wake");
        assert_eq!(consumer.join().expect("consumer should finish"), "wake");
    }

    #[test]
    fn unbounded_enqueue_ignores_capacity() {
        let queue = BlockingQueue::with_capacity(1);
        queue.enqueue(1);
        queue.enqueue_unbounded(2);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.capacity(), Some(1));
    }

    #[test]
    fn clear_reports_removed() {
        let queue = BlockingQueue::new();
        for i in 0..5 {
            queue.enqueue(i);
        }
        assert_eq!(queue.clear(), 5);
        assert!(queue.is_empty());
    }

    #[test]
    fn many_producers_lose_nothing() {
        let queue = Arc::new(BlockingQueue::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..250 {
                        queue.enqueue(p * 1000 + i);
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().expect("producer should finish");
        }

        let mut seen: Vec<_> = std::iter::from_fn(|| queue.try_dequeue()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 1000);
    }
}
