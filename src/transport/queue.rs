//! Outbound packet queue shared by the capture and sender tasks

use parking_lot::Mutex;
use std::collections::VecDeque;

/// FIFO of framed packets waiting to be sent.
///
/// Safe for concurrent pushes from producers and pops from the sender task
/// without any locking by callers. Unbounded unless a capacity is given, in
/// which case the oldest packet is evicted to make room.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    packets: Mutex<VecDeque<Vec<u8>>>,
    capacity: Option<usize>,
}

impl OutboundQueue {
    /// Create a queue; `None` means unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        Self { packets: Mutex::new(VecDeque::new()), capacity }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Append a packet. Returns the packet evicted to make room, if any.
    pub fn push(&self, packet: Vec<u8>) -> Option<Vec<u8>> {
        let mut packets = self.packets.lock();
        let evicted = match self.capacity {
            Some(cap) if packets.len() >= cap => packets.pop_front(),
            _ => None,
        };
        packets.push_back(packet);
        evicted
    }

    /// Remove the oldest packet.
    pub fn pop(&self) -> Option<Vec<u8>> {
        self.packets.lock().pop_front()
    }

    /// Remove and return every queued packet in order.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.packets.lock().drain(..).collect()
    }

    /// Discard every queued packet, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut packets = self.packets.lock();
        let dropped = packets.len();
        packets.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fifo_order() {
        let queue = OutboundQueue::unbounded();
        queue.push(vec![1]);
        queue.push(vec![2]);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(vec![1]));
        assert_eq!(queue.pop(), Some(vec![2]));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn capped_queue_drops_oldest() {
        let queue = OutboundQueue::new(Some(2));
        assert_eq!(queue.push(vec![1]), None);
        assert_eq!(queue.push(vec![2]), None);
        assert_eq!(queue.push(vec![3]), Some(vec![1]));
        assert_eq!(queue.drain(), vec![vec![2], vec![3]]);
        assert_eq!(queue.capacity(), Some(2));
    }

    #[test]
    fn clear_reports_dropped_count() {
        let queue = OutboundQueue::unbounded();
        for i in 0..5 {
            queue.push(vec![i]);
        }
        assert_eq!(queue.clear(), 5);
        assert_eq!(queue.clear(), 0);
    }

    #[test]
    fn concurrent_producers_keep_per_producer_order() {
        let queue = Arc::new(OutboundQueue::unbounded());
        let producers: Vec<_> = (0..4u8)
            .map(|id| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for seq in 0..100u8 {
                        queue.push(vec![id, seq]);
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let packets = queue.drain();
        assert_eq!(packets.len(), 400);
        for id in 0..4u8 {
            let seqs: Vec<u8> = packets.iter().filter(|p| p[0] == id).map(|p| p[1]).collect();
            assert_eq!(seqs, (0..100).collect::<Vec<_>>());
        }
    }
}
