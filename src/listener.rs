//! Bounded, per-listener FIFO between a [`crate::streamer::Streamer`] and one
//! HTTP response body. The producer half never blocks: a full queue drops the
//! newest chunk rather than stalling the Streamer or evicting older data.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

pub type ListenerId = Uuid;

/// Producer half, held by a Streamer's listener table.
#[derive(Clone)]
pub struct ListenerQueue {
    tx: mpsc::Sender<Bytes>,
}

impl ListenerQueue {
    /// Offers a chunk to the queue. Returns `false` if the queue is full (the
    /// chunk was dropped) or if the consumer has gone away.
    pub fn offer(&self, chunk: Bytes) -> bool {
        self.tx.try_send(chunk).is_ok()
    }
}

/// Consumer half, held exclusively by the HTTP handler that created the
/// queue.
pub struct ListenerConsumer {
    rx: mpsc::Receiver<Bytes>,
}

impl ListenerConsumer {
    /// Waits up to `timeout_duration` for the next chunk. `None` means the
    /// poll timed out (caller should fill silence) OR the producer has
    /// dropped (no further chunks will ever arrive); callers treat both the
    /// same way since a vacated queue just keeps emitting silence until the
    /// client disconnects.
    pub async fn poll(&mut self, timeout_duration: Duration) -> Option<Bytes> {
        match timeout(timeout_duration, self.rx.recv()).await {
            Ok(Some(chunk)) => Some(chunk),
            Ok(None) => None,
            Err(_) => None,
        }
    }
}

/// Creates a new bound queue pair with the given capacity.
pub fn new_listener_queue(capacity: usize) -> (ListenerQueue, ListenerConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ListenerQueue { tx }, ListenerConsumer { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offer_and_poll_roundtrip() {
        let (queue, mut consumer) = new_listener_queue(4);
        assert!(queue.offer(Bytes::from_static(b"chunk-1")));
        let received = consumer.poll(Duration::from_millis(50)).await;
        assert_eq!(received, Some(Bytes::from_static(b"chunk-1")));
    }

    #[tokio::test]
    async fn test_poll_times_out_when_empty() {
        let (_queue, mut consumer) = new_listener_queue(4);
        let received = consumer.poll(Duration::from_millis(20)).await;
        assert_eq!(received, None);
    }

    #[tokio::test]
    async fn test_offer_drops_newest_when_full() {
        let (queue, mut consumer) = new_listener_queue(2);
        assert!(queue.offer(Bytes::from_static(b"1")));
        assert!(queue.offer(Bytes::from_static(b"2")));
        // queue is now full; this chunk is dropped, not an evicted older one
        assert!(!queue.offer(Bytes::from_static(b"3")));

        assert_eq!(
            consumer.poll(Duration::from_millis(50)).await,
            Some(Bytes::from_static(b"1"))
        );
        assert_eq!(
            consumer.poll(Duration::from_millis(50)).await,
            Some(Bytes::from_static(b"2"))
        );
        // "3" was dropped, not buffered
        assert_eq!(consumer.poll(Duration::from_millis(20)).await, None);
    }

    #[tokio::test]
    async fn test_preserves_order() {
        let (queue, mut consumer) = new_listener_queue(8);
        for i in 0..5u8 {
            assert!(queue.offer(Bytes::from(vec![i])));
        }
        for i in 0..5u8 {
            let chunk = consumer.poll(Duration::from_millis(50)).await.unwrap();
            assert_eq!(chunk[0], i);
        }
    }

    #[tokio::test]
    async fn test_poll_returns_none_after_producer_dropped() {
        let (queue, mut consumer) = new_listener_queue(2);
        drop(queue);
        assert_eq!(consumer.poll(Duration::from_millis(20)).await, None);
    }
}
