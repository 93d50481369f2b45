//! Jitter buffer — a small bounded queue that absorbs arrival-time
//! variance between network packets so playback can proceed at a steady
//! cadence.
//!
//! The producer side never blocks: a frame arriving while the buffer is
//! full is dropped. The consumer side blocks up to a fixed timeout and
//! then signals the caller to substitute silence. Built on a bounded
//! stdlib channel so the async receiver task and the blocking playback
//! thread can share it without further synchronization.

use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

use talkie_core::wire::Frame;

/// Create a jitter buffer holding at most `capacity` frames.
pub fn jitter_buffer(capacity: usize) -> (FrameProducer, FrameConsumer) {
    let (tx, rx) = sync_channel(capacity);
    (FrameProducer { tx }, FrameConsumer { rx })
}

/// Producer half — owned by the downlink receiver.
pub struct FrameProducer {
    tx: SyncSender<Frame>,
}

impl FrameProducer {
    /// Non-blocking enqueue. Returns false if the frame was dropped
    /// because the buffer is full or the consumer is gone.
    pub fn offer(&self, frame: Frame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// What the playback loop should do this cycle.
#[derive(Debug, PartialEq, Eq)]
pub enum Pull {
    /// A frame arrived in time — play it.
    Frame(Frame),
    /// Nothing arrived within the timeout — play silence to keep the
    /// device cadence.
    Silence,
    /// The producer is gone; playback should stop.
    Closed,
}

/// Consumer half — owned by the playback loop.
pub struct FrameConsumer {
    rx: Receiver<Frame>,
}

impl FrameConsumer {
    /// Wait up to `timeout` for the next frame.
    pub fn pull(&self, timeout: Duration) -> Pull {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Pull::Frame(frame),
            Err(RecvTimeoutError::Timeout) => Pull::Silence,
            Err(RecvTimeoutError::Disconnected) => Pull::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn frame(fill: i16) -> Frame {
        vec![fill; 4]
    }

    #[test]
    fn frames_come_out_in_arrival_order() {
        let (producer, consumer) = jitter_buffer(5);
        assert!(producer.offer(frame(1)));
        assert!(producer.offer(frame(2)));

        assert_eq!(consumer.pull(Duration::from_millis(10)), Pull::Frame(frame(1)));
        assert_eq!(consumer.pull(Duration::from_millis(10)), Pull::Frame(frame(2)));
    }

    #[test]
    fn full_buffer_drops_newest_without_blocking() {
        let (producer, consumer) = jitter_buffer(5);
        for i in 0..5 {
            assert!(producer.offer(frame(i)));
        }

        let start = Instant::now();
        assert!(!producer.offer(frame(99)), "sixth frame must be dropped");
        assert!(start.elapsed() < Duration::from_millis(50), "offer must not block");

        // The queued frames are intact and the dropped one never shows up.
        for i in 0..5 {
            assert_eq!(consumer.pull(Duration::from_millis(10)), Pull::Frame(frame(i)));
        }
        assert_eq!(consumer.pull(Duration::from_millis(10)), Pull::Silence);
    }

    #[test]
    fn empty_buffer_times_out_to_silence() {
        let (_producer, consumer) = jitter_buffer(5);

        let start = Instant::now();
        assert_eq!(consumer.pull(Duration::from_millis(50)), Pull::Silence);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(50));
        assert!(waited < Duration::from_secs(1), "consumer must not stall");
    }

    #[test]
    fn dropped_producer_closes_consumer() {
        let (producer, consumer) = jitter_buffer(5);
        producer.offer(frame(7));
        drop(producer);

        // Buffered frames drain first, then the close is observed.
        assert_eq!(consumer.pull(Duration::from_millis(10)), Pull::Frame(frame(7)));
        assert_eq!(consumer.pull(Duration::from_millis(10)), Pull::Closed);
    }

    #[test]
    fn dropped_consumer_turns_offers_into_noops() {
        let (producer, consumer) = jitter_buffer(5);
        drop(consumer);
        assert!(!producer.offer(frame(1)));
    }
}
