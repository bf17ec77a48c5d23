//! Rate-gated buffering of messages until their pose can be resolved.
//!
//! ```text
//!  enqueue ──[ts − last > min_dt?]──► ┌────┬────┬────┐ ──next_ready──► (msg, T_G_C)
//!              no: discard            │head│    │tail│      head pose resolvable?
//!                                     └────┴────┴────┘      no: stop, keep order
//! ```
//!
//! A head whose pose never resolves would block the queue forever, so once
//! the backlog reaches [`MAX_QUEUE_SIZE`] the oldest messages are dropped.

use std::collections::VecDeque;

use crate::core::{LogThrottle, Timestamp, Transform};

use super::message::PointcloudMessage;
use super::resolver::PoseResolver;

/// Backlog size at which the oldest unresolvable messages are dropped.
pub const MAX_QUEUE_SIZE: usize = 10;

const OVERFLOW_LOG_PERIOD_SECS: f64 = 60.0;

/// Anything with a timestamp and a sensor frame.
pub trait Stamped {
    /// Acquisition time.
    fn timestamp(&self) -> Timestamp;

    /// Sensor frame.
    fn frame_id(&self) -> &str;
}

impl Stamped for PointcloudMessage {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn frame_id(&self) -> &str {
        &self.frame_id
    }
}

/// FIFO of messages waiting for their pose.
#[derive(Debug)]
pub struct IngestQueue<M> {
    queue: VecDeque<M>,
    min_time_between_msgs: f64,
    last_enqueued: Timestamp,
    overflow_log: LogThrottle,
    num_dropped: usize,
}

impl<M: Stamped> IngestQueue<M> {
    /// Create a queue admitting at most one message per `min_time_between_msgs` seconds.
    pub fn new(min_time_between_msgs: f64) -> Self {
        Self {
            queue: VecDeque::with_capacity(MAX_QUEUE_SIZE),
            min_time_between_msgs,
            last_enqueued: Timestamp::ZERO,
            overflow_log: LogThrottle::new(OVERFLOW_LOG_PERIOD_SECS),
            num_dropped: 0,
        }
    }

    /// Admit a message if enough time passed since the last admitted one.
    ///
    /// Rejected messages are discarded, never retried. Since the gate
    /// compares against the last admitted stamp, a message stamped at or
    /// before it is always rejected.
    pub fn enqueue(&mut self, msg: M) -> bool {
        let elapsed = msg.timestamp().seconds_since(self.last_enqueued);
        if elapsed > self.min_time_between_msgs {
            self.last_enqueued = msg.timestamp();
            self.queue.push_back(msg);
            true
        } else {
            log::debug!(
                "Discarding message at {} ({:.3}s after the last admitted one)",
                msg.timestamp(),
                elapsed
            );
            false
        }
    }

    /// Pop the head if its pose resolves.
    ///
    /// An unresolvable head stays in place and blocks the rest of the queue.
    pub fn next_ready<R>(&mut self, resolver: &R, world_frame: &str) -> Option<(M, Transform)>
    where
        R: PoseResolver + ?Sized,
    {
        let head = self.queue.front()?;
        if let Some(pose) = resolver.lookup(head.frame_id(), world_frame, head.timestamp()) {
            return self.queue.pop_front().map(|msg| (msg, pose));
        }

        if self.queue.len() >= MAX_QUEUE_SIZE {
            if self.overflow_log.ready() {
                log::warn!(
                    "Input queue getting too long! Dropping messages. Either the pose \
                     lookups keep failing or processing is taking too long."
                );
            }
            while self.queue.len() >= MAX_QUEUE_SIZE {
                self.queue.pop_front();
                self.num_dropped += 1;
            }
        }
        None
    }

    /// Pop every message that resolves, in arrival order.
    pub fn drain_ready<R>(&mut self, resolver: &R, world_frame: &str) -> Vec<(M, Transform)>
    where
        R: PoseResolver + ?Sized,
    {
        let mut ready = Vec::new();
        while let Some(item) = self.next_ready(resolver, world_frame) {
            ready.push(item);
        }
        ready
    }

    /// Messages waiting.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Messages dropped because of backlog overflow.
    pub fn num_dropped(&self) -> usize {
        self.num_dropped
    }

    /// Stamp of the last admitted message.
    pub fn last_enqueued(&self) -> Timestamp {
        self.last_enqueued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point;

    #[derive(Debug, Clone)]
    struct Msg(Timestamp);

    impl Stamped for Msg {
        fn timestamp(&self) -> Timestamp {
            self.0
        }
        fn frame_id(&self) -> &str {
            "sensor"
        }
    }

    /// Resolves any stamp up to a watermark.
    struct Watermark(Timestamp);

    impl PoseResolver for Watermark {
        fn lookup(&self, _: &str, _: &str, timestamp: Timestamp) -> Option<Transform> {
            (timestamp <= self.0).then(|| Transform::from_translation(Point::new(timestamp.as_secs_f64() as f32, 0.0, 0.0)))
        }
    }

    fn ms(v: u64) -> Timestamp {
        Timestamp::from_nanos(v * 1_000_000)
    }

    #[test]
    fn test_zero_gate_admits_every_increasing_stamp() {
        let mut queue = IngestQueue::new(0.0);
        for i in 1..=5 {
            assert!(queue.enqueue(Msg(ms(i))));
        }
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn test_positive_gate_discards_early_messages() {
        let mut queue = IngestQueue::new(0.1);
        assert!(queue.enqueue(Msg(ms(1000))));
        assert!(!queue.enqueue(Msg(ms(1050))));
        assert!(!queue.enqueue(Msg(ms(1100))));
        assert!(queue.enqueue(Msg(ms(1101))));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.last_enqueued(), ms(1101));
    }

    #[test]
    fn test_regressing_stamp_rejected() {
        let mut queue = IngestQueue::new(0.0);
        assert!(queue.enqueue(Msg(ms(10))));
        assert!(!queue.enqueue(Msg(ms(5))));
        assert!(!queue.enqueue(Msg(ms(10))));
    }

    #[test]
    fn test_drain_stops_at_unresolvable_head() {
        let mut queue = IngestQueue::new(0.0);
        for i in 1..=4 {
            queue.enqueue(Msg(ms(i)));
        }
        let ready = queue.drain_ready(&Watermark(ms(2)), "world");
        assert_eq!(ready.iter().map(|(m, _)| m.0).collect::<Vec<_>>(), vec![ms(1), ms(2)]);
        assert_eq!(queue.len(), 2);

        let ready = queue.drain_ready(&Watermark(ms(10)), "world");
        assert_eq!(ready.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut queue = IngestQueue::new(0.0);
        for i in 1..=12 {
            queue.enqueue(Msg(ms(i)));
        }
        assert!(queue.next_ready(&Watermark(Timestamp::ZERO), "world").is_none());
        assert_eq!(queue.len(), MAX_QUEUE_SIZE - 1);
        assert_eq!(queue.num_dropped(), 3);

        // The survivors are the newest ones, still in order.
        let ready = queue.drain_ready(&Watermark(ms(100)), "world");
        assert_eq!(ready.first().map(|(m, _)| m.0), Some(ms(4)));
        assert_eq!(ready.last().map(|(m, _)| m.0), Some(ms(12)));
    }
}
