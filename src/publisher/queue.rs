//! Bounded alarm queue with drop-oldest overflow, and its dispatcher.
//!
//! Stream workers push without awaiting. A single dispatcher task drains
//! the queue into the configured [`AlarmPublisher`].

use super::{AlarmNotice, AlarmPublisher};
use crate::error::Error;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of [`AlarmQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued with room to spare.
    Queued,
    /// Queued after evicting the oldest pending alarm.
    DroppedOldest,
}

/// Counters exposed for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Alarms waiting for delivery.
    pub pending: usize,
    /// Alarms delivered.
    pub published: u64,
    /// Alarms rejected by the publisher.
    pub failed: u64,
    /// Alarms evicted on overflow.
    pub dropped: u64,
}

/// Bounded FIFO of alarms waiting for delivery.
#[derive(Debug)]
pub struct AlarmQueue {
    items: Mutex<VecDeque<AlarmNotice>>,
    capacity: usize,
    notify: Notify,
    published: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl AlarmQueue {
    /// Create a queue holding at most `capacity` alarms.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue an alarm, evicting the oldest one when full. Never blocks.
    pub fn push(&self, notice: AlarmNotice) -> PushOutcome {
        let evicted = {
            let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
            let evicted = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(notice);
            evicted
        };
        self.notify.notify_one();

        match evicted {
            Some(old) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                let overflow = Error::QueueOverflow { dropped };
                warn!(
                    scene_id = %old.scene_id,
                    stream_id = %old.event.stream_id,
                    class = %old.event.class_name,
                    dropped,
                    "{overflow}"
                );
                PushOutcome::DroppedOldest
            }
            None => PushOutcome::Queued,
        }
    }

    fn try_pop(&self) -> Option<AlarmNotice> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Wait for the next alarm.
    pub async fn pop(&self) -> AlarmNotice {
        loop {
            if let Some(notice) = self.try_pop() {
                return notice;
            }
            self.notify.notified().await;
        }
    }

    /// Alarms waiting for delivery.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.len(),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn deliver(
    publisher: &dyn AlarmPublisher,
    queue: &AlarmQueue,
    notice: &AlarmNotice,
    timeout: Duration,
) {
    match tokio::time::timeout(timeout, publisher.publish(notice)).await {
        Ok(Ok(())) => {
            queue.published.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Err(e)) => {
            queue.failed.fetch_add(1, Ordering::Relaxed);
            warn!(stream_id = %notice.event.stream_id, error = %e, "Alarm publish rejected");
        }
        Err(_) => {
            queue.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                stream_id = %notice.event.stream_id,
                timeout_secs = timeout.as_secs_f64(),
                "Alarm publish timed out"
            );
        }
    }
}

/// Spawn the task that drains `queue` into `publisher` until `cancel`.
///
/// Alarms still queued at cancellation are delivered before the task exits.
pub fn spawn_dispatcher(
    queue: Arc<AlarmQueue>,
    publisher: Arc<dyn AlarmPublisher>,
    timeout: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Alarm dispatcher started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                notice = queue.pop() => {
                    deliver(publisher.as_ref(), &queue, &notice, timeout).await;
                }
            }
        }

        let mut flushed = 0usize;
        while let Some(notice) = queue.try_pop() {
            deliver(publisher.as_ref(), &queue, &notice, timeout).await;
            flushed += 1;
        }
        let stats = queue.stats();
        info!(
            flushed,
            published = stats.published,
            failed = stats.failed,
            dropped = stats.dropped,
            "Alarm dispatcher stopped"
        );
    })
}
