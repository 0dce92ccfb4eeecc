//! Stream identity, lifecycle state and the shared status cell.

use crate::region::Region;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Lifecycle state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    /// Registered, no frame read yet.
    Pending,
    /// Reading frames.
    Active,
    /// Read or heartbeat failures exceeded their bound.
    Error,
    /// Trying to reopen the source.
    Reconnecting,
    /// Terminal.
    Stopped,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Error => write!(f, "error"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Immutable description of a stream, fixed at deploy time.
#[derive(Debug, Clone)]
pub struct StreamSpec {
    /// Unique stream id.
    pub stream_id: String,
    /// Camera the stream belongs to.
    pub device_id: String,
    /// Owning scene.
    pub scene_id: String,
    /// Algorithm the scene runs.
    pub algorithm: String,
    /// Resolved play URL.
    pub source_url: String,
    /// Region detections must fall into.
    pub region: Region,
    /// Classes allowed to alarm. Empty means all.
    pub target_classes: Vec<String>,
    /// Detections below this are discarded.
    pub confidence_threshold: f32,
    /// Frames per second sent to inference.
    pub fps_limit: f64,
    /// Minimum confidence that counts toward an alarm.
    pub min_alarm_confidence: f32,
}

/// Counters a stream accumulates while running.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamStats {
    /// Frames read from the source.
    pub frames_read: u64,
    /// Frames sent to inference.
    pub frames_inferred: u64,
    /// Frames dropped by the rate limiter.
    pub frames_skipped: u64,
    /// Detections that survived filtering.
    pub detections: u64,
    /// Alarms raised.
    pub alarms: u64,
    /// Read failures since the last good frame.
    pub consecutive_read_failures: u32,
    /// Failures of any kind since start.
    pub error_count: u64,
    /// Most recent failure.
    pub last_error: Option<String>,
    /// Heartbeat ticks failed in a row.
    pub heartbeat_failures: u32,
    /// Last successful heartbeat.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Last successful frame read.
    pub last_active: Option<DateTime<Utc>>,
    /// Reconnect attempts made since start.
    pub reconnect_attempts: u64,
}

/// Point-in-time view of a registered stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamSnapshot {
    /// Stream id.
    pub stream_id: String,
    /// Camera id.
    pub device_id: String,
    /// Owning scene.
    pub scene_id: String,
    /// Play URL.
    pub source_url: String,
    /// Number of region polygons.
    pub region_polygons: usize,
    /// Class allow-list.
    pub target_classes: Vec<String>,
    /// Confidence threshold.
    pub confidence_threshold: f32,
    /// Rate limit.
    pub fps_limit: f64,
    /// Current state.
    pub state: StreamState,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Counters.
    pub stats: StreamStats,
}

#[derive(Debug)]
struct StatusInner {
    state: StreamState,
    stats: StreamStats,
}

/// State and counters of one stream, written by its workers and read by
/// status queries. Never held across an await.
#[derive(Debug)]
pub struct StreamStatus {
    stream_id: String,
    created_at: DateTime<Utc>,
    inner: Mutex<StatusInner>,
}

impl StreamStatus {
    /// New status in `Pending`.
    pub fn new(stream_id: &str) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            created_at: Utc::now(),
            inner: Mutex::new(StatusInner {
                state: StreamState::Pending,
                stats: StreamStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    pub fn state(&self) -> StreamState {
        self.lock().state
    }

    /// Registration time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Move to `next`. `Stopped` is terminal; returns whether the state changed.
    pub fn transition(&self, next: StreamState, reason: &str) -> bool {
        let previous = {
            let mut inner = self.lock();
            let previous = inner.state;
            if previous == next || previous == StreamState::Stopped {
                return false;
            }
            inner.state = next;
            previous
        };
        info!(
            stream_id = %self.stream_id,
            from = %previous,
            to = %next,
            reason,
            "Stream state changed"
        );
        true
    }

    /// Apply `f` to the counters.
    pub fn update(&self, f: impl FnOnce(&mut StreamStats)) {
        f(&mut self.lock().stats);
    }

    /// Record a failure message.
    pub fn record_error(&self, message: String) {
        self.update(|stats| {
            stats.error_count += 1;
            stats.last_error = Some(message);
        });
    }

    /// Copy of the counters.
    pub fn stats(&self) -> StreamStats {
        self.lock().stats.clone()
    }

    /// Snapshot combined with the stream's spec.
    pub fn snapshot(&self, spec: &StreamSpec) -> StreamSnapshot {
        let (state, stats) = {
            let inner = self.lock();
            (inner.state, inner.stats.clone())
        };
        StreamSnapshot {
            stream_id: spec.stream_id.clone(),
            device_id: spec.device_id.clone(),
            scene_id: spec.scene_id.clone(),
            source_url: spec.source_url.clone(),
            region_polygons: spec.region.polygons().len(),
            target_classes: spec.target_classes.clone(),
            confidence_threshold: spec.confidence_threshold,
            fps_limit: spec.fps_limit,
            state,
            created_at: self.created_at,
            stats,
        }
    }
}
