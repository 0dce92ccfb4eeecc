//! Stream registry: the single table of live streams.

use super::state::{StreamSnapshot, StreamSpec, StreamState, StreamStatus};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A stream and the tasks that serve it.
#[derive(Debug)]
pub struct RegisteredStream {
    /// Identity and settings.
    pub spec: Arc<StreamSpec>,
    /// Shared state and counters.
    pub status: Arc<StreamStatus>,
    /// Cancels the stream and heartbeat workers.
    pub cancel: CancellationToken,
    /// Worker task handles.
    pub tasks: Vec<JoinHandle<()>>,
    seq: u64,
}

impl RegisteredStream {
    /// Bundle a stream for registration.
    pub fn new(
        spec: Arc<StreamSpec>,
        status: Arc<StreamStatus>,
        cancel: CancellationToken,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            spec,
            status,
            cancel,
            tasks,
            seq: 0,
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> StreamSnapshot {
        self.status.snapshot(&self.spec)
    }
}

/// Why a stream cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The stream may be registered.
    Open,
    /// The stream id is already registered by a scene.
    Taken {
        /// Scene owning the existing stream.
        scene_id: String,
    },
    /// The registry is at capacity.
    Full {
        /// Configured maximum.
        capacity: usize,
    },
}

impl std::fmt::Display for Admission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Taken { scene_id } => {
                write!(f, "device already streaming for scene '{scene_id}'")
            }
            Self::Full { capacity } => write!(f, "stream limit of {capacity} reached"),
        }
    }
}

/// Count of registered streams per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// All registered streams.
    pub total: usize,
    /// In `Pending`.
    pub pending: usize,
    /// In `Active`.
    pub active: usize,
    /// In `Error`.
    pub error: usize,
    /// In `Reconnecting`.
    pub reconnecting: usize,
    /// In `Stopped` but not yet removed.
    pub stopped: usize,
}

/// Map of stream id to registered stream.
///
/// Not synchronized itself; the owner serializes structural changes.
#[derive(Debug)]
pub struct StreamRegistry {
    streams: HashMap<String, RegisteredStream>,
    capacity: usize,
    next_seq: u64,
}

impl StreamRegistry {
    /// Empty registry holding at most `capacity` streams.
    pub fn new(capacity: usize) -> Self {
        Self {
            streams: HashMap::new(),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    /// Number of registered streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Most streams the registry admits.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether no streams are registered.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Whether `stream_id` is registered.
    pub fn contains(&self, stream_id: &str) -> bool {
        self.streams.contains_key(stream_id)
    }

    /// Whether `stream_id` could be registered now.
    pub fn admission(&self, stream_id: &str) -> Admission {
        if let Some(existing) = self.streams.get(stream_id) {
            return Admission::Taken {
                scene_id: existing.spec.scene_id.clone(),
            };
        }
        if self.streams.len() >= self.capacity {
            return Admission::Full {
                capacity: self.capacity,
            };
        }
        Admission::Open
    }

    /// Register a stream. Callers check [`admission`](Self::admission) first;
    /// a stream under an existing id replaces and returns the old entry.
    pub fn insert(&mut self, mut stream: RegisteredStream) -> Option<RegisteredStream> {
        stream.seq = self.next_seq;
        self.next_seq += 1;
        debug!(stream_id = %stream.spec.stream_id, seq = stream.seq, "Stream registered");
        let previous = self
            .streams
            .insert(stream.spec.stream_id.clone(), stream);
        previous.map(Self::retire)
    }

    /// Unregister a stream, cancel its workers and mark it `Stopped`.
    pub fn remove(&mut self, stream_id: &str) -> Option<RegisteredStream> {
        self.streams.remove(stream_id).map(Self::retire)
    }

    fn retire(stream: RegisteredStream) -> RegisteredStream {
        stream.cancel.cancel();
        stream.status.transition(StreamState::Stopped, "removed from registry");
        stream
    }

    /// Snapshot of one stream.
    pub fn get(&self, stream_id: &str) -> Option<StreamSnapshot> {
        self.streams.get(stream_id).map(RegisteredStream::snapshot)
    }

    /// Snapshots of all streams in registration order.
    pub fn list(&self) -> Vec<StreamSnapshot> {
        let mut streams: Vec<&RegisteredStream> = self.streams.values().collect();
        streams.sort_by_key(|s| s.seq);
        streams.into_iter().map(RegisteredStream::snapshot).collect()
    }

    /// Per-state counts.
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            total: self.streams.len(),
            ..RegistryStats::default()
        };
        for stream in self.streams.values() {
            match stream.status.state() {
                StreamState::Pending => stats.pending += 1,
                StreamState::Active => stats.active += 1,
                StreamState::Error => stats.error += 1,
                StreamState::Reconnecting => stats.reconnecting += 1,
                StreamState::Stopped => stats.stopped += 1,
            }
        }
        stats
    }
}

/// Wait for the tasks of removed streams, aborting any still running
/// after `grace`.
pub async fn join_streams(streams: Vec<RegisteredStream>, grace: Duration) {
    let tasks: Vec<JoinHandle<()>> = streams.into_iter().flat_map(|s| s.tasks).collect();
    if tasks.is_empty() {
        return;
    }

    let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
    if tokio::time::timeout(grace, join_all(tasks)).await.is_err() {
        warn!(
            tasks = aborts.len(),
            grace_secs = grace.as_secs_f64(),
            "Workers did not stop in time, aborting"
        );
        for handle in aborts {
            handle.abort();
        }
    }
}
