//! Alarm delivery: notice type, publisher seam, queue and backends.

mod http;
mod log;
mod queue;

pub use http::HttpAlarmPublisher;
pub use log::LogAlarmPublisher;
pub use queue::{AlarmQueue, PushOutcome, QueueStats, spawn_dispatcher};

use crate::alarm::AlarmEvent;
use crate::config::{PublisherConfig, PublisherKind};
use crate::constants::publisher::SNAPSHOT_EXTENSION;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An accepted alarm with the context the outside world needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmNotice {
    /// Owning scene.
    pub scene_id: String,
    /// Camera the stream belongs to.
    pub device_id: String,
    /// Algorithm the scene runs.
    pub algorithm: String,
    /// The debounced alarm.
    pub event: AlarmEvent,
    /// Where the alarm snapshot belongs.
    pub snapshot_path: PathBuf,
}

impl AlarmNotice {
    /// Build a notice, deriving the snapshot path under `artifact_dir`.
    pub fn new(
        scene_id: &str,
        device_id: &str,
        algorithm: &str,
        event: AlarmEvent,
        artifact_dir: &Path,
    ) -> Self {
        let snapshot_path = snapshot_path(artifact_dir, scene_id, device_id, &event);
        Self {
            scene_id: scene_id.to_string(),
            device_id: device_id.to_string(),
            algorithm: algorithm.to_string(),
            event,
            snapshot_path,
        }
    }
}

/// `<artifact_dir>/<scene>/<device>/<YYYYmmdd_HHMMSS_mmm>_<class>.jpg`
pub fn snapshot_path(
    artifact_dir: &Path,
    scene_id: &str,
    device_id: &str,
    event: &AlarmEvent,
) -> PathBuf {
    let stamp = event.timestamp.format("%Y%m%d_%H%M%S_%3f");
    let class = sanitize_component(&event.class_name);
    artifact_dir
        .join(sanitize_component(scene_id))
        .join(sanitize_component(device_id))
        .join(format!("{stamp}_{class}.{SNAPSHOT_EXTENSION}"))
}

fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Where accepted alarms go.
#[async_trait]
pub trait AlarmPublisher: Send + Sync {
    /// Deliver one alarm. A rejection is returned, never panicked.
    async fn publish(&self, notice: &AlarmNotice) -> Result<()>;
}

/// Build the publisher selected in config.
pub fn build_publisher(config: &PublisherConfig) -> Result<Arc<dyn AlarmPublisher>> {
    match config.kind {
        PublisherKind::Log => Ok(Arc::new(LogAlarmPublisher)),
        PublisherKind::Http => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or_else(|| Error::ConfigValidation {
                    message: "publisher.endpoint is required when kind = \"http\"".to_string(),
                })?;
            Ok(Arc::new(HttpAlarmPublisher::new(
                endpoint,
                config.request_timeout(),
            )?))
        }
    }
}
