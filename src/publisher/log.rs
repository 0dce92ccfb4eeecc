//! Publisher that only logs alarms.

use super::{AlarmNotice, AlarmPublisher};
use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// Writes each alarm to the log at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlarmPublisher;

#[async_trait]
impl AlarmPublisher for LogAlarmPublisher {
    async fn publish(&self, notice: &AlarmNotice) -> Result<()> {
        info!(
            scene_id = %notice.scene_id,
            device_id = %notice.device_id,
            stream_id = %notice.event.stream_id,
            class = %notice.event.class_name,
            confidence = notice.event.confidence,
            severity = %notice.event.severity,
            snapshot = %notice.snapshot_path.display(),
            "ALARM"
        );
        Ok(())
    }
}
