//! Publisher that POSTs alarm messages as JSON.

use super::{AlarmNotice, AlarmPublisher};
use crate::alarm::Severity;
use crate::error::{Error, Result};
use crate::utils::format_platform_time;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Alarm message body understood by the platform's event bus bridge.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlarmMessage<'a> {
    scene: &'a str,
    alarm_time: String,
    pic: String,
    device_gb_code: &'a str,
    record: &'a str,
    class_name: &'a str,
    confidence: f32,
    level: Severity,
    host: &'a str,
}

/// Delivers alarms to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpAlarmPublisher {
    client: Client,
    endpoint: String,
    host: String,
}

impl HttpAlarmPublisher {
    /// Build a publisher posting to `endpoint`.
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        Ok(Self {
            client,
            endpoint,
            host,
        })
    }

    fn message<'a>(&'a self, notice: &'a AlarmNotice) -> AlarmMessage<'a> {
        AlarmMessage {
            scene: &notice.scene_id,
            alarm_time: format_platform_time(notice.event.timestamp),
            pic: notice.snapshot_path.to_string_lossy().into_owned(),
            device_gb_code: &notice.device_id,
            record: "",
            class_name: &notice.event.class_name,
            confidence: notice.event.confidence,
            level: notice.event.severity,
            host: &self.host,
        }
    }
}

#[async_trait]
impl AlarmPublisher for HttpAlarmPublisher {
    async fn publish(&self, notice: &AlarmNotice) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.message(notice))
            .send()
            .await
            .map_err(|e| Error::Publish {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::Publish {
                reason: format!("HTTP {}", response.status()),
            });
        }

        debug!(scene_id = %notice.scene_id, device_id = %notice.device_id, "Alarm posted");
        Ok(())
    }
}
