//! Heartbeat worker: one keep-alive loop per device.
//!
//! Each tick calls the device platform with a bounded timeout and retries a
//! few times inside the tick. After `max_failed_ticks` failed ticks in a row
//! the device is reported as failing on a watch channel, which the owning
//! stream worker turns into an `Error` state. A later successful tick
//! reports the device healthy again.

use crate::config::HeartbeatConfig;
use crate::error::Error;
use crate::platform::DevicePlatform;
use crate::stream::StreamStatus;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Device keep-alive health as seen by the stream worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceHealth {
    /// Heartbeats are getting through.
    Healthy,
    /// Too many ticks failed in a row.
    Failing,
}

/// Heartbeat timing.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatSettings {
    /// Time between ticks.
    pub interval: Duration,
    /// Timeout of one call.
    pub timeout: Duration,
    /// Attempts per tick.
    pub retries_per_tick: u32,
    /// Pause between attempts within a tick.
    pub retry_delay: Duration,
    /// Failed ticks that mark the device failing.
    pub max_failed_ticks: u32,
}

impl From<&HeartbeatConfig> for HeartbeatSettings {
    fn from(config: &HeartbeatConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs.max(1)),
            timeout: Duration::from_secs(config.timeout_secs),
            retries_per_tick: config.retries_per_tick.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            max_failed_ticks: config.max_failed_ticks.max(1),
        }
    }
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self::from(&HeartbeatConfig::default())
    }
}

/// Keep-alive bookkeeping for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatEntry {
    /// Device id.
    pub device_id: String,
    /// Failed ticks in a row.
    pub consecutive_failures: u32,
    /// Last successful heartbeat.
    pub last_success: Option<DateTime<Utc>>,
}

/// Periodic keep-alive task for one device.
pub struct HeartbeatWorker {
    entry: HeartbeatEntry,
    platform: Arc<dyn DevicePlatform>,
    settings: HeartbeatSettings,
    status: Arc<StreamStatus>,
    health: watch::Sender<DeviceHealth>,
    cancel: CancellationToken,
}

impl HeartbeatWorker {
    /// Create a worker and the health channel its stream worker listens on.
    pub fn new(
        device_id: &str,
        platform: Arc<dyn DevicePlatform>,
        settings: HeartbeatSettings,
        status: Arc<StreamStatus>,
        cancel: CancellationToken,
    ) -> (Self, watch::Receiver<DeviceHealth>) {
        let (health, receiver) = watch::channel(DeviceHealth::Healthy);
        let worker = Self {
            entry: HeartbeatEntry {
                device_id: device_id.to_string(),
                consecutive_failures: 0,
                last_success: None,
            },
            platform,
            settings,
            status,
            health,
            cancel,
        };
        (worker, receiver)
    }

    /// Tick until cancelled.
    pub async fn run(mut self) {
        let device_id = self.entry.device_id.clone();
        debug!(
            device_id = %device_id,
            interval_secs = self.settings.interval.as_secs(),
            "Heartbeat started"
        );

        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.settings.interval,
            self.settings.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let ok = tokio::select! {
                () = self.cancel.cancelled() => break,
                ok = self.tick() => ok,
            };
            self.record(ok);
        }

        debug!(device_id = %device_id, "Heartbeat stopped");
    }

    /// One tick: up to `retries_per_tick` calls. Returns whether one succeeded.
    async fn tick(&self) -> bool {
        let device_id = self.entry.device_id.as_str();
        let attempts = self.settings.retries_per_tick;

        for attempt in 1..=attempts {
            let call = self.platform.heartbeat(device_id, self.settings.timeout);
            let error = match tokio::time::timeout(self.settings.timeout, call).await {
                Ok(Ok(())) => return true,
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout {
                    operation: format!("heartbeat for '{device_id}'"),
                    seconds: self.settings.timeout.as_secs_f64(),
                },
            };
            debug!(device_id, attempt, attempts, error = %error, "Heartbeat attempt failed");
            if attempt < attempts {
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }
        false
    }

    fn record(&mut self, ok: bool) {
        let device_id = self.entry.device_id.as_str();

        if ok {
            let recovered = self.entry.consecutive_failures >= self.settings.max_failed_ticks;
            self.entry.consecutive_failures = 0;
            let now = Utc::now();
            self.entry.last_success = Some(now);
            self.status.update(|stats| {
                stats.heartbeat_failures = 0;
                stats.last_heartbeat = Some(now);
            });
            if recovered {
                info!(device_id, "Heartbeat recovered");
            }
            self.health.send_if_modified(|h| {
                let changed = *h != DeviceHealth::Healthy;
                *h = DeviceHealth::Healthy;
                changed
            });
            return;
        }

        self.entry.consecutive_failures = self.entry.consecutive_failures.saturating_add(1);
        let failures = self.entry.consecutive_failures;
        self.status.update(|stats| stats.heartbeat_failures = failures);
        warn!(
            device_id,
            failures,
            max = self.settings.max_failed_ticks,
            "Heartbeat tick failed"
        );

        if failures >= self.settings.max_failed_ticks {
            let escalated = self.health.send_if_modified(|h| {
                let changed = *h != DeviceHealth::Failing;
                *h = DeviceHealth::Failing;
                changed
            });
            if escalated {
                self.status
                    .record_error(format!("heartbeat failed {failures} ticks in a row"));
                warn!(device_id, failures, "Heartbeat lost, escalating stream to error");
            }
        }
    }

    /// Current bookkeeping.
    pub fn entry(&self) -> &HeartbeatEntry {
        &self.entry
    }
}
