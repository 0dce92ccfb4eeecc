//! Stream worker: reads frames, runs inference and feeds the debounce engine.
//!
//! One worker task per stream. The loop is
//! read → rate limit → downscale → detect → filter → debounce → enqueue,
//! with a bounded local retry on read failures, a reconnect policy once
//! retries run out, and a watch channel from the heartbeat worker that can
//! put the stream into `Error` at any point.

use super::rate::RateLimiter;
use super::reconnect::ReconnectPolicy;
use super::state::{StreamSpec, StreamState, StreamStatus};
use crate::alarm::{DebounceEngine, DebounceSettings};
use crate::config::Config;
use crate::error::Error;
use crate::heartbeat::DeviceHealth;
use crate::inference::{DetectionFilter, Detector};
use crate::publisher::{AlarmNotice, AlarmQueue, PushOutcome};
use crate::source::{Frame, FrameReader, FrameSource, downscale};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Worker tuning shared by every stream of a manager.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Read failures in a row before the stream enters `Error`.
    pub max_read_failures: u32,
    /// Pause between local read retries.
    pub read_retry_delay: Duration,
    /// Deadline for opening a source or reading one frame.
    pub read_timeout: Duration,
    /// Longest frame side sent to inference.
    pub max_resolution: u32,
    /// Reconnect schedule.
    pub reconnect: ReconnectPolicy,
    /// Debounce parameters.
    pub debounce: DebounceSettings,
    /// Root of alarm snapshot paths.
    pub artifact_dir: PathBuf,
}

impl WorkerSettings {
    /// Derive worker settings from the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_read_failures: config.stream.max_read_failures.max(1),
            read_retry_delay: Duration::from_millis(config.stream.read_retry_delay_ms),
            read_timeout: Duration::from_secs(config.stream.read_timeout_secs.max(1)),
            max_resolution: config.stream.max_resolution,
            reconnect: ReconnectPolicy::from(&config.stream.reconnect),
            debounce: DebounceSettings::from(&config.alarm),
            artifact_dir: config.publisher.artifact_dir.clone(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Why the frame loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Exit {
    Cancelled,
    ReadFailures(String),
    HeartbeatLost,
    Exhausted,
}

/// Per-stream frame pipeline.
pub struct StreamWorker {
    spec: Arc<StreamSpec>,
    status: Arc<StreamStatus>,
    source: Arc<dyn FrameSource>,
    detector: Arc<dyn Detector>,
    alarms: Arc<AlarmQueue>,
    settings: WorkerSettings,
    filter: DetectionFilter,
    limiter: RateLimiter,
    debounce: DebounceEngine,
    health: watch::Receiver<DeviceHealth>,
    health_open: bool,
    reconnect_attempt: u32,
    cancel: CancellationToken,
}

impl StreamWorker {
    /// Assemble a worker. Nothing runs until [`StreamWorker::run`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spec: Arc<StreamSpec>,
        status: Arc<StreamStatus>,
        source: Arc<dyn FrameSource>,
        detector: Arc<dyn Detector>,
        alarms: Arc<AlarmQueue>,
        settings: WorkerSettings,
        health: watch::Receiver<DeviceHealth>,
        cancel: CancellationToken,
    ) -> Self {
        let filter = DetectionFilter::new(
            spec.confidence_threshold,
            &spec.target_classes,
            spec.region.clone(),
        );
        let limiter = RateLimiter::new(spec.fps_limit);
        let debounce = DebounceEngine::new(DebounceSettings {
            min_confidence: spec.min_alarm_confidence,
            ..settings.debounce
        });
        Self {
            spec,
            status,
            source,
            detector,
            alarms,
            settings,
            filter,
            limiter,
            debounce,
            health,
            health_open: true,
            reconnect_attempt: 0,
            cancel,
        }
    }

    /// Run until cancelled or reconnects are exhausted. Always ends `Stopped`.
    pub async fn run(mut self) {
        let stream_id = self.spec.stream_id.clone();
        info!(stream_id = %stream_id, url = %self.spec.source_url, "Stream worker started");

        let reason = self.drive().await;

        self.status.transition(StreamState::Stopped, reason);
        self.debounce.forget_stream(&stream_id);
        info!(stream_id = %stream_id, reason, "Stream worker stopped");
    }

    async fn drive(&mut self) -> &'static str {
        let mut exit = match self.open_initial().await {
            Ok(reader) => self.pump(reader).await,
            Err(exit) => exit,
        };

        loop {
            match exit {
                Exit::Cancelled => return "cancelled",
                Exit::Exhausted => return "reconnect attempts exhausted",
                Exit::ReadFailures(reason) => {
                    self.status.transition(StreamState::Error, &reason);
                }
                Exit::HeartbeatLost => {
                    self.status.transition(StreamState::Error, "heartbeat lost");
                    if !self.wait_for_heartbeat().await {
                        return "cancelled";
                    }
                }
            }

            exit = match self.reconnect().await {
                Ok(reader) => self.pump(reader).await,
                Err(exit) => exit,
            };
        }
    }

    fn heartbeat_failing(&self) -> bool {
        self.health_open && *self.health.borrow() == DeviceHealth::Failing
    }

    /// Block while the heartbeat reports failure. `false` when cancelled.
    async fn wait_for_heartbeat(&mut self) -> bool {
        let cancel = self.cancel.clone();
        while self.heartbeat_failing() {
            tokio::select! {
                () = cancel.cancelled() => return false,
                changed = self.health.changed() => {
                    if changed.is_err() {
                        self.health_open = false;
                    }
                }
            }
        }
        debug!(stream_id = %self.spec.stream_id, "Heartbeat healthy again");
        !cancel.is_cancelled()
    }

    async fn open_source(&self, cancel: &CancellationToken) -> Result<Box<dyn FrameReader>, Exit> {
        let url = self.spec.source_url.as_str();
        let open = tokio::time::timeout(self.settings.read_timeout, self.source.open(url));

        let error = tokio::select! {
            () = cancel.cancelled() => return Err(Exit::Cancelled),
            opened = open => match opened {
                Ok(Ok(reader)) => return Ok(reader),
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout {
                    operation: format!("opening '{url}'"),
                    seconds: self.settings.read_timeout.as_secs_f64(),
                },
            },
        };

        let reason = error.to_string();
        self.status.record_error(reason.clone());
        Err(Exit::ReadFailures(reason))
    }

    /// First open, retried locally while the stream is still `Pending`.
    async fn open_initial(&mut self) -> Result<Box<dyn FrameReader>, Exit> {
        let cancel = self.cancel.clone();
        let attempts = self.settings.max_read_failures;

        for attempt in 1..=attempts {
            match self.open_source(&cancel).await {
                Ok(reader) => return Ok(reader),
                Err(Exit::ReadFailures(reason)) => {
                    self.status
                        .update(|stats| stats.consecutive_read_failures = attempt);
                    warn!(
                        stream_id = %self.spec.stream_id,
                        attempt,
                        attempts,
                        error = %reason,
                        "Failed to open stream"
                    );
                    if attempt == attempts {
                        return Err(Exit::ReadFailures(reason));
                    }
                    tokio::select! {
                        () = cancel.cancelled() => return Err(Exit::Cancelled),
                        () = tokio::time::sleep(self.settings.read_retry_delay) => {}
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Err(Exit::ReadFailures("no open attempts configured".to_string()))
    }

    /// Attempts count across episodes until a frame is read again, so a
    /// source that opens but never delivers still exhausts the policy.
    async fn reconnect(&mut self) -> Result<Box<dyn FrameReader>, Exit> {
        let cancel = self.cancel.clone();
        let stream_id = self.spec.stream_id.clone();
        let attempts = self.settings.reconnect.max_attempts();
        self.status
            .transition(StreamState::Reconnecting, "reconnect scheduled");

        while self.reconnect_attempt < attempts {
            self.reconnect_attempt += 1;
            let attempt = self.reconnect_attempt;
            let delay = self.settings.reconnect.delay_for(attempt);
            info!(
                stream_id = %stream_id,
                attempt,
                attempts,
                delay_secs = delay.as_secs_f64(),
                "Reconnecting stream"
            );
            tokio::select! {
                () = cancel.cancelled() => return Err(Exit::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
            if self.heartbeat_failing() {
                return Err(Exit::HeartbeatLost);
            }

            self.status.update(|stats| stats.reconnect_attempts += 1);
            match self.open_source(&cancel).await {
                Ok(reader) => {
                    self.status.update(|stats| stats.consecutive_read_failures = 0);
                    self.status.transition(StreamState::Active, "reconnected");
                    return Ok(reader);
                }
                Err(Exit::ReadFailures(reason)) => {
                    warn!(
                        stream_id = %stream_id,
                        attempt,
                        error = %reason,
                        "Reconnect attempt failed"
                    );
                }
                Err(other) => return Err(other),
            }
        }

        warn!(stream_id = %stream_id, attempts, "Reconnect attempts exhausted, stopping stream");
        Err(Exit::Exhausted)
    }

    /// Read frames until the reader fails for good, the heartbeat is lost,
    /// or the stream is cancelled.
    async fn pump(&mut self, mut reader: Box<dyn FrameReader>) -> Exit {
        let cancel = self.cancel.clone();

        loop {
            if self.heartbeat_failing() {
                return Exit::HeartbeatLost;
            }

            if reader.pull_based() {
                let wait = self.limiter.wait_time(Instant::now());
                if !wait.is_zero() {
                    tokio::select! {
                        () = cancel.cancelled() => return Exit::Cancelled,
                        changed = self.health.changed(), if self.health_open => {
                            if changed.is_err() {
                                self.health_open = false;
                            }
                            continue;
                        }
                        () = tokio::time::sleep(wait) => {}
                    }
                }
            }

            let read = tokio::select! {
                () = cancel.cancelled() => return Exit::Cancelled,
                changed = self.health.changed(), if self.health_open => {
                    if changed.is_err() {
                        self.health_open = false;
                    }
                    continue;
                }
                read = tokio::time::timeout(self.settings.read_timeout, reader.read_frame()) => {
                    read
                }
            };

            let error = match read {
                Ok(Ok(frame)) => {
                    self.on_frame_read();
                    tokio::select! {
                        () = cancel.cancelled() => return Exit::Cancelled,
                        () = self.process(frame) => {}
                    }
                    continue;
                }
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout {
                    operation: "frame read".to_string(),
                    seconds: self.settings.read_timeout.as_secs_f64(),
                },
            };

            if let Some(exit) = self.on_read_failure(error, &cancel).await {
                return exit;
            }
        }
    }

    fn on_frame_read(&mut self) {
        self.reconnect_attempt = 0;
        self.status.update(|stats| {
            stats.frames_read += 1;
            stats.consecutive_read_failures = 0;
            stats.last_active = Some(Utc::now());
        });
        self.status
            .transition(StreamState::Active, "frame received");
    }

    /// Count a failed read. Returns an exit once the failure budget is spent.
    async fn on_read_failure(&self, error: Error, cancel: &CancellationToken) -> Option<Exit> {
        let reason = error.to_string();
        self.status.record_error(reason.clone());
        let mut failures = 0;
        self.status.update(|stats| {
            stats.consecutive_read_failures += 1;
            failures = stats.consecutive_read_failures;
        });

        let max = self.settings.max_read_failures;
        if failures >= max {
            warn!(
                stream_id = %self.spec.stream_id,
                failures,
                error = %reason,
                "Too many read failures"
            );
            return Some(Exit::ReadFailures(reason));
        }

        debug!(
            stream_id = %self.spec.stream_id,
            failures,
            max,
            error = %reason,
            "Frame read failed, retrying"
        );
        tokio::select! {
            () = cancel.cancelled() => Some(Exit::Cancelled),
            () = tokio::time::sleep(self.settings.read_retry_delay) => None,
        }
    }

    async fn process(&mut self, frame: Frame) {
        if !self.limiter.admit(Instant::now()) {
            self.status.update(|stats| stats.frames_skipped += 1);
            return;
        }

        let captured_at = frame.captured_at;
        let prepared = downscale(frame, self.settings.max_resolution);
        self.status.update(|stats| stats.frames_inferred += 1);

        let detections = match self
            .detector
            .detect(&prepared.frame, self.filter.confidence_threshold())
            .await
        {
            Ok(detections) => detections,
            Err(e) => {
                warn!(
                    stream_id = %self.spec.stream_id,
                    error = %e,
                    "Inference failed, skipping frame"
                );
                self.status.record_error(e.to_string());
                return;
            }
        };

        let detections = detections
            .into_iter()
            .map(|mut det| {
                det.bbox = det.bbox.scaled(prepared.scale_back);
                det
            })
            .collect();
        let kept = self.filter.apply(detections);
        let kept_count = kept.len() as u64;
        self.status.update(|stats| stats.detections += kept_count);

        let events = self
            .debounce
            .observe_frame(&self.spec.stream_id, &kept, captured_at);

        for event in events {
            info!(
                stream_id = %self.spec.stream_id,
                class = %event.class_name,
                confidence = event.confidence,
                severity = %event.severity,
                "Alarm raised"
            );
            self.status.update(|stats| stats.alarms += 1);
            let notice = AlarmNotice::new(
                &self.spec.scene_id,
                &self.spec.device_id,
                &self.spec.algorithm,
                event,
                &self.settings.artifact_dir,
            );
            if self.alarms.push(notice) == PushOutcome::DroppedOldest {
                debug!(stream_id = %self.spec.stream_id, "Alarm queue full, oldest alarm dropped");
            }
        }
    }
}
