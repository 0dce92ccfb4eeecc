//! Scene lifecycle: deploy, stop, queries.
//!
//! Scenes and streams live behind one lock so a stop triggered by the
//! expiry sweep and one triggered by a caller can race safely: whichever
//! arrives second finds nothing to stop. Network calls (URL resolution)
//! and worker shutdown happen outside the lock.

use super::types::{DeployReport, DeployRequest, DeviceFailure, SceneSnapshot, StopReport};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::heartbeat::{HeartbeatSettings, HeartbeatWorker};
use crate::inference::{Detector, DetectorFactory};
use crate::platform::{DevicePlatform, SceneMapper};
use crate::publisher::AlarmQueue;
use crate::region::Region;
use crate::source::FrameSource;
use crate::stream::{
    Admission, RegisteredStream, RegistryStats, StreamRegistry, StreamSnapshot, StreamSpec,
    StreamStatus, StreamWorker, WorkerSettings, join_streams, stream_id_for,
};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// External services the manager drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Stream URL resolution and heartbeats.
    pub platform: Arc<dyn DevicePlatform>,
    /// Algorithm to model mapping.
    pub mapper: Arc<dyn SceneMapper>,
    /// Detector per model.
    pub detectors: Arc<dyn DetectorFactory>,
    /// Opens stream URLs.
    pub source: Arc<dyn FrameSource>,
    /// Outgoing alarms.
    pub alarms: Arc<AlarmQueue>,
}

/// Manager tuning derived from [`Config`].
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Default per-stream confidence threshold.
    pub confidence_threshold: f32,
    /// Default per-stream frame rate limit.
    pub fps_limit: f64,
    /// Deadline passed to URL resolution.
    pub resolve_timeout: Duration,
    /// Maximum registered streams.
    pub max_streams: usize,
    /// Time workers get to exit before being aborted.
    pub shutdown_grace: Duration,
    /// Expiry sweep period.
    pub sweep_interval: Duration,
    /// Heartbeat timing.
    pub heartbeat: HeartbeatSettings,
    /// Stream worker tuning.
    pub worker: WorkerSettings,
}

impl ManagerSettings {
    /// Derive from the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            confidence_threshold: config.stream.confidence_threshold,
            fps_limit: config.stream.fps_limit,
            resolve_timeout: config.platform.request_timeout(),
            max_streams: config.stream.max_streams,
            shutdown_grace: Duration::from_secs(config.scene.shutdown_grace_secs),
            sweep_interval: Duration::from_secs(config.scene.sweep_interval_secs.max(1)),
            heartbeat: HeartbeatSettings::from(&config.heartbeat),
            worker: WorkerSettings::from_config(config),
        }
    }
}

#[derive(Debug)]
struct SceneRecord {
    algorithm: String,
    model_id: String,
    start: Option<DateTime<Utc>>,
    end: DateTime<Utc>,
    created_at: DateTime<Utc>,
    streams: BTreeMap<String, String>,
}

impl SceneRecord {
    fn snapshot(&self, scene_id: &str) -> SceneSnapshot {
        SceneSnapshot {
            scene_id: scene_id.to_string(),
            algorithm: self.algorithm.clone(),
            model_id: self.model_id.clone(),
            start: self.start,
            end: self.end,
            created_at: self.created_at,
            streams: self.streams.clone(),
        }
    }
}

#[derive(Debug)]
struct Tables {
    scenes: HashMap<String, SceneRecord>,
    registry: StreamRegistry,
}

impl Tables {
    /// Remove a scene and every stream it owns.
    fn take_scene(&mut self, scene_id: &str) -> Option<Vec<RegisteredStream>> {
        self.take_scene_if(scene_id, |_| true)
    }

    /// [`Tables::take_scene`], only when `pred` holds for the scene.
    fn take_scene_if(
        &mut self,
        scene_id: &str,
        pred: impl FnOnce(&SceneRecord) -> bool,
    ) -> Option<Vec<RegisteredStream>> {
        if !self.scenes.get(scene_id).is_some_and(pred) {
            return None;
        }
        let record = self.scenes.remove(scene_id)?;
        Some(
            record
                .streams
                .values()
                .filter_map(|stream_id| self.registry.remove(stream_id))
                .collect(),
        )
    }

    /// Whether any of `stream_ids` would be admitted once `scene_id` has
    /// released its own streams.
    fn would_admit_any<'a>(
        &self,
        scene_id: &str,
        mut stream_ids: impl Iterator<Item = &'a str>,
    ) -> bool {
        let released = self.scenes.get(scene_id).map_or(0, |r| r.streams.len());
        if self.registry.len().saturating_sub(released) >= self.registry.capacity() {
            return false;
        }
        stream_ids.any(|stream_id| match self.registry.admission(stream_id) {
            Admission::Taken { scene_id: owner } => owner == scene_id,
            Admission::Open | Admission::Full { .. } => true,
        })
    }
}

/// Turns deployment requests into running stream and heartbeat workers.
pub struct SceneManager {
    settings: ManagerSettings,
    collaborators: Collaborators,
    tables: Mutex<Tables>,
    sweep_gate: tokio::sync::Mutex<()>,
    root: CancellationToken,
}

impl SceneManager {
    /// Create a manager with settings taken from `config`.
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        Self::with_settings(ManagerSettings::from_config(config), collaborators)
    }

    /// Create a manager with explicit settings.
    pub fn with_settings(settings: ManagerSettings, collaborators: Collaborators) -> Self {
        let registry = StreamRegistry::new(settings.max_streams);
        Self {
            settings,
            collaborators,
            tables: Mutex::new(Tables {
                scenes: HashMap::new(),
                registry,
            }),
            sweep_gate: tokio::sync::Mutex::new(()),
            root: CancellationToken::new(),
        }
    }

    /// Settings in use.
    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deploy a scene.
    ///
    /// Malformed requests (empty scene, bad window, unknown algorithm, bad
    /// region, unloadable model) fail as a whole. Devices whose stream
    /// cannot be resolved or registered are reported in the returned
    /// [`DeployReport`] while the others start. Deploying an existing scene
    /// id replaces it, unless none of the new devices could start, in which
    /// case the running deployment is kept.
    pub async fn deploy(&self, request: DeployRequest) -> Result<DeployReport> {
        let scene_id = request.scene_id.trim().to_string();
        if scene_id.is_empty() {
            return Err(Error::ConfigValidation {
                message: "scene id must not be empty".to_string(),
            });
        }
        if request.devices.is_empty() {
            return Err(Error::ConfigValidation {
                message: format!("scene '{scene_id}' lists no devices"),
            });
        }

        let now = Utc::now();
        let window = request.window(now)?;
        request.validate_overrides()?;
        let binding = self
            .collaborators
            .mapper
            .resolve_model(&request.algorithm)
            .ok_or_else(|| Error::UnknownAlgorithm {
                name: request.algorithm.clone(),
            })?;
        let regions = request
            .devices
            .iter()
            .map(|device| Region::parse(&device.area))
            .collect::<Result<Vec<_>>>()?;
        let detector = self.collaborators.detectors.detector_for(&binding.model_id)?;

        info!(
            scene_id = %scene_id,
            algorithm = %request.algorithm,
            model = %binding.model_id,
            devices = request.devices.len(),
            end = %window.end,
            "Deploying scene"
        );

        let mut failures = Vec::new();
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for (device, region) in request.devices.iter().zip(regions) {
            let device_id = device.device_id.trim();
            if device_id.is_empty() {
                failures.push(failure(device_id, "empty device id".to_string()));
            } else if !seen.insert(device_id) {
                failures.push(failure(device_id, "device listed twice".to_string()));
            } else {
                candidates.push((device_id, region));
            }
        }

        let platform = &self.collaborators.platform;
        let timeout = self.settings.resolve_timeout;
        let resolved = join_all(
            candidates
                .iter()
                .map(|(device_id, _)| platform.resolve_stream_url(device_id, timeout)),
        )
        .await;

        let confidence_threshold = request
            .confidence_threshold
            .unwrap_or(self.settings.confidence_threshold);
        let fps_limit = request.fps_limit.unwrap_or(self.settings.fps_limit);
        let min_alarm_confidence = request
            .min_confidence
            .unwrap_or(self.settings.worker.debounce.min_confidence);

        let reachable: Vec<String> = candidates
            .iter()
            .zip(&resolved)
            .filter(|(_, url)| url.is_ok())
            .map(|((device_id, _), _)| stream_id_for(device_id))
            .collect();

        let (deployed, retired) = {
            let mut tables = self.lock();
            let viable = tables.would_admit_any(&scene_id, reachable.iter().map(String::as_str));
            let retired = if tables.scenes.contains_key(&scene_id) && !viable {
                warn!(
                    scene_id = %scene_id,
                    "Redeploy would start no streams, keeping existing deployment"
                );
                None
            } else {
                tables.take_scene(&scene_id)
            };
            if retired.is_some() {
                info!(scene_id = %scene_id, "Replacing existing deployment");
            }

            let mut streams = BTreeMap::new();
            for ((device_id, region), url) in candidates.into_iter().zip(resolved) {
                let url = match url {
                    Ok(url) => url,
                    Err(e) => {
                        failures.push(failure(device_id, e.to_string()));
                        continue;
                    }
                };

                let stream_id = stream_id_for(device_id);
                let admission = tables.registry.admission(&stream_id);
                if admission != Admission::Open {
                    failures.push(failure(device_id, admission.to_string()));
                    continue;
                }

                let spec = Arc::new(StreamSpec {
                    stream_id: stream_id.clone(),
                    device_id: device_id.to_string(),
                    scene_id: scene_id.clone(),
                    algorithm: request.algorithm.clone(),
                    source_url: url,
                    region,
                    target_classes: binding.target_classes.clone(),
                    confidence_threshold,
                    fps_limit,
                    min_alarm_confidence,
                });
                tables.registry.insert(self.spawn_stream(spec, detector.clone()));
                streams.insert(device_id.to_string(), stream_id);
            }

            let deployed = streams.len();
            if deployed > 0 {
                tables.scenes.insert(
                    scene_id.clone(),
                    SceneRecord {
                        algorithm: request.algorithm.clone(),
                        model_id: binding.model_id.clone(),
                        start: window.start,
                        end: window.end,
                        created_at: now,
                        streams,
                    },
                );
            }
            (deployed, retired)
        };

        let replaced = retired.is_some();
        if let Some(retired) = retired {
            join_streams(retired, self.settings.shutdown_grace).await;
        }

        for failed in &failures {
            let error = Error::DeviceDeploy {
                device_id: failed.device_id.clone(),
                reason: failed.reason.clone(),
            };
            warn!(scene_id = %scene_id, error = %error, "Device failed to deploy");
        }
        info!(
            scene_id = %scene_id,
            deployed,
            failed = failures.len(),
            "Scene deployment finished"
        );

        Ok(DeployReport {
            scene_id,
            deployed_count: deployed,
            failed_count: failures.len(),
            failures,
            replaced,
        })
    }

    fn spawn_stream(&self, spec: Arc<StreamSpec>, detector: Arc<dyn Detector>) -> RegisteredStream {
        let status = Arc::new(StreamStatus::new(&spec.stream_id));
        let cancel = self.root.child_token();

        let (heartbeat, health) = HeartbeatWorker::new(
            &spec.device_id,
            self.collaborators.platform.clone(),
            self.settings.heartbeat,
            status.clone(),
            cancel.clone(),
        );
        let worker = StreamWorker::new(
            spec.clone(),
            status.clone(),
            self.collaborators.source.clone(),
            detector,
            self.collaborators.alarms.clone(),
            self.settings.worker.clone(),
            health,
            cancel.clone(),
        );

        let tasks = vec![tokio::spawn(worker.run()), tokio::spawn(heartbeat.run())];
        RegisteredStream::new(spec, status, cancel, tasks)
    }

    /// Stop a scene and every stream it owns. Unknown scenes report
    /// `stopped: false`.
    pub async fn stop(&self, scene_id: &str) -> StopReport {
        let taken = self.lock().take_scene(scene_id);
        self.finish_stop(scene_id, taken).await
    }

    /// Stop a scene only if its end time is at or before `now`, checked
    /// under the same lock that removes it. A scene redeployed with a later
    /// end time is left running.
    pub async fn stop_if_expired(&self, scene_id: &str, now: DateTime<Utc>) -> StopReport {
        let taken = self
            .lock()
            .take_scene_if(scene_id, |record| record.end <= now);
        self.finish_stop(scene_id, taken).await
    }

    async fn finish_stop(
        &self,
        scene_id: &str,
        taken: Option<Vec<RegisteredStream>>,
    ) -> StopReport {
        let Some(streams) = taken else {
            debug!(scene_id, "Nothing to stop");
            return StopReport::default();
        };

        let stream_count = streams.len();
        join_streams(streams, self.settings.shutdown_grace).await;
        info!(scene_id, streams = stream_count, "Scene stopped");
        StopReport {
            stopped: true,
            stream_count,
        }
    }

    /// Remove one stream. Its scene goes away with its last stream.
    pub async fn remove_stream(&self, stream_id: &str) -> bool {
        let removed = {
            let mut tables = self.lock();
            let Some(stream) = tables.registry.remove(stream_id) else {
                return false;
            };
            let scene_id = stream.spec.scene_id.clone();
            let now_empty = tables.scenes.get_mut(&scene_id).is_some_and(|record| {
                record.streams.retain(|_, id| id != stream_id);
                record.streams.is_empty()
            });
            if now_empty {
                tables.scenes.remove(&scene_id);
                info!(scene_id = %scene_id, "Last stream removed, scene dropped");
            }
            stream
        };

        join_streams(vec![removed], self.settings.shutdown_grace).await;
        info!(stream_id, "Stream removed");
        true
    }

    /// Snapshot of one stream.
    pub fn get_stream_status(&self, stream_id: &str) -> Option<StreamSnapshot> {
        self.lock().registry.get(stream_id)
    }

    /// Snapshots of every stream in registration order.
    pub fn list_streams(&self) -> Vec<StreamSnapshot> {
        self.lock().registry.list()
    }

    /// Snapshot of one scene.
    pub fn get_scene(&self, scene_id: &str) -> Option<SceneSnapshot> {
        self.lock()
            .scenes
            .get(scene_id)
            .map(|record| record.snapshot(scene_id))
    }

    /// Snapshots of every scene, oldest first.
    pub fn list_scenes(&self) -> Vec<SceneSnapshot> {
        let mut scenes: Vec<SceneSnapshot> = self
            .lock()
            .scenes
            .iter()
            .map(|(id, record)| record.snapshot(id))
            .collect();
        scenes.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.scene_id.cmp(&b.scene_id))
        });
        scenes
    }

    /// Streams per state.
    pub fn registry_stats(&self) -> RegistryStats {
        self.lock().registry.stats()
    }

    /// Tear down every scene whose end time is at or before `now`.
    ///
    /// Single-flight: returns `None` without doing anything if another
    /// sweep is still running.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Option<Vec<String>> {
        let Ok(_guard) = self.sweep_gate.try_lock() else {
            debug!("Expiry sweep already running, skipping");
            return None;
        };

        let mut expired: Vec<String> = self
            .lock()
            .scenes
            .iter()
            .filter(|(_, record)| record.end <= now)
            .map(|(id, _)| id.clone())
            .collect();
        expired.sort();

        let mut stopped = Vec::with_capacity(expired.len());
        for scene_id in expired {
            let report = self.stop_if_expired(&scene_id, now).await;
            if report.stopped {
                info!(scene_id = %scene_id, streams = report.stream_count, "Scene expired");
                stopped.push(scene_id);
            }
        }
        Some(stopped)
    }

    /// [`SceneManager::sweep_expired_at`] with the current time.
    pub async fn sweep_expired(&self) -> Option<Vec<String>> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Stop every scene and cancel anything left. Returns scenes stopped.
    pub async fn shutdown(&self) -> usize {
        let scene_ids: Vec<String> = self.lock().scenes.keys().cloned().collect();
        let mut stopped = 0;
        for scene_id in scene_ids {
            if self.stop(&scene_id).await.stopped {
                stopped += 1;
            }
        }
        self.root.cancel();
        info!(scenes = stopped, "Scene manager shut down");
        stopped
    }
}

fn failure(device_id: &str, reason: String) -> DeviceFailure {
    DeviceFailure {
        device_id: device_id.to_string(),
        reason,
    }
}
