//! End-to-end scene lifecycle tests against in-memory collaborators.
//!
//! Alarm cooldown is keyed per (stream, class) throughout.

#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use image::{DynamicImage, RgbImage};
use scenewatch::config::Config;
use scenewatch::error::{Error, Result};
use scenewatch::inference::{BoundingBox, Detection, Detector, DetectorFactory};
use scenewatch::platform::{DevicePlatform, ModelBinding, SceneMapper};
use scenewatch::publisher::{AlarmNotice, AlarmPublisher, AlarmQueue, spawn_dispatcher};
use scenewatch::scene::{
    Collaborators, DeployRequest, DeviceRequest, ManagerSettings, SceneManager,
};
use scenewatch::source::{Frame, FrameReader, FrameSource};
use scenewatch::stream::StreamState;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SQUARE: &str = "(0,0),(10,0),(10,10),(0,10)";

#[derive(Default)]
struct FakePlatform {
    offline: Mutex<HashSet<String>>,
    heartbeat_down: Mutex<HashSet<String>>,
}

#[async_trait]
impl DevicePlatform for FakePlatform {
    async fn resolve_stream_url(&self, device_id: &str, _timeout: Duration) -> Result<String> {
        if self.offline.lock().unwrap().contains(device_id) {
            return Err(Error::ResolveStream {
                device_id: device_id.to_string(),
                reason: "device offline".to_string(),
            });
        }
        Ok(format!("rtsp://media.local/{device_id}"))
    }

    async fn heartbeat(&self, device_id: &str, _timeout: Duration) -> Result<()> {
        if self.heartbeat_down.lock().unwrap().contains(device_id) {
            return Err(Error::Heartbeat {
                device_id: device_id.to_string(),
                reason: "status 500".to_string(),
            });
        }
        Ok(())
    }
}

struct FakeMapper;

impl SceneMapper for FakeMapper {
    fn resolve_model(&self, algorithm: &str) -> Option<ModelBinding> {
        match algorithm {
            "fire" => Some(ModelBinding {
                model_id: "fire-v1".to_string(),
                target_classes: vec!["fire".to_string()],
            }),
            "broken" => Some(ModelBinding {
                model_id: "missing-model".to_string(),
                target_classes: Vec::new(),
            }),
            _ => None,
        }
    }
}

/// Every frame yields whatever `detections` holds at the time.
#[derive(Default)]
struct FakeDetector {
    detections: Mutex<Vec<Detection>>,
}

#[async_trait]
impl Detector for FakeDetector {
    async fn detect(&self, _frame: &Frame, threshold: f32) -> Result<Vec<Detection>> {
        Ok(self
            .detections
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.confidence >= threshold)
            .cloned()
            .collect())
    }
}

struct FakeDetectors(Arc<FakeDetector>);

impl DetectorFactory for FakeDetectors {
    fn detector_for(&self, model_id: &str) -> Result<Arc<dyn Detector>> {
        if model_id == "missing-model" {
            return Err(Error::ModelLoad {
                model: model_id.to_string(),
                reason: "not installed".to_string(),
            });
        }
        Ok(self.0.clone())
    }
}

struct FakeSource;

struct FakeReader;

#[async_trait]
impl FrameReader for FakeReader {
    async fn read_frame(&mut self) -> Result<Frame> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(Frame::new(DynamicImage::ImageRgb8(RgbImage::new(100, 100))))
    }
}

#[async_trait]
impl FrameSource for FakeSource {
    async fn open(&self, _url: &str) -> Result<Box<dyn FrameReader>> {
        Ok(Box::new(FakeReader))
    }
}

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<AlarmNotice>>,
}

#[async_trait]
impl AlarmPublisher for RecordingPublisher {
    async fn publish(&self, notice: &AlarmNotice) -> Result<()> {
        self.published.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

struct Harness {
    manager: Arc<SceneManager>,
    platform: Arc<FakePlatform>,
    detector: Arc<FakeDetector>,
    alarms: Arc<AlarmQueue>,
}

fn harness_with(config: &Config) -> Harness {
    let platform = Arc::new(FakePlatform::default());
    let detector = Arc::new(FakeDetector::default());
    let alarms = Arc::new(AlarmQueue::new(config.publisher.queue_capacity));
    let collaborators = Collaborators {
        platform: platform.clone(),
        mapper: Arc::new(FakeMapper),
        detectors: Arc::new(FakeDetectors(detector.clone())),
        source: Arc::new(FakeSource),
        alarms: alarms.clone(),
    };
    Harness {
        manager: Arc::new(SceneManager::with_settings(
            ManagerSettings::from_config(config),
            collaborators,
        )),
        platform,
        detector,
        alarms,
    }
}

fn harness() -> Harness {
    harness_with(&Config::default())
}

fn request(scene_id: &str, algorithm: &str, devices: &[(&str, &str)]) -> DeployRequest {
    DeployRequest {
        scene_id: scene_id.to_string(),
        algorithm: algorithm.to_string(),
        devices: devices
            .iter()
            .map(|(id, area)| DeviceRequest {
                device_id: (*id).to_string(),
                area: (*area).to_string(),
            })
            .collect(),
        start_time: None,
        end_time: (Utc::now() + TimeDelta::hours(1)).to_rfc3339(),
        confidence_threshold: None,
        fps_limit: None,
        min_confidence: None,
    }
}

fn fire_at(cx: f64, cy: f64, confidence: f32) -> Detection {
    Detection {
        class_name: "fire".to_string(),
        confidence,
        bbox: BoundingBox {
            x1: cx - 1.0,
            y1: cy - 1.0,
            x2: cx + 1.0,
            y2: cy + 1.0,
        },
    }
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..4_000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(start_paused = true)]
async fn test_deploy_single_device_becomes_active() {
    let h = harness();
    let report = h
        .manager
        .deploy(request("s1", "fire", &[("d1", SQUARE)]))
        .await
        .unwrap();

    assert_eq!(report.deployed_count, 1);
    assert_eq!(report.failed_count, 0);
    assert!(!report.replaced);

    let manager = h.manager.clone();
    wait_until(|| {
        manager
            .get_stream_status("stream-d1")
            .is_some_and(|s| s.state == StreamState::Active)
    })
    .await;

    let status = h.manager.get_stream_status("stream-d1").unwrap();
    assert_eq!(status.scene_id, "s1");
    assert_eq!(status.source_url, "rtsp://media.local/d1");
    assert_eq!(status.region_polygons, 1);
    assert_eq!(status.target_classes, vec!["fire".to_string()]);

    let scene = h.manager.get_scene("s1").unwrap();
    assert_eq!(scene.model_id, "fire-v1");
    assert_eq!(scene.streams.get("d1").unwrap(), "stream-d1");

    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_partial_deploy_reports_each_failure() {
    let h = harness();
    h.platform
        .offline
        .lock()
        .unwrap()
        .insert("d2".to_string());

    let report = h
        .manager
        .deploy(request("s1", "fire", &[("d1", ""), ("d2", ""), ("d1", ""), ("d3", "")]))
        .await
        .unwrap();

    assert_eq!(report.deployed_count, 2);
    assert_eq!(report.failed_count, 2);
    let failed: Vec<&str> = report.failures.iter().map(|f| f.device_id.as_str()).collect();
    assert!(failed.contains(&"d2"));
    assert!(failed.contains(&"d1"));
    assert!(report.failures.iter().any(|f| f.reason.contains("offline")));

    assert_eq!(h.manager.list_streams().len(), 2);
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_all_devices_failing_records_no_scene() {
    let h = harness();
    h.platform
        .offline
        .lock()
        .unwrap()
        .insert("d1".to_string());

    let report = h
        .manager
        .deploy(request("s1", "fire", &[("d1", "")]))
        .await
        .unwrap();

    assert_eq!(report.deployed_count, 0);
    assert_eq!(report.failed_count, 1);
    assert!(h.manager.get_scene("s1").is_none());
    assert!(h.manager.list_streams().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_requests_fail_whole_deploy() {
    let h = harness();

    let err = h
        .manager
        .deploy(request("s1", "teleport", &[("d1", "")]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownAlgorithm { .. }));

    let err = h
        .manager
        .deploy(request("s1", "fire", &[("d1", SQUARE), ("d2", "(0,0),(1,x)")]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRegion { .. }));

    let err = h
        .manager
        .deploy(request("s1", "broken", &[("d1", "")]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ModelLoad { .. }));

    let mut expired = request("s1", "fire", &[("d1", "")]);
    expired.end_time = (Utc::now() - TimeDelta::minutes(1)).to_rfc3339();
    let err = h.manager.deploy(expired).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTimeWindow { .. }));

    let err = h
        .manager
        .deploy(request("s1", "fire", &[]))
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    for threshold in [1.5, -0.2, f32::NAN] {
        let mut bad = request("s1", "fire", &[("d1", "")]);
        bad.confidence_threshold = Some(threshold);
        let err = h.manager.deploy(bad).await.unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    let mut bad = request("s1", "fire", &[("d1", "")]);
    bad.fps_limit = Some(f64::NAN);
    assert!(h.manager.deploy(bad).await.unwrap_err().is_configuration());

    assert!(h.manager.list_streams().is_empty());
    assert!(h.manager.list_scenes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let h = harness();
    h.manager
        .deploy(request("s1", "fire", &[("d1", ""), ("d2", "")]))
        .await
        .unwrap();
    h.manager
        .deploy(request("s2", "fire", &[("d3", "")]))
        .await
        .unwrap();

    let first = h.manager.stop("s1").await;
    assert!(first.stopped);
    assert_eq!(first.stream_count, 2);
    assert_eq!(h.manager.registry_stats().total, 1);

    let second = h.manager.stop("s1").await;
    assert!(!second.stopped);
    assert_eq!(second.stream_count, 0);
    assert_eq!(h.manager.registry_stats().total, 1);

    assert!(!h.manager.stop("never-deployed").await.stopped);
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_device_owned_by_other_scene_is_rejected() {
    let h = harness();
    h.manager
        .deploy(request("s1", "fire", &[("d1", "")]))
        .await
        .unwrap();

    let report = h
        .manager
        .deploy(request("s2", "fire", &[("d1", ""), ("d2", "")]))
        .await
        .unwrap();
    assert_eq!(report.deployed_count, 1);
    assert!(report.failures[0].reason.contains("s1"));

    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_redeploy_replaces_scene() {
    let h = harness();
    h.manager
        .deploy(request("s1", "fire", &[("d1", ""), ("d2", "")]))
        .await
        .unwrap();

    let report = h
        .manager
        .deploy(request("s1", "fire", &[("d2", ""), ("d3", "")]))
        .await
        .unwrap();
    assert!(report.replaced);
    assert_eq!(report.deployed_count, 2);

    let ids: Vec<String> = h
        .manager
        .list_streams()
        .into_iter()
        .map(|s| s.stream_id)
        .collect();
    assert_eq!(ids, vec!["stream-d2".to_string(), "stream-d3".to_string()]);
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_redeploy_that_starts_nothing_keeps_scene() {
    let h = harness();
    h.manager
        .deploy(request("s1", "fire", &[("d1", "")]))
        .await
        .unwrap();
    h.platform.offline.lock().unwrap().insert("d9".to_string());

    let report = h
        .manager
        .deploy(request("s1", "fire", &[("d9", "")]))
        .await
        .unwrap();
    assert!(!report.replaced);
    assert_eq!(report.deployed_count, 0);
    assert_eq!(report.failed_count, 1);

    let scene = h.manager.get_scene("s1").unwrap();
    assert_eq!(scene.streams.get("d1").unwrap(), "stream-d1");
    let status = h.manager.get_stream_status("stream-d1").unwrap();
    assert_ne!(status.state, StreamState::Stopped);
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stream_limit_is_per_device_failure() {
    let mut config = Config::default();
    config.stream.max_streams = 1;
    let h = harness_with(&config);

    let report = h
        .manager
        .deploy(request("s1", "fire", &[("d1", ""), ("d2", "")]))
        .await
        .unwrap();
    assert_eq!(report.deployed_count, 1);
    assert_eq!(report.failed_count, 1);
    assert!(report.failures[0].reason.contains("limit"));
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_remove_last_stream_drops_scene() {
    let h = harness();
    h.manager
        .deploy(request("s1", "fire", &[("d1", ""), ("d2", "")]))
        .await
        .unwrap();

    assert!(h.manager.remove_stream("stream-d1").await);
    assert!(h.manager.get_scene("s1").is_some());
    assert!(!h.manager.remove_stream("stream-d1").await);

    assert!(h.manager.remove_stream("stream-d2").await);
    assert!(h.manager.get_scene("s1").is_none());
    assert!(h.manager.list_streams().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fire_inside_region_alarms_once_within_cooldown() {
    let h = harness();
    *h.detector.detections.lock().unwrap() = vec![fire_at(5.0, 5.0, 0.9)];

    let report = h
        .manager
        .deploy(request("s1", "fire", &[("d1", SQUARE)]))
        .await
        .unwrap();
    assert_eq!(report.deployed_count, 1);

    let alarms = h.alarms.clone();
    wait_until(|| !alarms.is_empty()).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.alarms.len(), 1);

    let notice = h.alarms.pop().await;
    assert_eq!(notice.scene_id, "s1");
    assert_eq!(notice.device_id, "d1");
    assert_eq!(notice.event.stream_id, "stream-d1");
    assert_eq!(notice.event.class_name, "fire");
    assert_eq!(notice.event.severity.to_string(), "high");

    let status = h.manager.get_stream_status("stream-d1").unwrap();
    assert_eq!(status.stats.alarms, 1);
    assert!(status.stats.frames_skipped > 0);
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_fire_outside_region_never_alarms() {
    let h = harness();
    *h.detector.detections.lock().unwrap() = vec![fire_at(50.0, 50.0, 0.99)];

    h.manager
        .deploy(request("s1", "fire", &[("d1", SQUARE)]))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(h.alarms.is_empty());
    let status = h.manager.get_stream_status("stream-d1").unwrap();
    assert!(status.stats.frames_inferred >= 10);
    assert_eq!(status.stats.detections, 0);
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_scene_min_confidence_overrides_default() {
    let h = harness();
    *h.detector.detections.lock().unwrap() = vec![fire_at(5.0, 5.0, 0.9)];

    let mut strict = request("s1", "fire", &[("d1", "")]);
    strict.min_confidence = Some(0.95);
    h.manager.deploy(strict).await.unwrap();

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(h.alarms.is_empty());
    let status = h.manager.get_stream_status("stream-d1").unwrap();
    assert!(status.stats.detections >= 10);
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_classes_outside_allow_list_are_ignored() {
    let h = harness();
    let mut smoke = fire_at(5.0, 5.0, 0.95);
    smoke.class_name = "smoke".to_string();
    *h.detector.detections.lock().unwrap() = vec![smoke];

    h.manager
        .deploy(request("s1", "fire", &[("d1", "")]))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.alarms.is_empty());
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_failure_puts_stream_in_error() {
    let h = harness();
    h.manager
        .deploy(request("s1", "fire", &[("d1", "")]))
        .await
        .unwrap();

    let manager = h.manager.clone();
    wait_until(|| {
        manager
            .get_stream_status("stream-d1")
            .is_some_and(|s| s.state == StreamState::Active)
    })
    .await;

    h.platform
        .heartbeat_down
        .lock()
        .unwrap()
        .insert("d1".to_string());

    let manager = h.manager.clone();
    wait_until(|| {
        manager
            .get_stream_status("stream-d1")
            .is_some_and(|s| s.state == StreamState::Error)
    })
    .await;

    let status = h.manager.get_stream_status("stream-d1").unwrap();
    assert!(status.stats.heartbeat_failures >= 3);
    assert_eq!(h.manager.registry_stats().error, 1);

    h.platform.heartbeat_down.lock().unwrap().clear();
    let manager = h.manager.clone();
    wait_until(|| {
        manager
            .get_stream_status("stream-d1")
            .is_some_and(|s| s.state == StreamState::Active)
    })
    .await;

    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_stop_and_sweep_stop_once() {
    let h = harness();
    h.manager
        .deploy(request("s1", "fire", &[("d1", ""), ("d2", "")]))
        .await
        .unwrap();

    let later = Utc::now() + TimeDelta::hours(2);
    let (stop, swept) = tokio::join!(h.manager.stop("s1"), h.manager.sweep_expired_at(later));
    let swept = swept.unwrap();

    let by_stop = usize::from(stop.stopped);
    let by_sweep = swept.iter().filter(|id| *id == "s1").count();
    assert_eq!(by_stop + by_sweep, 1);
    assert!(h.manager.list_streams().is_empty());
    assert!(h.manager.list_scenes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_deploy_and_sweep_keep_tables_consistent() {
    let h = harness();
    let deploy = {
        let manager = h.manager.clone();
        tokio::spawn(async move {
            manager
                .deploy(request("s1", "fire", &[("d1", ""), ("d2", "")]))
                .await
        })
    };
    let sweep = {
        let manager = h.manager.clone();
        tokio::spawn(async move {
            manager
                .sweep_expired_at(Utc::now() + TimeDelta::hours(2))
                .await
        })
    };
    deploy.await.unwrap().unwrap();
    sweep.await.unwrap();

    let scenes = h.manager.list_scenes();
    for stream in h.manager.list_streams() {
        assert!(scenes.iter().any(|s| s.scene_id == stream.scene_id));
    }
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_sweep_spares_scene_redeployed_mid_sweep() {
    let h = harness();
    h.manager
        .deploy(request("a", "fire", &[("d1", "")]))
        .await
        .unwrap();
    h.manager
        .deploy(request("b", "fire", &[("d2", "")]))
        .await
        .unwrap();

    let sweep_time = Utc::now() + TimeDelta::hours(2);
    let mut renewed = request("b", "fire", &[("d2", "")]);
    renewed.end_time = (Utc::now() + TimeDelta::hours(3)).to_rfc3339();

    let (swept, redeploy) = tokio::join!(h.manager.sweep_expired_at(sweep_time), async {
        tokio::task::yield_now().await;
        h.manager.deploy(renewed).await
    });
    let swept = swept.unwrap();
    assert_eq!(redeploy.unwrap().deployed_count, 1);

    assert!(swept.contains(&"a".to_string()));
    assert!(h.manager.get_scene("a").is_none());
    let scene = h.manager.get_scene("b").unwrap();
    assert!(scene.end > sweep_time);
    assert!(h.manager.get_stream_status("stream-d2").is_some());
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_sweep_only_removes_expired() {
    let h = harness();
    h.manager
        .deploy(request("short", "fire", &[("d1", "")]))
        .await
        .unwrap();
    let mut long = request("long", "fire", &[("d2", "")]);
    long.end_time = (Utc::now() + TimeDelta::days(1)).to_rfc3339();
    h.manager.deploy(long).await.unwrap();

    let swept = h
        .manager
        .sweep_expired_at(Utc::now() + TimeDelta::hours(2))
        .await
        .unwrap();
    assert_eq!(swept, vec!["short".to_string()]);
    assert!(h.manager.get_scene("long").is_some());
    assert!(h.manager.get_stream_status("stream-d1").is_none());
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_alarms_reach_publisher() {
    let h = harness();
    let publisher = Arc::new(RecordingPublisher::default());
    let cancel = CancellationToken::new();
    let dispatcher = spawn_dispatcher(
        h.alarms.clone(),
        publisher.clone(),
        Duration::from_secs(5),
        cancel.clone(),
    );
    *h.detector.detections.lock().unwrap() = vec![fire_at(5.0, 5.0, 0.6)];

    h.manager
        .deploy(request("s1", "fire", &[("d1", SQUARE)]))
        .await
        .unwrap();

    let seen = publisher.clone();
    wait_until(|| !seen.published.lock().unwrap().is_empty()).await;
    h.manager.shutdown().await;
    cancel.cancel();
    dispatcher.await.unwrap();

    let published = publisher.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    let notice = &published[0];
    assert_eq!(notice.algorithm, "fire");
    assert_eq!(notice.event.severity.to_string(), "medium");
    let path = notice.snapshot_path.to_string_lossy().to_string();
    assert!(path.contains("s1"));
    assert!(path.ends_with("_fire.jpg"));
    assert_eq!(h.alarms.stats().published, 1);
}
