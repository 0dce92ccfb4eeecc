//! Deployment requests, reports and scene snapshots.

use crate::config::check_unit_range;
use crate::error::{Error, Result};
use crate::utils::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A request binding one algorithm to a set of devices for a time window.
///
/// Field aliases accept the platform's camelCase names as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployRequest {
    /// Scene identifier.
    #[serde(alias = "sceneId", alias = "scene")]
    pub scene_id: String,
    /// Algorithm name, resolved through the scene mapper.
    pub algorithm: String,
    /// Devices to stream from.
    #[serde(default)]
    pub devices: Vec<DeviceRequest>,
    /// Informational start of the window.
    #[serde(default, alias = "startTime")]
    pub start_time: Option<String>,
    /// End of the window; the scene is torn down once it passes.
    #[serde(alias = "endTime")]
    pub end_time: String,
    /// Per-scene override of `stream.confidence_threshold`.
    #[serde(default, alias = "confidenceThreshold")]
    pub confidence_threshold: Option<f32>,
    /// Per-scene override of `stream.fps_limit`.
    #[serde(default, alias = "fpsLimit")]
    pub fps_limit: Option<f64>,
    /// Per-scene override of `alarm.min_confidence`.
    #[serde(default, alias = "minConfidence")]
    pub min_confidence: Option<f32>,
}

/// One device of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRequest {
    /// Device identifier on the platform.
    #[serde(alias = "deviceGbCode", alias = "deviceId")]
    pub device_id: String,
    /// Region string; empty means unrestricted.
    #[serde(default)]
    pub area: String,
}

/// Parsed validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Informational start.
    pub start: Option<DateTime<Utc>>,
    /// Expiry.
    pub end: DateTime<Utc>,
}

impl DeployRequest {
    /// Parse and check the window against `now`: `end > now`, `end > start`.
    pub fn window(&self, now: DateTime<Utc>) -> Result<TimeWindow> {
        let end = parse_timestamp(&self.end_time)?;
        let start = self
            .start_time
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_timestamp)
            .transpose()?;

        if end <= now {
            return Err(Error::InvalidTimeWindow {
                reason: format!("end time {end} is not in the future"),
            });
        }
        if let Some(start) = start
            && end <= start
        {
            return Err(Error::InvalidTimeWindow {
                reason: format!("end time {end} is not after start time {start}"),
            });
        }
        Ok(TimeWindow { start, end })
    }

    /// Check the per-scene tuning overrides that are present.
    pub fn validate_overrides(&self) -> Result<()> {
        if let Some(threshold) = self.confidence_threshold {
            check_unit_range("confidence_threshold", threshold)?;
        }
        if let Some(min_confidence) = self.min_confidence {
            check_unit_range("min_confidence", min_confidence)?;
        }
        if let Some(fps) = self.fps_limit
            && !(fps.is_finite() && fps >= 0.0)
        {
            return Err(Error::ConfigValidation {
                message: format!("fps_limit must be a finite, non-negative number, got {fps}"),
            });
        }
        Ok(())
    }
}

/// A device that could not be deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFailure {
    /// Device identifier.
    pub device_id: String,
    /// Why it failed.
    pub reason: String,
}

/// Outcome of a deployment. Partial success is reported, never hidden.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    /// Scene identifier.
    pub scene_id: String,
    /// Devices now streaming.
    pub deployed_count: usize,
    /// Devices that failed.
    pub failed_count: usize,
    /// One entry per failed device.
    pub failures: Vec<DeviceFailure>,
    /// Whether an earlier deployment of the same scene was replaced.
    pub replaced: bool,
}

/// Outcome of stopping a scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StopReport {
    /// `false` when the scene was unknown or already stopped.
    pub stopped: bool,
    /// Streams torn down.
    pub stream_count: usize,
}

/// Read-only view of a live scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneSnapshot {
    /// Scene identifier.
    pub scene_id: String,
    /// Algorithm name.
    pub algorithm: String,
    /// Model the algorithm maps to.
    pub model_id: String,
    /// Informational start.
    pub start: Option<DateTime<Utc>>,
    /// Expiry.
    pub end: DateTime<Utc>,
    /// Acceptance time.
    pub created_at: DateTime<Utc>,
    /// Device id to stream id.
    pub streams: BTreeMap<String, String>,
}

/// Scenes deployed at startup, read from a TOML file of `[[scenes]]`.
#[derive(Debug, Clone, Default, Deserialize)]
struct ScenesFile {
    #[serde(default)]
    scenes: Vec<DeployRequest>,
}

/// Load startup scenes from `path`.
pub fn load_scenes_file(path: &Path) -> Result<Vec<DeployRequest>> {
    let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file: ScenesFile = toml::from_str(&contents).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(file.scenes)
}
