//! Configuration type definitions.

use crate::constants::{alarm, heartbeat, inference, platform, publisher, reconnect, scene, stream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device platform connection.
    pub platform: PlatformConfig,

    /// Heartbeat worker settings.
    pub heartbeat: HeartbeatConfig,

    /// Stream worker settings.
    pub stream: StreamConfig,

    /// Alarm debounce settings.
    pub alarm: AlarmConfig,

    /// Scene lifecycle settings.
    pub scene: SceneConfig,

    /// Alarm publisher settings.
    pub publisher: PublisherConfig,

    /// Remote detector settings.
    pub inference: InferenceConfig,

    /// Frame source settings.
    pub source: SourceConfig,

    /// Algorithm name to model binding.
    pub algorithms: BTreeMap<String, AlgorithmConfig>,
}

/// Device platform connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Base URL of the device platform API.
    pub base_url: String,

    /// Timeout for one platform request in seconds.
    pub request_timeout_secs: u64,

    /// Attempts made when resolving a play URL.
    pub resolve_retries: u32,

    /// Delay between resolution attempts in milliseconds.
    pub resolve_retry_delay_ms: u64,

    /// Protocol tried first when picking a play URL.
    pub preferred_protocol: StreamProtocol,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: platform::DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: platform::DEFAULT_REQUEST_TIMEOUT_SECS,
            resolve_retries: platform::DEFAULT_RESOLVE_RETRIES,
            resolve_retry_delay_ms: platform::DEFAULT_RESOLVE_RETRY_DELAY_MS,
            preferred_protocol: StreamProtocol::default(),
        }
    }
}

impl PlatformConfig {
    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Play URL protocols offered by the device platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamProtocol {
    /// RTMP play URL.
    #[default]
    Rtmp,
    /// RTSP play URL.
    Rtsp,
    /// HTTP-FLV play URL.
    Flv,
    /// HLS play URL.
    Hls,
}

impl StreamProtocol {
    /// Fallback order used when the preferred protocol is missing.
    pub const FALLBACK_ORDER: [Self; 4] = [Self::Rtmp, Self::Rtsp, Self::Flv, Self::Hls];
}

impl std::fmt::Display for StreamProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rtmp => write!(f, "rtmp"),
            Self::Rtsp => write!(f, "rtsp"),
            Self::Flv => write!(f, "flv"),
            Self::Hls => write!(f, "hls"),
        }
    }
}

/// Heartbeat worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Seconds between ticks.
    pub interval_secs: u64,

    /// Timeout for one heartbeat call in seconds.
    pub timeout_secs: u64,

    /// Attempts inside one tick.
    pub retries_per_tick: u32,

    /// Delay between attempts inside one tick in milliseconds.
    pub retry_delay_ms: u64,

    /// Failed ticks in a row before the stream is put into `Error`.
    pub max_failed_ticks: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: heartbeat::DEFAULT_INTERVAL_SECS,
            timeout_secs: heartbeat::DEFAULT_TIMEOUT_SECS,
            retries_per_tick: heartbeat::DEFAULT_RETRIES_PER_TICK,
            retry_delay_ms: heartbeat::DEFAULT_RETRY_DELAY_MS,
            max_failed_ticks: heartbeat::DEFAULT_MAX_FAILED_TICKS,
        }
    }
}

/// Stream worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Detections below this confidence are discarded.
    pub confidence_threshold: f32,

    /// Maximum frames per second sent to inference. `<= 0` disables limiting.
    pub fps_limit: f64,

    /// Largest frame dimension sent to inference. `0` disables downscaling.
    pub max_resolution: u32,

    /// Consecutive read failures before the stream enters `Error`.
    pub max_read_failures: u32,

    /// Pause between local read retries in milliseconds.
    pub read_retry_delay_ms: u64,

    /// Maximum number of registered streams.
    pub max_streams: usize,

    /// Timeout for one frame read in seconds.
    pub read_timeout_secs: u64,

    /// Reconnect policy after an error.
    pub reconnect: ReconnectConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: stream::DEFAULT_CONFIDENCE_THRESHOLD,
            fps_limit: stream::DEFAULT_FPS_LIMIT,
            max_resolution: stream::DEFAULT_MAX_RESOLUTION,
            max_read_failures: stream::DEFAULT_MAX_READ_FAILURES,
            read_retry_delay_ms: stream::DEFAULT_READ_RETRY_DELAY_MS,
            max_streams: stream::DEFAULT_MAX_STREAMS,
            read_timeout_secs: stream::DEFAULT_READ_TIMEOUT_SECS,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Backoff strategy between reconnect attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectStrategy {
    /// Same delay before every attempt.
    #[default]
    Fixed,
    /// Delay grows by `multiplier` up to `max_delay_secs`.
    Exponential,
}

/// Reconnect policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Backoff strategy.
    pub strategy: ReconnectStrategy,

    /// Delay before an attempt (fixed) or the first attempt (exponential).
    pub delay_secs: u64,

    /// Upper bound for exponential delays.
    pub max_delay_secs: u64,

    /// Exponential growth factor.
    pub multiplier: f64,

    /// Attempts before the stream is stopped.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            strategy: ReconnectStrategy::default(),
            delay_secs: reconnect::DEFAULT_DELAY_SECS,
            max_delay_secs: reconnect::DEFAULT_MAX_DELAY_SECS,
            multiplier: reconnect::DEFAULT_MULTIPLIER,
            max_attempts: reconnect::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Alarm debounce settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Minimum confidence that counts as a hit.
    pub min_confidence: f32,

    /// Consecutive hits required before an alarm fires.
    pub consecutive_frames: u32,

    /// Seconds between two alarms for the same stream and class.
    pub cooldown_secs: u64,

    /// Severity banding thresholds.
    pub levels: SeverityLevels,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            min_confidence: alarm::DEFAULT_MIN_CONFIDENCE,
            consecutive_frames: alarm::DEFAULT_CONSECUTIVE_FRAMES,
            cooldown_secs: alarm::DEFAULT_COOLDOWN_SECS,
            levels: SeverityLevels::default(),
        }
    }
}

/// Lower bounds of the medium and high severity bands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityLevels {
    /// Confidence at which an alarm becomes medium.
    pub medium: f32,

    /// Confidence at which an alarm becomes high.
    pub high: f32,
}

impl Default for SeverityLevels {
    fn default() -> Self {
        Self {
            medium: alarm::DEFAULT_MEDIUM_LEVEL,
            high: alarm::DEFAULT_HIGH_LEVEL,
        }
    }
}

/// Scene lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Seconds between expiry sweeps.
    pub sweep_interval_secs: u64,

    /// Seconds to wait for workers after cancellation.
    pub shutdown_grace_secs: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: scene::DEFAULT_SWEEP_INTERVAL_SECS,
            shutdown_grace_secs: scene::DEFAULT_SHUTDOWN_GRACE_SECS,
        }
    }
}

/// Publisher backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherKind {
    /// Write alarms to the log only.
    #[default]
    Log,
    /// POST alarms as JSON to `endpoint`.
    Http,
}

/// Alarm publisher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Backend used to deliver alarms.
    pub kind: PublisherKind,

    /// Endpoint for the HTTP publisher.
    pub endpoint: Option<String>,

    /// Alarm queue capacity.
    pub queue_capacity: usize,

    /// Timeout for one publish call in seconds.
    pub timeout_secs: u64,

    /// Root directory for alarm snapshot paths.
    pub artifact_dir: PathBuf,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            kind: PublisherKind::default(),
            endpoint: None,
            queue_capacity: publisher::DEFAULT_QUEUE_CAPACITY,
            timeout_secs: publisher::DEFAULT_TIMEOUT_SECS,
            artifact_dir: PathBuf::from(publisher::DEFAULT_ARTIFACT_DIR),
        }
    }
}

impl PublisherConfig {
    /// Publish timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Remote detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of the detection service.
    pub endpoint: Option<String>,

    /// Timeout for one inference request in seconds.
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: inference::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl InferenceConfig {
    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Frame source settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Snapshot gateway that turns a stream URL into a JPEG frame endpoint.
    pub snapshot_gateway: Option<String>,
}

/// Model binding for one algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    /// Model identifier passed to the detector.
    pub model: String,

    /// Classes that may raise alarms. Empty means all classes.
    #[serde(default)]
    pub target_classes: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.heartbeat.interval_secs, 10);
        assert_eq!(config.heartbeat.max_failed_ticks, 3);
        assert_eq!(config.stream.max_read_failures, 5);
        assert_eq!(config.stream.reconnect.strategy, ReconnectStrategy::Fixed);
        assert_eq!(config.stream.reconnect.delay_secs, 5);
        assert_eq!(config.stream.reconnect.max_attempts, 3);
        assert_eq!(config.alarm.consecutive_frames, 3);
        assert_eq!(config.alarm.cooldown_secs, 30);
        assert_eq!(config.alarm.levels.medium, 0.5);
        assert_eq!(config.alarm.levels.high, 0.7);
        assert_eq!(config.scene.sweep_interval_secs, 30);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[stream]
fps_limit = 0.5

[stream.reconnect]
strategy = "exponential"

[algorithms.fire]
model = "yolo-fire"
target_classes = ["fire", "smoke"]
"#,
        )
        .unwrap();

        assert_eq!(config.stream.fps_limit, 0.5);
        assert_eq!(config.stream.max_read_failures, 5);
        assert_eq!(
            config.stream.reconnect.strategy,
            ReconnectStrategy::Exponential
        );
        assert_eq!(config.stream.reconnect.max_attempts, 3);
        assert_eq!(config.algorithms["fire"].model, "yolo-fire");
        assert_eq!(config.algorithms["fire"].target_classes.len(), 2);
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(StreamProtocol::Rtsp.to_string(), "rtsp");
        assert_eq!(StreamProtocol::FALLBACK_ORDER[0], StreamProtocol::Rtmp);
    }
}
