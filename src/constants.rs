//! Application-wide constants.
//!
//! All defaults for timing, thresholds and queue sizes live here so the
//! configuration types and the workers agree on them.

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "scenewatch";

/// Config file name inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Device platform defaults.
pub mod platform {
    /// Default device platform base URL.
    pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
    /// Default per-request timeout in seconds.
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
    /// Attempts made when resolving a play URL.
    pub const DEFAULT_RESOLVE_RETRIES: u32 = 3;
    /// Delay between play URL resolution attempts in milliseconds.
    pub const DEFAULT_RESOLVE_RETRY_DELAY_MS: u64 = 1000;
    /// Play URL endpoint, relative to the base URL.
    pub const PLAY_URL_PATH: &str = "/api/channel/getPlayUrlByGbCode";
    /// Heartbeat endpoint, relative to the base URL.
    pub const HEARTBEAT_PATH: &str = "/api/channel/heartbeatByGbCode";
    /// Status code the platform uses for success.
    pub const STATUS_OK: i64 = 0;
}

/// Heartbeat worker defaults.
pub mod heartbeat {
    /// Seconds between heartbeat ticks.
    pub const DEFAULT_INTERVAL_SECS: u64 = 10;
    /// Timeout for a single heartbeat call in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
    /// Immediate retries inside one tick before the tick counts as failed.
    pub const DEFAULT_RETRIES_PER_TICK: u32 = 3;
    /// Delay between retries inside one tick in milliseconds.
    pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
    /// Consecutive failed ticks that put the owning stream into `Error`.
    pub const DEFAULT_MAX_FAILED_TICKS: u32 = 3;
}

/// Stream worker defaults.
pub mod stream {
    /// Detections below this confidence are discarded before filtering.
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
    /// Frames per second forwarded to inference.
    pub const DEFAULT_FPS_LIMIT: f64 = 1.0;
    /// Largest frame dimension sent to inference (0 disables downscaling).
    pub const DEFAULT_MAX_RESOLUTION: u32 = 1920;
    /// Consecutive read failures before a stream enters `Error`.
    pub const DEFAULT_MAX_READ_FAILURES: u32 = 5;
    /// Pause between local read retries in milliseconds.
    pub const DEFAULT_READ_RETRY_DELAY_MS: u64 = 200;
    /// Maximum number of concurrently registered streams.
    pub const DEFAULT_MAX_STREAMS: usize = 64;
    /// Timeout for a single frame read in seconds.
    pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 10;
    /// Prefix of generated stream ids.
    pub const STREAM_ID_PREFIX: &str = "stream-";
}

/// Reconnect policy defaults.
pub mod reconnect {
    /// Delay before each reconnect attempt (fixed) or the first (exponential).
    pub const DEFAULT_DELAY_SECS: u64 = 5;
    /// Upper bound for exponential backoff.
    pub const DEFAULT_MAX_DELAY_SECS: u64 = 60;
    /// Exponential backoff growth factor.
    pub const DEFAULT_MULTIPLIER: f64 = 2.0;
    /// Reconnect attempts before the stream is stopped.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
}

/// Alarm debounce defaults.
pub mod alarm {
    /// Minimum confidence that counts as a hit.
    pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
    /// Consecutive hits required before an alarm fires.
    pub const DEFAULT_CONSECUTIVE_FRAMES: u32 = 3;
    /// Minimum seconds between two alarms for the same (stream, class).
    pub const DEFAULT_COOLDOWN_SECS: u64 = 30;
    /// Lower bound of the medium severity band.
    pub const DEFAULT_MEDIUM_LEVEL: f32 = 0.5;
    /// Lower bound of the high severity band.
    pub const DEFAULT_HIGH_LEVEL: f32 = 0.7;
}

/// Scene lifecycle defaults.
pub mod scene {
    /// Seconds between expiry sweeps.
    pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;
    /// Seconds to wait for workers to exit after cancellation.
    pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;
    /// Platform timestamp format.
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
}

/// Alarm publisher defaults.
pub mod publisher {
    /// Capacity of the alarm queue before the oldest alarm is dropped.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
    /// Timeout for a single publish call in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
    /// Directory alarm snapshot paths are rooted at.
    pub const DEFAULT_ARTIFACT_DIR: &str = "alarms";
    /// Snapshot file extension.
    pub const SNAPSHOT_EXTENSION: &str = "jpg";
}

/// Remote inference defaults.
pub mod inference {
    /// Timeout for a single inference request in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
    /// Detection endpoint, relative to the inference base URL.
    pub const DETECT_PATH: &str = "/v1/detect";
    /// JPEG quality for frames posted to the detector.
    pub const JPEG_QUALITY: u8 = 85;
}

/// Confidence value bounds.
pub mod confidence {
    /// Minimum valid confidence value.
    pub const MIN: f32 = 0.0;
    /// Maximum valid confidence value.
    pub const MAX: f32 = 1.0;
}
