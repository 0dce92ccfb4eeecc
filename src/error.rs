//! Error types for scenewatch.

/// Result type alias for scenewatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
///
/// Callers use this to decide whether a failure is reported to the
/// requester, retried locally, or only counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request or configuration. Never retried.
    Configuration,
    /// Network, frame or heartbeat failure. Retried under a bounded policy.
    TransientIo,
    /// One device of a multi-device deployment failed.
    PartialFailure,
    /// The alarm queue was full and an alarm was dropped.
    PublisherBackpressure,
    /// Anything else.
    Internal,
}

/// Top-level error type for scenewatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize configuration")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// Region string could not be parsed into polygons.
    #[error("invalid region '{input}': {reason}")]
    InvalidRegion {
        /// The offending region string.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Algorithm name does not map to a model.
    #[error("unknown algorithm '{name}'")]
    UnknownAlgorithm {
        /// Requested algorithm name.
        name: String,
    },

    /// Deployment time window is not usable.
    #[error("invalid time window: {reason}")]
    InvalidTimeWindow {
        /// Why the window was rejected.
        reason: String,
    },

    /// Timestamp string could not be parsed.
    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp {
        /// The offending timestamp.
        value: String,
    },

    /// Detector for a model could not be created.
    #[error("failed to load model '{model}': {reason}")]
    ModelLoad {
        /// Model identifier.
        model: String,
        /// Failure reason.
        reason: String,
    },

    /// Stream source could not be opened.
    #[error("failed to open stream '{url}': {reason}")]
    StreamOpen {
        /// Source URL.
        url: String,
        /// Failure reason.
        reason: String,
    },

    /// Frame could not be read from the source.
    #[error("failed to read frame: {reason}")]
    FrameRead {
        /// Failure reason.
        reason: String,
    },

    /// Frame bytes could not be decoded.
    #[error("failed to decode frame")]
    FrameDecode {
        /// Underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// Heartbeat call failed.
    #[error("heartbeat for device '{device_id}' failed: {reason}")]
    Heartbeat {
        /// Device identifier.
        device_id: String,
        /// Failure reason.
        reason: String,
    },

    /// Device stream URL could not be resolved.
    #[error("failed to resolve stream for device '{device_id}': {reason}")]
    ResolveStream {
        /// Device identifier.
        device_id: String,
        /// Failure reason.
        reason: String,
    },

    /// Inference call failed.
    #[error("inference failed: {reason}")]
    Inference {
        /// Failure reason.
        reason: String,
    },

    /// Alarm publish failed.
    #[error("failed to publish alarm: {reason}")]
    Publish {
        /// Failure reason.
        reason: String,
    },

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {seconds:.1}s")]
    Timeout {
        /// What timed out.
        operation: String,
        /// Deadline in seconds.
        seconds: f64,
    },

    /// HTTP client error.
    #[error("HTTP request failed")]
    Http {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// One device of a deployment failed.
    #[error("device '{device_id}' not deployed: {reason}")]
    DeviceDeploy {
        /// Device identifier.
        device_id: String,
        /// Failure reason.
        reason: String,
    },

    /// Alarm queue overflowed and an alarm was dropped.
    #[error("alarm queue full, {dropped} alarm(s) dropped so far")]
    QueueOverflow {
        /// Total alarms dropped since start.
        dropped: u64,
    },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigDirNotFound
            | Self::ConfigRead { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigValidation { .. }
            | Self::ConfigWrite { .. }
            | Self::ConfigSerialize { .. }
            | Self::InvalidRegion { .. }
            | Self::UnknownAlgorithm { .. }
            | Self::InvalidTimeWindow { .. }
            | Self::InvalidTimestamp { .. }
            | Self::ModelLoad { .. } => ErrorKind::Configuration,
            Self::StreamOpen { .. }
            | Self::FrameRead { .. }
            | Self::FrameDecode { .. }
            | Self::Heartbeat { .. }
            | Self::ResolveStream { .. }
            | Self::Inference { .. }
            | Self::Publish { .. }
            | Self::Timeout { .. }
            | Self::Http { .. } => ErrorKind::TransientIo,
            Self::DeviceDeploy { .. } => ErrorKind::PartialFailure,
            Self::QueueOverflow { .. } => ErrorKind::PublisherBackpressure,
            Self::Io(_) | Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Whether this error belongs to the configuration class.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

impl From<reqwest::Error> for Error {
    fn from(source: reqwest::Error) -> Self {
        Self::Http { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_error_is_configuration() {
        let err = Error::InvalidRegion {
            input: "(a,b)".to_string(),
            reason: "non-numeric coordinate".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.is_configuration());
        assert!(err.to_string().contains("(a,b)"));
    }

    #[test]
    fn test_io_classes() {
        let err = Error::Heartbeat {
            device_id: "d1".to_string(),
            reason: "status 1".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::TransientIo);

        let err = Error::Timeout {
            operation: "heartbeat".to_string(),
            seconds: 5.0,
        };
        assert_eq!(err.kind(), ErrorKind::TransientIo);
        assert_eq!(err.to_string(), "heartbeat timed out after 5.0s");
    }

    #[test]
    fn test_partial_and_backpressure_classes() {
        let err = Error::DeviceDeploy {
            device_id: "d2".to_string(),
            reason: "offline".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::PartialFailure);

        let err = Error::QueueOverflow { dropped: 4 };
        assert_eq!(err.kind(), ErrorKind::PublisherBackpressure);
    }
}
