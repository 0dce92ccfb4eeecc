//! Alarm debounce engine and alarm event types.

mod debounce;
mod severity;

pub use debounce::{AlarmCounter, DebounceEngine, DebounceSettings, Observation};
pub use severity::Severity;

use crate::inference::BoundingBox;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An accepted alarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    /// Stream the alarm was raised on.
    pub stream_id: String,
    /// Detected class.
    pub class_name: String,
    /// Confidence of the triggering detection.
    pub confidence: f32,
    /// Severity band.
    pub severity: Severity,
    /// Observation time.
    pub timestamp: DateTime<Utc>,
    /// Box of the triggering detection.
    pub bbox: Option<BoundingBox>,
}
