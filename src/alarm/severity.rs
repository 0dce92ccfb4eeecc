//! Severity banding.

use crate::config::SeverityLevels;
use serde::{Deserialize, Serialize};

/// Alarm severity derived from confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Below the medium band.
    Low,
    /// Between the medium and high bands.
    Medium,
    /// At or above the high band.
    High,
}

impl Severity {
    /// Classify `confidence` against `levels`.
    pub fn classify(confidence: f32, levels: &SeverityLevels) -> Self {
        if confidence >= levels.high {
            Self::High
        } else if confidence >= levels.medium {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}
