//! Detection types and the detector seam.

mod filter;
mod remote;

pub use filter::DetectionFilter;
pub use remote::{RemoteDetector, RemoteDetectorFactory};

use crate::error::Result;
use crate::region::Point;
use crate::source::Frame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Axis-aligned box in pixel coordinates, `(x1, y1)` top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    /// Left edge.
    pub x1: f64,
    /// Top edge.
    pub y1: f64,
    /// Right edge.
    pub x2: f64,
    /// Bottom edge.
    pub y2: f64,
}

impl BoundingBox {
    /// Create a box from its corners.
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Center point.
    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Box with every coordinate multiplied by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.x1 * factor,
            self.y1 * factor,
            self.x2 * factor,
            self.y2 * factor,
        )
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One object found in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label.
    pub class_name: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Bounding box.
    pub bbox: BoundingBox,
}

impl Detection {
    /// Center of the bounding box, used by the region filter.
    pub fn center(&self) -> Point {
        self.bbox.center()
    }
}

/// Runs a model over a frame.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Detect objects with confidence at or above `confidence_threshold`.
    async fn detect(&self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>>;
}

/// Creates detectors for model identifiers.
pub trait DetectorFactory: Send + Sync {
    /// Detector for `model_id`. Fails with a configuration error if the
    /// model cannot be served.
    fn detector_for(&self, model_id: &str) -> Result<Arc<dyn Detector>>;
}
