//! Post-inference filtering: confidence, class allow-list, region.

use super::Detection;
use crate::region::Region;
use std::collections::HashSet;

/// Filters applied to raw detections before debouncing.
#[derive(Debug, Clone)]
pub struct DetectionFilter {
    confidence_threshold: f32,
    target_classes: Option<HashSet<String>>,
    region: Region,
}

impl DetectionFilter {
    /// Build a filter. An empty `target_classes` admits every class.
    pub fn new(confidence_threshold: f32, target_classes: &[String], region: Region) -> Self {
        let target_classes =
            (!target_classes.is_empty()).then(|| target_classes.iter().cloned().collect());
        Self {
            confidence_threshold,
            target_classes,
            region,
        }
    }

    /// Confidence threshold passed to the detector.
    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// The region detections must fall into.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Whether a single detection survives.
    pub fn accepts(&self, detection: &Detection) -> bool {
        detection.confidence >= self.confidence_threshold
            && self
                .target_classes
                .as_ref()
                .is_none_or(|classes| classes.contains(&detection.class_name))
            && self.region.contains(detection.center())
    }

    /// Keep only surviving detections, preserving order.
    pub fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections.into_iter().filter(|d| self.accepts(d)).collect()
    }
}
