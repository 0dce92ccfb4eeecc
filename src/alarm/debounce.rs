//! Consecutive-frame debounce with a per-(stream, class) cooldown.

use super::{AlarmEvent, Severity};
use crate::config::{AlarmConfig, SeverityLevels};
use crate::inference::{BoundingBox, Detection};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeMap, HashMap};

/// Debounce parameters.
#[derive(Debug, Clone, Copy)]
pub struct DebounceSettings {
    /// Minimum confidence that counts as a hit.
    pub min_confidence: f32,
    /// Hits in a row required to alarm.
    pub consecutive_frames: u32,
    /// Minimum time between alarms for one (stream, class).
    pub cooldown: TimeDelta,
    /// Severity bands.
    pub levels: SeverityLevels,
}

impl From<&AlarmConfig> for DebounceSettings {
    fn from(config: &AlarmConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            consecutive_frames: config.consecutive_frames,
            cooldown: i64::try_from(config.cooldown_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            levels: config.levels,
        }
    }
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self::from(&AlarmConfig::default())
    }
}

/// Streak and cooldown anchor for one (stream, class).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmCounter {
    /// Hits in a row.
    pub consecutive: u32,
    /// When the last alarm fired.
    pub last_alarm: Option<DateTime<Utc>>,
}

/// Outcome of one [`DebounceEngine::observe`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Streak too short or confidence too low.
    NoAlarm,
    /// Streak long enough but still cooling down.
    Suppressed,
    /// Alarm accepted.
    Alarm(AlarmEvent),
}

/// Alarm state machine for the streams a worker owns.
#[derive(Debug, Default)]
pub struct DebounceEngine {
    settings: DebounceSettings,
    counters: HashMap<(String, String), AlarmCounter>,
}

impl DebounceEngine {
    /// Create an engine.
    pub fn new(settings: DebounceSettings) -> Self {
        Self {
            settings,
            counters: HashMap::new(),
        }
    }

    /// Feed one observation of `class_name` on `stream_id`.
    pub fn observe(
        &mut self,
        stream_id: &str,
        class_name: &str,
        confidence: f32,
        bbox: Option<BoundingBox>,
        timestamp: DateTime<Utc>,
    ) -> Observation {
        let counter = self
            .counters
            .entry((stream_id.to_string(), class_name.to_string()))
            .or_default();

        if confidence < self.settings.min_confidence {
            counter.consecutive = 0;
            return Observation::NoAlarm;
        }

        counter.consecutive = counter.consecutive.saturating_add(1);
        if counter.consecutive < self.settings.consecutive_frames {
            return Observation::NoAlarm;
        }

        if let Some(last) = counter.last_alarm
            && timestamp - last < self.settings.cooldown
        {
            return Observation::Suppressed;
        }

        counter.last_alarm = Some(timestamp);
        Observation::Alarm(AlarmEvent {
            stream_id: stream_id.to_string(),
            class_name: class_name.to_string(),
            confidence,
            severity: Severity::classify(confidence, &self.settings.levels),
            timestamp,
            bbox,
        })
    }

    /// Feed one frame's filtered detections.
    ///
    /// Each class present is observed once with its most confident
    /// detection. Every class tracked on this stream but absent from the
    /// frame is observed with confidence 0 so its streak resets.
    pub fn observe_frame(
        &mut self,
        stream_id: &str,
        detections: &[Detection],
        timestamp: DateTime<Utc>,
    ) -> Vec<AlarmEvent> {
        let mut best: BTreeMap<&str, &Detection> = BTreeMap::new();
        for det in detections {
            best.entry(det.class_name.as_str())
                .and_modify(|cur| {
                    if det.confidence > cur.confidence {
                        *cur = det;
                    }
                })
                .or_insert(det);
        }

        let absent: Vec<String> = self
            .counters
            .keys()
            .filter(|(sid, class)| sid == stream_id && !best.contains_key(class.as_str()))
            .map(|(_, class)| class.clone())
            .collect();

        let mut events = Vec::new();
        for (class, det) in best {
            if let Observation::Alarm(event) =
                self.observe(stream_id, class, det.confidence, Some(det.bbox), timestamp)
            {
                events.push(event);
            }
        }
        for class in absent {
            self.observe(stream_id, &class, 0.0, None, timestamp);
        }
        events
    }

    /// Counter for a (stream, class), if one exists.
    pub fn counter(&self, stream_id: &str, class_name: &str) -> Option<&AlarmCounter> {
        self.counters
            .get(&(stream_id.to_string(), class_name.to_string()))
    }

    /// Drop every counter of `stream_id`.
    pub fn forget_stream(&mut self, stream_id: &str) {
        self.counters.retain(|(sid, _), _| sid != stream_id);
    }
}
