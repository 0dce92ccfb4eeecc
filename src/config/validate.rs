//! Configuration validation.

use crate::config::{Config, PublisherKind};
use crate::constants::confidence;
use crate::error::{Error, Result};

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_thresholds(config)?;
    validate_timing(config)?;
    validate_publisher(config)?;
    validate_algorithms(config)?;
    Ok(())
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

pub(crate) fn check_unit_range(name: &str, value: f32) -> Result<()> {
    if !(confidence::MIN..=confidence::MAX).contains(&value) {
        return Err(invalid(format!(
            "{name} must be between {} and {}, got {value}",
            confidence::MIN,
            confidence::MAX
        )));
    }
    Ok(())
}

/// Validate confidence thresholds and severity bands.
fn validate_thresholds(config: &Config) -> Result<()> {
    check_unit_range("stream.confidence_threshold", config.stream.confidence_threshold)?;
    check_unit_range("alarm.min_confidence", config.alarm.min_confidence)?;
    check_unit_range("alarm.levels.medium", config.alarm.levels.medium)?;
    check_unit_range("alarm.levels.high", config.alarm.levels.high)?;

    if config.alarm.levels.medium > config.alarm.levels.high {
        return Err(invalid(format!(
            "alarm.levels.medium ({}) must not exceed alarm.levels.high ({})",
            config.alarm.levels.medium, config.alarm.levels.high
        )));
    }

    if config.alarm.consecutive_frames == 0 {
        return Err(invalid("alarm.consecutive_frames must be at least 1"));
    }

    Ok(())
}

/// Validate intervals, retry bounds and capacities.
fn validate_timing(config: &Config) -> Result<()> {
    if config.heartbeat.interval_secs == 0 {
        return Err(invalid("heartbeat.interval_secs must be at least 1"));
    }

    if config.heartbeat.retries_per_tick == 0 {
        return Err(invalid("heartbeat.retries_per_tick must be at least 1"));
    }

    if config.heartbeat.max_failed_ticks == 0 {
        return Err(invalid("heartbeat.max_failed_ticks must be at least 1"));
    }

    if config.scene.sweep_interval_secs == 0 {
        return Err(invalid("scene.sweep_interval_secs must be at least 1"));
    }

    if config.stream.max_read_failures == 0 {
        return Err(invalid("stream.max_read_failures must be at least 1"));
    }

    if config.stream.reconnect.max_attempts == 0 {
        return Err(invalid("stream.reconnect.max_attempts must be at least 1"));
    }

    if config.stream.reconnect.multiplier < 1.0 {
        return Err(invalid(format!(
            "stream.reconnect.multiplier must be at least 1.0, got {}",
            config.stream.reconnect.multiplier
        )));
    }

    if config.stream.max_streams == 0 {
        return Err(invalid("stream.max_streams must be at least 1"));
    }

    if !config.stream.fps_limit.is_finite() {
        return Err(invalid("stream.fps_limit must be a finite number"));
    }

    if config.platform.resolve_retries == 0 {
        return Err(invalid("platform.resolve_retries must be at least 1"));
    }

    Ok(())
}

/// Validate publisher backend settings.
fn validate_publisher(config: &Config) -> Result<()> {
    if config.publisher.queue_capacity == 0 {
        return Err(invalid("publisher.queue_capacity must be at least 1"));
    }

    if config.publisher.kind == PublisherKind::Http && config.publisher.endpoint.is_none() {
        return Err(invalid("publisher.endpoint is required when kind = \"http\""));
    }

    Ok(())
}

/// Validate algorithm bindings.
fn validate_algorithms(config: &Config) -> Result<()> {
    for (name, binding) in &config.algorithms {
        if binding.model.trim().is_empty() {
            return Err(invalid(format!("algorithms.{name}.model must not be empty")));
        }
    }
    Ok(())
}
