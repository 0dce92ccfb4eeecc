//! Small helpers shared across modules.

pub mod time;

pub use time::{format_platform_time, parse_timestamp};
