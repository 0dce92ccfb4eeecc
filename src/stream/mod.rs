//! Streams: per-device frame pipelines and the registry that tracks them.

mod rate;
mod reconnect;
mod registry;
mod state;
mod worker;

pub use rate::RateLimiter;
pub use reconnect::ReconnectPolicy;
pub use registry::{Admission, RegisteredStream, RegistryStats, StreamRegistry, join_streams};
pub use state::{StreamSnapshot, StreamSpec, StreamState, StreamStats, StreamStatus};
pub use worker::{StreamWorker, WorkerSettings};

use crate::constants::stream::STREAM_ID_PREFIX;

/// Stream id for a device.
pub fn stream_id_for(device_id: &str) -> String {
    format!("{STREAM_ID_PREFIX}{device_id}")
}
