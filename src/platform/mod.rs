//! Device platform and scene mapper seams.

mod http;
mod mapper;

pub use http::{HttpDevicePlatform, PlayUrls};
pub use mapper::{ConfigSceneMapper, ModelBinding, SceneMapper};

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// The external platform that owns the cameras.
#[async_trait]
pub trait DevicePlatform: Send + Sync {
    /// Resolve a playable stream URL for `device_id`.
    async fn resolve_stream_url(&self, device_id: &str, timeout: Duration) -> Result<String>;

    /// Send one keep-alive for `device_id`.
    async fn heartbeat(&self, device_id: &str, timeout: Duration) -> Result<()>;
}
