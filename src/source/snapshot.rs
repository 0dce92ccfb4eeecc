//! HTTP snapshot source.
//!
//! Each read fetches one still image. HTTP(S) URLs are fetched directly;
//! anything else (RTSP, RTMP, ...) goes through a snapshot gateway that
//! serves `<gateway>?src=<stream url>` as JPEG.

use super::{Frame, FrameReader, FrameSource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

/// Opens [`SnapshotReader`]s.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    client: Client,
    gateway: Option<String>,
}

impl SnapshotSource {
    /// Build a source with a per-request timeout.
    pub fn new(gateway: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, gateway })
    }

    /// URL a frame for `stream_url` is fetched from.
    pub fn frame_url(&self, stream_url: &str) -> Result<Url> {
        let open_err = |reason: String| Error::StreamOpen {
            url: stream_url.to_string(),
            reason,
        };

        if let Some(gateway) = &self.gateway {
            return Url::parse_with_params(gateway, &[("src", stream_url)])
                .map_err(|e| open_err(format!("invalid snapshot gateway '{gateway}': {e}")));
        }

        let url = Url::parse(stream_url).map_err(|e| open_err(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(open_err(format!(
                "'{scheme}' streams need source.snapshot_gateway"
            ))),
        }
    }
}

#[async_trait]
impl FrameSource for SnapshotSource {
    async fn open(&self, url: &str) -> Result<Box<dyn FrameReader>> {
        let frame_url = self.frame_url(url)?;
        debug!(stream_url = url, frame_url = %frame_url, "Opened snapshot source");
        Ok(Box::new(SnapshotReader {
            client: self.client.clone(),
            frame_url,
        }))
    }
}

/// Reads frames by polling a snapshot URL.
#[derive(Debug)]
pub struct SnapshotReader {
    client: Client,
    frame_url: Url,
}

#[async_trait]
impl FrameReader for SnapshotReader {
    async fn read_frame(&mut self) -> Result<Frame> {
        let response = self
            .client
            .get(self.frame_url.clone())
            .send()
            .await
            .map_err(|e| Error::FrameRead {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::FrameRead {
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| Error::FrameRead {
            reason: e.to_string(),
        })?;

        let image =
            image::load_from_memory(&bytes).map_err(|e| Error::FrameDecode { source: e })?;
        Ok(Frame::new(image))
    }

    fn pull_based(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_http_url_used_directly() {
        let source = SnapshotSource::new(None, Duration::from_secs(1)).unwrap();
        let url = source.frame_url("http://cam.local/snap.jpg").unwrap();
        assert_eq!(url.as_str(), "http://cam.local/snap.jpg");
    }

    #[test]
    fn test_rtsp_without_gateway_rejected() {
        let source = SnapshotSource::new(None, Duration::from_secs(1)).unwrap();
        let err = source.frame_url("rtsp://cam.local/live").unwrap_err();
        assert!(matches!(err, Error::StreamOpen { .. }));
    }

    #[tokio::test]
    async fn test_reader_is_paced() {
        let source = SnapshotSource::new(None, Duration::from_secs(1)).unwrap();
        let reader = source.open("http://cam.local/snap.jpg").await.unwrap();
        assert!(reader.pull_based());
    }

    #[test]
    fn test_gateway_wraps_stream_url() {
        let source = SnapshotSource::new(
            Some("http://gw.local:1984/api/frame.jpeg".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        let url = source.frame_url("rtmp://media.local/live/d1").unwrap();
        assert_eq!(url.path(), "/api/frame.jpeg");
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "src");
        assert_eq!(value, "rtmp://media.local/live/d1");
    }
}
