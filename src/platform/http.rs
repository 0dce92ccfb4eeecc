//! HTTP client for the device platform.

use super::DevicePlatform;
use crate::config::{PlatformConfig, StreamProtocol};
use crate::constants::platform::{HEARTBEAT_PATH, PLAY_URL_PATH, STATUS_OK};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceRequest<'a> {
    device_gb_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct PlatformResponse<T> {
    status: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

impl<T> PlatformResponse<T> {
    fn failure_reason(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("status {}", self.status))
    }
}

/// Play URLs the platform returns for a device.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PlayUrls {
    /// RTMP URL.
    #[serde(default)]
    pub rtmp: Option<String>,
    /// RTSP URL.
    #[serde(default)]
    pub rtsp: Option<String>,
    /// HLS URL.
    #[serde(default)]
    pub hls: Option<String>,
    /// HTTP-FLV URL.
    #[serde(default)]
    pub flv: Option<String>,
    /// WebRTC URL.
    #[serde(default)]
    pub webrtc: Option<String>,
}

impl PlayUrls {
    fn get(&self, protocol: StreamProtocol) -> Option<&str> {
        let url = match protocol {
            StreamProtocol::Rtmp => self.rtmp.as_deref(),
            StreamProtocol::Rtsp => self.rtsp.as_deref(),
            StreamProtocol::Flv => self.flv.as_deref(),
            StreamProtocol::Hls => self.hls.as_deref(),
        };
        url.filter(|u| !u.trim().is_empty())
    }

    /// The preferred URL, falling back through the remaining protocols.
    pub fn pick(&self, preferred: StreamProtocol) -> Option<&str> {
        self.get(preferred).or_else(|| {
            StreamProtocol::FALLBACK_ORDER
                .iter()
                .find_map(|p| self.get(*p))
        })
    }
}

/// Device platform reached over its JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpDevicePlatform {
    client: Client,
    base_url: String,
    retries: u32,
    retry_delay: Duration,
    preferred: StreamProtocol,
}

impl HttpDevicePlatform {
    /// Build a client from config.
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retries: config.resolve_retries.max(1),
            retry_delay: Duration::from_millis(config.resolve_retry_delay_ms),
            preferred: config.preferred_protocol,
        })
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        device_id: &str,
        timeout: Duration,
    ) -> std::result::Result<PlatformResponse<T>, String> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .timeout(timeout)
            .json(&DeviceRequest {
                device_gb_code: device_id,
            })
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        response.json().await.map_err(|e| e.to_string())
    }

    async fn resolve_once(
        &self,
        device_id: &str,
        timeout: Duration,
    ) -> std::result::Result<String, String> {
        let body: PlatformResponse<PlayUrls> =
            self.post(PLAY_URL_PATH, device_id, timeout).await?;
        if body.status != STATUS_OK {
            return Err(body.failure_reason());
        }
        let urls = body.data.unwrap_or_default();
        urls.pick(self.preferred)
            .map(str::to_string)
            .ok_or_else(|| "platform returned no play URL".to_string())
    }
}

#[async_trait]
impl DevicePlatform for HttpDevicePlatform {
    async fn resolve_stream_url(&self, device_id: &str, timeout: Duration) -> Result<String> {
        let mut last_error = String::new();

        for attempt in 1..=self.retries {
            debug!(device_id, attempt, retries = self.retries, "Resolving play URL");
            match self.resolve_once(device_id, timeout).await {
                Ok(url) => {
                    info!(device_id, url = %url, "Resolved play URL");
                    return Ok(url);
                }
                Err(reason) => {
                    warn!(device_id, attempt, error = %reason, "Play URL resolution failed");
                    last_error = reason;
                }
            }
            if attempt < self.retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(Error::ResolveStream {
            device_id: device_id.to_string(),
            reason: format!("{last_error} (after {} attempts)", self.retries),
        })
    }

    async fn heartbeat(&self, device_id: &str, timeout: Duration) -> Result<()> {
        let body: PlatformResponse<serde_json::Value> = self
            .post(HEARTBEAT_PATH, device_id, timeout)
            .await
            .map_err(|reason| Error::Heartbeat {
                device_id: device_id.to_string(),
                reason,
            })?;

        if body.status != STATUS_OK {
            return Err(Error::Heartbeat {
                device_id: device_id.to_string(),
                reason: body.failure_reason(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(DeviceRequest {
            device_gb_code: "34020000001320000001",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"deviceGbCode": "34020000001320000001"}));
    }

    #[test]
    fn test_parse_play_url_response() {
        let body: PlatformResponse<PlayUrls> = serde_json::from_str(
            r#"{"status":0,"message":"ok","data":{"rtmp":"rtmp://m/live/1","rtsp":"rtsp://m/1","hls":null}}"#,
        )
        .unwrap();
        assert_eq!(body.status, 0);
        let urls = body.data.unwrap();
        assert_eq!(urls.pick(StreamProtocol::Rtsp), Some("rtsp://m/1"));
        assert_eq!(urls.pick(StreamProtocol::Hls), Some("rtmp://m/live/1"));
    }

    #[test]
    fn test_failure_reason_prefers_message() {
        let body: PlatformResponse<PlayUrls> =
            serde_json::from_str(r#"{"status":1,"message":"device offline"}"#).unwrap();
        assert_eq!(body.failure_reason(), "device offline");

        let body: PlatformResponse<PlayUrls> = serde_json::from_str(r#"{"status":7}"#).unwrap();
        assert_eq!(body.failure_reason(), "status 7");
    }

    #[test]
    fn test_empty_urls_are_skipped() {
        let urls = PlayUrls {
            rtmp: Some(String::new()),
            flv: Some("http://m/1.flv".to_string()),
            ..PlayUrls::default()
        };
        assert_eq!(urls.pick(StreamProtocol::Rtmp), Some("http://m/1.flv"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = PlatformConfig {
            base_url: "http://platform.local/".to_string(),
            ..PlatformConfig::default()
        };
        let client = HttpDevicePlatform::new(&config).unwrap();
        assert_eq!(client.base_url, "http://platform.local");
    }
}
