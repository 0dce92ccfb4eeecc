//! Detector backed by a remote HTTP detection service.

use super::{Detection, Detector, DetectorFactory};
use crate::constants::inference::{DETECT_PATH, JPEG_QUALITY};
use crate::error::{Error, Result};
use crate::source::Frame;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Posts JPEG frames to `<endpoint>/v1/detect` for one model.
#[derive(Debug, Clone)]
pub struct RemoteDetector {
    client: Client,
    url: String,
    model: String,
}

impl RemoteDetector {
    fn encode(frame: &Frame) -> Result<Vec<u8>> {
        let rgb = frame.image.to_rgb8();
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
            .encode_image(&rgb)
            .map_err(|e| Error::Inference {
                reason: format!("failed to encode frame: {e}"),
            })?;
        Ok(buf)
    }
}

#[async_trait]
impl Detector for RemoteDetector {
    async fn detect(&self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>> {
        let jpeg = Self::encode(frame)?;

        let form = Form::new()
            .part(
                "image",
                Part::bytes(jpeg)
                    .file_name("frame.jpg")
                    .mime_str("image/jpeg")?,
            )
            .text("model", self.model.clone())
            .text("conf", confidence_threshold.to_string());

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Inference {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference {
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: DetectResponse = response.json().await.map_err(|e| Error::Inference {
            reason: format!("invalid response: {e}"),
        })?;

        trace!(model = %self.model, count = parsed.detections.len(), "Remote detections");

        Ok(parsed
            .detections
            .into_iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .collect())
    }
}

/// Hands out [`RemoteDetector`]s sharing one HTTP client.
#[derive(Debug, Clone)]
pub struct RemoteDetectorFactory {
    client: Client,
    endpoint: Option<String>,
}

impl RemoteDetectorFactory {
    /// Build a factory. Without an endpoint every model fails to load.
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

impl DetectorFactory for RemoteDetectorFactory {
    fn detector_for(&self, model_id: &str) -> Result<Arc<dyn Detector>> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| Error::ModelLoad {
            model: model_id.to_string(),
            reason: "inference.endpoint is not configured".to_string(),
        })?;

        Ok(Arc::new(RemoteDetector {
            client: self.client.clone(),
            url: format!("{}{DETECT_PATH}", endpoint.trim_end_matches('/')),
            model: model_id.to_string(),
        }))
    }
}
