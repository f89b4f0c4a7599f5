//! OCR provider reached over HTTP.
//!
//! The endpoint receives the raw image bytes as the request body and answers
//! with `{"text": "...", "confidence": 0.9}` (confidence optional).

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use snapnote_core::config::ExtractionConfig;
use snapnote_core::error::SnapnoteError;
use snapnote_core::types::ExtractionResult;
use tracing::debug;

use crate::OcrService;

#[derive(Deserialize)]
struct OcrResponse {
    text: String,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct HttpOcrService {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpOcrService {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

impl OcrService for HttpOcrService {
    async fn extract_text(&self, image_data: &[u8]) -> Result<ExtractionResult, SnapnoteError> {
        if image_data.is_empty() {
            return Err(SnapnoteError::Extraction("Empty image data".to_string()));
        }

        debug!(endpoint = %self.endpoint, bytes = image_data.len(), "Sending image to OCR provider");
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image_data.to_vec())
            .send()
            .await
            .map_err(|e| SnapnoteError::Extraction(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SnapnoteError::Extraction(format!(
                "OCR provider returned {}: {}",
                status, body
            )));
        }

        let parsed: OcrResponse = response
            .json()
            .await
            .map_err(|e| SnapnoteError::Extraction(format!("Failed to parse response: {}", e)))?;

        Ok(ExtractionResult {
            text: parsed.text,
            confidence: parsed.confidence,
        })
    }
}
