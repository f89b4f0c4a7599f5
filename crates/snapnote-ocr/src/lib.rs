//! Snapnote OCR crate - text-extraction provider trait and implementations.
//!
//! Provides the OcrService trait for turning an image payload into an
//! [`ExtractionResult`], the [`ExtractionClient`] that validates provider
//! output, a built-in demo provider, an HTTP provider, and a
//! MockOcrService for testing.

pub mod any;
pub mod client;
pub mod demo;
pub mod http;

use snapnote_core::error::SnapnoteError;
use snapnote_core::types::ExtractionResult;

pub use any::AnyOcrService;
pub use client::ExtractionClient;
pub use demo::{DemoOcrService, DEMO_CONFIDENCE, DEMO_TEXT};
pub use http::HttpOcrService;

/// Provider that extracts text from a captured image.
///
/// Implementations wrap an OCR engine or remote API behind a uniform async
/// interface. Output is untrusted until it passes through [`ExtractionClient`].
pub trait OcrService: Send + Sync {
    /// Extract text from raw image bytes.
    ///
    /// The returned text may be empty if no text is detected.
    fn extract_text(
        &self,
        image_data: &[u8],
    ) -> impl std::future::Future<Output = Result<ExtractionResult, SnapnoteError>> + Send;
}

/// Mock OCR service for testing.
///
/// Returns a fixed result for any non-empty input.
#[derive(Debug, Clone)]
pub struct MockOcrService {
    response: ExtractionResult,
}

impl MockOcrService {
    pub fn new() -> Self {
        Self::with_text("Mock OCR extracted text")
    }

    /// Create a mock that returns `text` with no confidence score.
    pub fn with_text(text: &str) -> Self {
        Self {
            response: ExtractionResult {
                text: text.to_string(),
                confidence: None,
            },
        }
    }

    /// Create a mock that returns `text` with the given confidence, which is
    /// passed through unchecked so validation can be tested.
    pub fn with_confidence(text: &str, confidence: f32) -> Self {
        Self {
            response: ExtractionResult {
                text: text.to_string(),
                confidence: Some(confidence),
            },
        }
    }
}

impl Default for MockOcrService {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrService for MockOcrService {
    async fn extract_text(&self, image_data: &[u8]) -> Result<ExtractionResult, SnapnoteError> {
        if image_data.is_empty() {
            return Err(SnapnoteError::Extraction("Empty image data".to_string()));
        }
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_ocr_default() {
        let service = MockOcrService::new();
        let result = service.extract_text(&[1, 2, 3]).await.unwrap();
        assert!(result.text.contains("Mock OCR"));
        assert!(result.confidence.is_none());
    }

    #[tokio::test]
    async fn test_mock_ocr_with_confidence() {
        let service = MockOcrService::with_confidence("Custom", 0.5);
        let result = service.extract_text(&[1]).await.unwrap();
        assert_eq!(result.text, "Custom");
        assert_eq!(result.confidence, Some(0.5));
    }

    #[tokio::test]
    async fn test_mock_ocr_empty_input() {
        let service = MockOcrService::new();
        let result = service.extract_text(&[]).await;
        assert!(matches!(result, Err(SnapnoteError::Extraction(_))));
    }
}
