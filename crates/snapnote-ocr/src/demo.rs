//! Offline OCR stand-in used when extraction runs in demo mode.

use std::time::Duration;

use snapnote_core::error::SnapnoteError;
use snapnote_core::types::ExtractionResult;

use crate::OcrService;

/// Text returned for every capture in demo mode.
pub const DEMO_TEXT: &str = "Meeting Notes - Q3 Planning\n\n\
1. Revenue targets: $2.5M for Q3\n\
2. New product launch in August\n\
3. Hiring plan: 5 engineers, 2 designers\n\
4. Marketing budget increased by 15%\n\
5. Customer retention focus areas:\n   \
- Improve onboarding experience\n   \
- Enhance support response times\n   \
- Launch loyalty program\n\
6. Key metrics to track:\n   \
- Conversion rate (target: 3.5%)\n   \
- Churn rate (target: < 2%)\n   \
- NPS (target: > 45)\n\
7. Next meeting: July 15th, 10am";

pub const DEMO_CONFIDENCE: f32 = 0.94;

/// Returns [`DEMO_TEXT`] for any non-empty image after an optional delay.
#[derive(Debug, Clone, Default)]
pub struct DemoOcrService {
    latency: Duration,
}

impl DemoOcrService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

impl OcrService for DemoOcrService {
    async fn extract_text(&self, image_data: &[u8]) -> Result<ExtractionResult, SnapnoteError> {
        if image_data.is_empty() {
            return Err(SnapnoteError::Extraction("Empty image data".to_string()));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(ExtractionResult {
            text: DEMO_TEXT.to_string(),
            confidence: Some(DEMO_CONFIDENCE),
        })
    }
}
