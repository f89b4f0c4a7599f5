use std::time::Duration;

use snapnote_core::config::{BackendMode, ExtractionConfig};
use snapnote_core::error::SnapnoteError;
use snapnote_core::types::ExtractionResult;

use crate::{DemoOcrService, HttpOcrService, MockOcrService, OcrService};

/// OCR provider chosen at start-up from configuration.
#[derive(Debug, Clone)]
pub enum AnyOcrService {
    Demo(DemoOcrService),
    Http(HttpOcrService),
    Mock(MockOcrService),
}

impl AnyOcrService {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        match config.mode {
            BackendMode::Demo => AnyOcrService::Demo(DemoOcrService::with_latency(
                Duration::from_millis(config.demo_latency_ms),
            )),
            BackendMode::Live => AnyOcrService::Http(HttpOcrService::from_config(config)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnyOcrService::Demo(_) => "demo",
            AnyOcrService::Http(_) => "http",
            AnyOcrService::Mock(_) => "mock",
        }
    }
}

impl OcrService for AnyOcrService {
    async fn extract_text(&self, image_data: &[u8]) -> Result<ExtractionResult, SnapnoteError> {
        match self {
            AnyOcrService::Demo(p) => p.extract_text(image_data).await,
            AnyOcrService::Http(p) => p.extract_text(image_data).await,
            AnyOcrService::Mock(p) => p.extract_text(image_data).await,
        }
    }
}
