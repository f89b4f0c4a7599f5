//! Validating adapter between the pipeline and an OCR provider.

use snapnote_core::error::{Result, SnapnoteError};
use snapnote_core::types::ExtractionResult;
use tracing::{debug, warn};

use crate::OcrService;

/// Thin pass-through to an [`OcrService`].
///
/// Checks that a reported confidence lies in `[0, 1]`. Provider failures
/// surface as [`SnapnoteError::Extraction`] and are never retried here.
#[derive(Debug, Clone)]
pub struct ExtractionClient<O> {
    provider: O,
}

impl<O: OcrService> ExtractionClient<O> {
    pub fn new(provider: O) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &O {
        &self.provider
    }

    /// Extract text from `image_data`.
    pub async fn extract(&self, image_data: &[u8]) -> Result<ExtractionResult> {
        let result = self
            .provider
            .extract_text(image_data)
            .await
            .map_err(|e| match e {
                SnapnoteError::Extraction(msg) => SnapnoteError::Extraction(msg),
                other => SnapnoteError::Extraction(other.to_string()),
            })?;

        if let Some(confidence) = result.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                warn!(confidence, "OCR provider returned out-of-range confidence");
                return Err(SnapnoteError::Extraction(format!(
                    "Confidence {} outside [0, 1]",
                    confidence
                )));
            }
        }

        debug!(
            chars = result.text.chars().count(),
            confidence = ?result.confidence,
            "Text extracted"
        );
        Ok(result)
    }
}
