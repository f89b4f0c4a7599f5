use snapnote_core::error::SnapnoteError;
use thiserror::Error;

/// Hard failures of a generation call.
///
/// `Clone` because a single model-load outcome is handed to every caller
/// waiting on it. A malformed model response is not an error; see
/// [`crate::GenerationOutcome::Degraded`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The backend could not be made ready.
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    /// The backend was invoked but failed or timed out.
    #[error("Generation backend error: {0}")]
    Backend(String),
}

impl From<GenerationError> for SnapnoteError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::ModelLoad(msg) => SnapnoteError::ModelLoad(msg),
            GenerationError::Backend(msg) => SnapnoteError::GenerationBackend(msg),
        }
    }
}
