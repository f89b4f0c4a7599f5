use snapnote_core::error::SnapnoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The event is not accepted in the current state. State is unchanged.
    #[error("Invalid pipeline transition: {event} while {state}")]
    InvalidTransition { state: String, event: String },

    /// Persisting the draft failed. The draft is kept for another attempt.
    #[error(transparent)]
    Store(#[from] SnapnoteError),
}

impl From<PipelineError> for SnapnoteError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Store(inner) => inner,
            other => SnapnoteError::Pipeline(other.to_string()),
        }
    }
}
