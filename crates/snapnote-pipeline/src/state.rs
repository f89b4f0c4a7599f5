//! Capture pipeline state machine.
//!
//! Valid transitions:
//! - Idle -> CameraActive (start capture)
//! - CameraActive -> Idle (cancel)
//! - CameraActive -> ExtractingText (image captured)
//! - ExtractingText -> GeneratingNote (text extracted)
//! - ExtractingText -> Error (extraction failed)
//! - GeneratingNote -> Previewing (note generated)
//! - GeneratingNote -> Error (generation failed)
//! - Previewing -> Idle (save or discard)
//! - Error -> CameraActive (retry)
//! - Error -> Idle (dismiss)

use std::fmt;

use snapnote_core::types::NoteDraft;

use crate::error::PipelineError;

/// Shown when a failure carries no message of its own.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred while processing your image.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Nothing in progress.
    #[default]
    Idle,
    /// Waiting for the user to take or pick a photo.
    CameraActive,
    ExtractingText,
    GeneratingNote,
    /// A draft is ready for the user to save or discard.
    Previewing(NoteDraft),
    /// A step failed; holds a user-facing message.
    Error(String),
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "Idle"),
            PipelineState::CameraActive => write!(f, "CameraActive"),
            PipelineState::ExtractingText => write!(f, "ExtractingText"),
            PipelineState::GeneratingNote => write!(f, "GeneratingNote"),
            PipelineState::Previewing(_) => write!(f, "Previewing"),
            PipelineState::Error(_) => write!(f, "Error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StartCapture,
    Cancel,
    ImageCaptured,
    TextExtracted,
    ExtractionFailed(String),
    NoteGenerated(NoteDraft),
    GenerationFailed(String),
    Save,
    Discard,
    Retry,
    Dismiss,
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::StartCapture => write!(f, "StartCapture"),
            PipelineEvent::Cancel => write!(f, "Cancel"),
            PipelineEvent::ImageCaptured => write!(f, "ImageCaptured"),
            PipelineEvent::TextExtracted => write!(f, "TextExtracted"),
            PipelineEvent::ExtractionFailed(_) => write!(f, "ExtractionFailed"),
            PipelineEvent::NoteGenerated(_) => write!(f, "NoteGenerated"),
            PipelineEvent::GenerationFailed(_) => write!(f, "GenerationFailed"),
            PipelineEvent::Save => write!(f, "Save"),
            PipelineEvent::Discard => write!(f, "Discard"),
            PipelineEvent::Retry => write!(f, "Retry"),
            PipelineEvent::Dismiss => write!(f, "Dismiss"),
        }
    }
}

impl PipelineState {
    /// The state reached by applying `event`, or an error if `event` is not
    /// accepted here.
    pub fn next(&self, event: PipelineEvent) -> Result<PipelineState, PipelineError> {
        use PipelineEvent as E;
        use PipelineState as S;

        let next = match (self, event) {
            (S::Idle, E::StartCapture) => S::CameraActive,
            (S::CameraActive, E::Cancel) => S::Idle,
            (S::CameraActive, E::ImageCaptured) => S::ExtractingText,
            (S::ExtractingText, E::TextExtracted) => S::GeneratingNote,
            (S::ExtractingText, E::ExtractionFailed(message))
            | (S::GeneratingNote, E::GenerationFailed(message)) => S::Error(user_message(message)),
            (S::GeneratingNote, E::NoteGenerated(draft)) => S::Previewing(draft),
            (S::Previewing(_), E::Save) | (S::Previewing(_), E::Discard) => S::Idle,
            (S::Error(_), E::Retry) => S::CameraActive,
            (S::Error(_), E::Dismiss) => S::Idle,
            (state, event) => {
                return Err(PipelineError::InvalidTransition {
                    state: state.to_string(),
                    event: event.to_string(),
                })
            }
        };
        Ok(next)
    }

    pub fn accepts(&self, event: &PipelineEvent) -> bool {
        self.next(event.clone()).is_ok()
    }

    /// Whether an extraction or generation call is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self, PipelineState::ExtractingText | PipelineState::GeneratingNote)
    }

    pub fn draft(&self) -> Option<&NoteDraft> {
        match self {
            PipelineState::Previewing(draft) => Some(draft),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            PipelineState::Error(message) => Some(message),
            _ => None,
        }
    }
}

fn user_message(message: String) -> String {
    if message.trim().is_empty() {
        DEFAULT_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

// =============================================================================
// Tests
// =============================================================================
