//! Pipeline controller driving capture -> extraction -> generation -> save.
//!
//! The current state lives in a `watch` channel: every accepted transition
//! is published to subscribers, and a rejected event leaves the state
//! untouched. Extraction and generation failures are not returned as
//! errors; they move the pipeline to [`PipelineState::Error`]. So does a run
//! whose future is dropped before it finishes.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use snapnote_core::types::{Note, NoteDraft};
use snapnote_generation::GenerationService;
use snapnote_ocr::{ExtractionClient, OcrService};
use snapnote_storage::NoteStore;

use crate::error::PipelineError;
use crate::state::{PipelineEvent, PipelineState};

/// Error shown when a run is dropped while extraction or generation is
/// outstanding.
pub const CANCELLED_MESSAGE: &str = "Processing was cancelled before the note was ready.";

/// Raw payload handed over by the capture surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub data: Vec<u8>,
    /// Where the capture came from, kept on the note for traceability.
    pub source_url: Option<String>,
}

impl CapturedImage {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            source_url: None,
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}

pub struct PipelineController<O> {
    extraction: ExtractionClient<O>,
    generation: GenerationService,
    store: Arc<NoteStore>,
    state: watch::Sender<PipelineState>,
    /// Serializes `save` so one draft is persisted once.
    saving: Mutex<()>,
}

impl<O: OcrService> PipelineController<O> {
    pub fn new(
        extraction: ExtractionClient<O>,
        generation: GenerationService,
        store: Arc<NoteStore>,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            extraction,
            generation,
            store,
            state,
            saving: Mutex::new(()),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PipelineState {
        self.state.borrow().clone()
    }

    /// Receive every state the controller publishes from now on.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn generation(&self) -> &GenerationService {
        &self.generation
    }

    pub fn store(&self) -> &Arc<NoteStore> {
        &self.store
    }

    pub fn start_capture(&self) -> Result<(), PipelineError> {
        self.apply(PipelineEvent::StartCapture)
    }

    pub fn cancel(&self) -> Result<(), PipelineError> {
        self.apply(PipelineEvent::Cancel)
    }

    /// Run extraction then generation for `image`.
    ///
    /// Returns the state the run settled in: `Previewing` on success or
    /// `Error` on a provider failure. `Err` only for an invalid transition.
    /// Dropping the returned future mid-run settles the pipeline in `Error`
    /// with [`CANCELLED_MESSAGE`].
    pub async fn image_captured(&self, image: CapturedImage) -> Result<PipelineState, PipelineError> {
        self.apply(PipelineEvent::ImageCaptured)?;
        let _settle = SettleOnDrop { state: &self.state };
        info!(bytes = image.data.len(), "Image captured, extracting text");

        let extracted = match self.extraction.extract(&image.data).await {
            Ok(extracted) => extracted,
            Err(e) => {
                error!(error = %e, "Text extraction failed");
                self.apply(PipelineEvent::ExtractionFailed(e.to_string()))?;
                return Ok(self.state());
            }
        };
        self.apply(PipelineEvent::TextExtracted)?;

        match self.generation.generate(&extracted.text).await {
            Ok(outcome) => {
                if outcome.is_degraded() {
                    warn!("Previewing a degraded note");
                }
                let draft = NoteDraft::from_generation(
                    outcome.into_result(),
                    extracted.text,
                    image.source_url,
                );
                info!(title = %draft.title, "Draft ready for preview");
                self.apply(PipelineEvent::NoteGenerated(draft))?;
            }
            Err(e) => {
                error!(error = %e, "Note generation failed");
                self.apply(PipelineEvent::GenerationFailed(e.to_string()))?;
            }
        }
        Ok(self.state())
    }

    /// Persist the previewed draft with a fresh timestamp and return to Idle.
    ///
    /// The note is written before the state changes, outside the channel's
    /// lock. If the write fails the pipeline stays in `Previewing` so the
    /// user can try again or discard.
    pub fn save(&self) -> Result<Note, PipelineError> {
        let _saving = self.saving.lock().unwrap_or_else(|e| e.into_inner());

        let draft = match &*self.state.borrow() {
            PipelineState::Previewing(draft) => draft.clone(),
            other => return Err(invalid(other, &PipelineEvent::Save)),
        };

        let note = self
            .store
            .add(draft.clone().into_new_note(Utc::now()))
            .map_err(|e| {
                error!(error = %e, "Failed to save note, keeping draft");
                PipelineError::Store(e)
            })?;

        let mut settled = false;
        self.state.send_if_modified(|state| {
            if state.draft() != Some(&draft) {
                return false;
            }
            match state.next(PipelineEvent::Save) {
                Ok(next) => {
                    debug!("Pipeline state: {} -> {}", state, next);
                    *state = next;
                    settled = true;
                    true
                }
                Err(_) => false,
            }
        });
        if !settled {
            warn!(note_id = %note.id, "Draft left preview while it was being saved");
        }
        Ok(note)
    }

    pub fn discard(&self) -> Result<(), PipelineError> {
        self.apply(PipelineEvent::Discard)
    }

    pub fn retry(&self) -> Result<(), PipelineError> {
        self.apply(PipelineEvent::Retry)
    }

    pub fn dismiss(&self) -> Result<(), PipelineError> {
        self.apply(PipelineEvent::Dismiss)
    }

    fn apply(&self, event: PipelineEvent) -> Result<(), PipelineError> {
        transition(&self.state, event)
    }
}

fn transition(state: &watch::Sender<PipelineState>, event: PipelineEvent) -> Result<(), PipelineError> {
    let mut result = Ok(());
    state.send_if_modified(|state| match state.next(event) {
        Ok(next) => {
            debug!("Pipeline state: {} -> {}", state, next);
            *state = next;
            true
        }
        Err(e) => {
            result = Err(e);
            false
        }
    });
    result
}

/// Moves a run that never finished from `ExtractingText`/`GeneratingNote`
/// to `Error`. A run that settled leaves nothing to do.
struct SettleOnDrop<'a> {
    state: &'a watch::Sender<PipelineState>,
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        let event = match *self.state.borrow() {
            PipelineState::ExtractingText => {
                PipelineEvent::ExtractionFailed(CANCELLED_MESSAGE.to_string())
            }
            PipelineState::GeneratingNote => {
                PipelineEvent::GenerationFailed(CANCELLED_MESSAGE.to_string())
            }
            _ => return,
        };
        warn!("Capture run dropped before it finished");
        let _ = transition(self.state, event);
    }
}

fn invalid(state: &PipelineState, event: &PipelineEvent) -> PipelineError {
    PipelineError::InvalidTransition {
        state: state.to_string(),
        event: event.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
