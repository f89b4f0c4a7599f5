//! Snapnote pipeline crate - capture -> extraction -> generation -> save.
//!
//! [`PipelineState`] and [`PipelineEvent`] define the state machine as pure
//! data; [`PipelineController`] drives it against the OCR client, the
//! generation service and the note store.

pub mod controller;
pub mod error;
pub mod state;

pub use controller::{CapturedImage, PipelineController, CANCELLED_MESSAGE};
pub use error::PipelineError;
pub use state::{PipelineEvent, PipelineState, DEFAULT_ERROR_MESSAGE};
