//! Snapnote generation crate - turns extracted text into structured notes.
//!
//! [`GenerationService`] owns the lazily loaded model, the result cache and
//! the single-flight bookkeeping. Backends implement [`GenerationBackend`]
//! (load) and [`GenerationModel`] (generate); the service is the only caller.

pub mod any;
pub mod backend;
pub mod demo;
pub mod error;
pub mod http;
pub mod mock;
pub mod parse;
pub mod prompt;
pub mod service;

pub use any::AnyGenerationBackend;
pub use backend::{GeneratedText, GenerationBackend, GenerationModel, GenerationOptions};
pub use demo::DemoGenerationBackend;
pub use error::GenerationError;
pub use http::HttpGenerationBackend;
pub use mock::MockGenerationBackend;
pub use parse::GenerationOutcome;
pub use service::{GenerationService, ModelStatus};
