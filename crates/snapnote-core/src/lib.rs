//! Snapnote core crate - shared note types, errors, configuration and logging.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{BackendMode, SnapnoteConfig};
pub use error::{Result, SnapnoteError};
pub use types::*;
