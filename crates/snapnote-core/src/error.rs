use thiserror::Error;

/// Top-level error type for the Snapnote system.
///
/// Subsystem crates that need extra properties on their errors (for example
/// a `Clone` error shared between concurrent waiters) define their own enum
/// and implement `From<SubsystemError> for SnapnoteError` so that `?` works
/// across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SnapnoteError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Generation backend error: {0}")]
    GenerationBackend(String),

    #[error("Note not found: {id}")]
    NotFound { id: String },

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl From<toml::de::Error> for SnapnoteError {
    fn from(err: toml::de::Error) -> Self {
        SnapnoteError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SnapnoteError {
    fn from(err: toml::ser::Error) -> Self {
        SnapnoteError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SnapnoteError {
    fn from(err: serde_json::Error) -> Self {
        SnapnoteError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Snapnote operations.
pub type Result<T> = std::result::Result<T, SnapnoteError>;
