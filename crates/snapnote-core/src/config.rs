use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SnapnoteError};

/// Top-level configuration for Snapnote.
///
/// Loaded from `~/.snapnote/config.toml` by default. Each section maps to one
/// crate of the capture-to-note pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapnoteConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl SnapnoteConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SnapnoteConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SnapnoteError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Absolute path of the notes file (`data_dir` joined with `notes_file`).
    pub fn notes_path(&self) -> PathBuf {
        expand_home(&self.general.data_dir).join(&self.storage.notes_file)
    }
}

/// Expand a leading `~/` against `HOME` (or `USERPROFILE` on Windows).
pub fn expand_home(path: &str) -> PathBuf {
    let rest = path
        .strip_prefix("~/")
        .or_else(|| path.strip_prefix("~\\"));
    match rest {
        Some(rest) => {
            let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"));
            match home {
                Ok(home) => PathBuf::from(home).join(rest),
                Err(_) => PathBuf::from(rest),
            }
        }
        None => PathBuf::from(path),
    }
}

/// Which implementation backs a provider boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    /// Built-in offline stand-in.
    #[default]
    Demo,
    /// Real provider reached over HTTP.
    Live,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the notes file.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.snapnote/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Text-extraction (OCR) provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub mode: BackendMode,
    /// Endpoint receiving raw image bytes in live mode.
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Simulated provider latency in demo mode.
    pub demo_latency_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Demo,
            endpoint: "http://127.0.0.1:8866/ocr".to_string(),
            timeout_secs: 30,
            demo_latency_ms: 0,
        }
    }
}

/// Generation service and backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub mode: BackendMode,
    /// Base URL of a text-generation-inference compatible server.
    pub endpoint: String,
    /// Model the live backend expects the server to report.
    pub model_id: String,
    pub timeout_secs: u64,
    /// Maximum number of generated tokens.
    pub max_length: u32,
    /// Minimum number of generated tokens.
    pub min_length: u32,
    /// Sampling temperature. Kept low to favour fidelity.
    pub temperature: f32,
    pub num_beams: Option<u32>,
    pub early_stopping: Option<bool>,
    /// Result cache size. `0` keeps every result for the session.
    pub cache_capacity: usize,
    /// Characters of raw output kept in a degraded result.
    pub raw_excerpt_chars: usize,
    /// Simulated model latency in demo mode.
    pub demo_latency_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Demo,
            endpoint: "http://127.0.0.1:8080".to_string(),
            model_id: "google/flan-t5-base".to_string(),
            timeout_secs: 120,
            max_length: 1024,
            min_length: 50,
            temperature: 0.3,
            num_beams: Some(4),
            early_stopping: Some(true),
            cache_capacity: 256,
            raw_excerpt_chars: 500,
            demo_latency_ms: 0,
        }
    }
}

/// Note persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// File name of the note collection inside `data_dir`.
    pub notes_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            notes_file: "notes.json".to_string(),
        }
    }
}
