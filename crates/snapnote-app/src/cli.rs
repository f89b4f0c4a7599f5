//! CLI argument definitions for the Snapnote application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Snapnote: turn photos of text into structured notes.
#[derive(Parser, Debug)]
#[command(name = "snapnote", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the notes file.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Extract text from an image and preview the generated note.
    Capture {
        /// Image file to process.
        image: PathBuf,
        /// Keep the generated note instead of discarding the preview.
        #[arg(short = 's', long = "save")]
        save: bool,
    },
    /// List notes, newest first.
    List,
    /// Print a note.
    Show { id: String },
    /// Change a note's title.
    Rename { id: String, title: String },
    /// Delete a note permanently.
    Delete { id: String },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SNAPNOTE_CONFIG env var > ~/.snapnote/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SNAPNOTE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// `--data-dir` override, if given.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".snapnote").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".snapnote").join("config.toml");
    }
    PathBuf::from("config.toml")
}
