use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snapnote_core::config::GenerationConfig;

use crate::error::GenerationError;

/// Bounded generation parameters passed on every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub max_length: u32,
    pub min_length: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_beams: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_stopping: Option<bool>,
}

impl GenerationOptions {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_length: config.max_length,
            min_length: config.min_length,
            temperature: config.temperature,
            num_beams: config.num_beams,
            early_stopping: config.early_stopping,
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

/// One candidate returned by a model. Only the first is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedText {
    pub generated_text: String,
}

impl GeneratedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            generated_text: text.into(),
        }
    }
}

/// A loaded, ready-to-use model.
#[async_trait]
pub trait GenerationModel: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Vec<GeneratedText>, GenerationError>;
}

/// Factory for a heavyweight model. `load` may be slow and may fail.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    async fn load(&self) -> Result<Arc<dyn GenerationModel>, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_default_config() {
        let options = GenerationOptions::default();
        assert_eq!(options.max_length, 1024);
        assert_eq!(options.min_length, 50);
        assert_eq!(options.num_beams, Some(4));
        assert_eq!(options.early_stopping, Some(true));
    }

    #[test]
    fn test_options_serialization_skips_unset() {
        let options = GenerationOptions {
            num_beams: None,
            early_stopping: None,
            ..GenerationOptions::default()
        };
        let value = serde_json::to_value(&options).unwrap();
        assert!(value.get("num_beams").is_none());
        assert!(value.get("early_stopping").is_none());
        assert_eq!(value["max_length"], 1024);
    }
}
