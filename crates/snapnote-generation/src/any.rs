use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use snapnote_core::config::{BackendMode, GenerationConfig};

use crate::backend::{GenerationBackend, GenerationModel};
use crate::demo::DemoGenerationBackend;
use crate::error::GenerationError;
use crate::http::HttpGenerationBackend;
use crate::mock::MockGenerationBackend;

/// Generation backend chosen at start-up from configuration.
#[derive(Debug, Clone)]
pub enum AnyGenerationBackend {
    Demo(DemoGenerationBackend),
    Http(HttpGenerationBackend),
    Mock(MockGenerationBackend),
}

impl AnyGenerationBackend {
    pub fn from_config(config: &GenerationConfig) -> Self {
        match config.mode {
            BackendMode::Demo => AnyGenerationBackend::Demo(DemoGenerationBackend::with_latency(
                Duration::from_millis(config.demo_latency_ms),
            )),
            BackendMode::Live => {
                AnyGenerationBackend::Http(HttpGenerationBackend::from_config(config))
            }
        }
    }
}

#[async_trait]
impl GenerationBackend for AnyGenerationBackend {
    fn name(&self) -> &str {
        match self {
            AnyGenerationBackend::Demo(b) => b.name(),
            AnyGenerationBackend::Http(b) => b.name(),
            AnyGenerationBackend::Mock(b) => b.name(),
        }
    }

    async fn load(&self) -> Result<Arc<dyn GenerationModel>, GenerationError> {
        match self {
            AnyGenerationBackend::Demo(b) => b.load().await,
            AnyGenerationBackend::Http(b) => b.load().await,
            AnyGenerationBackend::Mock(b) => b.load().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_selects_by_mode() {
        let mut config = GenerationConfig::default();
        assert_eq!(AnyGenerationBackend::from_config(&config).name(), "demo");

        config.mode = BackendMode::Live;
        assert_eq!(AnyGenerationBackend::from_config(&config).name(), "http");
    }

    #[tokio::test]
    async fn test_any_delegates_load() {
        let mock = MockGenerationBackend::new();
        let backend = AnyGenerationBackend::Mock(mock.clone());
        assert!(backend.load().await.is_ok());
        assert_eq!(mock.load_count(), 1);
    }
}
