//! Backend for a text-generation server reached over HTTP.
//!
//! `load` probes `GET {endpoint}/info` so an unreachable server is reported
//! as a load failure. `generate` posts `{"inputs", "parameters"}` to
//! `{endpoint}/generate` and accepts either a list of candidates or a single
//! `{"generated_text"}` object.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use snapnote_core::config::GenerationConfig;
use tracing::{debug, info, warn};

use crate::backend::{GeneratedText, GenerationBackend, GenerationModel, GenerationOptions};
use crate::error::GenerationError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpGenerationBackend {
    client: Client,
    base_url: String,
    model_id: String,
    timeout: Duration,
}

impl HttpGenerationBackend {
    pub fn new(base_url: impl Into<String>, model_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model_id: model_id.into(),
            timeout,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(
            config.endpoint.clone(),
            config.model_id.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[derive(Deserialize)]
struct InfoResponse {
    #[serde(default)]
    model_id: Option<String>,
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn load(&self) -> Result<Arc<dyn GenerationModel>, GenerationError> {
        let response = self
            .client
            .get(format!("{}/info", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                GenerationError::ModelLoad(format!("Server {} unreachable: {}", self.base_url, e))
            })?;

        if !response.status().is_success() {
            return Err(GenerationError::ModelLoad(format!(
                "Server {} returned {}",
                self.base_url,
                response.status()
            )));
        }

        let served = response
            .json::<InfoResponse>()
            .await
            .ok()
            .and_then(|info| info.model_id);
        match served {
            Some(served) if !self.model_id.is_empty() && served != self.model_id => {
                warn!(expected = %self.model_id, served = %served, "Server is serving a different model");
            }
            Some(served) => info!(model = %served, "Generation server ready"),
            None => info!(url = %self.base_url, "Generation server ready"),
        }

        Ok(Arc::new(HttpModel {
            client: self.client.clone(),
            url: format!("{}/generate", self.base_url),
            timeout: self.timeout,
        }))
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: &'a GenerationOptions,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Many(Vec<GeneratedText>),
    One(GeneratedText),
}

struct HttpModel {
    client: Client,
    url: String,
    timeout: Duration,
}

#[async_trait]
impl GenerationModel for HttpModel {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Vec<GeneratedText>, GenerationError> {
        let request = GenerateRequest {
            inputs: prompt,
            parameters: options,
        };

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Backend(format!("Request timed out after {:?}", self.timeout))
                } else {
                    GenerationError::Backend(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Backend(format!(
                "Server returned {}: {}",
                status, body
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Backend(format!("Failed to parse response: {}", e)))?;

        let outputs = match parsed {
            GenerateResponse::Many(outputs) => outputs,
            GenerateResponse::One(output) => vec![output],
        };
        debug!(candidates = outputs.len(), "Generation response received");
        Ok(outputs)
    }
}
