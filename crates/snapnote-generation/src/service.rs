//! Generation service: model lifecycle, result cache and request coalescing.
//!
//! Model lifecycle is `Unloaded -> Loading -> Ready`, falling back to
//! `Unloaded` when a load fails so the next call retries. At most one load is
//! in flight; callers arriving while `Loading` await the same shared future
//! and observe the same outcome.
//!
//! Results are cached by the exact input text once they pass validation.
//! Concurrent cache misses for the same text share one in-flight generation.
//! Mutexes here are never held across an `.await`.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use snapnote_core::config::GenerationConfig;
use snapnote_core::types::GenerationResult;
use tracing::{debug, info, warn};

use crate::any::AnyGenerationBackend;
use crate::backend::{GenerationBackend, GenerationModel, GenerationOptions};
use crate::error::GenerationError;
use crate::parse::{parse_response, GenerationOutcome};
use crate::prompt::build_prompt;

type LoadFuture = Shared<BoxFuture<'static, Result<Arc<dyn GenerationModel>, GenerationError>>>;
type GenerateFuture = Shared<BoxFuture<'static, Result<GenerationOutcome, GenerationError>>>;

enum ModelState {
    Unloaded,
    Loading { attempt: u64, pending: LoadFuture },
    Ready(Arc<dyn GenerationModel>),
}

/// Observable model lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Ready,
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelStatus::Unloaded => write!(f, "Unloaded"),
            ModelStatus::Loading => write!(f, "Loading"),
            ModelStatus::Ready => write!(f, "Ready"),
        }
    }
}

struct Inner {
    backend: Arc<dyn GenerationBackend>,
    options: GenerationOptions,
    excerpt_chars: usize,
    model: Mutex<ModelState>,
    load_attempts: AtomicU64,
    cache: Mutex<LruCache<String, GenerationResult>>,
    in_flight: Mutex<HashMap<String, GenerateFuture>>,
}

/// Turns extracted text into a [`GenerationOutcome`].
///
/// Cheap to clone; clones share the model, cache and in-flight requests.
#[derive(Clone)]
pub struct GenerationService {
    inner: Arc<Inner>,
}

impl GenerationService {
    /// Build a service over `backend`, taking generation parameters, cache
    /// capacity and excerpt length from `config`. A capacity of `0` keeps
    /// every result for the lifetime of the service.
    pub fn new(backend: Arc<dyn GenerationBackend>, config: &GenerationConfig) -> Self {
        let cache = match NonZeroUsize::new(config.cache_capacity) {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self {
            inner: Arc::new(Inner {
                backend,
                options: GenerationOptions::from_config(config),
                excerpt_chars: config.raw_excerpt_chars,
                model: Mutex::new(ModelState::Unloaded),
                load_attempts: AtomicU64::new(0),
                cache: Mutex::new(cache),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Build a service with the backend selected by `config.mode`.
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(Arc::new(AnyGenerationBackend::from_config(config)), config)
    }

    /// Generate a note for `text`.
    ///
    /// A degraded outcome is returned as `Ok` and is never cached. Load and
    /// backend failures are returned as `Err` and are never cached either.
    pub async fn generate(&self, text: &str) -> Result<GenerationOutcome, GenerationError> {
        if let Some(hit) = self.inner.cached(text) {
            debug!(chars = text.len(), "Generation cache hit");
            return Ok(GenerationOutcome::Generated(hit));
        }

        let pending = {
            let mut in_flight = lock(&self.inner.in_flight);
            // A generation may have finished and cached between the check above
            // and taking this lock.
            if let Some(hit) = self.inner.cached(text) {
                debug!(chars = text.len(), "Generation cache hit");
                return Ok(GenerationOutcome::Generated(hit));
            }
            match in_flight.get(text) {
                Some(pending) => {
                    debug!(chars = text.len(), "Joining in-flight generation");
                    pending.clone()
                }
                None => {
                    debug!(chars = text.len(), "Generation cache miss");
                    let inner = Arc::clone(&self.inner);
                    let key = text.to_string();
                    let pending = async move { inner.run(key).await }.boxed().shared();
                    in_flight.insert(text.to_string(), pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Make sure the model is loaded without generating anything.
    pub async fn warm_up(&self) -> Result<(), GenerationError> {
        self.inner.ensure_model().await.map(|_| ())
    }

    pub fn model_status(&self) -> ModelStatus {
        match &*lock(&self.inner.model) {
            ModelState::Unloaded => ModelStatus::Unloaded,
            ModelState::Loading { .. } => ModelStatus::Loading,
            ModelState::Ready(_) => ModelStatus::Ready,
        }
    }

    /// Number of load attempts started so far.
    pub fn load_attempts(&self) -> u64 {
        self.inner.load_attempts.load(Ordering::SeqCst)
    }

    pub fn cache_len(&self) -> usize {
        lock(&self.inner.cache).len()
    }

    pub fn clear_cache(&self) {
        lock(&self.inner.cache).clear();
        info!("Generation cache cleared");
    }

    pub fn backend_name(&self) -> &str {
        self.inner.backend.name()
    }
}

impl fmt::Debug for GenerationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationService")
            .field("backend", &self.backend_name())
            .field("model", &self.model_status())
            .field("cached", &self.cache_len())
            .finish()
    }
}

impl Inner {
    fn cached(&self, text: &str) -> Option<GenerationResult> {
        lock(&self.cache).get(text).cloned()
    }

    /// Generate for `text`, cache a validated result, then leave the
    /// in-flight table. Caching happens first so a caller that misses the
    /// in-flight entry finds the cache populated.
    async fn run(self: Arc<Self>, text: String) -> Result<GenerationOutcome, GenerationError> {
        let outcome = self.generate_uncached(&text).await;

        match &outcome {
            Ok(GenerationOutcome::Generated(result)) => {
                lock(&self.cache).put(text.clone(), result.clone());
            }
            Ok(GenerationOutcome::Degraded { reason, .. }) => {
                warn!(reason = %reason, "Model output failed validation, returning degraded result");
            }
            Err(e) => warn!(error = %e, "Generation failed"),
        }

        lock(&self.in_flight).remove(&text);
        outcome
    }

    async fn generate_uncached(&self, text: &str) -> Result<GenerationOutcome, GenerationError> {
        let model = self.ensure_model().await?;
        let prompt = build_prompt(text);

        let started = Instant::now();
        let outputs = model.generate(&prompt, &self.options).await?;
        let raw = outputs
            .into_iter()
            .next()
            .map(|output| output.generated_text)
            .ok_or_else(|| GenerationError::Backend("Backend returned no output".to_string()))?;
        debug!(
            response_len = raw.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Generation complete"
        );

        Ok(parse_response(&raw, self.excerpt_chars))
    }

    async fn ensure_model(&self) -> Result<Arc<dyn GenerationModel>, GenerationError> {
        let (attempt, pending) = {
            let mut state = lock(&self.model);
            match &*state {
                ModelState::Ready(model) => return Ok(Arc::clone(model)),
                ModelState::Loading { attempt, pending } => (*attempt, pending.clone()),
                ModelState::Unloaded => {
                    let attempt = self.load_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let backend = Arc::clone(&self.backend);
                    info!(backend = backend.name(), attempt, "Loading generation model");
                    let pending = async move { backend.load().await }.boxed().shared();
                    *state = ModelState::Loading {
                        attempt,
                        pending: pending.clone(),
                    };
                    (attempt, pending)
                }
            }
        };

        let started = Instant::now();
        let outcome = pending.await;

        // Every waiter gets here with the same outcome; only the first one to
        // take the lock finds its attempt still current.
        let mut state = lock(&self.model);
        if matches!(&*state, ModelState::Loading { attempt: current, .. } if *current == attempt) {
            match &outcome {
                Ok(model) => {
                    info!(
                        attempt,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Generation model ready"
                    );
                    *state = ModelState::Ready(Arc::clone(model));
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Model load failed, will retry on next call");
                    *state = ModelState::Unloaded;
                }
            }
        }
        outcome
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGenerationBackend;
    use crate::parse::{DEGRADED_TITLE, PARSE_FAILURE};
    use crate::DemoGenerationBackend;
    use std::time::Duration;

    const Q3_TEXT: &str = "Meeting Notes - Q3 Planning\n1. Revenue targets: $2.5M";

    fn service_with(backend: &MockGenerationBackend) -> GenerationService {
        GenerationService::new(Arc::new(backend.clone()), &GenerationConfig::default())
    }

    #[tokio::test]
    async fn test_starts_unloaded_and_loads_lazily() {
        let backend = MockGenerationBackend::new();
        let service = service_with(&backend);
        assert_eq!(service.model_status(), ModelStatus::Unloaded);
        assert_eq!(backend.load_count(), 0);

        service.generate("hello").await.unwrap();
        assert_eq!(service.model_status(), ModelStatus::Ready);
        assert_eq!(backend.load_count(), 1);

        service.generate("world").await.unwrap();
        assert_eq!(backend.load_count(), 1);
    }

    #[tokio::test]
    async fn test_single_flight_load() {
        let backend = MockGenerationBackend::new().with_load_delay(Duration::from_millis(50));
        let service = service_with(&backend);

        let calls = (0..8).map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.generate(&format!("text {}", i)).await })
        });
        let results = futures::future::join_all(calls).await;

        for result in results {
            assert!(result.unwrap().is_ok());
        }
        assert_eq!(backend.load_count(), 1);
        assert_eq!(service.load_attempts(), 1);
        assert_eq!(backend.generate_count(), 8);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_load_failure() {
        let backend = MockGenerationBackend::new()
            .failing_loads(1)
            .with_load_delay(Duration::from_millis(50));
        let service = service_with(&backend);

        let calls = (0..5).map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.generate(&format!("text {}", i)).await })
        });
        let results = futures::future::join_all(calls).await;

        let errors: Vec<GenerationError> = results
            .into_iter()
            .map(|r| r.unwrap().unwrap_err())
            .collect();
        assert_eq!(backend.load_count(), 1);
        assert!(errors.iter().all(|e| *e == errors[0]));
        assert!(matches!(errors[0], GenerationError::ModelLoad(_)));
        assert_eq!(service.model_status(), ModelStatus::Unloaded);
        assert_eq!(service.cache_len(), 0);
    }

    #[tokio::test]
    async fn test_retry_after_load_failure() {
        let backend = MockGenerationBackend::new().failing_loads(1);
        let service = service_with(&backend);

        let err = service.generate("hello").await.unwrap_err();
        assert!(matches!(err, GenerationError::ModelLoad(_)));
        assert_eq!(service.model_status(), ModelStatus::Unloaded);

        let outcome = service.generate("hello").await.unwrap();
        assert!(!outcome.is_degraded());
        assert_eq!(backend.load_count(), 2);
        assert_eq!(service.model_status(), ModelStatus::Ready);
    }

    #[tokio::test]
    async fn test_status_is_loading_while_load_in_flight() {
        let backend = MockGenerationBackend::new().with_load_delay(Duration::from_millis(200));
        let service = service_with(&backend);

        let handle = {
            let service = service.clone();
            tokio::spawn(async move { service.warm_up().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(service.model_status(), ModelStatus::Loading);

        handle.await.unwrap().unwrap();
        assert_eq!(service.model_status(), ModelStatus::Ready);
    }

    #[tokio::test]
    async fn test_idempotent_cache() {
        let backend = MockGenerationBackend::new();
        let service = service_with(&backend);

        let first = service.generate("same text").await.unwrap();
        let second = service.generate("same text").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.generate_count(), 1);
        assert_eq!(service.cache_len(), 1);
    }

    #[tokio::test]
    async fn test_cache_key_is_exact_text() {
        let backend = MockGenerationBackend::new();
        let service = service_with(&backend);

        service.generate("text").await.unwrap();
        service.generate("text ").await.unwrap();
        service.generate("Text").await.unwrap();
        assert_eq!(backend.generate_count(), 3);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_regeneration() {
        let backend = MockGenerationBackend::new();
        let service = service_with(&backend);

        service.generate("text").await.unwrap();
        service.clear_cache();
        assert_eq!(service.cache_len(), 0);
        service.generate("text").await.unwrap();
        assert_eq!(backend.generate_count(), 2);
    }

    #[tokio::test]
    async fn test_degraded_result_not_cached() {
        let backend = MockGenerationBackend::with_response("not json at all");
        let service = service_with(&backend);

        let outcome = service.generate("scan").await.unwrap();
        assert!(outcome.is_degraded());
        let result = outcome.result();
        assert_eq!(result.title, DEGRADED_TITLE);
        assert_eq!(
            result.structured_content.get("RawOutput").unwrap(),
            ["not json at all"]
        );
        assert_eq!(result.uncertainties, vec![PARSE_FAILURE]);
        assert_eq!(service.cache_len(), 0);

        backend.set_response(crate::mock::MOCK_RESPONSE);
        let outcome = service.generate("scan").await.unwrap();
        assert!(!outcome.is_degraded());
        assert_eq!(backend.generate_count(), 2);
    }

    #[tokio::test]
    async fn test_backend_failure_not_cached() {
        let backend = MockGenerationBackend::new().failing_generation("timed out");
        let service = service_with(&backend);

        let err = service.generate("text").await.unwrap_err();
        assert_eq!(err, GenerationError::Backend("timed out".to_string()));
        assert_eq!(service.cache_len(), 0);
        // The model stays loaded after a generation failure.
        assert_eq!(service.model_status(), ModelStatus::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_coalesce() {
        let backend = MockGenerationBackend::new().with_generate_delay(Duration::from_millis(50));
        let service = service_with(&backend);

        let calls = (0..6).map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.generate("duplicate").await })
        });
        let results = futures::future::join_all(calls).await;

        let outcomes: Vec<GenerationOutcome> =
            results.into_iter().map(|r| r.unwrap().unwrap()).collect();
        assert!(outcomes.iter().all(|o| *o == outcomes[0]));
        assert_eq!(backend.generate_count(), 1);
    }

    #[tokio::test]
    async fn test_bounded_cache_evicts_least_recent() {
        let backend = MockGenerationBackend::new();
        let config = GenerationConfig {
            cache_capacity: 2,
            ..GenerationConfig::default()
        };
        let service = GenerationService::new(Arc::new(backend.clone()), &config);

        service.generate("a").await.unwrap();
        service.generate("b").await.unwrap();
        service.generate("a").await.unwrap();
        service.generate("c").await.unwrap();
        assert_eq!(service.cache_len(), 2);
        assert_eq!(backend.generate_count(), 3);

        service.generate("a").await.unwrap();
        assert_eq!(backend.generate_count(), 3);
        service.generate("b").await.unwrap();
        assert_eq!(backend.generate_count(), 4);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_unbounded() {
        let backend = MockGenerationBackend::new();
        let config = GenerationConfig {
            cache_capacity: 0,
            ..GenerationConfig::default()
        };
        let service = GenerationService::new(Arc::new(backend.clone()), &config);

        for i in 0..300 {
            service.generate(&format!("text {}", i)).await.unwrap();
        }
        assert_eq!(service.cache_len(), 300);
    }

    #[tokio::test]
    async fn test_prompt_embeds_text() {
        let backend = MockGenerationBackend::new();
        let service = service_with(&backend);

        service.generate(Q3_TEXT).await.unwrap();
        let prompt = backend.last_prompt().unwrap();
        assert_eq!(crate::prompt::extract_source(&prompt), Some(Q3_TEXT));
    }

    #[tokio::test]
    async fn test_q3_scenario_with_demo_backend() {
        let service = GenerationService::new(
            Arc::new(DemoGenerationBackend::new()),
            &GenerationConfig::default(),
        );

        let first = service.generate(Q3_TEXT).await.unwrap();
        let GenerationOutcome::Generated(result) = &first else {
            panic!("expected a generated result");
        };
        let (heading, bullets) = result
            .structured_content
            .iter()
            .find(|(heading, _)| heading.contains("Financ") || heading.contains("Goal"))
            .unwrap();
        assert_eq!(heading, "Financial Goals");
        assert!(bullets.iter().any(|b| b.contains("$2.5M")));

        let second = service.generate(Q3_TEXT).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(service.cache_len(), 1);
    }
}
