//! Scriptable backend for tests.
//!
//! Counts load and generate calls, can fail a number of loads before
//! succeeding, and can delay either step so concurrent callers overlap.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{GeneratedText, GenerationBackend, GenerationModel, GenerationOptions};
use crate::error::GenerationError;

pub const MOCK_RESPONSE: &str =
    r#"{"title":"Mock Note","structuredContent":{"Summary":["mock output"]},"uncertainties":[]}"#;

#[derive(Debug, Default)]
struct MockState {
    response: Mutex<String>,
    failing_loads: AtomicUsize,
    generate_error: Mutex<Option<String>>,
    load_delay: Mutex<Duration>,
    generate_delay: Mutex<Duration>,
    loads: AtomicUsize,
    generations: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct MockGenerationBackend {
    state: Arc<MockState>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self::with_response(MOCK_RESPONSE)
    }

    /// Every generate call returns `raw` verbatim.
    pub fn with_response(raw: impl Into<String>) -> Self {
        let state = MockState {
            response: Mutex::new(raw.into()),
            ..MockState::default()
        };
        Self {
            state: Arc::new(state),
        }
    }

    /// Fail the next `count` load attempts.
    pub fn failing_loads(self, count: usize) -> Self {
        self.state.failing_loads.store(count, Ordering::SeqCst);
        self
    }

    /// Fail every generate call with a backend error.
    pub fn failing_generation(self, message: impl Into<String>) -> Self {
        *lock(&self.state.generate_error) = Some(message.into());
        self
    }

    pub fn with_load_delay(self, delay: Duration) -> Self {
        *lock(&self.state.load_delay) = delay;
        self
    }

    pub fn with_generate_delay(self, delay: Duration) -> Self {
        *lock(&self.state.generate_delay) = delay;
        self
    }

    pub fn set_response(&self, raw: impl Into<String>) {
        *lock(&self.state.response) = raw.into();
    }

    pub fn load_count(&self) -> usize {
        self.state.loads.load(Ordering::SeqCst)
    }

    pub fn generate_count(&self) -> usize {
        self.state.generations.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        lock(&self.state.last_prompt).clone()
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load(&self) -> Result<Arc<dyn GenerationModel>, GenerationError> {
        let attempt = self.state.loads.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *lock(&self.state.load_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let should_fail = self
            .state
            .failing_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(GenerationError::ModelLoad(format!(
                "mock load attempt {} failed",
                attempt
            )));
        }

        Ok(Arc::new(MockModel {
            state: self.state.clone(),
        }))
    }
}

struct MockModel {
    state: Arc<MockState>,
}

#[async_trait]
impl GenerationModel for MockModel {
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<Vec<GeneratedText>, GenerationError> {
        self.state.generations.fetch_add(1, Ordering::SeqCst);
        *lock(&self.state.last_prompt) = Some(prompt.to_string());

        let delay = *lock(&self.state.generate_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = lock(&self.state.generate_error).clone() {
            return Err(GenerationError::Backend(message));
        }
        Ok(vec![GeneratedText::new(lock(&self.state.response).clone())])
    }
}
