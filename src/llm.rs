//! Model invocation
//!
//! A narrow interface over language-model backends: one prompt in, one
//! completion out. Calls are synchronous from the caller's perspective and
//! may take seconds; there is no streaming and no cancellation.

mod error;
mod ollama;

pub use error::{InvokeError, InvokeErrorKind};
pub use ollama::OllamaInvoker;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for model backends
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Generate a completion for `prompt` with the given model.
    async fn invoke(&self, model_id: &str, prompt: &str) -> Result<String, InvokeError>;
}

#[async_trait]
impl<T: ModelInvoker + ?Sized> ModelInvoker for Arc<T> {
    async fn invoke(&self, model_id: &str, prompt: &str) -> Result<String, InvokeError> {
        (**self).invoke(model_id, prompt).await
    }
}

/// Logging wrapper for invokers
pub struct LoggingInvoker<I> {
    inner: I,
}

impl<I: ModelInvoker> LoggingInvoker<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<I: ModelInvoker> ModelInvoker for LoggingInvoker<I> {
    async fn invoke(&self, model_id: &str, prompt: &str) -> Result<String, InvokeError> {
        let start = std::time::Instant::now();
        let result = self.inner.invoke(model_id, prompt).await;
        let duration = start.elapsed();

        match &result {
            Ok(text) => {
                tracing::info!(
                    model = %model_id,
                    duration_ms = %duration.as_millis(),
                    prompt_chars = prompt.chars().count(),
                    response_chars = text.chars().count(),
                    "model call completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e,
                    "model call failed"
                );
            }
        }

        result
    }
}
