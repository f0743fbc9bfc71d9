//! Retry and model-fallback control around model round trips
//!
//! One controller instance lives for the whole session: once quota
//! exhaustion switches it to the fallback tier, it stays there.

use std::future::Future;
use std::sync::Mutex;
use tandemai::Model;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::retry::jittered_backoff;
use crate::types::{AgentEvent, RetryConfig, emit};

pub struct FallbackController {
    retry: RetryConfig,
    primary: Model,
    fallback: Option<Model>,
    using_fallback: Mutex<bool>,
}

impl FallbackController {
    pub fn new(primary: Model, fallback: Option<Model>, retry: RetryConfig) -> Self {
        Self {
            retry,
            primary,
            fallback,
            using_fallback: Mutex::new(false),
        }
    }

    /// The tier new requests go to
    pub fn active_model(&self) -> Model {
        let using_fallback = self.using_fallback.lock().map(|f| *f).unwrap_or(false);
        match (&self.fallback, using_fallback) {
            (Some(fallback), true) => fallback.clone(),
            _ => self.primary.clone(),
        }
    }

    /// Run `operation` against the active tier, retrying transient failures
    /// with jittered exponential backoff and switching to the fallback tier
    /// on quota exhaustion.
    ///
    /// The fallback switch does not consume retry budget; every other
    /// failure class propagates immediately.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        events: &mpsc::Sender<AgentEvent>,
        mut operation: F,
    ) -> Result<T, AgentError>
    where
        F: FnMut(Model) -> Fut,
        Fut: Future<Output = Result<T, tandemai::Error>>,
    {
        let mut attempt = 0usize;
        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let model = self.active_model();
            let error = match operation(model.clone()).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if error.is_quota() {
                match self.engage_fallback() {
                    Some(fallback) => {
                        tracing::warn!(
                            from = %model.id,
                            to = %fallback.id,
                            "quota exhausted, switching to fallback model"
                        );
                        emit(
                            events,
                            AgentEvent::FallbackEngaged {
                                from: model.id,
                                to: fallback.id,
                            },
                        )
                        .await;
                        continue;
                    }
                    None => return Err(AgentError::ModelQuota(error.to_string())),
                }
            }

            if !error.is_retryable() {
                return Err(error.into());
            }

            attempt += 1;
            if attempt >= self.retry.max_attempts {
                return Err(AgentError::ModelTransport(error.to_string()));
            }

            let delay = jittered_backoff(&self.retry, attempt);
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient model failure, backing off"
            );
            emit(
                events,
                AgentEvent::RetryAttempt {
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    reason: error.to_string(),
                },
            )
            .await;

            tokio::select! {
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Switch to the fallback tier. Returns the fallback model on the first
    /// switch, `None` if there is no fallback or it is already active.
    fn engage_fallback(&self) -> Option<Model> {
        let fallback = self.fallback.as_ref()?;
        let mut using_fallback = self.using_fallback.lock().ok()?;
        if *using_fallback {
            return None;
        }
        *using_fallback = true;
        Some(fallback.clone())
    }
}
