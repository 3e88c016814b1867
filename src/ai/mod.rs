//! Escalation to a remote text-understanding service.
//!
//! Only reached when the pattern stage is unsure. Every failure mode maps to
//! an [`EscalationError`] that the caller turns into a fallback; nothing here
//! can fail a batch.

mod client;
pub mod inference;

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use tokio::{sync::Semaphore, time::timeout};

use crate::{
    config::EscalationConfig,
    domain::{message::truncate_chars, Category, InboundMessage},
    infrastructure::shutdown::ShutdownListener,
};

pub use client::LlmClient;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationRequest {
    pub subject: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationVerdict {
    pub category: Category,
    pub confidence: f64,
    pub justification: String,
}

#[derive(Debug, Error)]
pub enum EscalationError {
    #[error("escalation backend is not configured")]
    NotConfigured,
    #[error("escalation timed out after {0:?}")]
    Timeout(Duration),
    #[error("escalation transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("escalation service returned status {0}")]
    Status(u16),
    #[error("malformed escalation response: {0}")]
    Malformed(String),
    #[error("escalation cancelled")]
    Cancelled,
}

/// Narrow capability the pipeline depends on; swap in a stub for tests.
pub trait TextClassifier: Send + Sync {
    fn classify<'a>(
        &'a self,
        request: &'a EscalationRequest,
    ) -> BoxFuture<'a, Result<EscalationVerdict, EscalationError>>;
}

pub struct EscalationClassifier {
    backend: Option<Arc<dyn TextClassifier>>,
    threshold: f64,
    call_timeout: Duration,
    excerpt_chars: usize,
    permits: Arc<Semaphore>,
}

impl EscalationClassifier {
    pub fn new(backend: Option<Arc<dyn TextClassifier>>, config: &EscalationConfig) -> Self {
        Self {
            backend,
            threshold: config.threshold,
            call_timeout: config.timeout,
            excerpt_chars: config.excerpt_chars,
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
        }
    }

    /// No backend: every message keeps its pattern verdict.
    #[cfg(test)]
    pub(crate) fn disabled(config: &EscalationConfig) -> Self {
        Self::new(None, config)
    }

    pub fn should_escalate(&self, confidence: f64) -> bool {
        self.backend.is_some() && confidence < self.threshold
    }

    fn build_request(&self, message: &InboundMessage) -> EscalationRequest {
        EscalationRequest {
            subject: message.subject.clone(),
            excerpt: truncate_chars(message.content(), self.excerpt_chars).to_string(),
        }
    }

    /// One bounded remote call. Waits for a permit, honours `shutdown` while
    /// waiting and while the call is in flight.
    pub async fn escalate(
        &self,
        message: &InboundMessage,
        shutdown: &mut ShutdownListener,
    ) -> Result<EscalationVerdict, EscalationError> {
        let backend = self.backend.as_ref().ok_or(EscalationError::NotConfigured)?;
        let request = self.build_request(message);

        let _permit = tokio::select! {
            permit = self.permits.acquire() => permit.map_err(|_| EscalationError::Cancelled)?,
            _ = shutdown.notified() => return Err(EscalationError::Cancelled),
        };

        tokio::select! {
            res = timeout(self.call_timeout, backend.classify(&request)) => {
                res.map_err(|_| EscalationError::Timeout(self.call_timeout))?
            }
            _ = shutdown.notified() => Err(EscalationError::Cancelled),
        }
    }
}
