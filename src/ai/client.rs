use futures::future::BoxFuture;
use reqwest::Client;

use crate::config::EscalationConfig;

use super::{
    inference::{build_request, parse_completion, ChatCompletionResponse},
    EscalationError, EscalationRequest, EscalationVerdict, TextClassifier,
};

/// Chat-completions backend for escalated messages.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    config: EscalationConfig,
}

impl LlmClient {
    pub fn new(http: Client, config: EscalationConfig) -> Self {
        Self { http, config }
    }

    async fn request_verdict(
        &self,
        request: &EscalationRequest,
    ) -> Result<EscalationVerdict, EscalationError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or(EscalationError::NotConfigured)?;

        let body = build_request(self.config.model.clone(), self.config.max_tokens, request);
        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EscalationError::Status(status.as_u16()));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        parse_completion(completion)
    }
}

impl TextClassifier for LlmClient {
    fn classify<'a>(
        &'a self,
        request: &'a EscalationRequest,
    ) -> BoxFuture<'a, Result<EscalationVerdict, EscalationError>> {
        Box::pin(self.request_verdict(request))
    }
}
