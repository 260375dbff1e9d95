use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tracing::warn;

use relief_core::config::{ModelConfig, RetryConfig};
use relief_core::error::{Result, ReliefError};
use relief_core::traits::LlmClient;
use relief_core::types::*;

/// An LLM client that retries transient request failures against the same backend.
pub struct RetryingClient {
    inner: Box<dyn LlmClient>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(inner: Box<dyn LlmClient>, retry_config: RetryConfig) -> Self {
        Self {
            inner,
            retry_config,
        }
    }
}

fn is_retryable(e: &ReliefError) -> bool {
    match e {
        ReliefError::LlmRequest(msg) => {
            msg.contains("429")
                || msg.contains("500")
                || msg.contains("502")
                || msg.contains("503")
                || msg.contains("timeout")
                || msg.contains("connection")
        }
        ReliefError::LlmStream(_) => true,
        _ => false,
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl LlmClient for RetryingClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();
        let tools = tools.to_vec();

        Box::pin(async move {
            let max_retries = self.retry_config.max_retries;

            let mut attempt = 0;
            loop {
                match self
                    .inner
                    .chat_stream(&config, messages.clone(), &tools)
                    .await
                {
                    Ok(stream) => return Ok(stream),
                    Err(e) if is_retryable(&e) && attempt < max_retries => {
                        let backoff = calculate_backoff(attempt, &self.retry_config);
                        warn!(
                            attempt = attempt + 1,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %e,
                            "Retrying LLM request"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use relief_test_utils::MockLlmClient;

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[test]
    fn retryable_classification() {
        assert!(is_retryable(&ReliefError::LlmRequest("HTTP 429 Too Many Requests".into())));
        assert!(is_retryable(&ReliefError::LlmRequest("HTTP 503: overloaded".into())));
        assert!(is_retryable(&ReliefError::LlmStream("reset".into())));
        assert!(!is_retryable(&ReliefError::LlmRequest("HTTP 401: bad key".into())));
        assert!(!is_retryable(&ReliefError::Config("x".into())));
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            initial_backoff_ms: 1000,
            max_backoff_ms: 5000,
        };
        let d = calculate_backoff(8, &config);
        assert!(d <= Duration::from_millis(6000));
    }

    #[tokio::test]
    async fn retries_transient_failure_then_succeeds() {
        let inner = MockLlmClient::new()
            .with_error(ReliefError::LlmRequest("HTTP 503: busy".into()))
            .with_text_response("ok");
        let client = RetryingClient::new(Box::new(inner), fast_retry(2));

        let mut stream = client
            .chat_stream(&ModelConfig::default(), vec![ChatMessage::user("hi")], &[])
            .await
            .unwrap();
        let mut text = String::new();
        while let Some(Ok(delta)) = stream.next().await {
            if let StreamDelta::TextDelta(t) = delta {
                text.push_str(&t);
            }
        }
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let inner = MockLlmClient::new()
            .with_error(ReliefError::LlmRequest("HTTP 401: bad key".into()))
            .with_text_response("never reached");
        let client = RetryingClient::new(Box::new(inner), fast_retry(3));

        let result = client
            .chat_stream(&ModelConfig::default(), vec![ChatMessage::user("hi")], &[])
            .await;
        assert!(matches!(result, Err(ReliefError::LlmRequest(msg)) if msg.contains("401")));
    }
}
