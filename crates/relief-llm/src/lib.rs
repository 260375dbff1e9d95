pub mod providers;
pub mod retry;
pub mod streaming;

use tracing::info;

use relief_core::config::{ModelConfig, ModelProvider};
use relief_core::config::Credentials;
use relief_core::error::Result;
use relief_core::traits::LlmClient;

pub use providers::groq::GroqClient;
pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create the chat-completion client for the configured provider.
///
/// Called once at startup; the provider's key must be present.
pub fn create_client(config: &ModelConfig, credentials: &Credentials) -> Result<Box<dyn LlmClient>> {
    let key = credentials.model_key(config.provider)?;
    let client: Box<dyn LlmClient> = match config.provider {
        ModelProvider::OpenAi => Box::new(OpenAiClient::new(key)),
        ModelProvider::Groq => Box::new(GroqClient::new(key)),
    };

    let client = match &config.retry {
        Some(retry) => Box::new(RetryingClient::new(client, retry.clone())) as Box<dyn LlmClient>,
        None => client,
    };

    info!(provider = %config.provider, model = %config.model_id(), "LLM client ready");
    Ok(client)
}
