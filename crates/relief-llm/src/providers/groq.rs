use futures::future::BoxFuture;
use futures::stream::BoxStream;
use reqwest::Client;

use relief_core::config::ModelConfig;
use relief_core::error::Result;
use relief_core::traits::LlmClient;
use relief_core::types::*;

use super::openai::stream_chat;

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Groq client. Groq serves an OpenAI-compatible endpoint, so the wire
/// format is shared with [`super::OpenAiClient`]; only the endpoint and key differ.
pub struct GroqClient {
    http: Client,
    api_key: String,
}

impl GroqClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
        }
    }
}

impl LlmClient for GroqClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();
        let tools = tools.to_vec();

        Box::pin(async move {
            let url = config.base_url.as_deref().unwrap_or(GROQ_API_URL);
            // Groq reports usage in its own x_groq field; stream_options is not sent
            let stream =
                stream_chat(&self.http, url, &self.api_key, &config, messages, &tools, false)
                    .await?;
            Ok(stream as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}
