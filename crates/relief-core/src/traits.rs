use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::plan::{InputBundle, TaskOutput, WorkItem};
use crate::types::*;

/// Chat-completion backend. One implementation is selected per process.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// A tool invoked by an agent through the model's tool calls.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used in LLM tool calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input and context.
    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>>;

    /// Timeout in seconds for this tool.
    fn timeout_secs(&self) -> u64 {
        30
    }
}

/// Runs a single work item given the outputs of its context items.
pub trait TaskExecutor: Send + Sync {
    /// `context` holds the outputs of `task.context`, in declared order.
    fn execute<'a>(
        &'a self,
        task: &'a WorkItem,
        context: &'a [TaskOutput],
    ) -> BoxFuture<'a, Result<String>>;
}

/// Starts one full pipeline run for an input bundle and returns its result text.
pub trait CrewLauncher: Send + Sync {
    fn launch(&self, inputs: InputBundle) -> BoxFuture<'_, Result<String>>;
}
