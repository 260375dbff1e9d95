//! Mocks and fixtures shared by the Relief Crew test suites.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use relief_core::config::{Credentials, ModelConfig};
use relief_core::error::{Result, ReliefError};
use relief_core::plan::{InputBundle, TaskOutput, WorkItem};
use relief_core::traits::{CrewLauncher, LlmClient, TaskExecutor, Tool};
use relief_core::types::*;

enum Scripted {
    Deltas(Vec<StreamDelta>),
    Error(ReliefError),
    Stalled,
}

/// A request the mock LLM received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub tool_names: Vec<String>,
}

/// LLM client that replays scripted responses in order.
///
/// Once the script is exhausted every further request fails.
#[derive(Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Scripted>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    call_seq: AtomicUsize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text answer.
    pub fn with_text_response(self, text: &str) -> Self {
        self.push(Scripted::Deltas(vec![
            StreamDelta::TextDelta(text.to_string()),
            StreamDelta::Usage {
                input_tokens: 10,
                output_tokens: 5,
            },
            StreamDelta::Stop(StopReason::EndTurn),
        ]))
    }

    /// Queue a single tool call.
    pub fn with_tool_call(self, name: &str, input: serde_json::Value) -> Self {
        let id = format!("call_{}", self.call_seq.fetch_add(1, Ordering::SeqCst));
        self.push(Scripted::Deltas(vec![
            StreamDelta::ToolUseStart {
                index: 0,
                id,
                name: name.to_string(),
            },
            StreamDelta::ToolInputDelta {
                index: 0,
                delta: input.to_string(),
            },
            StreamDelta::Stop(StopReason::ToolUse),
        ]))
    }

    /// Queue a response stream that opens and then never yields.
    pub fn with_stalled_stream(self) -> Self {
        self.push(Scripted::Stalled)
    }

    /// Queue a request failure.
    pub fn with_error(self, error: ReliefError) -> Self {
        self.push(Scripted::Error(error))
    }

    /// Handle to the recorded requests, usable after the client is moved.
    pub fn requests_handle(&self) -> Arc<Mutex<Vec<RecordedRequest>>> {
        self.requests.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(self, item: Scripted) -> Self {
        self.script.lock().unwrap().push_back(item);
        self
    }
}

impl LlmClient for MockLlmClient {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages,
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        });
        let next = self.script.lock().unwrap().pop_front();

        Box::pin(async move {
            match next {
                Some(Scripted::Deltas(deltas)) => {
                    let stream = futures::stream::iter(deltas.into_iter().map(Ok));
                    Ok(Box::pin(stream) as BoxStream<'_, Result<StreamDelta>>)
                }
                Some(Scripted::Stalled) => {
                    let stream = futures::stream::pending::<Result<StreamDelta>>();
                    Ok(Box::pin(stream) as BoxStream<'_, Result<StreamDelta>>)
                }
                Some(Scripted::Error(e)) => Err(e),
                None => Err(ReliefError::LlmRequest("mock script exhausted".into())),
            }
        })
    }
}

/// Tool that returns a fixed output and counts its invocations.
pub struct MockTool {
    name: String,
    output: String,
    calls: Arc<AtomicUsize>,
}

impl MockTool {
    pub fn new(name: &str, output: &str) -> Self {
        Self {
            name: name.to_string(),
            output: output.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared invocation counter.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Mock tool for tests"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn execute(
        &self,
        _input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let output = self.output.clone();
        Box::pin(async move { Ok(ToolResult::success(output)) })
    }
}

/// One executor invocation as seen by [`RecordingExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedTask {
    pub name: String,
    pub agent_role: String,
    pub description: String,
    pub context: Vec<String>,
}

/// Task executor that records invocations and answers from a script keyed by task name.
///
/// Unscripted tasks answer `"{name} done"`.
#[derive(Default)]
pub struct RecordingExecutor {
    outputs: HashMap<String, String>,
    failures: HashMap<String, String>,
    calls: Arc<Mutex<Vec<ExecutedTask>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, task: &str, output: &str) -> Self {
        self.outputs.insert(task.to_string(), output.to_string());
        self
    }

    /// Fail the named task with an LLM request error carrying `message`.
    pub fn failing_at(mut self, task: &str, message: &str) -> Self {
        self.failures.insert(task.to_string(), message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ExecutedTask> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.name).collect()
    }
}

impl TaskExecutor for RecordingExecutor {
    fn execute<'a>(
        &'a self,
        task: &'a WorkItem,
        context: &'a [TaskOutput],
    ) -> BoxFuture<'a, Result<String>> {
        self.calls.lock().unwrap().push(ExecutedTask {
            name: task.name.clone(),
            agent_role: task.persona.role.clone(),
            description: task.description.clone(),
            context: context.iter().map(|c| c.raw.clone()).collect(),
        });

        let result = match self.failures.get(&task.name) {
            Some(msg) => Err(ReliefError::LlmRequest(msg.clone())),
            None => Ok(self
                .outputs
                .get(&task.name)
                .cloned()
                .unwrap_or_else(|| format!("{} done", task.name))),
        };
        Box::pin(async move { result })
    }
}

/// Launcher that counts launches and echoes a fixed result.
pub struct CountingLauncher {
    result: std::result::Result<String, String>,
    launches: Arc<Mutex<Vec<InputBundle>>>,
}

impl CountingLauncher {
    pub fn succeeding(result: &str) -> Self {
        Self {
            result: Ok(result.to_string()),
            launches: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            launches: Arc::default(),
        }
    }

    /// Handle to the bundles launched so far.
    pub fn launches(&self) -> Arc<Mutex<Vec<InputBundle>>> {
        self.launches.clone()
    }
}

impl CrewLauncher for CountingLauncher {
    fn launch(&self, inputs: InputBundle) -> BoxFuture<'_, Result<String>> {
        self.launches.lock().unwrap().push(inputs);
        let result = self
            .result
            .clone()
            .map_err(ReliefError::LlmRequest);
        Box::pin(async move { result })
    }
}

/// Credentials with all three secrets set to dummy values.
pub fn test_credentials() -> Credentials {
    Credentials {
        openai_api_key: Some("sk-test".into()),
        groq_api_key: Some("gsk-test".into()),
        serper_api_key: Some("serper-test".into()),
    }
}
