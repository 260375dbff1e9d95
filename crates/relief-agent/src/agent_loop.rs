use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use relief_core::config::{AgentConfig, ModelConfig};
use relief_core::error::{Result, ReliefError};
use relief_core::event::EventBus;
use relief_core::plan::{Persona, TaskOutput, WorkItem};
use relief_core::traits::{LlmClient, TaskExecutor};
use relief_core::types::*;
use relief_tools::ToolRegistry;

const FINAL_ANSWER_NUDGE: &str =
    "You have used all of your tool calls. Now give your best final answer, based on what you have gathered so far.";

/// Accumulator for streaming tool call deltas.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    input_json: String,
}

/// One model response, fully streamed.
struct Turn {
    text: String,
    tool_calls: Vec<ToolCallAccumulator>,
    stop_reason: Option<StopReason>,
}

/// System prompt for a persona.
pub fn system_prompt(persona: &Persona) -> String {
    format!(
        "You are {}. {}\nYour personal goal is: {}",
        persona.role, persona.backstory, persona.goal
    )
}

/// User prompt for a work item, with its context outputs appended.
pub fn task_prompt(task: &WorkItem, context: &[TaskOutput]) -> String {
    let mut prompt = format!(
        "Current Task: {}\n\nThis is the expected criteria for your final answer: {}\nyou MUST return the actual complete content as the final answer, not a summary.",
        task.description, task.expected_output
    );
    if !context.is_empty() {
        let joined = context
            .iter()
            .map(|c| c.raw.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        prompt.push_str("\n\nThis is the context you're working with:\n");
        prompt.push_str(&joined);
    }
    prompt
}

/// Truncate on a char boundary.
fn truncate_output(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!(
            "{}\n\n[output truncated: {} of {} chars shown]",
            &content[..cut],
            max_chars,
            content.chars().count()
        ),
        None => content.to_string(),
    }
}

/// Runs one work item as a ReAct loop against the configured model.
///
/// The persona's tool subset is offered on every round until its iteration
/// cap is spent; the model is then asked once more, without tools, for the
/// final answer.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    config: AgentConfig,
    tools: Arc<ToolRegistry>,
    event_bus: Option<Arc<EventBus>>,
    run_id: RunId,
    cancel: CancellationToken,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: ModelConfig,
        config: AgentConfig,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            llm,
            model,
            config,
            tools,
            event_bus: None,
            run_id: RunId::new(),
            cancel: CancellationToken::new(),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    /// Stop the run at the next await point when `token` is cancelled.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Total (input, output) tokens reported by the model so far.
    pub fn usage(&self) -> (u64, u64) {
        (
            self.input_tokens.load(Ordering::Relaxed),
            self.output_tokens.load(Ordering::Relaxed),
        )
    }

    fn publish(&self, event: CrewEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    async fn stream_turn(
        &self,
        messages: &[ChatMessage],
        tool_defs: &[ToolDefinition],
    ) -> Result<Turn> {
        let stream_result = tokio::select! {
            result = self.llm.chat_stream(&self.model, messages.to_vec(), tool_defs) => result,
            _ = self.cancel.cancelled() => return Err(ReliefError::Cancelled),
        };
        let mut stream = stream_result?;

        let mut turn = Turn {
            text: String::new(),
            tool_calls: Vec::new(),
            stop_reason: None,
        };

        while let Some(delta) = stream.next().await {
            if self.cancel.is_cancelled() {
                return Err(ReliefError::Cancelled);
            }

            match delta? {
                StreamDelta::TextDelta(text) => {
                    self.publish(CrewEvent::TextDelta(text.clone()));
                    turn.text.push_str(&text);
                }
                StreamDelta::ToolUseStart { index, id, name } => {
                    while turn.tool_calls.len() <= index {
                        turn.tool_calls.push(ToolCallAccumulator::default());
                    }
                    turn.tool_calls[index].id = id;
                    turn.tool_calls[index].name = name;
                }
                StreamDelta::ToolInputDelta { index, delta } => {
                    if let Some(tc) = turn.tool_calls.get_mut(index) {
                        tc.input_json.push_str(&delta);
                    }
                }
                StreamDelta::Stop(reason) => {
                    turn.stop_reason = Some(reason);
                }
                StreamDelta::Usage {
                    input_tokens,
                    output_tokens,
                } => {
                    self.input_tokens.fetch_add(input_tokens, Ordering::Relaxed);
                    self.output_tokens.fetch_add(output_tokens, Ordering::Relaxed);
                    self.publish(CrewEvent::UsageUpdate {
                        input_tokens,
                        output_tokens,
                    });
                }
            }
        }

        Ok(turn)
    }

    /// Run the requested tools one after another. Failures become error results.
    async fn run_tools(
        &self,
        persona: &Persona,
        calls: &[ToolCallAccumulator],
        inputs: Vec<serde_json::Value>,
    ) -> Vec<ContentBlock> {
        let mut blocks = Vec::with_capacity(calls.len());

        for (tc, input) in calls.iter().zip(inputs) {
            self.publish(CrewEvent::ToolStart {
                name: tc.name.clone(),
                input: input.clone(),
            });

            let result = if !persona.may_use(&tc.name) {
                warn!(tool = %tc.name, agent = %persona.role, "Tool outside persona's subset");
                ToolResult::error(format!(
                    "Tool '{}' is not available to {}. Available tools: {}",
                    tc.name,
                    persona.role,
                    persona.tool_names().join(", ")
                ))
            } else {
                let ctx = ToolContext {
                    run_id: self.run_id.clone(),
                    agent_role: persona.role.clone(),
                };
                match self.tools.execute(&tc.name, input, ctx).await {
                    Ok(r) => r,
                    Err(e) => {
                        error!(tool = %tc.name, error = %e, "Tool execution failed");
                        ToolResult::error(e.to_string())
                    }
                }
            };

            let result = ToolResult {
                content: truncate_output(&result.content, self.config.max_tool_output_chars),
                is_error: result.is_error,
            };

            self.publish(CrewEvent::ToolEnd {
                name: tc.name.clone(),
                result: result.clone(),
            });

            blocks.push(ContentBlock::ToolResult {
                tool_use_id: tc.id.clone(),
                content: result.content,
                is_error: result.is_error,
            });
        }

        blocks
    }

    /// Await `fut`, failing with `MaxDurationExceeded` once the task's time is spent.
    async fn within_deadline<T>(
        &self,
        start: Instant,
        max_duration: Duration,
        fut: impl std::future::Future<Output = T>,
    ) -> Result<T> {
        let remaining = max_duration.saturating_sub(start.elapsed());
        match tokio::time::timeout(remaining, fut).await {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!(limit_secs = self.config.max_duration_secs, "Agent run exceeded its time limit");
                Err(ReliefError::MaxDurationExceeded(self.config.max_duration_secs))
            }
        }
    }

    /// Run a work item and return the persona's final answer.
    pub async fn run_task(&self, task: &WorkItem, context: &[TaskOutput]) -> Result<String> {
        let start = Instant::now();
        let max_duration = Duration::from_secs(self.config.max_duration_secs);
        let persona = &task.persona;
        let max_iterations = persona.max_iterations;

        let tool_names = persona.tool_names();
        let tool_defs = self.tools.definitions_for(&tool_names);
        if tool_defs.len() < tool_names.len() {
            debug!(
                agent = %persona.role,
                requested = tool_names.len(),
                available = tool_defs.len(),
                "Some persona tools are not registered"
            );
        }

        let mut messages = vec![
            ChatMessage::system(system_prompt(persona)),
            ChatMessage::user(task_prompt(task, context)),
        ];

        info!(task = %task.name, agent = %persona.role, tools = tool_defs.len(), "Agent run started");

        let mut round = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(ReliefError::Cancelled);
            }
            if start.elapsed() > max_duration {
                return Err(ReliefError::MaxDurationExceeded(self.config.max_duration_secs));
            }

            // Once the cap is spent the model answers without tools
            let final_round = round >= max_iterations || tool_defs.is_empty();
            let offered: &[ToolDefinition] = if final_round { &[] } else { &tool_defs };

            debug!(task = %task.name, round, final_round, "Starting agent turn");
            let turn = self
                .within_deadline(start, max_duration, self.stream_turn(&messages, offered))
                .await??;

            if turn.stop_reason == Some(StopReason::MaxTokens) {
                warn!(task = %task.name, "LLM hit max tokens");
            }

            if turn.tool_calls.is_empty() || final_round {
                if !turn.tool_calls.is_empty() {
                    warn!(task = %task.name, "Ignoring tool calls on the final turn");
                }
                let (input_tokens, output_tokens) = self.usage();
                info!(
                    task = %task.name,
                    rounds = round + 1,
                    input_tokens,
                    output_tokens,
                    "Agent run complete"
                );
                return Ok(turn.text);
            }

            let inputs: Vec<serde_json::Value> = turn
                .tool_calls
                .iter()
                .map(|tc| serde_json::from_str(&tc.input_json).unwrap_or(serde_json::Value::Null))
                .collect();

            let mut content = Vec::new();
            if !turn.text.is_empty() {
                content.push(ContentBlock::Text {
                    text: turn.text.clone(),
                });
            }
            for (tc, input) in turn.tool_calls.iter().zip(inputs.iter()) {
                content.push(ContentBlock::ToolUse {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    input: input.clone(),
                });
            }
            messages.push(ChatMessage {
                role: Role::Assistant,
                content,
                timestamp: Some(chrono::Utc::now()),
            });

            let results = self
                .within_deadline(start, max_duration, self.run_tools(persona, &turn.tool_calls, inputs))
                .await?;
            messages.push(ChatMessage {
                role: Role::User,
                content: results,
                timestamp: Some(chrono::Utc::now()),
            });

            round += 1;
            if round >= max_iterations {
                messages.push(ChatMessage::user(FINAL_ANSWER_NUDGE));
            }
        }
    }
}

impl TaskExecutor for AgentRuntime {
    fn execute<'a>(
        &'a self,
        task: &'a WorkItem,
        context: &'a [TaskOutput],
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.run_task(task, context))
    }
}
