//! Personas, work items, and run outputs of a crew.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Topic label used by the command-line prompt.
pub const CLI_TOPIC_LABEL: &str = "Topic";
/// Topic label used by the web form.
pub const WEB_TOPIC_LABEL: &str = "Disaster Relief Topic";

/// Name of a tool as registered in the tool registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolRef(pub String);

impl ToolRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A specialized agent: what it is, what it wants, and what it may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    #[serde(default)]
    pub tools: Vec<ToolRef>,
    pub max_iterations: u32,
    #[serde(default)]
    pub allow_delegation: bool,
}

impl Persona {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(ToolRef::as_str).collect()
    }

    pub fn may_use(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t.0 == tool)
    }
}

/// One unit of work assigned to a persona.
///
/// Equality is structural and recurses through `context`. Use
/// [`Arc::ptr_eq`] to test whether two handles are the same item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub name: String,
    pub persona: Arc<Persona>,
    pub description: String,
    pub expected_output: String,
    /// Earlier items whose outputs are fed forward, in order.
    pub context: Vec<Arc<WorkItem>>,
}

/// The single free-text payload threaded through a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputBundle(String);

impl InputBundle {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// `"{label}: {topic}\nDetailed Questions: {details}"`
    pub fn compose(label: &str, topic: &str, details: &str) -> Self {
        Self(format!("{}: {}\nDetailed Questions: {}", label, topic, details))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for InputBundle {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for InputBundle {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl fmt::Display for InputBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output of one completed work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub name: String,
    pub agent_role: String,
    pub raw: String,
}

/// Output of a whole run. `raw` is the terminal item's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewOutput {
    pub raw: String,
    pub tasks_output: Vec<TaskOutput>,
}

/// Lifecycle of a work item within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed(TaskOutput),
}

impl TaskState {
    pub fn output(&self) -> Option<&TaskOutput> {
        match self {
            TaskState::Completed(out) => Some(out),
            _ => None,
        }
    }
}

/// How a crew walks its work items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Process {
    /// Submission order, one at a time.
    #[default]
    Sequential,
}
