use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use relief_core::config::Credentials;
use relief_core::error::{Result, ReliefError};
use relief_core::traits::Tool;
use relief_core::types::{ToolContext, ToolDefinition, ToolResult};

use crate::builtin::{ScrapeWebsiteTool, WebSearchTool, WebsiteSearchTool};

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool.
    pub fn register(&mut self, tool: impl Tool) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Tool definitions for the named subset, in the order given.
    ///
    /// Names that are not registered are skipped.
    pub fn definitions_for<S: AsRef<str>>(&self, names: &[S]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|n| self.tools.get(n.as_ref()))
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Execute a tool by name, bounded by the tool's timeout.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| ReliefError::ToolNotFound(name.to_string()))?;

        let timeout = std::time::Duration::from_secs(tool.timeout_secs());

        match tokio::time::timeout(timeout, tool.execute(input, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(ReliefError::ToolTimeout {
                tool: name.to_string(),
                timeout_secs: tool.timeout_secs(),
            }),
        }
    }

    /// Registry with the research tools the data collector uses.
    ///
    /// `web_search` is only registered when a Serper key is configured.
    pub fn with_research_tools(credentials: &Credentials) -> Result<Self> {
        let mut registry = Self::new();

        match credentials.serper_key() {
            Ok(key) => registry.register(WebSearchTool::new(key)),
            Err(_) => debug!("No Serper key, web_search not registered"),
        }
        registry.register(WebsiteSearchTool::new()?);
        registry.register(ScrapeWebsiteTool::new()?);

        Ok(registry)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
