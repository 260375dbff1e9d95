use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use relief_core::error::{Result, ReliefError};
use relief_core::traits::Tool;
use relief_core::types::{ToolContext, ToolResult};

const SERPER_URL: &str = "https://google.serper.dev/search";

/// Internet search through the Serper Google search API.
pub struct WebSearchTool {
    api_key: String,
    http: reqwest::Client,
    endpoint: String,
}

impl WebSearchTool {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            endpoint: SERPER_URL.to_string(),
        }
    }

    /// Point the tool at a different search endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn failure(message: impl ToString) -> ReliefError {
        ReliefError::ToolExecution {
            tool: "web_search".into(),
            message: message.to_string(),
        }
    }
}

/// Render Serper's `organic` results (plus the answer box, if any) as text.
pub fn format_results(body: &serde_json::Value, max: usize) -> String {
    let mut sections = Vec::new();

    if let Some(answer) = body["answerBox"]["answer"]
        .as_str()
        .or_else(|| body["answerBox"]["snippet"].as_str())
    {
        sections.push(format!("Answer: {}", answer));
    }

    if let Some(organic) = body["organic"].as_array() {
        sections.extend(organic.iter().take(max).map(|r| {
            format!(
                "**{}**\n{}\nURL: {}",
                r["title"].as_str().unwrap_or(""),
                r["snippet"].as_str().unwrap_or(""),
                r["link"].as_str().unwrap_or("")
            )
        }));
    }

    if sections.is_empty() {
        "No results found.".into()
    } else {
        sections.join("\n\n---\n\n")
    }
}

impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the internet for current information. Returns titles, snippets, and links."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results (default 5)",
                    "default": 5
                }
            },
            "required": ["query"]
        })
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let query = input["query"]
                .as_str()
                .filter(|q| !q.trim().is_empty())
                .ok_or_else(|| ReliefError::ToolValidation("'query' must be a string".into()))?;
            let max = input["max_results"].as_u64().unwrap_or(5).clamp(1, 20) as usize;

            debug!(query, max, "Searching the web");

            let resp = self
                .http
                .post(&self.endpoint)
                .header("X-API-KEY", &self.api_key)
                .json(&json!({ "q": query, "num": max }))
                .send()
                .await
                .map_err(Self::failure)?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(Self::failure(format!("HTTP {}: {}", status, text)));
            }

            let body: serde_json::Value = resp.json().await.map_err(Self::failure)?;
            Ok(ToolResult::success(format_results(&body, max)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_organic_results() {
        let body = json!({
            "organic": [
                { "title": "Quake relief update", "snippet": "Aid convoys reach the valley.", "link": "https://news.example/a" },
                { "title": "Shelter map", "snippet": "Twelve shelters open.", "link": "https://maps.example/b" },
                { "title": "Third", "snippet": "dropped", "link": "https://x.example/c" }
            ]
        });
        let text = format_results(&body, 2);
        assert!(text.contains("**Quake relief update**"));
        assert!(text.contains("URL: https://maps.example/b"));
        assert!(!text.contains("dropped"));
        assert_eq!(text.matches("---").count(), 1);
    }

    #[test]
    fn answer_box_comes_first() {
        let body = json!({
            "answerBox": { "answer": "7.8 magnitude" },
            "organic": [{ "title": "t", "snippet": "s", "link": "l" }]
        });
        assert!(format_results(&body, 5).starts_with("Answer: 7.8 magnitude"));
    }

    #[test]
    fn empty_body_reports_no_results() {
        assert_eq!(format_results(&json!({}), 5), "No results found.");
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let tool = WebSearchTool::new("key");
        let ctx = ToolContext {
            run_id: relief_core::types::RunId::new(),
            agent_role: "Data Collector".into(),
        };
        let err = tool.execute(json!({ "query": "  " }), ctx).await.unwrap_err();
        assert!(matches!(err, ReliefError::ToolValidation(_)));
    }
}
