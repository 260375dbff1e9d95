use futures::future::BoxFuture;
use serde::Deserialize;

use relief_core::error::{Result, ReliefError};
use relief_core::traits::Tool;
use relief_core::types::{ToolContext, ToolResult};

use super::page::{fetch_text, http_client, truncate_chars};

const DEFAULT_MAX_LENGTH: usize = 30_000;

/// Read the full text content of a web page.
pub struct ScrapeWebsiteTool {
    http: reqwest::Client,
}

impl ScrapeWebsiteTool {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: http_client("scrape_website")?,
        })
    }
}

#[derive(Deserialize)]
struct ScrapeInput {
    website_url: String,
    #[serde(default)]
    max_length: Option<usize>,
}

impl Tool for ScrapeWebsiteTool {
    fn name(&self) -> &str {
        "scrape_website"
    }

    fn timeout_secs(&self) -> u64 {
        60
    }

    fn description(&self) -> &str {
        "Read a website's content. Returns the page as plain text, truncated to max_length."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "website_url": {
                    "type": "string",
                    "description": "Full URL of the page to read"
                },
                "max_length": {
                    "type": "integer",
                    "description": "Maximum characters to return (default: 30000)"
                }
            },
            "required": ["website_url"]
        })
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let params: ScrapeInput = serde_json::from_value(input)
                .map_err(|e| ReliefError::ToolValidation(e.to_string()))?;

            let text = fetch_text(&self.http, self.name(), &params.website_url).await?;
            if text.is_empty() {
                return Ok(ToolResult::error(format!(
                    "{} returned no readable text",
                    params.website_url
                )));
            }

            let max_length = params.max_length.unwrap_or(DEFAULT_MAX_LENGTH);
            Ok(ToolResult::success(truncate_chars(&text, max_length)))
        })
    }
}
