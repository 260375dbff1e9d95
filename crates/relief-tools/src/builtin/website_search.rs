use std::collections::HashSet;

use futures::future::BoxFuture;
use serde::Deserialize;

use relief_core::error::{Result, ReliefError};
use relief_core::traits::Tool;
use relief_core::types::{ToolContext, ToolResult};

use super::page::{fetch_text, http_client};

const DEFAULT_MAX_RESULTS: usize = 5;
const PASSAGE_MAX_CHARS: usize = 1200;

/// Search within the content of a single website for passages matching a query.
pub struct WebsiteSearchTool {
    http: reqwest::Client,
}

impl WebsiteSearchTool {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: http_client("website_search")?,
        })
    }
}

#[derive(Deserialize)]
struct WebsiteSearchInput {
    website: String,
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Split page text into one passage per line, chunking overlong lines by words.
fn passages(text: &str) -> Vec<String> {
    let mut out = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.len() <= PASSAGE_MAX_CHARS {
            out.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in line.split_whitespace() {
            if !current.is_empty() && current.len() + word.len() + 1 > PASSAGE_MAX_CHARS {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    out
}

/// Rank passages by how many distinct query terms they contain.
///
/// Passages with no overlap are dropped; ties keep page order.
pub fn rank_passages(text: &str, query: &str, k: usize) -> Vec<String> {
    let wanted = terms(query);
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, usize, String)> = passages(text)
        .into_iter()
        .enumerate()
        .filter_map(|(pos, p)| {
            let score = terms(&p).intersection(&wanted).count();
            (score > 0).then_some((score, pos, p))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().take(k).map(|(_, _, p)| p).collect()
}

impl Tool for WebsiteSearchTool {
    fn name(&self) -> &str {
        "website_search"
    }

    fn timeout_secs(&self) -> u64 {
        60
    }

    fn description(&self) -> &str {
        "Semantic search within a specific website's content. Returns the passages most relevant to the query."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "website": {
                    "type": "string",
                    "description": "URL of the website to search"
                },
                "query": {
                    "type": "string",
                    "description": "What to look for on the website"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum passages to return (default 5)"
                }
            },
            "required": ["website", "query"]
        })
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let params: WebsiteSearchInput = serde_json::from_value(input)
                .map_err(|e| ReliefError::ToolValidation(e.to_string()))?;
            if params.query.trim().is_empty() {
                return Err(ReliefError::ToolValidation("'query' must not be empty".into()));
            }

            let text = fetch_text(&self.http, self.name(), &params.website).await?;
            let k = params.max_results.unwrap_or(DEFAULT_MAX_RESULTS).max(1);
            let hits = rank_passages(&text, &params.query, k);

            if hits.is_empty() {
                return Ok(ToolResult::success(format!(
                    "No passages on {} matched '{}'.",
                    params.website, params.query
                )));
            }

            let body = hits
                .iter()
                .enumerate()
                .map(|(i, p)| format!("[{}] {}", i + 1, p))
                .collect::<Vec<_>>()
                .join("\n\n");
            Ok(ToolResult::success(format!(
                "Relevant content from {}:\n\n{}",
                params.website, body
            )))
        })
    }
}
