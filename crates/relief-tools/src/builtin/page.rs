//! Page fetching and HTML-to-text conversion shared by the website tools.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use relief_core::error::{Result, ReliefError};

const USER_AGENT: &str = concat!("relief-crew/", env!("CARGO_PKG_VERSION"));

/// HTTP client with the timeout and user agent the website tools use.
pub fn http_client(tool: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ReliefError::ToolExecution {
            tool: tool.to_string(),
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Fetch a URL and return its readable text. HTML bodies are stripped to text.
pub async fn fetch_text(http: &reqwest::Client, tool: &str, url: &str) -> Result<String> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ReliefError::ToolValidation(format!(
            "'{}' is not an http(s) URL",
            url
        )));
    }

    debug!(tool, url, "Fetching page");

    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| ReliefError::ToolExecution {
            tool: tool.to_string(),
            message: format!("Request failed: {}", e),
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ReliefError::ToolExecution {
            tool: tool.to_string(),
            message: format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ),
        });
    }

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = resp.text().await.map_err(|e| ReliefError::ToolExecution {
        tool: tool.to_string(),
        message: format!("Failed to read response body: {}", e),
    })?;

    Ok(if content_type.contains("html") || looks_like_html(&body) {
        strip_html_tags(&body)
    } else {
        body
    })
}

fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    head.starts_with("<!") || head.to_ascii_lowercase().starts_with("<html")
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex is valid"))
}

/// Strip tags, scripts, and styles; decode common entities; collapse blank runs.
pub fn strip_html_tags(html: &str) -> String {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    static STYLE: OnceLock<Regex> = OnceLock::new();
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();
    static BLANKS: OnceLock<Regex> = OnceLock::new();

    let cleaned = regex(&SCRIPT, r"(?is)<script[^>]*>.*?</script>").replace_all(html, "");
    let cleaned = regex(&STYLE, r"(?is)<style[^>]*>.*?</style>").replace_all(&cleaned, "");
    // Block-level closers become line breaks so paragraphs survive
    let cleaned = regex(&BLOCK, r"(?i)</(p|div|li|h[1-6]|tr|section|article)>|<br\s*/?>")
        .replace_all(&cleaned, "\n");
    let text = regex(&TAG, r"<[^>]+>").replace_all(&cleaned, "");

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    let text = regex(&SPACES, r"[ \t]+").replace_all(&text, " ");
    let text = text
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    let text = regex(&BLANKS, r"\n{3,}").replace_all(&text, "\n\n");

    text.trim().to_string()
}

/// Truncate on a char boundary, noting the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n\n[truncated at {} chars]", &text[..cut], max_chars),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_styles_and_tags() {
        let html = r#"<html><head><style>p{color:red}</style><script>var x = 1;</script></head>
<body><h1>Shelter status</h1><p>District 4 &amp; 5 need water.</p><p>Roads&nbsp;closed.</p></body></html>"#;
        let text = strip_html_tags(html);
        assert!(!text.contains("color"));
        assert!(!text.contains("var x"));
        assert!(text.contains("Shelter status"));
        assert!(text.contains("District 4 & 5 need water."));
        assert!(text.contains("Roads closed."));
        assert!(!text.contains('<'));
    }

    #[test]
    fn keeps_paragraph_breaks() {
        let text = strip_html_tags("<p>one</p><p>two</p>");
        assert_eq!(text, "one\ntwo");
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_chars("short", 10), "short");
        let cut = truncate_chars("éééé", 2);
        assert!(cut.starts_with("éé\n\n[truncated at 2 chars]"));
    }

    #[test]
    fn detects_html_without_content_type() {
        assert!(looks_like_html("  <!DOCTYPE html><html></html>"));
        assert!(looks_like_html("<HTML><body>x</body></HTML>"));
        assert!(!looks_like_html("{\"json\": true}"));
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let http = http_client("scrape_website").unwrap();
        let err = fetch_text(&http, "scrape_website", "file:///etc/passwd")
            .await
            .unwrap_err();
        assert!(matches!(err, ReliefError::ToolValidation(_)));
    }
}
