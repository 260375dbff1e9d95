//! Server-side rendering of the relief form page.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::static_files::page_template;

pub const BLANK_INPUT_MESSAGE: &str = "Please fill all the fields.";
pub const BUSY_MESSAGE: &str =
    "A relief run is already in progress. Please wait for it to finish and try again.";
pub const RESULTS_HEADING: &str = "Results of your disaster relief project:";

/// What the page shows below the run button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Empty,
    Error(String),
    Busy,
    Results(String),
}

/// Escape text for an HTML body or attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the page with the submitted details kept in the textarea.
pub fn render(topic: &str, details: &str, outcome: &Outcome) -> String {
    let (notice, results) = match outcome {
        Outcome::Empty => (String::new(), String::new()),
        Outcome::Error(msg) => (
            format!(r#"<div class="notice error" role="alert">{}</div>"#, escape_html(msg)),
            String::new(),
        ),
        Outcome::Busy => (
            format!(r#"<div class="notice busy" role="status">{}</div>"#, BUSY_MESSAGE),
            String::new(),
        ),
        Outcome::Results(text) => (
            String::new(),
            format!(
                r#"<section class="results"><h3>{}</h3><pre>{}</pre></section>"#,
                RESULTS_HEADING,
                escape_html(text)
            ),
        ),
    };

    let topic = escape_html(topic);
    let details = escape_html(details);
    match page_template() {
        Some(template) => fill(
            &template,
            &[
                ("topic", topic.as_str()),
                ("details", details.as_str()),
                ("notice", notice.as_str()),
                ("results", results.as_str()),
            ],
        ),
        None => format!(
            "<!DOCTYPE html><title>Disaster Relief Assistant</title><h1>Disaster Relief Assistant</h1>{}{}",
            notice, results
        ),
    }
}

/// Fill `{{name}}` placeholders in one pass. Inserted values are never rescanned;
/// unknown names are left as they are.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[open..open + 2 + close + 2]),
        }
        rest = &after[close + 2..];
    }

    out.push_str(rest);
    out
}

/// Rendered page as a response.
pub fn respond(status: StatusCode, topic: &str, details: &str, outcome: &Outcome) -> Response {
    (status, Html(render(topic, details, outcome))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script> & 'y'"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#39;y&#39;"
        );
    }

    #[test]
    fn empty_page_has_form_labels() {
        let html = render("Earthquake Disaster Relief", "", &Outcome::Empty);
        assert!(html.contains("<title>Disaster Relief Assistant</title>"));
        assert!(html.contains("Enter Relief Details"));
        assert!(html.contains("Run Relief Operations"));
        assert!(html.contains("<textarea"));
        assert!(!html.contains(RESULTS_HEADING));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn results_are_escaped() {
        let html = render("t", "d", &Outcome::Results("<b>Plan C</b>".into()));
        assert!(html.contains(RESULTS_HEADING));
        assert!(html.contains("&lt;b&gt;Plan C&lt;/b&gt;"));
        assert!(!html.contains("<b>Plan C</b>"));
    }

    #[test]
    fn details_with_placeholder_text_are_not_expanded() {
        let html = render("t", "{{results}}", &Outcome::Results("Plan C".into()));
        assert_eq!(html.matches(RESULTS_HEADING).count(), 1);
        assert!(html.contains(">{{results}}</textarea>"));
    }

    #[test]
    fn results_with_placeholder_text_are_shown_verbatim() {
        let html = render("t", "USERTEXT", &Outcome::Results("Step 1: {{details}}".into()));
        assert!(html.contains("<pre>Step 1: {{details}}</pre>"));
        assert_eq!(html.matches("USERTEXT").count(), 1);
    }

    #[test]
    fn notice_with_placeholder_text_is_shown_verbatim() {
        let html = render("t", "d", &Outcome::Error("bad {{results}} {{topic}}".into()));
        assert!(html.contains("bad {{results}} {{topic}}"));
        assert!(!html.contains(RESULTS_HEADING));
    }

    #[test]
    fn fill_handles_unknown_and_unclosed_placeholders() {
        let out = fill("a {{x}} {{y}} {{z", &[("x", "{{y}}")]);
        assert_eq!(out, "a {{y}} {{y}} {{z");
    }

    #[test]
    fn error_notice() {
        let html = render("t", "", &Outcome::Error(BLANK_INPUT_MESSAGE.into()));
        assert!(html.contains(BLANK_INPUT_MESSAGE));
        assert!(html.contains("notice error"));
    }
}
