//! DuckDuckGo web search over the HTML endpoint

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use super::{max_results_arg, required_str, strip_tags};
use crate::config::ToolSettings;
use crate::error::Result;
use crate::tools::{
    BoxedTool, HandlerTool, ToolError, ToolExecutionContext, ToolHandler, ToolMetadata, ToolSchema,
};

// <a class="result__a" href="...">Title</a>
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<a[^>]*class="[^"]*result__a[^"]*"[^>]*href="([^"]+)"[^>]*>([\s\S]*?)</a>"#)
        .expect("valid link regex")
});

static SNIPPET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<a[^>]*class="[^"]*result__snippet[^"]*"[^>]*>([\s\S]*?)</a>"#)
        .expect("valid snippet regex")
});

/// One search hit
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

struct DuckDuckGoSearch {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

#[async_trait]
impl ToolHandler for DuckDuckGoSearch {
    async fn handle(&self, args: Value, _ctx: &ToolExecutionContext) -> std::result::Result<Value, ToolError> {
        let query = required_str(&args, "query")?;
        let limit = max_results_arg(&args, self.max_results, 25);

        tracing::info!("Searching DuckDuckGo for: {}", query);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::transient(format!(
                "DuckDuckGo search failed with status: {}",
                response.status()
            )));
        }

        let html = response.text().await?;
        let hits = parse_results(&html, limit);
        Ok(Value::String(format_hits(query, &hits)))
    }
}

/// Extract result links and snippets from a DuckDuckGo HTML page
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let snippets: Vec<String> = SNIPPET_RE
        .captures_iter(html)
        .map(|caps| strip_tags(&caps[1]))
        .collect();

    LINK_RE
        .captures_iter(html)
        .take(limit)
        .enumerate()
        .map(|(i, caps)| SearchHit {
            title: strip_tags(&caps[2]),
            url: decode_redirect_url(&caps[1]),
            snippet: snippets.get(i).cloned().unwrap_or_default(),
        })
        .collect()
}

/// Unwrap DuckDuckGo's `/l/?uddg=<encoded>` redirect links
pub fn decode_redirect_url(href: &str) -> String {
    let href = super::decode_entities(href);
    if let Some(start) = href.find("uddg=") {
        let encoded = &href[start + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    if href.starts_with("//") {
        return format!("https:{}", href);
    }
    href
}

fn format_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for: {}", query);
    }

    let mut lines = vec![format!("Search results for: {} (via DuckDuckGo)", query)];
    for (i, hit) in hits.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, hit.title));
        lines.push(format!("   {}", hit.url));
        if !hit.snippet.is_empty() {
            lines.push(format!("   {}", hit.snippet));
        }
    }
    lines.join("\n")
}

/// Build the `duckduckgo_search` tool
pub fn duckduckgo_tool(settings: &ToolSettings) -> Result<BoxedTool> {
    let handler = DuckDuckGoSearch {
        client: settings.http_client()?,
        base_url: settings.duckduckgo_url.clone(),
        max_results: settings.max_results,
    };

    Ok(std::sync::Arc::new(HandlerTool::new(
        ToolMetadata::new("duckduckgo_search", "Search the web with DuckDuckGo.")
            .with_hint("Use to find current information and its sources.")
            .with_returns("Numbered results with title, URL and snippet")
            .with_tag("search"),
        ToolSchema::new(json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query" },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results (default 5)",
                    "minimum": 1,
                    "maximum": 25
                }
            },
            "required": ["query"]
        })),
        handler,
    )))
}
