//! Google News search over the public RSS feed

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use super::{decode_entities, max_results_arg, required_str, strip_tags};
use crate::config::ToolSettings;
use crate::error::Result;
use crate::tools::{
    BoxedTool, HandlerTool, ToolError, ToolExecutionContext, ToolHandler, ToolMetadata, ToolSchema,
};

static ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<item>([\s\S]*?)</item>").expect("valid item regex"));
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<title>([\s\S]*?)</title>").expect("valid title regex"));
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<link>([\s\S]*?)</link>").expect("valid link regex"));
static PUB_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<pubDate>([\s\S]*?)</pubDate>").expect("valid date regex"));
static SOURCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<source[^>]*>([\s\S]*?)</source>").expect("valid source regex"));

/// Feed edition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsLanguage {
    English,
    French,
}

impl NewsLanguage {
    /// Parse a language code, falling back to English
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "fr" | "french" | "fr-fr" => NewsLanguage::French,
            _ => NewsLanguage::English,
        }
    }

    /// `(hl, gl, ceid)` query parameters of the edition
    fn edition(self) -> (&'static str, &'static str, &'static str) {
        match self {
            NewsLanguage::English => ("en", "US", "US:en"),
            NewsLanguage::French => ("fr", "FR", "FR:fr"),
        }
    }
}

/// One feed item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub published: Option<String>,
    pub source: Option<String>,
}

struct GoogleNewsSearch {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

#[async_trait]
impl ToolHandler for GoogleNewsSearch {
    async fn handle(&self, args: Value, _ctx: &ToolExecutionContext) -> std::result::Result<Value, ToolError> {
        let query = required_str(&args, "query")?;
        let limit = max_results_arg(&args, self.max_results, 25);
        let language = args
            .get("language")
            .and_then(Value::as_str)
            .map(NewsLanguage::from_code)
            .unwrap_or(NewsLanguage::English);
        let (hl, gl, ceid) = language.edition();

        tracing::info!("Searching Google News ({}) for: {}", hl, query);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("hl", hl), ("gl", gl), ("ceid", ceid)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::transient(format!(
                "Google News request failed with status: {}",
                response.status()
            )));
        }

        let feed = response.text().await?;
        let items = parse_feed(&feed, limit);
        if items.is_empty() {
            return Ok(Value::String(format!("No news found for: {}", query)));
        }

        serde_json::to_value(items).map_err(|e| ToolError::internal(e.to_string()))
    }
}

/// Extract `<item>` entries from an RSS document
pub fn parse_feed(xml: &str, limit: usize) -> Vec<NewsItem> {
    ITEM_RE
        .captures_iter(xml)
        .filter_map(|caps| {
            let body = &caps[1];
            let title = field(&TITLE_RE, body)?;
            let link = field(&LINK_RE, body).unwrap_or_default();
            Some(NewsItem {
                title,
                link,
                published: field(&PUB_DATE_RE, body),
                source: field(&SOURCE_RE, body),
            })
        })
        .take(limit)
        .collect()
}

fn field(re: &Regex, body: &str) -> Option<String> {
    let raw = re.captures(body)?.get(1)?.as_str().trim();
    let raw = raw
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(raw);
    let text = strip_tags(&decode_entities(raw));
    (!text.is_empty()).then_some(text)
}

/// Build the `google_news_search` tool
pub fn google_news_tool(settings: &ToolSettings) -> Result<BoxedTool> {
    let handler = GoogleNewsSearch {
        client: settings.http_client()?,
        base_url: settings.google_news_url.clone(),
        max_results: settings.max_results,
    };

    Ok(Arc::new(HandlerTool::new(
        ToolMetadata::new("google_news_search", "Search Google News for the latest articles on a topic.")
            .with_hint("Set language to \"fr\" for the French edition.")
            .with_returns("A list of items with title, link, publication date and source")
            .with_tag("news"),
        ToolSchema::new(json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The topic to search for" },
                "language": {
                    "type": "string",
                    "enum": ["en", "fr"],
                    "description": "Feed edition (default en)"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of items (default 5)",
                    "minimum": 1,
                    "maximum": 25
                }
            },
            "required": ["query"]
        })),
        handler,
    )))
}
