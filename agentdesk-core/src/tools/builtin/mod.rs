//! Built-in tools bound to the desk agents
//!
//! - `duckduckgo_search`: web search over DuckDuckGo's HTML endpoint
//! - `google_news_search`: latest headlines from the Google News RSS feed
//! - Yahoo Finance toolkit: price, recommendations, fundamentals, company info
//! - `summarize_csv`: descriptive statistics for a CSV file
//! - `transfer_task_to_<member>`: a team member behind a tool

pub mod agent_tool;
pub mod csv_summary;
pub mod duckduckgo;
pub mod google_news;
pub mod yfinance;

pub use agent_tool::{agent_tool, member_tool_name};
pub use csv_summary::{ColumnStats, CsvSummary, Table, csv_summary_tool, summarize_csv};
pub use duckduckgo::duckduckgo_tool;
pub use google_news::google_news_tool;
pub use yfinance::{FinanceFeatures, yfinance_tools};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::result::{ToolError, ToolErrorKind};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

/// Remove markup and decode the common HTML entities
pub(crate) fn strip_tags(html: &str) -> String {
    let text = TAG_RE.replace_all(html, "");
    decode_entities(text.trim())
}

pub(crate) fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Required string argument
pub(crate) fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    args.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ToolError::new(ToolErrorKind::Validation, format!("{} parameter is required", field))
        })
}

/// Optional result cap, clamped to `1..=limit`
pub(crate) fn max_results_arg(args: &Value, default: usize, limit: usize) -> usize {
    args.get("max_results")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(default)
        .clamp(1, limit.max(1))
}
