//! Session history and result export
//!
//! Successful runs are appended in arrival order. Nothing is ever removed.
//! Exports carry the most recent result verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DeskError;

/// One successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub time: DateTime<Utc>,
    /// Choice label the user picked
    pub agent: String,
    pub topic: String,
    pub result: String,
}

/// Download formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Text,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
            ExportFormat::Text => "text/plain; charset=utf-8",
        }
    }

    pub fn file_name(self) -> String {
        format!("agent_result.{}", self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "txt" | "text" => Ok(ExportFormat::Text),
            other => Err(DeskError::UnknownChoice(format!("unknown export format: {}", other))),
        }
    }
}

/// A file offered for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub content_type: &'static str,
    pub content: String,
}

/// Append-only log of successful runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a successful run, stamped now
    pub fn record(
        &mut self,
        agent: impl Into<String>,
        topic: impl Into<String>,
        result: impl Into<String>,
    ) -> &HistoryEntry {
        self.push(HistoryEntry {
            time: Utc::now(),
            agent: agent.into(),
            topic: topic.into(),
            result: result.into(),
        })
    }

    /// Append a prepared entry
    pub fn push(&mut self, entry: HistoryEntry) -> &HistoryEntry {
        tracing::debug!(agent = %entry.agent, entries = self.entries.len() + 1, "History entry recorded");
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// Entries, newest first
    pub fn recent_first(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().rev()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The latest result as a download; `None` before the first success
    pub fn export(&self, format: ExportFormat) -> Option<Download> {
        self.latest().map(|entry| Download {
            file_name: format.file_name(),
            content_type: format.content_type(),
            content: entry.result.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log_has_nothing_to_export() {
        let log = HistoryLog::new();
        assert!(log.is_empty());
        assert!(log.latest().is_none());
        assert!(log.export(ExportFormat::Markdown).is_none());
    }

    #[test]
    fn test_recent_first_and_latest() {
        let mut log = HistoryLog::new();
        for i in 1..=3 {
            log.record("Web Agent", format!("topic {}", i), format!("result {}", i));
        }

        assert_eq!(log.len(), 3);
        let topics: Vec<&str> = log.recent_first().map(|e| e.topic.as_str()).collect();
        assert_eq!(topics, vec!["topic 3", "topic 2", "topic 1"]);
        assert_eq!(log.latest().unwrap().result, "result 3");
    }

    #[test]
    fn test_exports_are_identical_and_verbatim() {
        let mut log = HistoryLog::new();
        let result = "# Report\n\n| a | b |\n|---|---|\n| 1 | 2 |\n";
        log.record("Finance Agent", "NVDA", result);

        let md = log.export(ExportFormat::Markdown).unwrap();
        let txt = log.export(ExportFormat::Text).unwrap();
        assert_eq!(md.file_name, "agent_result.md");
        assert_eq!(txt.file_name, "agent_result.txt");
        assert_eq!(md.content, result);
        assert_eq!(md.content.as_bytes(), txt.content.as_bytes());
        assert!(txt.content_type.starts_with("text/plain"));
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("TXT".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
