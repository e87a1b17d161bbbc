//! Descriptive statistics for CSV files
//!
//! Numeric columns get count, mean, sample standard deviation, min,
//! quartiles (linear interpolation) and max. When a file has no numeric
//! column, the text columns are described with count, unique, top and freq
//! instead.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::required_str;
use crate::error::{DeskError, Result};
use crate::tools::{
    BoxedTool, HandlerTool, ToolError, ToolExecutionContext, ToolHandler, ToolMetadata, ToolSchema,
};

/// Cells read as missing values
const MISSING: &[&str] = &["", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None"];

const NUMERIC_LABELS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];
const TEXT_LABELS: [&str; 4] = ["count", "unique", "top", "freq"];

fn is_missing(cell: &str) -> bool {
    MISSING.contains(&cell.trim())
}

/// A parsed CSV file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table from headers and rows
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Load a CSV file with a header row
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path.as_ref())?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() {
            return Err(DeskError::Other("No columns to parse from file".to_string()));
        }

        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column(&self, index: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
    }

    /// Non-missing values of a column, if every one of them is a number
    fn numeric_values(&self, index: usize) -> Option<Vec<f64>> {
        let mut values = Vec::new();
        for cell in self.column(index).filter(|cell| !is_missing(cell)) {
            values.push(cell.trim().parse::<f64>().ok()?);
        }
        (!values.is_empty()).then_some(values)
    }

    /// Numeric columns with their non-missing values, in column order
    pub fn numeric_columns(&self) -> Vec<(String, Vec<f64>)> {
        self.headers
            .iter()
            .enumerate()
            .filter_map(|(i, name)| self.numeric_values(i).map(|values| (name.clone(), values)))
            .collect()
    }
}

/// Statistics for one column
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnStats {
    Numeric {
        name: String,
        count: usize,
        mean: f64,
        std: f64,
        min: f64,
        q25: f64,
        q50: f64,
        q75: f64,
        max: f64,
    },
    Text {
        name: String,
        count: usize,
        unique: usize,
        top: Option<String>,
        freq: Option<usize>,
    },
}

impl ColumnStats {
    fn numeric(name: &str, mut values: Vec<f64>) -> Self {
        values.sort_by(|a, b| a.total_cmp(b));
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (squares / (count - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        ColumnStats::Numeric {
            name: name.to_string(),
            count,
            mean,
            std,
            min: values[0],
            q25: quantile(&values, 0.25),
            q50: quantile(&values, 0.5),
            q75: quantile(&values, 0.75),
            max: values[count - 1],
        }
    }

    fn text<'a>(name: &str, cells: impl Iterator<Item = &'a str>) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut first_seen: Vec<&str> = Vec::new();
        let mut count = 0;

        for cell in cells.filter(|cell| !is_missing(cell)) {
            count += 1;
            let entry = counts.entry(cell).or_insert(0);
            if *entry == 0 {
                first_seen.push(cell);
            }
            *entry += 1;
        }

        // ties go to the value seen first
        let mut top: Option<(&str, usize)> = None;
        for value in &first_seen {
            let freq = counts[value];
            if top.is_none_or(|(_, best)| freq > best) {
                top = Some((value, freq));
            }
        }

        ColumnStats::Text {
            name: name.to_string(),
            count,
            unique: first_seen.len(),
            top: top.map(|(value, _)| value.to_string()),
            freq: top.map(|(_, freq)| freq),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ColumnStats::Numeric { name, .. } | ColumnStats::Text { name, .. } => name,
        }
    }

    fn cells(&self) -> Vec<String> {
        match self {
            ColumnStats::Numeric {
                count,
                mean,
                std,
                min,
                q25,
                q50,
                q75,
                max,
                ..
            } => [*count as f64, *mean, *std, *min, *q25, *q50, *q75, *max]
                .iter()
                .map(|v| format!("{:.6}", v))
                .collect(),
            ColumnStats::Text {
                count,
                unique,
                top,
                freq,
                ..
            } => vec![
                count.to_string(),
                unique.to_string(),
                top.clone().unwrap_or_else(|| "NaN".to_string()),
                freq.map(|f| f.to_string()).unwrap_or_else(|| "NaN".to_string()),
            ],
        }
    }
}

/// Linear interpolation between the closest ranks of sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

/// Statistics for every described column of a table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsvSummary {
    pub columns: Vec<ColumnStats>,
}

impl CsvSummary {
    /// Describe the numeric columns, or the text columns when none is numeric
    pub fn describe(table: &Table) -> Self {
        let numeric = table.numeric_columns();
        let columns = if numeric.is_empty() {
            table
                .headers()
                .iter()
                .enumerate()
                .map(|(i, name)| ColumnStats::text(name, table.column(i)))
                .collect()
        } else {
            numeric
                .into_iter()
                .map(|(name, values)| ColumnStats::numeric(&name, values))
                .collect()
        };
        Self { columns }
    }

    fn is_numeric(&self) -> bool {
        matches!(self.columns.first(), Some(ColumnStats::Numeric { .. }))
    }

    /// Right-aligned text table, one row per statistic
    pub fn render(&self) -> String {
        let labels: &[&str] = if self.is_numeric() {
            &NUMERIC_LABELS
        } else {
            &TEXT_LABELS
        };
        let label_width = labels.iter().map(|l| l.len()).max().unwrap_or(0);

        let columns: Vec<(String, Vec<String>)> = self
            .columns
            .iter()
            .map(|c| (c.name().to_string(), c.cells()))
            .collect();
        let widths: Vec<usize> = columns
            .iter()
            .map(|(name, cells)| {
                cells
                    .iter()
                    .map(|c| c.chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut lines = Vec::with_capacity(labels.len() + 1);
        let mut header = " ".repeat(label_width);
        for ((name, _), width) in columns.iter().zip(&widths) {
            header.push_str(&format!("  {:>width$}", name, width = width));
        }
        lines.push(header);

        for (row, label) in labels.iter().enumerate() {
            let mut line = format!("{:<width$}", label, width = label_width);
            for ((_, cells), width) in columns.iter().zip(&widths) {
                line.push_str(&format!("  {:>width$}", cells[row], width = width));
            }
            lines.push(line);
        }

        lines.join("\n")
    }
}

/// Summarize a CSV file
///
/// Returns the rendered statistics and the parsed table. Any failure is
/// reported as an `Error: ...` string with no table.
pub fn summarize_csv(path: impl AsRef<Path>) -> (String, Option<Table>) {
    let path = path.as_ref();
    match Table::from_path(path) {
        Ok(table) => {
            let summary = CsvSummary::describe(&table);
            tracing::debug!(
                "Summarized {} ({} rows, {} columns described)",
                path.display(),
                table.len(),
                summary.columns.len()
            );
            (summary.render(), Some(table))
        }
        Err(e) => {
            tracing::warn!("Failed to summarize {}: {}", path.display(), e);
            (format!("Error: {}", e), None)
        }
    }
}

struct CsvSummaryHandler;

#[async_trait]
impl ToolHandler for CsvSummaryHandler {
    async fn handle(&self, args: Value, _ctx: &ToolExecutionContext) -> std::result::Result<Value, ToolError> {
        let path = PathBuf::from(required_str(&args, "path")?);
        let (text, _) = tokio::task::spawn_blocking(move || summarize_csv(path))
            .await
            .map_err(|e| ToolError::internal(e.to_string()))?;
        Ok(Value::String(text))
    }
}

/// Build the `summarize_csv` tool
pub fn csv_summary_tool() -> BoxedTool {
    Arc::new(HandlerTool::new(
        ToolMetadata::new("summarize_csv", "Compute descriptive statistics for a CSV file.")
            .with_hint("Pass the path of the uploaded file.")
            .with_returns("A text table of count, mean, std, min, quartiles and max per column")
            .with_tag("data"),
        ToolSchema::new(json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path to the CSV file" }
            },
            "required": ["path"]
        })),
        CsvSummaryHandler,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_numeric_statistics() {
        let file = csv_file(b"ticker,price,volume\nAAA,1,10\nBBB,2,\nCCC,3,30\nDDD,4,40\n");
        let table = Table::from_path(file.path()).unwrap();
        let summary = CsvSummary::describe(&table);

        assert_eq!(summary.columns.len(), 2);
        match &summary.columns[0] {
            ColumnStats::Numeric {
                name,
                count,
                mean,
                std,
                q25,
                q50,
                q75,
                ..
            } => {
                assert_eq!(name, "price");
                assert_eq!(*count, 4);
                assert!((mean - 2.5).abs() < 1e-9);
                assert!((std - 1.2909944).abs() < 1e-6);
                assert!((q25 - 1.75).abs() < 1e-9);
                assert!((q50 - 2.5).abs() < 1e-9);
                assert!((q75 - 3.25).abs() < 1e-9);
            }
            other => panic!("expected numeric stats, got {:?}", other),
        }
        match &summary.columns[1] {
            ColumnStats::Numeric { count, min, max, .. } => {
                assert_eq!(*count, 3);
                assert_eq!(*min, 10.0);
                assert_eq!(*max, 40.0);
            }
            other => panic!("expected numeric stats, got {:?}", other),
        }
    }

    #[test]
    fn test_render_layout() {
        let file = csv_file(b"x\n1\n2\n3\n");
        let (text, table) = summarize_csv(file.path());

        assert!(table.is_some());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[1], "count  3.000000");
        assert_eq!(lines[2], "mean   2.000000");
        assert_eq!(lines[3], "std    1.000000");
        assert_eq!(lines[8], "max    3.000000");
        assert!(lines[0].ends_with('x'));
    }

    #[test]
    fn test_single_value_std_is_nan() {
        let file = csv_file(b"x\n5\n");
        let (text, _) = summarize_csv(file.path());
        assert!(text.contains("std         NaN"));
    }

    #[test]
    fn test_text_columns_described_when_nothing_numeric() {
        let file = csv_file(b"side,venue\nbuy,NYSE\nsell,NYSE\nbuy,NASDAQ\nbuy,\n");
        let (text, table) = summarize_csv(file.path());
        let table = table.unwrap();
        let summary = CsvSummary::describe(&table);

        assert_eq!(
            summary.columns[0],
            ColumnStats::Text {
                name: "side".into(),
                count: 4,
                unique: 2,
                top: Some("buy".into()),
                freq: Some(3),
            }
        );
        assert_eq!(
            summary.columns[1],
            ColumnStats::Text {
                name: "venue".into(),
                count: 3,
                unique: 2,
                top: Some("NYSE".into()),
                freq: Some(2),
            }
        );
        assert!(text.starts_with("      "));
        assert!(text.contains("unique"));
    }

    #[test]
    fn test_header_only_file() {
        let file = csv_file(b"a,b\n");
        let (text, table) = summarize_csv(file.path());
        assert_eq!(table.unwrap().len(), 0);
        assert!(text.contains("NaN"));
    }

    #[test]
    fn test_errors_become_error_text() {
        let (text, table) = summarize_csv("/definitely/not/here.csv");
        assert!(text.starts_with("Error: "));
        assert!(table.is_none());

        let empty = csv_file(b"");
        let (text, table) = summarize_csv(empty.path());
        assert_eq!(text, "Error: No columns to parse from file");
        assert!(table.is_none());

        let ragged = csv_file(b"a,b\n1,2\n3\n");
        let (text, table) = summarize_csv(ragged.path());
        assert!(text.starts_with("Error: CSV error"));
        assert!(table.is_none());

        let binary = csv_file(&[b'a', b'\n', 0xff, 0xfe, 0x00, b'\n']);
        let (text, table) = summarize_csv(binary.path());
        assert!(text.starts_with("Error: "));
        assert!(table.is_none());
    }

    #[test]
    fn test_numeric_columns_skip_missing() {
        let table = Table::new(
            vec!["a".into(), "b".into()],
            vec![
                vec!["1".into(), "x".into()],
                vec!["NA".into(), "y".into()],
                vec!["3".into(), "z".into()],
            ],
        );
        assert_eq!(table.numeric_columns(), vec![("a".to_string(), vec![1.0, 3.0])]);
    }

    #[tokio::test]
    async fn test_tool_returns_error_text_instead_of_failing() {
        let tool = csv_summary_tool();
        let envelope = tool
            .execute(json!({ "path": "/no/such/file.csv" }), &ToolExecutionContext::new())
            .await
            .unwrap();
        assert!(envelope.is_success());
        assert!(envelope.to_model_text().starts_with("Error: "));
    }
}
