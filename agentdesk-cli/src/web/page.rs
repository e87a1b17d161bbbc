//! Single-page HTML for a desk

use agentdesk_core::agent::ToolCallSummary;
use agentdesk_core::history::{ExportFormat, HistoryLog};
use agentdesk_core::registry::{AgentChoice, Desk};
use agentdesk_core::render::Rendered;
use agentdesk_core::tools::builtin::Table;
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

/// Rows shown in the uploaded table preview
pub const PREVIEW_ROWS: usize = 20;

const CHART_WIDTH: f64 = 640.0;
const CHART_HEIGHT: f64 = 220.0;
const CHART_COLORS: [&str; 6] = [
    "#58a6ff", "#3fb950", "#d29922", "#f85149", "#bc8cff", "#39c5cf",
];

/// Result of the last upload
#[derive(Debug, Clone)]
pub struct UploadView {
    pub file_name: String,
    pub summary: String,
    pub table: Option<Table>,
}

/// Everything one page render needs
#[derive(Debug)]
pub struct PageView<'a> {
    pub desk: Desk,
    pub selected: AgentChoice,
    pub query: &'a str,
    /// Shown instead of the form when the desk cannot run agents
    pub banner: Option<&'a str>,
    pub result: Option<&'a Rendered>,
    pub history: &'a HistoryLog,
    pub upload: Option<&'a UploadView>,
}

impl<'a> PageView<'a> {
    pub fn new(desk: Desk, history: &'a HistoryLog) -> Self {
        Self {
            desk,
            selected: desk.choices()[0],
            query: "",
            banner: None,
            result: None,
            history,
            upload: None,
        }
    }
}

/// Render the full page
pub fn render_page(view: &PageView<'_>) -> String {
    let desk = view.desk;
    let main = match view.banner {
        Some(banner) => format!(r#"<div class="banner error">{}</div>"#, text(banner)),
        None => {
            let mut main = query_form(view);
            if let Some(result) = view.result {
                main.push_str(&result_block(result));
            }
            if desk.keeps_history() {
                main.push_str(&history_block(view.history));
            }
            if desk.accepts_uploads() {
                main.push_str(&upload_block(view.upload));
            }
            main
        }
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
  * {{ margin: 0; padding: 0; box-sizing: border-box; }}
  body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, monospace; background: #0d1117; color: #c9d1d9; display: flex; min-height: 100vh; }}
  aside {{ width: 240px; background: #161b22; border-right: 1px solid #30363d; padding: 24px 16px; }}
  aside h2 {{ font-size: 14px; color: #8b949e; text-transform: uppercase; margin-bottom: 12px; }}
  aside label {{ display: block; padding: 6px 0; cursor: pointer; }}
  main {{ flex: 1; padding: 24px 32px; max-width: 1100px; }}
  h1 {{ color: #58a6ff; margin-bottom: 4px; font-size: 24px; }}
  .subtitle {{ color: #8b949e; margin-bottom: 24px; }}
  .card {{ background: #161b22; border: 1px solid #30363d; border-radius: 8px; padding: 16px; margin-bottom: 16px; }}
  .card h3 {{ color: #8b949e; font-size: 14px; margin-bottom: 8px; }}
  textarea {{ width: 100%; min-height: 90px; background: #0d1117; color: #c9d1d9; border: 1px solid #30363d; border-radius: 6px; padding: 8px; font: inherit; }}
  button {{ margin-top: 8px; background: #238636; color: #fff; border: 0; border-radius: 6px; padding: 8px 16px; cursor: pointer; }}
  pre {{ white-space: pre-wrap; word-wrap: break-word; font-family: inherit; }}
  pre.stats {{ font-family: monospace; }}
  .banner {{ border-radius: 6px; padding: 10px 14px; margin-bottom: 16px; }}
  .banner.error {{ background: #3d1418; border: 1px solid #f85149; color: #ffa198; }}
  .banner.warning {{ background: #3b2e08; border: 1px solid #d29922; color: #e3b341; }}
  #spinner {{ display: none; color: #58a6ff; margin-top: 8px; }}
  details {{ margin-bottom: 12px; }}
  summary {{ cursor: pointer; color: #8b949e; }}
  table {{ width: 100%; border-collapse: collapse; font-size: 13px; }}
  th {{ text-align: left; color: #8b949e; padding: 6px 8px; border-bottom: 1px solid #30363d; }}
  td {{ padding: 6px 8px; border-bottom: 1px solid #21262d; }}
  .ok {{ color: #3fb950; }}
  .failed {{ color: #f85149; }}
  .meta {{ color: #8b949e; font-size: 12px; }}
  a {{ color: #58a6ff; }}
</style>
</head>
<body>
{sidebar}
<main>
<h1>{title}</h1>
<p class="subtitle">{subtitle}</p>
{main}
</main>
<script>
  const form = document.getElementById('query-form');
  if (form) {{
    form.addEventListener('submit', () => {{
      const picked = document.querySelector('input[name="choice"]:checked');
      const label = picked ? picked.dataset.label : 'agent';
      const spinner = document.getElementById('spinner');
      spinner.textContent = 'Running ' + label + '... please wait';
      spinner.style.display = 'block';
    }});
  }}
</script>
</body>
</html>"#,
        title = text(desk.title()),
        subtitle = text(desk.subtitle()),
        sidebar = sidebar(view),
        main = main,
    )
}

fn sidebar(view: &PageView<'_>) -> String {
    let options: String = view
        .desk
        .choices()
        .iter()
        .map(|choice| {
            format!(
                r#"<label><input type="radio" form="query-form" name="choice" value="{slug}" data-label="{label}"{checked}> {label}</label>"#,
                slug = choice.slug(),
                label = attr(choice.label()),
                checked = if *choice == view.selected { " checked" } else { "" },
            )
        })
        .collect();
    format!(r#"<aside><h2>Agent Selection</h2>{}</aside>"#, options)
}

fn query_form(view: &PageView<'_>) -> String {
    let desk = view.desk;
    format!(
        r#"<form id="query-form" class="card" method="post" action="/run">
<h3>{label}</h3>
<textarea name="query" placeholder="{placeholder}">{query}</textarea>
<button type="submit">{button}</button>
<div id="spinner"></div>
</form>"#,
        label = text(desk.input_label()),
        placeholder = attr(desk.placeholder()),
        query = text(view.query),
        button = text(desk.button_label()),
    )
}

fn result_block(result: &Rendered) -> String {
    match result {
        Rendered::Content {
            agent,
            text: content,
            tool_calls,
        } => {
            let calls = tool_calls
                .as_deref()
                .map(tool_calls_block)
                .unwrap_or_default();
            format!(
                r#"<div class="card"><h3>{}</h3>{}<pre class="result">{}</pre></div>"#,
                text(agent),
                calls,
                text(content)
            )
        }
        Rendered::Warning(message) => {
            format!(r#"<div class="banner warning">{}</div>"#, text(message))
        }
        Rendered::Error(message) => {
            format!(r#"<div class="banner error">{}</div>"#, text(message))
        }
    }
}

fn tool_calls_block(calls: &[ToolCallSummary]) -> String {
    if calls.is_empty() {
        return String::new();
    }
    let items: String = calls
        .iter()
        .map(|call| {
            let status = if call.success { "ok" } else { "failed" };
            format!(
                r#"<li><code>{}({})</code> <span class="{status}">{status}</span> <span class="meta">{}ms</span></li>"#,
                text(&call.tool_name),
                text(&call.arguments.to_string()),
                call.duration_ms
            )
        })
        .collect();
    format!(
        r#"<details><summary>Tool calls ({})</summary><ul>{}</ul></details>"#,
        calls.len(),
        items
    )
}

fn history_block(history: &HistoryLog) -> String {
    if history.is_empty() {
        return String::new();
    }
    let entries: String = history
        .recent_first()
        .map(|entry| {
            format!(
                r#"<details><summary>{} &middot; {} &middot; {}</summary><pre>{}</pre></details>"#,
                entry.time.format("%Y-%m-%d %H:%M:%S"),
                text(&entry.agent),
                text(&entry.topic),
                text(&entry.result)
            )
        })
        .collect();
    let downloads: String = [ExportFormat::Markdown, ExportFormat::Text]
        .iter()
        .map(|format| {
            format!(
                r#"<a href="/download/{}" download="{}">Download {}</a> "#,
                format.extension(),
                format.file_name(),
                format.file_name()
            )
        })
        .collect();
    format!(
        r#"<div class="card"><h3>History ({})</h3>{}<p>{}</p></div>"#,
        history.len(),
        entries,
        downloads
    )
}

fn upload_block(upload: Option<&UploadView>) -> String {
    let mut block = String::from(
        r#"<div class="card"><h3>Upload a CSV file</h3>
<form method="post" action="/upload" enctype="multipart/form-data">
<input type="file" name="file" accept=".csv,text/csv">
<button type="submit">Upload</button>
</form>"#,
    );

    if let Some(upload) = upload {
        block.push_str(&format!(
            r#"<p class="meta">{}</p><pre class="stats">{}</pre>"#,
            text(&upload.file_name),
            text(&upload.summary)
        ));
        if let Some(table) = &upload.table {
            block.push_str(&chart(table));
            block.push_str(&preview_table(table));
        }
    }

    block.push_str("</div>");
    block
}

fn preview_table(table: &Table) -> String {
    let head: String = table
        .headers()
        .iter()
        .map(|h| format!("<th>{}</th>", text(h)))
        .collect();
    let body: String = table
        .rows()
        .iter()
        .take(PREVIEW_ROWS)
        .map(|row| {
            let cells: String = row
                .iter()
                .map(|cell| format!("<td>{}</td>", text(cell)))
                .collect();
            format!("<tr>{}</tr>", cells)
        })
        .collect();
    let more = if table.len() > PREVIEW_ROWS {
        format!(
            r#"<p class="meta">Showing {} of {} rows</p>"#,
            PREVIEW_ROWS,
            table.len()
        )
    } else {
        String::new()
    };
    format!(
        "<table><thead><tr>{}</tr></thead><tbody>{}</tbody></table>{}",
        head, body, more
    )
}

/// Line chart of every numeric column, one point per present value
fn chart(table: &Table) -> String {
    let columns: Vec<(String, Vec<f64>)> = table
        .numeric_columns()
        .into_iter()
        .filter(|(_, values)| values.iter().any(|v| v.is_finite()))
        .collect();
    if columns.is_empty() || table.len() < 2 {
        return String::new();
    }

    let finite = columns
        .iter()
        .flat_map(|(_, values)| values.iter().copied())
        .filter(|v| v.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let span = if max > min { max - min } else { 1.0 };
    let step = CHART_WIDTH / (table.len() - 1) as f64;

    let mut lines = String::new();
    let mut legend = String::new();
    for (i, (name, values)) in columns.iter().enumerate() {
        let color = CHART_COLORS[i % CHART_COLORS.len()];
        let points: Vec<String> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(x, v)| {
                let y = CHART_HEIGHT - (v - min) / span * CHART_HEIGHT;
                format!("{:.1},{:.1}", x as f64 * step, y)
            })
            .collect();
        lines.push_str(&format!(
            r#"<polyline fill="none" stroke="{}" stroke-width="1.5" points="{}"/>"#,
            color,
            points.join(" ")
        ));
        legend.push_str(&format!(
            r#"<span style="color:{}">&#9632; {}</span> "#,
            color,
            text(name)
        ));
    }

    format!(
        r#"<svg class="chart" viewBox="0 0 {w} {h}" width="100%" height="{h}" preserveAspectRatio="none">{lines}</svg><p class="meta">{legend}</p>"#,
        w = CHART_WIDTH,
        h = CHART_HEIGHT,
        lines = lines,
        legend = legend,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_page_has_no_history_or_upload() {
        let history = HistoryLog::new();
        let html = render_page(&PageView::new(Desk::Market, &history));

        assert!(html.contains("Multi-Agent Financial &amp; Web Analysis Tool"));
        assert!(html.contains("Agent Selection"));
        assert!(html.contains(r#"value="team""#));
        assert!(!html.contains(r#"value="analyst""#));
        assert!(!html.contains("Upload a CSV file"));
        assert!(html.contains("please wait"));
    }

    #[test]
    fn test_content_is_escaped_and_whitespace_kept() {
        let history = HistoryLog::new();
        let result = Rendered::Content {
            agent: "Web Agent".into(),
            text: "<script>alert(1)</script>\n| a |".into(),
            tool_calls: Some(vec![]),
        };
        let view = PageView {
            result: Some(&result),
            ..PageView::new(Desk::Research, &history)
        };
        let html = render_page(&view);

        assert!(html.contains(r#"<pre class="result">&lt;script&gt;alert(1)&lt;/script&gt;"#));
        assert!(!html.contains("<script>alert(1)"));
        assert!(!html.contains("Tool calls ("));
    }

    #[test]
    fn test_banner_replaces_form() {
        let history = HistoryLog::new();
        let view = PageView {
            banner: Some("GROQ_API_KEY is missing from environment variables."),
            ..PageView::new(Desk::Research, &history)
        };
        let html = render_page(&view);

        assert!(html.contains("GROQ_API_KEY is missing"));
        assert!(!html.contains(r#"action="/run""#));
    }

    #[test]
    fn test_history_newest_first_with_downloads() {
        let mut history = HistoryLog::new();
        history.record("Web Agent", "first topic", "one");
        history.record("News Agent", "second topic", "two");
        let html = render_page(&PageView::new(Desk::Research, &history));

        let first = html.find("first topic").unwrap();
        let second = html.find("second topic").unwrap();
        assert!(second < first);
        assert!(html.contains("History (2)"));
        assert!(html.contains(r#"href="/download/md""#));
        assert!(html.contains(r#"href="/download/txt""#));
    }

    #[test]
    fn test_upload_preview_and_chart() {
        let history = HistoryLog::new();
        let table = Table::new(
            vec!["day".into(), "close".into()],
            vec![
                vec!["mon".into(), "1".into()],
                vec!["tue".into(), "3".into()],
            ],
        );
        let upload = UploadView {
            file_name: "prices.csv".into(),
            summary: "stats".into(),
            table: Some(table),
        };
        let view = PageView {
            upload: Some(&upload),
            ..PageView::new(Desk::Research, &history)
        };
        let html = render_page(&view);

        assert!(html.contains("<th>close</th>"));
        assert!(html.contains("<td>tue</td>"));
        assert!(html.contains("<polyline"));
        assert!(html.contains(r#"<pre class="stats">stats</pre>"#));
    }
}
