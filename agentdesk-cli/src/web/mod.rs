//! Page server for one desk
//!
//! Routes:
//! - `GET /` renders the desk
//! - `POST /run` submits a query to the selected agent
//! - `GET /download/:format` serves the latest result (`md` or `txt`)
//! - `POST /upload` summarizes a CSV file (research desk)
//! - `GET /health` reports readiness
//!
//! Agent calls run without holding the session lock, so one slow agent never
//! blocks other sessions. Uploads share one file path, so writing and
//! summarizing an upload happen under a single lock.

pub mod page;
pub mod session;

use agentdesk_core::config::UploadConfig;
use agentdesk_core::history::{ExportFormat, HistoryEntry};
use agentdesk_core::registry::{AgentChoice, AgentRegistry, Desk};
use agentdesk_core::render::Rendered;
use agentdesk_core::runner::QueryRunner;
use agentdesk_core::tools::builtin::summarize_csv;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Form, Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use page::{PageView, UploadView, render_page};
use session::{Session, SessionData, SessionStore};

/// Multipart framing allowance on top of the upload limit
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shown when an upload carries no file
pub const NO_FILE_WARNING: &str = "Please choose a CSV file first.";

/// Whether the desk can run agents
pub enum Backend {
    Ready(Arc<AgentRegistry>),
    /// Startup failed; the message is shown instead of the form
    Unconfigured(String),
}

/// Shared state of the page server
pub struct AppState {
    pub desk: Desk,
    pub backend: Backend,
    pub upload: UploadConfig,
    pub sessions: SessionStore,
    /// Serializes write-then-summarize on the shared upload path
    upload_lock: Mutex<()>,
}

impl AppState {
    pub fn new(desk: Desk, backend: Backend, upload: UploadConfig) -> Self {
        Self {
            desk,
            backend,
            upload,
            sessions: SessionStore::new(),
            upload_lock: Mutex::new(()),
        }
    }

    /// Forget sessions idle longer than `ttl`
    pub fn with_session_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.sessions = SessionStore::with_ttl(ttl);
        self
    }

    fn banner(&self) -> Option<&str> {
        match &self.backend {
            Backend::Ready(_) => None,
            Backend::Unconfigured(message) => Some(message),
        }
    }
}

/// Build the router for a desk
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.upload.max_bytes + FORM_OVERHEAD_BYTES;
    Router::new()
        .route("/", get(index))
        .route("/run", post(run))
        .route("/download/:format", get(download))
        .route("/upload", post(upload).layer(DefaultBodyLimit::max(body_limit)))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process exits
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let desk = state.desk;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%desk, "Desk page listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RunForm {
    #[serde(default)]
    choice: Option<String>,
    #[serde(default)]
    query: String,
}

/// Inputs of one page render beyond the session state
#[derive(Default)]
struct PageInput<'a> {
    selected: Option<AgentChoice>,
    query: &'a str,
    result: Option<&'a Rendered>,
}

fn page_response(
    state: &AppState,
    session: &Session,
    data: &SessionData,
    status: StatusCode,
    input: PageInput<'_>,
) -> Response {
    let mut view = PageView::new(state.desk, &data.history);
    if let Some(selected) = input.selected {
        view.selected = selected;
    }
    view.query = input.query;
    view.result = input.result;
    view.banner = state.banner();
    view.upload = data.upload.as_ref();

    let html = render_page(&view);
    with_cookie(
        session,
        (status, [(header::CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response(),
    )
}

fn with_cookie(session: &Session, mut response: Response) -> Response {
    if let Some(value) = session
        .set_cookie()
        .and_then(|cookie| HeaderValue::from_str(&cookie).ok())
    {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = Session::from_headers(&headers);
    let data = state.sessions.snapshot(&session.id).await;
    page_response(&state, &session, &data, StatusCode::OK, PageInput::default())
}

async fn run(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<RunForm>,
) -> Response {
    let session = Session::from_headers(&headers);

    let registry = match &state.backend {
        Backend::Ready(registry) => Arc::clone(registry),
        Backend::Unconfigured(_) => {
            let data = state.sessions.snapshot(&session.id).await;
            return page_response(
                &state,
                &session,
                &data,
                StatusCode::SERVICE_UNAVAILABLE,
                PageInput::default(),
            );
        }
    };

    let choice = match form.choice.as_deref() {
        Some(value) => state.desk.parse_choice(value),
        None => Ok(state.desk.choices()[0]),
    };
    let choice = match choice {
        Ok(choice) => choice,
        Err(e) => {
            tracing::warn!(desk = %state.desk, error = %e, "Rejected agent choice");
            let data = state.sessions.snapshot(&session.id).await;
            let rendered = Rendered::Error(format!("Error: {}", e));
            return page_response(
                &state,
                &session,
                &data,
                StatusCode::BAD_REQUEST,
                PageInput {
                    query: &form.query,
                    result: Some(&rendered),
                    ..Default::default()
                },
            );
        }
    };

    let mut runner = QueryRunner::new();
    let rendered = runner
        .submit(registry.runnable(choice).as_ref(), &form.query)
        .await;

    let data = match runner.state().response() {
        Some(response) if state.desk.keeps_history() => {
            let entry = HistoryEntry {
                time: Utc::now(),
                agent: choice.label().to_string(),
                topic: form.query.trim().to_string(),
                result: response.content.clone().unwrap_or_default(),
            };
            state.sessions.record(&session.id, entry).await
        }
        _ => state.sessions.snapshot(&session.id).await,
    };

    page_response(
        &state,
        &session,
        &data,
        StatusCode::OK,
        PageInput {
            selected: Some(choice),
            query: &form.query,
            result: Some(&rendered),
        },
    )
}

async fn download(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(format): Path<String>,
) -> Response {
    let Ok(format) = format.parse::<ExportFormat>() else {
        return (StatusCode::NOT_FOUND, "Unknown download format").into_response();
    };
    if !state.desk.keeps_history() {
        return (StatusCode::NOT_FOUND, "This desk keeps no history").into_response();
    }

    let session = Session::from_headers(&headers);
    let data = state.sessions.snapshot(&session.id).await;
    match data.history.export(format) {
        Some(file) => {
            let disposition = format!("attachment; filename=\"{}\"", file.file_name);
            (
                [
                    (header::CONTENT_TYPE, file.content_type.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                file.content,
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "No result to download yet").into_response(),
    }
}

async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !state.desk.accepts_uploads() {
        return (StatusCode::NOT_FOUND, "This desk does not accept uploads").into_response();
    }
    let session = Session::from_headers(&headers);

    let mut file = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                let file_name = field.file_name().unwrap_or("upload.csv").to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((file_name, bytes)),
                    Err(e) => return (e.status(), e.body_text()).into_response(),
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => return (e.status(), e.body_text()).into_response(),
        }
    }

    let (file_name, bytes) = match file {
        Some((name, bytes)) if !bytes.is_empty() => (name, bytes),
        _ => {
            let data = state.sessions.snapshot(&session.id).await;
            let rendered = Rendered::Warning(NO_FILE_WARNING.to_string());
            return page_response(
                &state,
                &session,
                &data,
                StatusCode::BAD_REQUEST,
                PageInput {
                    result: Some(&rendered),
                    ..Default::default()
                },
            );
        }
    };

    let summary = if bytes.len() > state.upload.max_bytes {
        UploadView {
            file_name,
            summary: format!(
                "Error: file is {} bytes; the limit is {} bytes",
                bytes.len(),
                state.upload.max_bytes
            ),
            table: None,
        }
    } else {
        let _guard = state.upload_lock.lock().await;
        summarize_upload(&state.upload, file_name, &bytes).await
    };

    tracing::info!(
        file = %summary.file_name,
        rows = summary.table.as_ref().map(|t| t.len()).unwrap_or(0),
        "CSV upload summarized"
    );
    let data = state.sessions.set_upload(&session.id, summary).await;
    page_response(&state, &session, &data, StatusCode::OK, PageInput::default())
}

/// Write the upload to the fixed path and summarize it
async fn summarize_upload(config: &UploadConfig, file_name: String, bytes: &[u8]) -> UploadView {
    if let Err(e) = tokio::fs::write(&config.path, bytes).await {
        tracing::error!(path = %config.path.display(), error = %e, "Failed to store upload");
        return UploadView {
            file_name,
            summary: format!("Error: {}", e),
            table: None,
        };
    }

    let path = config.path.clone();
    let (summary, table) = match tokio::task::spawn_blocking(move || summarize_csv(path)).await {
        Ok(result) => result,
        Err(e) => (format!("Error: {}", e), None),
    };
    UploadView {
        file_name,
        summary,
        table,
    }
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let configured = matches!(state.backend, Backend::Ready(_));
    Json(serde_json::json!({
        "status": if configured { "ok" } else { "unconfigured" },
        "desk": state.desk.slug(),
        "version": agentdesk_core::VERSION,
    }))
}

#[cfg(test)]
mod tests;
