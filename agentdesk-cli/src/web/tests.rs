use super::*;
use agentdesk_core::config::DeskConfig;
use agentdesk_core::error::{DeskError, Result};
use agentdesk_core::llm::{LLMProvider, LLMRequest, LLMResponse};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

struct FakeProvider {
    replies: Mutex<VecDeque<Result<LLMResponse>>>,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn new(replies: Vec<Result<LLMResponse>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LLMProvider for FakeProvider {
    async fn generate_request(&self, _request: &LLMRequest) -> Result<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DeskError::Llm("no reply queued".into())))
    }
}

fn reply(content: &str) -> Result<LLMResponse> {
    Ok(LLMResponse {
        content: Some(content.to_string()),
        ..Default::default()
    })
}

fn ready_state(desk: Desk, provider: Arc<FakeProvider>, upload: UploadConfig) -> Arc<AppState> {
    let registry = AgentRegistry::with_provider(&DeskConfig::default(), provider).unwrap();
    Arc::new(AppState::new(desk, Backend::Ready(Arc::new(registry)), upload))
}

const SESSION: &str = "desk_session=6f1f8d3e-8a51-4c1e-9d3b-2b7f0f4b9c11";

async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

fn post_run(choice: &str, query: &str) -> Request<Body> {
    Request::post("/run")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, SESSION)
        .body(Body::from(format!(
            "choice={}&query={}",
            choice,
            query.replace(' ', "+")
        )))
        .unwrap()
}

fn get_page(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::COOKIE, SESSION)
        .body(Body::empty())
        .unwrap()
}

fn post_csv(file_name: &str, content: &str) -> Request<Body> {
    let boundary = "deskboundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
        b = boundary,
        f = file_name,
        c = content
    );
    Request::post("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .header(header::COOKIE, SESSION)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_index_issues_session_cookie() {
    let state = ready_state(Desk::Market, FakeProvider::new(vec![]), UploadConfig::default());
    let request = Request::get("/").body(Body::empty()).unwrap();
    let (status, headers, body) = send(router(state), request).await;

    assert_eq!(status, StatusCode::OK);
    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("desk_session="));
    assert!(body.contains("Run Analysis"));
}

#[tokio::test]
async fn test_existing_cookie_is_not_reissued() {
    let state = ready_state(Desk::Market, FakeProvider::new(vec![]), UploadConfig::default());
    let (_, headers, _) = send(router(state), get_page("/")).await;
    assert!(headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_blank_query_warns_without_calling_agent() {
    let provider = FakeProvider::new(vec![reply("unused")]);
    let state = ready_state(Desk::Research, provider.clone(), UploadConfig::default());
    let (status, _, body) = send(router(state.clone()), post_run("web", "   ")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Please enter a query first."));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    assert!(state.sessions.snapshot(&session_id()).await.history.is_empty());
}

fn session_id() -> String {
    SESSION.trim_start_matches("desk_session=").to_string()
}

#[tokio::test]
async fn test_run_records_history_and_downloads_latest() {
    let provider = FakeProvider::new(vec![reply("first answer"), reply("# Second\n\n| a |")]);
    let state = ready_state(Desk::Research, provider, UploadConfig::default());

    send(router(state.clone()), post_run("news", "AI chips")).await;
    let (_, _, body) = send(router(state.clone()), post_run("finance", "NVDA")).await;

    assert!(body.contains("# Second"));
    assert!(body.contains("History (2)"));

    let (status, headers, md) = send(router(state.clone()), get_page("/download/md")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(md, "# Second\n\n| a |");
    assert_eq!(
        headers.get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"agent_result.md\""
    );

    let (_, _, txt) = send(router(state.clone()), get_page("/download/txt")).await;
    assert_eq!(txt, md);

    let history = state.sessions.snapshot(&session_id()).await.history;
    assert_eq!(history.latest().unwrap().agent, "Finance Agent");
    assert_eq!(history.latest().unwrap().topic, "NVDA");
}

#[tokio::test]
async fn test_failed_run_shows_error_and_records_nothing() {
    let provider = FakeProvider::new(vec![Err(DeskError::Llm("rate limited".into()))]);
    let state = ready_state(Desk::Research, provider, UploadConfig::default());

    let (status, _, body) = send(router(state.clone()), post_run("web", "anything")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Error: LLM error: rate limited"));
    let (status, _, _) = send(router(state), get_page("/download/md")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_choice_outside_desk_is_rejected() {
    let provider = FakeProvider::new(vec![reply("unused")]);
    let state = ready_state(Desk::Market, provider.clone(), UploadConfig::default());

    let (status, _, body) = send(router(state), post_run("analyst", "describe")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Error: "));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_market_desk_keeps_no_history() {
    let provider = FakeProvider::new(vec![reply("answer")]);
    let state = ready_state(Desk::Market, provider, UploadConfig::default());

    let (_, _, body) = send(router(state.clone()), post_run("team", "Analyze TSLA")).await;
    assert!(body.contains("answer"));
    assert!(!body.contains("History ("));

    let (status, _, _) = send(router(state), get_page("/download/md")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unconfigured_desk_shows_banner() {
    let state = Arc::new(AppState::new(
        Desk::Research,
        Backend::Unconfigured("GROQ_API_KEY is missing from environment variables.".into()),
        UploadConfig::default(),
    ));

    let (status, _, body) = send(router(state.clone()), post_run("web", "hello")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("GROQ_API_KEY is missing from environment variables."));

    let (_, _, health) = send(router(state), get_page("/health")).await;
    let health: serde_json::Value = serde_json::from_str(&health).unwrap();
    assert_eq!(health["status"], "unconfigured");
    assert_eq!(health["desk"], "research");
}

#[tokio::test]
async fn test_upload_summarizes_csv() {
    let dir = tempfile::tempdir().unwrap();
    let upload = UploadConfig {
        path: dir.path().join("upload.csv"),
        max_bytes: 1024,
    };
    let state = ready_state(Desk::Research, FakeProvider::new(vec![]), upload.clone());

    let (status, _, body) = send(
        router(state.clone()),
        post_csv("prices.csv", "day,close\nmon,10\ntue,12\n"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("prices.csv"));
    assert!(body.contains("11.000000"));
    assert!(body.contains("<td>tue</td>"));
    assert!(upload.path.exists());

    let (_, _, page) = send(router(state), get_page("/")).await;
    assert!(page.contains("11.000000"));
}

#[tokio::test]
async fn test_malformed_upload_shows_error_text() {
    let dir = tempfile::tempdir().unwrap();
    let upload = UploadConfig {
        path: dir.path().join("upload.csv"),
        max_bytes: 1024,
    };
    let state = ready_state(Desk::Research, FakeProvider::new(vec![]), upload);

    let (status, _, body) = send(router(state), post_csv("bad.csv", "a,b\n1,2,3\n")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"<pre class="stats">Error: "#));
    assert!(!body.contains("<tbody>"));
}

#[tokio::test]
async fn test_oversized_upload_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let upload = UploadConfig {
        path: dir.path().join("upload.csv"),
        max_bytes: 8,
    };
    let state = ready_state(Desk::Research, FakeProvider::new(vec![]), upload.clone());

    let (_, _, body) = send(router(state), post_csv("big.csv", "a,b\n1,2\n3,4\n")).await;

    assert!(body.contains("the limit is 8 bytes"));
    assert!(!upload.path.exists());
}

#[tokio::test]
async fn test_market_desk_refuses_uploads() {
    let state = ready_state(Desk::Market, FakeProvider::new(vec![]), UploadConfig::default());
    let (status, _, _) = send(router(state), post_csv("x.csv", "a\n1\n")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reports_ready() {
    let state = ready_state(Desk::Market, FakeProvider::new(vec![]), UploadConfig::default());
    let (status, _, body) = send(router(state), get_page("/health")).await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["desk"], "market");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uploads_each_see_their_own_file() {
    let dir = tempfile::tempdir().unwrap();
    let upload = UploadConfig {
        path: dir.path().join("upload.csv"),
        max_bytes: 4096,
    };
    let state = ready_state(Desk::Research, FakeProvider::new(vec![]), upload);

    for round in 0..10 {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let app = router(state.clone());
                let column = format!("col_{}_{}", round, i);
                tokio::spawn(async move {
                    let csv = format!("{},value\nx,{}\ny,{}\n", column, i, i + 1);
                    let (_, _, body) = send(app, post_csv("data.csv", &csv)).await;
                    (column, body)
                })
            })
            .collect();

        for handle in handles {
            let (column, body) = handle.await.unwrap();
            assert!(
                body.contains(&format!("<th>{}</th>", column)),
                "upload {} was summarized from another file",
                column
            );
        }
    }
}
