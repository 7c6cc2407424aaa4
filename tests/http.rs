//! HTTP API tests.
//!
//! Each test starts the real router on an ephemeral port, backed by a real
//! SQLite store in a temp dir and a fake renderer, and drives it with
//! `reqwest`. No browser is needed; see `e2e.rs` for Chromium coverage.

use async_trait::async_trait;
use futures::StreamExt;
use report_vault::server::{build_router, AppState};
use report_vault::{
    BoundedRenderer, PdfRenderer, ReportError, ReportService, ServiceConfig, SqliteBlobStore,
    TokenAuthority,
};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

const FAKE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj << >> endobj\n%%EOF\n";

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Returns a fixed PDF, optionally holding each render until released.
struct FakeRenderer {
    gate: Option<Arc<Notify>>,
    started: Arc<Notify>,
}

impl FakeRenderer {
    fn instant() -> Self {
        Self {
            gate: None,
            started: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl PdfRenderer for FakeRenderer {
    async fn render(&self, html: &str) -> Result<Vec<u8>, ReportError> {
        assert!(html.contains("<html"), "renderer got an un-normalised document");
        self.started.notify_one();
        if let Some(ref gate) = self.gate {
            gate.notified().await;
        }
        Ok(FAKE_PDF.to_vec())
    }
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    _dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        Self::with_renderer(Arc::new(FakeRenderer::instant())).await
    }

    async fn with_renderer(renderer: Arc<dyn PdfRenderer>) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let dir = TempDir::new().unwrap();
        let config = ServiceConfig::builder()
            .storage_path(dir.path().join("reports.db"))
            .chunk_size(1024)
            .token_secret("integration-secret")
            .build()
            .unwrap();
        let store = SqliteBlobStore::open(&config.storage_path, config.chunk_size)
            .await
            .unwrap();
        let service = ReportService::new(Arc::new(store), renderer);
        let state = AppState::new(service, TokenAuthority::from_config(&config));
        let app = build_router(state, config.max_body_bytes);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn token(&self) -> String {
        let resp = self
            .client
            .post(self.url("/admin-login"))
            .json(&json!({ "username": "admin", "password": "admin123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn submit(&self, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/submit-report"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn list(&self, token: &str, query: &str) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/all-reports{query}")))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }
}

async fn error_message(resp: reqwest::Response) -> String {
    let body: Value = resp.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

// ── Public routes ────────────────────────────────────────────────────────────

#[tokio::test]
async fn root_returns_greeting() {
    let srv = TestServer::start().await;
    let resp = tokio_test::assert_ok!(srv.client.get(srv.url("/")).send().await);
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains("running"));
}

#[tokio::test]
async fn folder_catalog_lists_fifteen() {
    let srv = TestServer::start().await;
    let body: Value = srv
        .client
        .get(srv.url("/folders"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 15);
    assert_eq!(entries[0]["key"], "liquid_ir");
    assert_eq!(entries[14]["folder"], 15);
    assert!(entries[14]["key"].is_null());
}

// ── Auth ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let srv = TestServer::start().await;
    let resp = srv
        .client
        .post(srv.url("/admin-login"))
        .json(&json!({ "username": "admin", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(resp).await, "Invalid credentials");
}

#[tokio::test]
async fn protected_routes_fail_closed() {
    let srv = TestServer::start().await;

    let no_token = srv
        .client
        .post(srv.url("/submit-report"))
        .json(&json!({ "html": "<p>x</p>", "folder": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(no_token.status(), StatusCode::UNAUTHORIZED);

    let bad = srv.list("not.a.token", "").await;
    assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);

    let forged = TokenAuthority::new(
        "some-other-secret",
        3600,
        report_vault::AdminAccount::new("admin", "admin123"),
    )
    .issue("admin")
    .unwrap();
    let resp = srv
        .client
        .delete(srv.url("/delete-report/01ARZ3NDEKTSV4RRFFQ69G5FAV"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ── Submit / list / download / delete ────────────────────────────────────────

#[tokio::test]
async fn full_report_lifecycle() {
    let srv = TestServer::start().await;
    let token = srv.token().await;

    let resp = srv
        .submit(
            &token,
            json!({
                "html": "<h1>Weld 14</h1><table><tr><td>OK</td></tr></table>",
                "reportType": "weld_ir",
                "folder": 3,
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let file_id = resp.json::<Value>().await.unwrap()["fileId"]
        .as_str()
        .unwrap()
        .to_string();

    let listed: Value = srv.list(&token, "?folder=11").await.json().await.unwrap();
    let rows = listed.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["fileId"], file_id.as_str());
    assert_eq!(rows[0]["folder"], 11);
    assert!(rows[0]["filename"].as_str().unwrap().starts_with("weld_ir_"));
    assert!(rows[0]["uploadDate"].is_string());

    let resp = srv
        .client
        .get(srv.url(&format!("/get-pdf/{file_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "application/pdf");
    assert_eq!(
        resp.headers()["content-length"].to_str().unwrap(),
        FAKE_PDF.len().to_string()
    );
    assert!(resp.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .starts_with("inline; filename=\"weld_ir_"));
    let mut body = Vec::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(body, FAKE_PDF);

    let resp = srv
        .client
        .delete(srv.url(&format!("/delete-report/{file_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.json::<Value>().await.unwrap()["message"].is_string());

    let again = srv
        .client
        .delete(srv.url(&format!("/delete-report/{file_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let gone = srv
        .client
        .get(srv.url(&format!("/get-pdf/{file_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn listing_is_newest_first_and_filterable() {
    let srv = TestServer::start().await;
    let token = srv.token().await;

    let mut ids = Vec::new();
    for folder in [json!(2), json!("2"), json!(5)] {
        let resp = srv.submit(&token, json!({ "html": "<p>x</p>", "folder": folder })).await;
        assert_eq!(resp.status(), StatusCode::OK);
        ids.push(resp.json::<Value>().await.unwrap()["fileId"].clone());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let all: Value = srv.list(&token, "").await.json().await.unwrap();
    let order: Vec<&Value> = all.as_array().unwrap().iter().map(|r| &r["fileId"]).collect();
    assert_eq!(order, vec![&ids[2], &ids[1], &ids[0]]);

    let two: Value = srv.list(&token, "?folder=2").await.json().await.unwrap();
    assert_eq!(two.as_array().unwrap().len(), 2);

    let empty: Value = srv.list(&token, "?folder=15").await.json().await.unwrap();
    assert!(empty.as_array().unwrap().is_empty());

    let bad = srv.list(&token, "?folder=abc").await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn validation_errors_are_400() {
    let srv = TestServer::start().await;
    let token = srv.token().await;

    let resp = srv.submit(&token, json!({ "html": "<p>x</p>" })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(resp).await.contains("classification"));

    let resp = srv
        .submit(&token, json!({ "html": "<p>x</p>", "folder": 16 }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = srv.submit(&token, json!({ "reportType": "visual_ir" })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(resp).await, "Missing html content");

    let resp = srv
        .client
        .post(srv.url("/submit-report"))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_id_is_a_generic_failure() {
    let srv = TestServer::start().await;
    let resp = srv
        .client
        .get(srv.url("/get-pdf/definitely-not-an-id"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_message(resp).await.contains("not found"));
}

// ── Admission control ────────────────────────────────────────────────────────

#[tokio::test]
async fn saturated_render_pool_returns_503() {
    let gate = Arc::new(Notify::new());
    let fake = Arc::new(FakeRenderer {
        gate: Some(gate.clone()),
        started: Arc::new(Notify::new()),
    });
    let started = fake.started.clone();
    let pool = BoundedRenderer::new(fake, 1, 0);
    let srv = Arc::new(TestServer::with_renderer(Arc::new(pool)).await);
    let token = srv.token().await;

    let first = {
        let srv = Arc::clone(&srv);
        let token = token.clone();
        tokio::spawn(async move {
            srv.submit(&token, json!({ "html": "<p>slow</p>", "folder": 1 }))
                .await
                .status()
        })
    };
    started.notified().await;

    let second = srv
        .submit(&token, json!({ "html": "<p>fast</p>", "folder": 1 }))
        .await;
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);

    gate.notify_one();
    assert_eq!(first.await.unwrap(), StatusCode::OK);
}
