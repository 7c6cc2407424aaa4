//! HTTP surface.
//!
//! | Route | Auth | |
//! |-------|------|-|
//! | `GET /` | none | liveness text |
//! | `GET /folders` | none | folder catalog |
//! | `POST /admin-login` | none | `{username, password}` → `{token}` |
//! | `POST /submit-report` | bearer | `SubmitRequest` → `{fileId}` |
//! | `GET /all-reports?folder=` | bearer | newest-first listing |
//! | `GET /get-pdf/:fileId` | **none** | PDF byte stream |
//! | `DELETE /delete-report/:fileId` | bearer | `{message}` |
//!
//! `get-pdf` is unauthenticated while listing and deletion are not. Existing
//! clients link to downloads directly, so the asymmetry is kept; put the
//! service behind an authenticating proxy if artifact ids must stay private.

pub mod handlers;
pub mod response;

use crate::auth::TokenAuthority;
use crate::service::ReportService;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Shared per-request state.
#[derive(Clone)]
pub struct AppState {
    pub service: ReportService,
    pub auth: Arc<TokenAuthority>,
}

impl AppState {
    pub fn new(service: ReportService, auth: TokenAuthority) -> Self {
        Self {
            service,
            auth: Arc::new(auth),
        }
    }
}

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/folders", get(handlers::folders))
        .route("/admin-login", post(handlers::admin_login))
        .route("/submit-report", post(handlers::submit_report))
        .route("/all-reports", get(handlers::all_reports))
        .route("/get-pdf/:file_id", get(handlers::get_pdf))
        .route("/delete-report/:file_id", delete(handlers::delete_report))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves, then drain.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server drained");
    Ok(())
}
