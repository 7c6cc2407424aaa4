use super::response::{ApiError, Authenticated};
use super::AppState;
use crate::artifact::{ArtifactInfo, Folder};
use crate::error::ReportError;
use crate::pipeline::classify::{catalog, FolderEntry};
use crate::service::SubmitRequest;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

type ApiResult<T> = Result<T, ApiError>;

pub async fn root() -> &'static str {
    "report-vault is running"
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub async fn admin_login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(login) = body.map_err(body_rejected)?;
    let token = state.auth.login(&login.username, &login.password)?;
    Ok(Json(json!({ "token": token })))
}

pub async fn submit_report(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = body.map_err(body_rejected)?;

    // Run detached so a client that disconnects mid-render does not cancel
    // the render or leave the store half-written.
    let service = state.service.clone();
    let id = tokio::spawn(async move { service.submit(&principal, request).await })
        .await
        .map_err(|e| ReportError::Internal(format!("submit task failed: {e}")))??;

    Ok(Json(json!({ "fileId": id })))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    folder: Option<String>,
}

fn parse_folder_filter(raw: Option<&str>) -> Result<Option<Folder>, ReportError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let invalid = || ReportError::InvalidParameter {
        name: "folder".into(),
        detail: format!("expected an integer between 1 and 15, got '{raw}'"),
    };
    let n: i64 = raw.parse().map_err(|_| invalid())?;
    Folder::new(n).map(Some).ok_or_else(invalid)
}

pub async fn all_reports(
    State(state): State<AppState>,
    Authenticated(_): Authenticated,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ArtifactInfo>>> {
    let folder = parse_folder_filter(query.folder.as_deref())?;
    Ok(Json(state.service.list(folder).await?))
}

/// Stream a stored PDF. Deliberately unauthenticated.
pub async fn get_pdf(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<Response> {
    let (stat, content) = state.service.open(&file_id).await?;

    let disposition = HeaderValue::from_str(&format!(
        "inline; filename=\"{}\"",
        stat.info.filename.replace('"', "")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("inline"));

    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (CONTENT_LENGTH, HeaderValue::from(stat.length)),
            (CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(content),
    )
        .into_response())
}

pub async fn delete_report(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(file_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.service.delete(&principal, &file_id).await?;
    Ok(Json(json!({ "message": "Report deleted" })))
}

pub async fn folders() -> Json<Vec<FolderEntry>> {
    Json(catalog())
}

fn body_rejected(rejection: JsonRejection) -> ApiError {
    ApiError(ReportError::InvalidParameter {
        name: "body".into(),
        detail: rejection.body_text(),
    })
}
