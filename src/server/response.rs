//! Error responses and the bearer-token extractor.

use super::AppState;
use crate::auth::{bearer_token, Principal};
use crate::error::{ErrorCategory, ReportError};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

/// A [`ReportError`] on its way out as `{"error": "<message>"}`.
#[derive(Debug)]
pub struct ApiError(pub ReportError);

impl From<ReportError> for ApiError {
    fn from(e: ReportError) -> Self {
        Self(e)
    }
}

/// Status code for an error category.
///
/// Missing artifacts stay 500: clients of this API have always seen a
/// generic failure for an unknown id.
pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Auth => StatusCode::UNAUTHORIZED,
        ErrorCategory::Busy => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Render
        | ErrorCategory::NotFound
        | ErrorCategory::Store
        | ErrorCategory::Config
        | ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.category());
        if status.is_server_error() {
            error!("{} {}", status.as_u16(), self.0);
        } else {
            warn!("{} {}", status.as_u16(), self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// The caller behind a valid `Authorization: Bearer` header.
///
/// Rejects with 401 on anything else: no header, a non-bearer scheme, or a
/// token that fails verification.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

#[axum::async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = bearer_token(header)?;
        Ok(Self(state.auth.verify(token)?))
    }
}
