//! Error types for the report-vault library.
//!
//! Every failure in the render-and-store pipeline is terminal for the request
//! that hit it: nothing is retried and nothing half-written is left visible.
//! That makes a single error enum enough. [`ReportError`] carries the detail
//! (the underlying cause as text) and [`ReportError::category`] folds the
//! variants onto the coarse taxonomy the HTTP layer maps to status codes:
//!
//! | Category | Raised by | HTTP |
//! |----------|-----------|------|
//! | `Validation` | classifier, missing html, bad query | 400 |
//! | `Auth` | login, bearer-token verification | 401 |
//! | `Busy` | render admission pool is saturated | 503 |
//! | `Render` | browser launch, load timeout, capture | 500 |
//! | `NotFound` | blob store read / delete / stat | 500 |
//! | `Store` | any other blob store failure | 500 |

use thiserror::Error;

/// All fatal errors returned by the report-vault library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// Neither a known report type nor a folder number in 1..=15 was given.
    #[error("Missing or invalid classification: provide a known reportType or a folder between 1 and 15")]
    InvalidClassification,

    /// The submission carried no HTML body.
    #[error("Missing html content")]
    MissingHtml,

    /// A query or path parameter could not be parsed.
    #[error("Invalid parameter '{name}': {detail}")]
    InvalidParameter { name: String, detail: String },

    // ── Auth errors ───────────────────────────────────────────────────────
    /// Username/password did not match the configured account.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Bearer token missing, malformed, expired, or signed with another key.
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The browser could not be started (binary missing, out of resources).
    #[error("Rendering engine unavailable: {detail}")]
    RenderUnavailable { detail: String },

    /// The page did not reach network-idle within the load timeout.
    #[error("Document did not settle within {secs}s")]
    RenderTimeout { secs: u64 },

    /// Loading, media emulation, or PDF capture failed.
    #[error("PDF capture failed: {detail}")]
    RenderFailed { detail: String },

    /// The render pool is saturated and its wait queue is full.
    #[error("Rendering capacity exhausted ({waiting} requests already waiting)")]
    RenderBusy { waiting: usize },

    // ── Store errors ──────────────────────────────────────────────────────
    /// No artifact with this id exists (or the id is not a valid id).
    #[error("Report '{id}' not found")]
    NotFound { id: String },

    /// The underlying storage failed.
    #[error("Storage error: {detail}")]
    Store { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure class used for status-code mapping and log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Auth,
    Busy,
    Render,
    NotFound,
    Store,
    Config,
    Internal,
}

impl ReportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReportError::InvalidClassification
            | ReportError::MissingHtml
            | ReportError::InvalidParameter { .. } => ErrorCategory::Validation,
            ReportError::InvalidCredentials | ReportError::Unauthorized { .. } => {
                ErrorCategory::Auth
            }
            ReportError::RenderBusy { .. } => ErrorCategory::Busy,
            ReportError::RenderUnavailable { .. }
            | ReportError::RenderTimeout { .. }
            | ReportError::RenderFailed { .. } => ErrorCategory::Render,
            ReportError::NotFound { .. } => ErrorCategory::NotFound,
            ReportError::Store { .. } => ErrorCategory::Store,
            ReportError::InvalidConfig(_) => ErrorCategory::Config,
            ReportError::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub(crate) fn store(detail: impl std::fmt::Display) -> Self {
        ReportError::Store {
            detail: detail.to_string(),
        }
    }

    pub(crate) fn unauthorized(reason: impl Into<String>) -> Self {
        ReportError::Unauthorized {
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for ReportError {
    fn from(e: rusqlite::Error) -> Self {
        ReportError::store(e)
    }
}

impl From<r2d2::Error> for ReportError {
    fn from(e: r2d2::Error) -> Self {
        ReportError::Store {
            detail: format!("connection pool: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_validation() {
        assert_eq!(
            ReportError::InvalidClassification.category(),
            ErrorCategory::Validation
        );
        assert_eq!(ReportError::MissingHtml.category(), ErrorCategory::Validation);
    }

    #[test]
    fn render_variants_share_category() {
        let errs = [
            ReportError::RenderUnavailable {
                detail: "no chrome".into(),
            },
            ReportError::RenderTimeout { secs: 30 },
            ReportError::RenderFailed {
                detail: "boom".into(),
            },
        ];
        for e in errs {
            assert_eq!(e.category(), ErrorCategory::Render, "{e}");
        }
    }

    #[test]
    fn busy_is_not_a_render_failure() {
        let e = ReportError::RenderBusy { waiting: 16 };
        assert_eq!(e.category(), ErrorCategory::Busy);
        assert!(e.to_string().contains("16"));
    }

    #[test]
    fn not_found_display_names_id() {
        let e = ReportError::NotFound {
            id: "01HZX".into(),
        };
        assert!(e.to_string().contains("01HZX"), "got: {e}");
    }

    #[test]
    fn timeout_display() {
        let e = ReportError::RenderTimeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }
}
