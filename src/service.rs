//! The report service: classify, normalise, render, store.
//!
//! [`ReportService`] owns nothing but handles. The blob store and the
//! renderer are constructed once at startup and shared by `Arc`, so the
//! service is cheap to clone into every request task.
//!
//! ## Submission
//!
//! ```text
//! SubmitRequest ─▶ classify ─▶ html present? ─▶ normalize ─▶ render ─▶ store.write
//!                  400          400                          500       500
//! ```
//!
//! Every step is terminal on failure: nothing is retried, and nothing is
//! written unless the render produced a PDF.

use crate::artifact::{ArtifactId, ArtifactInfo, ArtifactStat, Folder};
use crate::auth::Principal;
use crate::error::ReportError;
use crate::pipeline::classify::{classify, RawFolder};
use crate::pipeline::normalize::normalize;
use crate::pipeline::render::PdfRenderer;
use crate::store::{bytes_stream, BlobStore, ByteStream};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use ulid::Ulid;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_UNSAFE_FILENAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").unwrap());

/// Filename base used when nothing usable is left after sanitising.
pub const FALLBACK_FILENAME_BASE: &str = "report";

/// A report submission as posted by clients.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub folder: Option<RawFolder>,
    #[serde(default)]
    pub report_title: Option<String>,
}

/// Orchestrates the render-and-store pipeline.
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn BlobStore>,
    renderer: Arc<dyn PdfRenderer>,
}

impl ReportService {
    pub fn new(store: Arc<dyn BlobStore>, renderer: Arc<dyn PdfRenderer>) -> Self {
        Self { store, renderer }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Render a submission to PDF and store it. Returns the new artifact id.
    pub async fn submit(
        &self,
        principal: &Principal,
        request: SubmitRequest,
    ) -> Result<ArtifactId, ReportError> {
        let start = Instant::now();
        let report_type = request.report_type.as_deref().filter(|s| !s.trim().is_empty());

        let folder = classify(report_type, request.folder.as_ref())?;
        let html = request
            .html
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or(ReportError::MissingHtml)?;

        debug!(
            "Submission from '{}': folder {}, {} bytes of HTML",
            principal.subject,
            folder,
            html.len()
        );

        let document = normalize(html, request.report_title.as_deref(), report_type);
        let pdf = self.renderer.render(&document.html).await?;

        let filename = derive_filename(report_type, &document.safe_title);
        let size = pdf.len();
        let id = self
            .store
            .write(&filename, folder, bytes_stream(pdf))
            .await?;

        info!(
            "Report {} '{}' stored in folder {} ({} bytes PDF, {}ms, by '{}')",
            id,
            filename,
            folder,
            size,
            start.elapsed().as_millis(),
            principal.subject
        );
        Ok(id)
    }

    pub async fn list(&self, folder: Option<Folder>) -> Result<Vec<ArtifactInfo>, ReportError> {
        self.store.list(folder).await
    }

    /// Metadata plus a lazy byte stream for one artifact.
    pub async fn open(&self, id: &str) -> Result<(ArtifactStat, ByteStream), ReportError> {
        let id: ArtifactId = id.parse()?;
        let stat = self.store.stat(&id).await?;
        let content = self.store.read(&id).await?;
        Ok((stat, content))
    }

    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<(), ReportError> {
        let id: ArtifactId = id.parse()?;
        self.store.delete(&id).await.inspect_err(|e| {
            warn!("Delete of {} by '{}' failed: {}", id, principal.subject, e);
        })?;
        info!("Report {} deleted by '{}'", id, principal.subject);
        Ok(())
    }
}

/// Normalise and render a document without storing it.
pub async fn render_document(
    renderer: &dyn PdfRenderer,
    html: &str,
    title: Option<&str>,
) -> Result<Vec<u8>, ReportError> {
    let document = normalize(html, title, None);
    renderer.render(&document.html).await
}

/// Filename for a new artifact: `<base>_<unix-millis>_<6 hex>.pdf`.
pub fn derive_filename(report_type: Option<&str>, title: &str) -> String {
    let nonce = (Ulid::new().random() & 0xff_ffff) as u32;
    filename_from_parts(report_type, title, Utc::now().timestamp_millis(), nonce)
}

fn filename_from_parts(report_type: Option<&str>, title: &str, millis: i64, nonce: u32) -> String {
    let raw = report_type.unwrap_or(title);
    let underscored = RE_WHITESPACE.replace_all(raw.trim(), "_");
    let base = RE_UNSAFE_FILENAME.replace_all(&underscored, "");
    let base = if base.chars().all(|c| matches!(c, '_' | '.' | '-')) {
        FALLBACK_FILENAME_BASE
    } else {
        base.as_ref()
    };
    format!("{base}_{millis}_{nonce:06x}.pdf")
}
