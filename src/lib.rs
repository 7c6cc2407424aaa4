//! # report-vault
//!
//! Render HTML inspection reports to PDF with headless Chromium and keep them
//! in a chunked, folder-indexed blob store behind a small HTTP API.
//!
//! ## Why this crate?
//!
//! Field inspection tools produce reports as HTML fragments. Archiving them
//! as PDFs needs a real layout engine (tables that break across pages, print
//! stylesheets, backgrounds), and archiving them reliably needs a store that
//! never shows a half-written file. This crate pairs a disposable-browser
//! renderer with a GridFS-style chunk store and puts an authenticated API in
//! front of both.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /submit-report
//!  │
//!  ├─ 1. Classify   reportType / folder → folder 1..=15   (400 on failure)
//!  ├─ 2. Normalize  wrap fragments in a printable document, clean the title
//!  ├─ 3. Admit      bounded render pool                    (503 when saturated)
//!  ├─ 4. Render     fresh Chromium → network idle → print media → A4 PDF
//!  └─ 5. Store      chunks first, metadata last → fileId
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use report_vault::{
//!     BoundedRenderer, ChromiumRenderer, Principal, ReportService, ServiceConfig,
//!     SqliteBlobStore, SubmitRequest,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder().no_sandbox(true).build()?;
//!     let store = SqliteBlobStore::open(&config.storage_path, config.chunk_size).await?;
//!     let renderer = BoundedRenderer::from_config(
//!         Arc::new(ChromiumRenderer::new(config.render.clone())),
//!         &config.render,
//!     );
//!     let service = ReportService::new(Arc::new(store), Arc::new(renderer));
//!
//!     let who = Principal { subject: "admin".into() };
//!     let id = service
//!         .submit(&who, SubmitRequest {
//!             html: Some("<h1>Weld 14</h1><table><tr><td>OK</td></tr></table>".into()),
//!             report_type: Some("weld_ir".into()),
//!             ..Default::default()
//!         })
//!         .await?;
//!     println!("stored {id}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `report-vault` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when embedding only the library:
//! ```toml
//! report-vault = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod auth;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod service;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{ArtifactId, ArtifactInfo, ArtifactStat, Folder};
pub use auth::{AdminAccount, Principal, TokenAuthority};
pub use config::{RenderConfig, ServiceConfig, ServiceConfigBuilder};
pub use error::{ErrorCategory, ReportError};
pub use pipeline::classify::{classify, RawFolder};
pub use pipeline::pool::BoundedRenderer;
pub use pipeline::render::{ChromiumRenderer, PdfRenderer};
pub use server::{build_router, AppState};
pub use service::{render_document, ReportService, SubmitRequest};
pub use store::{BlobStore, ByteStream, SqliteBlobStore};
