//! PDF rendering: print a normalised HTML document with headless Chromium.
//!
//! ## One browser per render
//!
//! Every call launches its own Chromium process with a throw-away scratch
//! directory holding both the browser profile and the document, loads the document, prints it, and tears the process down
//! again. Nothing (cookies, storage, service workers, JS globals) survives
//! from one report to the next. Launch cost is paid per render; the
//! [`crate::pipeline::pool`] wrapper bounds how many run at once.
//!
//! ## Load protocol
//!
//! 1. write the document to the scratch directory and navigate to its
//!    `file://` URL
//! 2. wait for the main frame's `networkIdle` after that navigation
//! 3. switch emulated media to `print`
//! 4. pause for the settle delay so late layout work can finish
//! 5. `Page.printToPDF` on A4 with backgrounds and fixed margins
//!
//! Steps 1–2 share the load timeout. The browser is closed whether or not
//! capture succeeded.

use crate::config::RenderConfig;
use crate::error::ReportError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetEmulatedMediaParams;
use chromiumoxide::cdp::browser_protocol::page::{EventLifecycleEvent, FrameId, PrintToPdfParams};
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::Path;
use std::time::Instant;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

/// Every PDF starts with this.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

const MM_PER_INCH: f64 = 25.4;
const A4_WIDTH_MM: f64 = 210.0;
const A4_HEIGHT_MM: f64 = 297.0;
const MARGIN_VERTICAL_MM: f64 = 20.0;
const MARGIN_HORIZONTAL_MM: f64 = 15.0;

const PROFILE_DIR: &str = "profile";
const DOCUMENT_FILE: &str = "index.html";

/// Turns a complete HTML document into PDF bytes.
///
/// The seam between the orchestrator and the browser; tests substitute a
/// renderer that never launches Chromium.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: &str) -> Result<Vec<u8>, ReportError>;
}

/// Print parameters: A4, print backgrounds, 20 mm top/bottom, 15 mm left/right.
pub fn pdf_params() -> PrintToPdfParams {
    PrintToPdfParams {
        print_background: Some(true),
        paper_width: Some(A4_WIDTH_MM / MM_PER_INCH),
        paper_height: Some(A4_HEIGHT_MM / MM_PER_INCH),
        margin_top: Some(MARGIN_VERTICAL_MM / MM_PER_INCH),
        margin_bottom: Some(MARGIN_VERTICAL_MM / MM_PER_INCH),
        margin_left: Some(MARGIN_HORIZONTAL_MM / MM_PER_INCH),
        margin_right: Some(MARGIN_HORIZONTAL_MM / MM_PER_INCH),
        ..Default::default()
    }
}

/// Write a document into `dir` and return the `file://` URL that loads it.
///
/// Large reports (embedded photos) go through the file system; Chromium caps
/// navigation URLs at 2 MB.
pub async fn stage_document(dir: &Path, html: &str) -> Result<Url, ReportError> {
    let path = dir.join(DOCUMENT_FILE);
    tokio::fs::write(&path, html)
        .await
        .map_err(|e| ReportError::RenderFailed {
            detail: format!("staging document: {e}"),
        })?;
    Url::from_file_path(&path).map_err(|()| ReportError::RenderFailed {
        detail: format!("no file URL for {}", path.display()),
    })
}

/// Check the PDF signature on rendered output.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_SIGNATURE)
}

/// Chromium-backed [`PdfRenderer`].
#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    config: RenderConfig,
}

impl ChromiumRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PdfRenderer for ChromiumRenderer {
    async fn render(&self, html: &str) -> Result<Vec<u8>, ReportError> {
        let start = Instant::now();
        let context = RenderContext::launch(&self.config).await?;
        debug!("Browser launched in {}ms", start.elapsed().as_millis());

        let result = capture(&context, html, &self.config).await;
        context.dispose().await;

        let pdf = result.inspect_err(|e| error!("Render failed: {}", e))?;
        if !looks_like_pdf(&pdf) {
            return Err(ReportError::RenderFailed {
                detail: "browser returned output without a PDF signature".into(),
            });
        }

        info!(
            "Rendered {} bytes of HTML → {} bytes of PDF in {}ms",
            html.len(),
            pdf.len(),
            start.elapsed().as_millis()
        );
        Ok(pdf)
    }
}

/// A live browser process plus everything that must die with it.
struct RenderContext {
    browser: Browser,
    handler: JoinHandle<()>,
    scratch: TempDir,
}

impl RenderContext {
    async fn launch(config: &RenderConfig) -> Result<Self, ReportError> {
        let scratch = TempDir::new().map_err(|e| ReportError::RenderUnavailable {
            detail: format!("scratch directory: {e}"),
        })?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(scratch.path().join(PROFILE_DIR))
            .request_timeout(config.load_timeout())
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--mute-audio");
        if config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref exe) = config.chrome_executable {
            builder = builder.chrome_executable(exe);
        }
        let browser_config = builder
            .build()
            .map_err(|detail| ReportError::RenderUnavailable { detail })?;

        let (browser, mut handler) =
            Browser::launch(browser_config)
                .await
                .map_err(|e| ReportError::RenderUnavailable {
                    detail: e.to_string(),
                })?;

        // Drive the CDP connection until the browser goes away. Individual
        // message errors are not fatal to the session.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler: {}", e);
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            scratch,
        })
    }

    /// Close the browser and wait for the process to exit.
    async fn dispose(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Browser wait failed: {}", e);
        }
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Load, settle, and print one document.
async fn capture(context: &RenderContext, html: &str, config: &RenderConfig) -> Result<Vec<u8>, ReportError> {
    let url = stage_document(context.scratch.path(), html).await?;
    let page = context
        .browser
        .new_page("about:blank")
        .await
        .map_err(capture_failed)?;

    let result = load_and_print(&page, url, config).await;
    if let Err(e) = page.close().await {
        debug!("Page close failed: {}", e);
    }
    result
}

async fn load_and_print(page: &Page, url: Url, config: &RenderConfig) -> Result<Vec<u8>, ReportError> {
    let mut lifecycle = page
        .event_listener::<EventLifecycleEvent>()
        .await
        .map_err(capture_failed)?;
    let main_frame = page.mainframe().await.map_err(capture_failed)?;

    let load = async {
        page.goto(url.to_string()).await.map_err(capture_failed)?;
        let mut watch = LoadWatch::new(main_frame);
        while let Some(event) = lifecycle.next().await {
            if watch.observe(&event.frame_id, &event.name) {
                return Ok(());
            }
        }
        Err(ReportError::RenderFailed {
            detail: "page closed before reaching network idle".into(),
        })
    };

    tokio::time::timeout(config.load_timeout(), load)
        .await
        .map_err(|_| ReportError::RenderTimeout {
            secs: config.load_timeout_secs,
        })??;

    page.execute(SetEmulatedMediaParams {
        media: Some("print".to_string()),
        features: None,
    })
    .await
    .map_err(capture_failed)?;

    tokio::time::sleep(config.settle_delay()).await;

    page.pdf(pdf_params()).await.map_err(capture_failed)
}

/// Decides when the main document has settled.
///
/// Lifecycle events from about:blank may still be queued, and iframes emit
/// their own `init`/`networkIdle`. Only the main frame's `networkIdle` after
/// its `init` counts.
struct LoadWatch {
    main_frame: Option<FrameId>,
    navigated: bool,
}

impl LoadWatch {
    fn new(main_frame: Option<FrameId>) -> Self {
        Self {
            main_frame,
            navigated: false,
        }
    }

    fn observe(&mut self, frame: &FrameId, name: &str) -> bool {
        if self.main_frame.as_ref().is_some_and(|main| main != frame) {
            return false;
        }
        match name {
            "init" => {
                self.navigated = true;
                false
            }
            "networkIdle" => self.navigated,
            _ => false,
        }
    }
}

fn capture_failed(e: impl std::fmt::Display) -> ReportError {
    ReportError::RenderFailed {
        detail: e.to_string(),
    }
}
