//! CLI binary for report-vault.
//!
//! A thin shim over the library crate: maps flags and env vars onto
//! `ServiceConfig`, then either serves the HTTP API or renders one local
//! HTML file to PDF.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use report_vault::server::{self, AppState};
use report_vault::{
    render_document, BlobStore, BoundedRenderer, ChromiumRenderer, PdfRenderer, ReportService,
    ServiceConfig, SqliteBlobStore, TokenAuthority,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default port (5000) with a real secret
  REPORT_VAULT_SECRET=$(openssl rand -hex 32) report-vault

  # Containers usually need the Chromium sandbox disabled
  report-vault --no-sandbox --storage /data/reports.db

  # Render one file without starting the server
  report-vault --render-only report.html -o report.pdf --title "Weld 14"

ENDPOINTS:
  GET    /                          liveness text
  GET    /folders                   folder catalog
  POST   /admin-login               {username, password} → {token}
  POST   /submit-report             bearer; {html, reportType?, folder?, reportTitle?} → {fileId}
  GET    /all-reports?folder=N      bearer; newest first
  GET    /get-pdf/:fileId           PDF stream (no auth)
  DELETE /delete-report/:fileId     bearer

ENVIRONMENT VARIABLES:
  PORT                               Listening port (default 5000)
  REPORT_VAULT_STORAGE               SQLite database path
  REPORT_VAULT_SECRET                Token-signing secret
  REPORT_VAULT_CHROME                Chrome/Chromium executable (auto-detected if unset)
  RUST_LOG                           Log filter, overrides --verbose / --quiet
"#;

/// Render HTML inspection reports to PDF and store them.
#[derive(Parser, Debug)]
#[command(
    name = "report-vault",
    version,
    about = "Render HTML inspection reports to PDF and store them in a chunked blob store",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "REPORT_VAULT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listening port.
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// SQLite database file backing the blob store.
    #[arg(long, env = "REPORT_VAULT_STORAGE", default_value = "./data/reports.db")]
    storage: PathBuf,

    /// HMAC secret for bearer tokens.
    #[arg(long, env = "REPORT_VAULT_SECRET", default_value = report_vault::config::DEFAULT_TOKEN_SECRET, hide_env_values = true)]
    secret: String,

    /// Administrative username.
    #[arg(long, env = "REPORT_VAULT_ADMIN_USER", default_value = "admin")]
    admin_user: String,

    /// Administrative password.
    #[arg(long, env = "REPORT_VAULT_ADMIN_PASSWORD", default_value = "admin123", hide_env_values = true)]
    admin_password: String,

    /// Bearer token lifetime in seconds.
    #[arg(long, env = "REPORT_VAULT_TOKEN_TTL_SECS", default_value_t = 3600)]
    token_ttl: u64,

    /// Stored chunk size in bytes (1 KiB – 16 MiB).
    #[arg(long, env = "REPORT_VAULT_CHUNK_SIZE", default_value_t = report_vault::config::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Largest accepted request body in bytes.
    #[arg(long, env = "REPORT_VAULT_MAX_BODY_BYTES", default_value_t = 10 * 1024 * 1024)]
    max_body_bytes: usize,

    /// Chrome/Chromium executable.
    #[arg(long, env = "REPORT_VAULT_CHROME")]
    chrome: Option<PathBuf>,

    /// Renders allowed to run at once.
    #[arg(long, env = "REPORT_VAULT_RENDER_CONCURRENCY", default_value_t = 4)]
    render_concurrency: usize,

    /// Submissions allowed to wait for a render slot before 503s.
    #[arg(long, env = "REPORT_VAULT_RENDER_QUEUE", default_value_t = 16)]
    render_queue: usize,

    /// Seconds to wait for a page to reach network idle.
    #[arg(long, env = "REPORT_VAULT_RENDER_TIMEOUT_SECS", default_value_t = 30)]
    render_timeout: u64,

    /// Pause after network idle before printing, in ms.
    #[arg(long, env = "REPORT_VAULT_SETTLE_MS", default_value_t = 500)]
    settle_ms: u64,

    /// Launch Chromium without its sandbox.
    #[arg(long, env = "REPORT_VAULT_NO_SANDBOX")]
    no_sandbox: bool,

    /// Render this HTML file to PDF and exit instead of serving.
    #[arg(long, value_name = "HTML")]
    render_only: Option<PathBuf>,

    /// Output path for --render-only (default: input with .pdf extension).
    #[arg(short, long, requires = "render_only")]
    output: Option<PathBuf>,

    /// Document title for --render-only.
    #[arg(long, requires = "render_only")]
    title: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli).context("Invalid configuration")?;

    if let Some(ref input) = cli.render_only {
        return render_only(&cli, &config, input).await;
    }
    serve(config).await
}

fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .host(&cli.host)
        .port(cli.port)
        .storage_path(&cli.storage)
        .chunk_size(cli.chunk_size)
        .token_secret(&cli.secret)
        .token_ttl_secs(cli.token_ttl)
        .admin_credentials(&cli.admin_user, &cli.admin_password)
        .max_body_bytes(cli.max_body_bytes)
        .render_concurrency(cli.render_concurrency)
        .render_queue_depth(cli.render_queue)
        .load_timeout_secs(cli.render_timeout)
        .settle_delay_ms(cli.settle_ms)
        .no_sandbox(cli.no_sandbox);
    if let Some(ref chrome) = cli.chrome {
        builder = builder.chrome_executable(chrome);
    }
    Ok(builder.build()?)
}

// ── Serve mode ───────────────────────────────────────────────────────────────

async fn serve(config: ServiceConfig) -> Result<()> {
    if config.uses_default_secret() {
        warn!("REPORT_VAULT_SECRET is not set; tokens are signed with the public default secret");
    }
    info!("Starting report-vault with {:?}", config);

    let store = Arc::new(
        SqliteBlobStore::open(&config.storage_path, config.chunk_size)
            .await
            .with_context(|| format!("Failed to open store at {}", config.storage_path.display()))?,
    );
    let renderer = BoundedRenderer::from_config(
        Arc::new(ChromiumRenderer::new(config.render.clone())),
        &config.render,
    );
    let service = ReportService::new(store.clone(), Arc::new(renderer));
    let state = AppState::new(service, TokenAuthority::from_config(&config));
    let router = server::build_router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

    server::serve(listener, router, wait_for_shutdown_signal())
        .await
        .context("HTTP server failed")?;

    store.close().await.context("Failed to close store")?;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM ({}); Ctrl-C only", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received, draining");
}

// ── Render-only mode ─────────────────────────────────────────────────────────

async fn render_only(cli: &Cli, config: &ServiceConfig, input: &Path) -> Result<()> {
    let html = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    if html.trim().is_empty() {
        bail!("{} is empty", input.display());
    }
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| input.with_extension("pdf"));

    let spinner = (!cli.quiet).then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Rendering");
        bar.set_message(input.display().to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let start = Instant::now();
    let renderer: Box<dyn PdfRenderer> = Box::new(ChromiumRenderer::new(config.render.clone()));
    let result = render_document(renderer.as_ref(), &html, cli.title.as_deref()).await;
    if let Some(ref bar) = spinner {
        bar.finish_and_clear();
    }
    let pdf = result.context("Rendering failed")?;

    tokio::fs::write(&output, &pdf)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if !cli.quiet {
        eprintln!(
            "{}  {} bytes  {}ms  →  {}",
            green("✔"),
            pdf.len(),
            start.elapsed().as_millis(),
            bold(&output.display().to_string()),
        );
        if config.render.no_sandbox {
            eprintln!("{}", yellow("   (rendered without the Chromium sandbox)"));
        }
    }
    Ok(())
}
