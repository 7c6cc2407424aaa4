//! Configuration for the report service.
//!
//! All runtime knobs live in [`ServiceConfig`], built through
//! [`ServiceConfigBuilder`]. The library never reads the environment itself;
//! the binary maps flags and env vars onto the builder, so tests and embedders
//! get exactly the config they construct.

use crate::error::ReportError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// GridFS-compatible default chunk size (255 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

/// Settings for the rendering engine and its admission pool.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Browser executable. If None, chromiumoxide auto-detects an installed Chrome/Chromium.
    pub chrome_executable: Option<PathBuf>,

    /// Maximum time to wait for the page to reach network-idle. Default: 30.
    ///
    /// A document that keeps a connection busy (polling, long-lived sockets)
    /// never goes idle; this bound turns that into a `RenderTimeout`.
    pub load_timeout_secs: u64,

    /// Fixed pause after network-idle before capture, in ms. Default: 500.
    pub settle_delay_ms: u64,

    /// Renders allowed to run at once. Default: 4.
    pub concurrency: usize,

    /// Callers allowed to wait for a render slot before new ones are rejected. Default: 16.
    pub queue_depth: usize,

    /// Launch Chromium with `--no-sandbox` (needed in most containers). Default: false.
    pub no_sandbox: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            load_timeout_secs: 30,
            settle_delay_ms: 500,
            concurrency: 4,
            queue_depth: 16,
            no_sandbox: false,
        }
    }
}

impl RenderConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Configuration for a report-vault deployment.
///
/// # Example
/// ```rust
/// use report_vault::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .port(8080)
///     .storage_path("/var/lib/reports/reports.db")
///     .token_secret("a-long-random-secret")
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Interface to bind. Default: 0.0.0.0.
    pub host: String,

    /// Listening port. Default: 5000.
    pub port: u16,

    /// SQLite database file backing the blob store. Default: ./data/reports.db.
    pub storage_path: PathBuf,

    /// Chunk size for stored payloads in bytes. Range: 1 KiB – 16 MiB. Default: 255 KiB.
    pub chunk_size: usize,

    /// HMAC key for bearer tokens.
    pub token_secret: String,

    /// Bearer token lifetime in seconds. Default: 3600.
    pub token_ttl_secs: u64,

    /// The single administrative account.
    pub admin_username: String,
    pub admin_password: String,

    /// Upper bound on request bodies. Default: 10 MiB.
    pub max_body_bytes: usize,

    pub render: RenderConfig,
}

/// Used when no secret is configured; the binary warns loudly about it.
pub const DEFAULT_TOKEN_SECRET: &str = "change-this-secret";

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            storage_path: PathBuf::from("./data/reports.db"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            token_secret: DEFAULT_TOKEN_SECRET.to_string(),
            token_ttl_secs: 3600,
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            render: RenderConfig::default(),
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_path", &self.storage_path)
            .field("chunk_size", &self.chunk_size)
            .field("token_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .field("max_body_bytes", &self.max_body_bytes)
            .field("render", &self.render)
            .finish()
    }
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn uses_default_secret(&self) -> bool {
        self.token_secret == DEFAULT_TOKEN_SECRET
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_path = path.into();
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    pub fn token_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.token_secret = secret.into();
        self
    }

    pub fn token_ttl_secs(mut self, secs: u64) -> Self {
        self.config.token_ttl_secs = secs.max(1);
        self
    }

    pub fn admin_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.admin_username = username.into();
        self.config.admin_password = password.into();
        self
    }

    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.config.max_body_bytes = bytes.max(1024);
        self
    }

    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.render.chrome_executable = Some(path.into());
        self
    }

    pub fn load_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render.load_timeout_secs = secs.max(1);
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.render.settle_delay_ms = ms;
        self
    }

    pub fn render_concurrency(mut self, n: usize) -> Self {
        self.config.render.concurrency = n.max(1);
        self
    }

    pub fn render_queue_depth(mut self, n: usize) -> Self {
        self.config.render.queue_depth = n;
        self
    }

    pub fn no_sandbox(mut self, v: bool) -> Self {
        self.config.render.no_sandbox = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ReportError> {
        let c = &self.config;
        if !(1024..=16 * 1024 * 1024).contains(&c.chunk_size) {
            return Err(ReportError::InvalidConfig(format!(
                "chunk size must be 1 KiB – 16 MiB, got {}",
                c.chunk_size
            )));
        }
        if c.token_secret.is_empty() {
            return Err(ReportError::InvalidConfig(
                "token secret must not be empty".into(),
            ));
        }
        if c.admin_username.is_empty() || c.admin_password.is_empty() {
            return Err(ReportError::InvalidConfig(
                "admin username and password must not be empty".into(),
            ));
        }
        if c.render.concurrency == 0 {
            return Err(ReportError::InvalidConfig(
                "render concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
