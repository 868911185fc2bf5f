//! Client configuration: where the conversion service lives and how long to
//! wait for it.
//!
//! Everything is carried in one [`ClientConfig`] built through
//! [`ClientConfigBuilder`], so the orchestrator, the HTTP client and the
//! Markdown renderer all agree on the same endpoints and files-prefix.

use crate::error::ConfigError;
use std::time::Duration;

/// Default API root of the conversion service.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:7861/api";

/// Upload size limit: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Configuration shared by every component of the client.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use testsnap::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .api_base_url("http://192.168.1.128:7861/api")
///     .processing_timeout(Duration::from_secs(600))
///     .build()
///     .unwrap();
/// assert_eq!(config.files_prefix(), "http://192.168.1.128:7861/api/files/");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, without trailing slash. Default: `http://localhost:7861/api`.
    pub api_base_url: String,

    /// URL prefix under which the server serves result files by relative
    /// path. Always ends with `/`. Default: `<api_base_url>/files/`.
    files_prefix: String,

    /// Delay between two progress polls. Range: 1–2 s. Default: 1 s.
    poll_interval: Duration,

    /// Budget for the whole processing phase, measured from the moment
    /// polling starts. Default: 5 minutes.
    pub processing_timeout: Duration,

    /// Largest file accepted by [`crate::file::validate_file`]. Default: 50 MiB.
    pub max_upload_bytes: u64,

    /// Per-request timeout for JSON requests. Uploads are not bounded by it.
    /// Default: 60 s.
    pub request_timeout: Duration,

    /// Quiet period before an edited Markdown buffer is re-rendered.
    /// Default: 300 ms.
    pub render_debounce: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            files_prefix: format!("{DEFAULT_API_BASE_URL}/files/"),
            poll_interval: MIN_POLL_INTERVAL,
            processing_timeout: Duration::from_secs(5 * 60),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            request_timeout: Duration::from_secs(60),
            render_debounce: Duration::from_millis(300),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
            files_prefix: None,
        }
    }

    /// Absolute URL of an API endpoint, e.g. `endpoint("pdf/upload")`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }

    /// Delay between two progress polls, within 1–2 s.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The files-prefix, always with a trailing `/`.
    pub fn files_prefix(&self) -> &str {
        &self.files_prefix
    }

    /// URL of a result file: the files-prefix followed by the URL-encoded,
    /// separator-normalised relative path.
    pub fn file_url(&self, relative_path: &str) -> String {
        let normalised = crate::task::normalize_separators(relative_path);
        format!("{}{}", self.files_prefix, urlencoding::encode(&normalised))
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
    files_prefix: Option<String>,
}

impl ClientConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the files-prefix (defaults to `<api_base_url>/files/`).
    pub fn files_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.files_prefix = Some(prefix.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
        self
    }

    pub fn processing_timeout(mut self, timeout: Duration) -> Self {
        self.config.processing_timeout = timeout;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn render_debounce(mut self, delay: Duration) -> Self {
        self.config.render_debounce = delay;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ClientConfig, ConfigError> {
        let c = &self.config;
        let parsed = reqwest::Url::parse(&c.api_base_url)
            .map_err(|e| ConfigError::Invalid(format!("API URL '{}' is invalid: {e}", c.api_base_url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "API URL must be http or https, got '{}'",
                c.api_base_url
            )));
        }
        if c.processing_timeout.is_zero() {
            return Err(ConfigError::Invalid("Processing timeout must be > 0".into()));
        }
        if c.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("Upload limit must be > 0".into()));
        }

        let prefix = self
            .files_prefix
            .take()
            .unwrap_or_else(|| format!("{}/files/", self.config.api_base_url));
        self.config.files_prefix = format!("{}/", prefix.trim_end_matches('/'));
        Ok(self.config)
    }
}
