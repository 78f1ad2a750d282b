//! Configuration module for MultiCloud.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default chunk size for chunked transfers (4 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for MultiCloud.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transfer: TransferConfig,
    pub oauth: OAuthConfig,
    pub http: HttpConfig,
}

/// Chunked download / upload settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Size of each ranged download request (in bytes).
    pub download_chunk_size: u64,
    /// Size of each upload chunk (in bytes).
    pub upload_chunk_size: u64,
    /// Minimum milliseconds between two progress notifications.
    pub progress_interval_ms: u64,
}

/// OAuth2 redirect listener and state settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Address the redirect listener binds to.
    pub listener_address: String,
    /// Port the redirect listener binds to; `0` picks an ephemeral port.
    pub listener_port: u16,
    /// Minimum length of generated CSRF state strings.
    pub state_min_length: usize,
    /// Maximum length of generated CSRF state strings.
    pub state_max_length: usize,
    /// Prefix state strings with the bound listener port.
    pub state_port_prefix: bool,
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// `User-Agent` header sent with every provider request.
    pub user_agent: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/multicloud/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("multicloud")
            .join("config.yaml")
    }
}

impl TransferConfig {
    /// Progress refresh interval as a [`Duration`].
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            download_chunk_size: DEFAULT_CHUNK_SIZE,
            upload_chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval_ms: 200,
        }
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            listener_address: "127.0.0.1".to_string(),
            listener_port: 0,
            state_min_length: 16,
            state_max_length: 32,
            state_port_prefix: true,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("multicloud/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"transfer.upload_chunk_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- transfer ---
        if self.transfer.download_chunk_size == 0 {
            errors.push(ValidationError {
                field: "transfer.download_chunk_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.transfer.upload_chunk_size == 0 {
            errors.push(ValidationError {
                field: "transfer.upload_chunk_size".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- oauth ---
        if self
            .oauth
            .listener_address
            .parse::<std::net::IpAddr>()
            .is_err()
        {
            errors.push(ValidationError {
                field: "oauth.listener_address".into(),
                message: format!(
                    "not an IP address: '{}'",
                    self.oauth.listener_address
                ),
            });
        }
        if self.oauth.state_min_length == 0 {
            errors.push(ValidationError {
                field: "oauth.state_min_length".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.oauth.state_min_length > self.oauth.state_max_length {
            errors.push(ValidationError {
                field: "oauth.state_min_length".into(),
                message: format!(
                    "state_min_length ({}) must not exceed state_max_length ({})",
                    self.oauth.state_min_length, self.oauth.state_max_length
                ),
            });
        }
        // Port prefix takes up to five characters of the state string.
        if self.oauth.state_port_prefix && self.oauth.state_min_length <= 5 {
            errors.push(ValidationError {
                field: "oauth.state_min_length".into(),
                message: "must be greater than 5 when state_port_prefix is enabled".into(),
            });
        }

        // --- http ---
        if self.http.user_agent.trim().is_empty() {
            errors.push(ValidationError {
                field: "http.user_agent".into(),
                message: "must not be empty".into(),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use multicloud_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .download_chunk_size(1024 * 1024)
///     .listener_port(8765)
///     .build();
/// assert_eq!(config.oauth.listener_port, 8765);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- transfer ---

    pub fn download_chunk_size(mut self, bytes: u64) -> Self {
        self.config.transfer.download_chunk_size = bytes;
        self
    }

    pub fn upload_chunk_size(mut self, bytes: u64) -> Self {
        self.config.transfer.upload_chunk_size = bytes;
        self
    }

    pub fn progress_interval_ms(mut self, ms: u64) -> Self {
        self.config.transfer.progress_interval_ms = ms;
        self
    }

    // --- oauth ---

    pub fn listener_address(mut self, address: impl Into<String>) -> Self {
        self.config.oauth.listener_address = address.into();
        self
    }

    pub fn listener_port(mut self, port: u16) -> Self {
        self.config.oauth.listener_port = port;
        self
    }

    pub fn state_length(mut self, min: usize, max: usize) -> Self {
        self.config.oauth.state_min_length = min;
        self.config.oauth.state_max_length = max;
        self
    }

    pub fn state_port_prefix(mut self, enabled: bool) -> Self {
        self.config.oauth.state_port_prefix = enabled;
        self
    }

    // --- http ---

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.http.user_agent = user_agent.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
