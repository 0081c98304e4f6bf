//! Configuration management for the fetch registry
//!
//! Runtime configuration lives next to the components that use it
//! ([`RegistryConfig`], [`ClientConfig`]). This module adds a TOML layer with
//! second-based durations that converts into those types, plus file discovery.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ClientConfig, RegistryConfig};
use crate::constants::{config as locations, events, http, storage};
use crate::errors::{ConfigError, ConfigResult};

/// Application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Registry and storage settings
    pub registry: RegistryConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
}

/// TOML-friendly registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfigToml {
    /// Parent of the private storage directory (system temp dir if unset)
    pub storage_root: Option<PathBuf>,
    /// Temporary file name prefix
    pub file_prefix: String,
    /// Buffered notifications per content
    pub event_capacity: usize,
    /// Bytes between progress notifications
    pub progress_interval_bytes: u64,
}

impl Default for RegistryConfigToml {
    fn default() -> Self {
        Self {
            storage_root: None,
            file_prefix: storage::FILE_PREFIX.to_string(),
            event_capacity: events::DEFAULT_EVENT_CAPACITY,
            progress_interval_bytes: events::DEFAULT_PROGRESS_INTERVAL_BYTES,
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// User agent override
    pub user_agent: Option<String>,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Connection pool idle timeout in seconds (None = no timeout)
    pub pool_idle_timeout_secs: Option<u64>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            request_timeout_secs: http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            user_agent: None,
            max_redirects: http::MAX_REDIRECTS,
            pool_idle_timeout_secs: Some(http::POOL_IDLE_TIMEOUT.as_secs()),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            tcp_nodelay: true,
            rate_limit_rps: http::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

impl AppConfig {
    /// Convert to the runtime registry configuration
    pub fn to_runtime_config(&self) -> RegistryConfig {
        let mut config = self.registry.to_runtime_config();
        config.client = self.client.to_runtime_config();
        config
    }

    /// Check values that would only fail later at runtime
    pub fn validate(&self) -> ConfigResult<()> {
        if self.client.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Rate limit must be at least 1 request per second".to_string(),
            });
        }
        if self.registry.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "registry.event_capacity".to_string(),
                value: "0".to_string(),
                reason: "At least one notification must be buffered".to_string(),
            });
        }
        if self.registry.file_prefix.contains(std::path::is_separator) {
            return Err(ConfigError::InvalidValue {
                field: "registry.file_prefix".to_string(),
                value: self.registry.file_prefix.clone(),
                reason: "Prefix must not contain path separators".to_string(),
            });
        }
        Ok(())
    }

    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the project-local file and
    /// then the user configuration file are tried; defaults apply if neither
    /// exists.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Find a configuration file in the standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(locations::LOCAL_CONFIG_FILE)];
        search_paths.extend(Self::get_default_config_path());

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Default configuration file path for the current user
    pub fn get_default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(locations::CONFIG_DIR_NAME)
                .join(locations::CONFIG_FILE_NAME)
        })
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Default configuration file content with comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# Fetch registry configuration

[registry]
# Parent directory of the temporary storage (system temp dir if unset)
# storage_root = "/path/to/scratch"
file_prefix = "{}"
event_capacity = {}
progress_interval_bytes = {}

[client]
request_timeout_secs = {}
connect_timeout_secs = {}
# user_agent = "my-app/1.0"
max_redirects = {}
pool_idle_timeout_secs = {}
pool_max_per_host = {}
tcp_nodelay = true
rate_limit_rps = {}
"#,
            storage::FILE_PREFIX,
            events::DEFAULT_EVENT_CAPACITY,
            events::DEFAULT_PROGRESS_INTERVAL_BYTES,
            http::DEFAULT_TIMEOUT.as_secs(),
            http::CONNECT_TIMEOUT.as_secs(),
            http::MAX_REDIRECTS,
            http::POOL_IDLE_TIMEOUT.as_secs(),
            http::POOL_MAX_PER_HOST,
            http::DEFAULT_RATE_LIMIT_RPS,
        )
    }
}

impl RegistryConfigToml {
    /// Convert to runtime RegistryConfig with a default client
    pub fn to_runtime_config(&self) -> RegistryConfig {
        RegistryConfig {
            storage_root: self.storage_root.clone(),
            file_prefix: self.file_prefix.clone(),
            event_capacity: self.event_capacity,
            progress_interval_bytes: self.progress_interval_bytes,
            client: ClientConfig::default(),
        }
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| http::USER_AGENT.to_string()),
            max_redirects: self.max_redirects,
            pool_idle_timeout: self.pool_idle_timeout_secs.map(Duration::from_secs),
            pool_max_per_host: self.pool_max_per_host,
            tcp_nodelay: self.tcp_nodelay,
            rate_limit_rps: self.rate_limit_rps,
        }
    }
}
