//! Configuration types for the realtime tool bridge.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Environment variable overriding [`BackendConfig::base_url`].
pub const ENV_BACKEND_URL: &str = "VOXLINK_BACKEND_URL";

/// Environment variable overriding [`DispatchConfig::timeout_ms`].
pub const ENV_DISPATCH_TIMEOUT_MS: &str = "VOXLINK_DISPATCH_TIMEOUT_MS";

/// Environment variable naming the config file.
pub const ENV_CONFIG_PATH: &str = "VOXLINK_CONFIG";

/// Top-level configuration for the bridge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Tool dispatch timing.
    pub dispatch: DispatchConfig,
    /// Tool backend HTTP settings.
    pub backend: BackendConfig,
    /// Session channel sizing.
    pub session: SessionConfig,
}

/// Tool dispatch timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Hard bound on a single tool execution, in milliseconds.
    ///
    /// Independent of any timeout the executor applies internally.
    pub timeout_ms: u64,
    /// Wait between emitting a tool output and requesting a new generation
    /// turn, in milliseconds.
    pub settle_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            settle_delay_ms: 100,
        }
    }
}

impl DispatchConfig {
    /// Dispatch timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Settle delay as a [`Duration`].
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Tool backend HTTP settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the function-call backend (retrieval and notes routes).
    pub base_url: String,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_owned(),
            request_timeout_secs: 30,
        }
    }
}

/// Session channel sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the inbound transport event queue.
    pub inbound_capacity: usize,
    /// Capacity of the session control queue.
    pub control_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: 256,
            control_capacity: 16,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_default(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "config file not found; using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| BridgeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/voxlink/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("voxlink")
            .join("config.toml")
    }

    /// Config path from `VOXLINK_CONFIG`, else [`Self::default_config_path`].
    pub fn resolve_config_path() -> PathBuf {
        std::env::var_os(ENV_CONFIG_PATH)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.timeout_ms == 0 {
            return Err(BridgeError::Config(
                "dispatch.timeout_ms must be greater than zero".into(),
            ));
        }
        if self.dispatch.settle_delay_ms >= self.dispatch.timeout_ms {
            return Err(BridgeError::Config(format!(
                "dispatch.settle_delay_ms ({}) must be shorter than dispatch.timeout_ms ({})",
                self.dispatch.settle_delay_ms, self.dispatch.timeout_ms
            )));
        }
        if self.backend.request_timeout_secs == 0 {
            return Err(BridgeError::Config(
                "backend.request_timeout_secs must be greater than zero".into(),
            ));
        }
        reqwest::Url::parse(&self.backend.base_url).map_err(|e| {
            BridgeError::Config(format!(
                "backend.base_url {:?} is not a valid URL: {e}",
                self.backend.base_url
            ))
        })?;
        if self.session.inbound_capacity == 0 || self.session.control_capacity == 0 {
            return Err(BridgeError::Config(
                "session channel capacities must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Apply `VOXLINK_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when an override cannot be parsed.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when an override cannot be parsed.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            let url = url.trim();
            if !url.is_empty() {
                self.backend.base_url = url.trim_end_matches('/').to_owned();
            }
        }
        if let Some(raw) = lookup(ENV_DISPATCH_TIMEOUT_MS) {
            self.dispatch.timeout_ms = raw.trim().parse().map_err(|e| {
                BridgeError::Config(format!("{ENV_DISPATCH_TIMEOUT_MS}={raw:?}: {e}"))
            })?;
        }
        Ok(())
    }
}
