//! Configuration file loading and management.
//!
//! Loads configuration from:
//! - Linux/macOS: `~/.config/costscope/config.toml`
//! - Windows: `%APPDATA%/costscope/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `COSTSCOPE_CONFIG`: Override config file path
//! - `COSTSCOPE_API_BASE`: Management API base URL
//! - `COSTSCOPE_BIND`: Server bind address
//! - `COSTSCOPE_TIMEOUT`: Request timeout in seconds

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::executor::{BatchExecutor, PacingConfig};
use crate::core::retry::RetryPolicy;
use crate::error::{CostscopeError, Result};
use crate::remote::arm::DEFAULT_API_BASE;

/// Environment variable to override the config file path.
pub const ENV_CONFIG: &str = "COSTSCOPE_CONFIG";
/// Environment variable for the management API base URL.
pub const ENV_API_BASE: &str = "COSTSCOPE_API_BASE";
/// Environment variable for the server bind address.
pub const ENV_BIND: &str = "COSTSCOPE_BIND";
/// Environment variable for the request timeout in seconds.
pub const ENV_TIMEOUT: &str = "COSTSCOPE_TIMEOUT";

// =============================================================================
// Config Sections
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Inter-call pacing for batch runs.
    pub pacing: PacingSettings,
    /// Retry schedules.
    pub retry: RetrySettings,
    /// Circuit breaker settings.
    pub breaker: BreakerSettings,
    /// HTTP server settings.
    pub server: ServerConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Timeout for management API requests in seconds.
    pub timeout_seconds: u64,
    /// Management API base URL (overridable for sovereign clouds or tests).
    pub api_base: Option<String>,
    /// Default log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            api_base: None,
            log_level: None,
        }
    }
}

/// Inter-call pacing: item `i` waits `min(base + i * step, cap)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingSettings {
    pub base_ms: u64,
    pub step_ms: u64,
    pub cap_ms: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            base_ms: 2_000,
            step_ms: 500,
            cap_ms: 10_000,
        }
    }
}

/// Retry schedules for transient and throttled failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub throttle_max_retries: u32,
    pub throttle_base_delay_ms: u64,
    pub throttle_max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            throttle_max_retries: 5,
            throttle_base_delay_ms: 15_000,
            throttle_max_delay_ms: 120_000,
        }
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive throttled calls tolerated before aborting the batch.
    pub max_consecutive_throttles: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            max_consecutive_throttles: 3,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address, e.g. "127.0.0.1:8484".
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8484".to_string(),
        }
    }
}

// =============================================================================
// Loading and Validation
// =============================================================================

/// Platform config directory for costscope.
#[must_use]
pub fn config_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "costscope")
        .map_or_else(|| PathBuf::from("."), |dirs| dirs.config_dir().to_path_buf())
}

impl Config {
    /// Load configuration, respecting the `COSTSCOPE_CONFIG` override.
    ///
    /// # Errors
    ///
    /// Returns error only if a config file exists but is invalid.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            Self::load_from(Path::new(&path))
        } else {
            Self::load_from(&config_dir().join("config.toml"))
        }
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "loading config file");
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CostscopeError::Config(format!("invalid config file: {e}")))?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns error when serialization or the write fails.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| CostscopeError::Config(format!("failed to serialize config: {e}")))?;
        fs::write(path, content)?;
        tracing::debug!(?path, "config file saved");
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns error when a value is out of bounds or the bind address does
    /// not parse.
    pub fn validate(&self) -> Result<()> {
        if self.general.timeout_seconds == 0 || self.general.timeout_seconds > 300 {
            return Err(CostscopeError::Config(
                "timeout_seconds must be between 1 and 300".to_string(),
            ));
        }
        if self.retry.max_retries > 10 || self.retry.throttle_max_retries > 10 {
            return Err(CostscopeError::Config(
                "retry counts above 10 would stack multi-minute delays".to_string(),
            ));
        }
        if self.breaker.max_consecutive_throttles == 0 {
            return Err(CostscopeError::Config(
                "max_consecutive_throttles must be at least 1".to_string(),
            ));
        }
        if self.pacing.cap_ms < self.pacing.base_ms {
            return Err(CostscopeError::Config(
                "pacing cap_ms must not be below base_ms".to_string(),
            ));
        }
        self.bind_addr()?;
        Ok(())
    }

    /// Resolved management API base URL (env override wins).
    #[must_use]
    pub fn api_base(&self) -> String {
        std::env::var(ENV_API_BASE).ok().unwrap_or_else(|| {
            self.general
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
        })
    }

    /// Resolved server bind address (env override wins).
    ///
    /// # Errors
    ///
    /// Returns error when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let raw = std::env::var(ENV_BIND).ok().unwrap_or_else(|| self.server.bind.clone());
        raw.parse().map_err(|_| {
            CostscopeError::Config(format!("invalid bind address '{raw}'"))
        })
    }

    /// Resolved request timeout (env override wins).
    #[must_use]
    pub fn timeout(&self) -> Duration {
        let seconds = std::env::var(ENV_TIMEOUT)
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(self.general.timeout_seconds);
        Duration::from_secs(seconds)
    }

    /// Build a batch executor from the configured pacing, retry, and breaker
    /// settings.
    #[must_use]
    pub fn batch_executor(&self) -> BatchExecutor {
        let pacing = PacingConfig {
            base: Duration::from_millis(self.pacing.base_ms),
            step: Duration::from_millis(self.pacing.step_ms),
            cap: Duration::from_millis(self.pacing.cap_ms),
        };
        let transient = RetryPolicy {
            max_retries: self.retry.max_retries,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            jitter: true,
        };
        let throttle = RetryPolicy {
            max_retries: self.retry.throttle_max_retries,
            base_delay: Duration::from_millis(self.retry.throttle_base_delay_ms),
            max_delay: Duration::from_millis(self.retry.throttle_max_delay_ms),
            jitter: false,
        };
        BatchExecutor::new(
            pacing,
            transient,
            throttle,
            self.breaker.max_consecutive_throttles,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
