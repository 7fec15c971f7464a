//! Error types for costscope.
//!
//! Uses `thiserror` for structured error types that map to HTTP statuses at
//! the server boundary and to exit codes in the CLI.
//!
//! ## Error Taxonomy
//!
//! - **Request**: the caller sent something invalid (missing required field,
//!   bad date format, unknown query type). Never retried; surfaced as a
//!   4xx-equivalent with a descriptive message.
//! - **Remote**: the management API failed. 429 and 5xx responses are
//!   retryable per the retry policies; other statuses and malformed
//!   responses are not.
//! - **Configuration / Credential**: local setup problems detected before
//!   any remote call is made.
//! - **Internal**: I/O, serialization, or unclassified faults.

use thiserror::Error;

use crate::remote::RemoteError;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid request from the caller.
    Request,
    /// Remote management API failures.
    Remote,
    /// Configuration issues (parse errors, invalid values).
    Configuration,
    /// Credential issues (missing or unusable token).
    Credential,
    /// Internal errors (bugs, I/O, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Request => "Request error",
            Self::Remote => "Remote API error",
            Self::Configuration => "Configuration error",
            Self::Credential => "Credential error",
            Self::Internal => "Internal error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for the CLI entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Invalid request (bad parameters, unknown query type)
    InvalidRequest = 2,
    /// Configuration or credential problem
    ConfigError = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

// =============================================================================
// Error Type
// =============================================================================

/// Main error type for costscope operations.
#[derive(Error, Debug)]
pub enum CostscopeError {
    /// The caller sent an invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A remote management API call failed after any applicable retries.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Configuration file or value problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// No usable credential was found.
    #[error("credential not configured: {0}")]
    CredentialMissing(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CostscopeError {
    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest(_) => ErrorCategory::Request,
            Self::Remote(_) => ErrorCategory::Remote,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::CredentialMissing(_) => ErrorCategory::Credential,
            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns whether the error is potentially recoverable by retrying.
    ///
    /// Only throttling (429) and transient server errors (5xx) qualify;
    /// everything else fails fast.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(remote) => remote.is_retryable(),
            _ => false,
        }
    }

    /// HTTP status for the server boundary.
    ///
    /// Invalid requests map to 400; everything else is a request-level
    /// failure reported as 500. Remote failures inside a batch never reach
    /// this mapping: they are folded into the response body as per-item
    /// errors.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            _ => 500,
        }
    }

    /// Map error to a CLI exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidRequest(_) => ExitCode::InvalidRequest,
            Self::Config(_) | Self::CredentialMissing(_) => ExitCode::ConfigError,
            Self::Remote(_) | Self::Io(_) | Self::Json(_) | Self::Other(_) => {
                ExitCode::GeneralError
            }
        }
    }
}

/// Result type alias for costscope operations.
pub type Result<T> = std::result::Result<T, CostscopeError>;

// =============================================================================
// Tests
// =============================================================================
