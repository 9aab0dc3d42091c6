//! Error handling for the todolist reconciler.
//!
//! One error type, [`TodoError`], flows through every layer. It carries:
//! - a machine-readable [`ErrorCode`] (used for log fields and the
//!   `todolist_errors_total` counter)
//! - a short operator message and an optional internal detail
//! - the underlying error as `source`
//!
//! # Usage
//!
//! ```rust,ignore
//! use todolist_core::error::{ErrorContext, ErrorCode, Result};
//!
//! fn load() -> Result<String> {
//!     std::fs::read_to_string("/var/run/token")
//!         .with_error_code(ErrorCode::MissingConfiguration)
//! }
//! ```

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TodoError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes, grouped by the component that fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Durable store
    StoreError,
    StoreConnectionFailed,
    StoreNotReady,

    // Payload encoding
    SerializationError,
    DeserializationError,
    InvalidJson,

    // Kubernetes API
    KubeApiError,
    WatchFailed,
    ResourceExpired,
    NetworkError,
    Unauthorized,

    // Bootstrap
    ConfigurationError,
    MissingConfiguration,
    InvalidConfiguration,

    // Process internals
    InternalError,
    ChannelClosed,
}

impl ErrorCode {
    /// Component the error belongs to, used as a metric label.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::StoreError | Self::StoreConnectionFailed | Self::StoreNotReady => "store",
            Self::SerializationError | Self::DeserializationError | Self::InvalidJson => {
                "serialization"
            }
            Self::KubeApiError
            | Self::WatchFailed
            | Self::ResourceExpired
            | Self::NetworkError
            | Self::Unauthorized => "kubernetes",
            Self::ConfigurationError | Self::MissingConfiguration | Self::InvalidConfiguration => {
                "configuration"
            }
            Self::InternalError | Self::ChannelClosed => "internal",
        }
    }

    /// Whether the same operation may succeed if attempted again later.
    ///
    /// The reconciler never retries an event itself; this only tells the
    /// operator whether a dropped event was a transient failure.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreConnectionFailed
                | Self::StoreError
                | Self::StoreNotReady
                | Self::WatchFailed
                | Self::ResourceExpired
                | Self::NetworkError
                | Self::KubeApiError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// How loudly an error is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Expected to clear up without intervention
    Medium,
    /// One event or publish was lost
    High,
    /// The agent cannot make progress
    Critical,
}

impl ErrorSeverity {
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::StoreNotReady
            | ErrorCode::WatchFailed
            | ErrorCode::ResourceExpired
            | ErrorCode::NetworkError => Self::Medium,
            ErrorCode::StoreConnectionFailed
            | ErrorCode::InternalError
            | ErrorCode::ChannelClosed => Self::Critical,
            _ => Self::High,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// Error raised by store, codec, Kubernetes and bootstrap code.
#[derive(Error, Debug)]
pub struct TodoError {
    code: ErrorCode,

    /// Short operator-facing message
    user_message: Cow<'static, str>,

    /// Extra detail for logs (server response body, file path, ...)
    internal_message: Option<String>,

    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for TodoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(detail) = &self.internal_message {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

impl TodoError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Every constructor funnels through here so each error is counted once.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        counter!(
            "todolist_errors_total",
            "code" => code.to_string(),
            "category" => code.category(),
        )
        .increment(1);

        Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            source: None,
        }
    }

    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        Self::new(code, user_message).with_internal_message(internal_message)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "Internal error", detail)
    }

    pub fn configuration(detail: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InvalidConfiguration, "Invalid configuration", detail)
    }

    /// The store was accessed before its readiness signal fired.
    pub fn store_not_ready() -> Self {
        Self::new(ErrorCode::StoreNotReady, "Store is not ready")
    }

    /// A Kubernetes API call returned a non-success status.
    pub fn kube_status(status: u16, body: impl Into<String>) -> Self {
        let code = match status {
            401 | 403 => ErrorCode::Unauthorized,
            410 => ErrorCode::ResourceExpired,
            _ => ErrorCode::KubeApiError,
        };
        Self::with_internal(
            code,
            format!("Kubernetes API returned status {}", status),
            body,
        )
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_internal_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = Some(message.into());
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    /// Emit one log record for this error at a level matching its severity.
    pub fn log(&self) {
        match self.severity() {
            ErrorSeverity::Medium => warn!(
                error_code = %self.code,
                category = self.code.category(),
                retryable = self.is_retryable(),
                detail = ?self.internal_message,
                "{}",
                self.user_message
            ),
            ErrorSeverity::High => error!(
                error_code = %self.code,
                category = self.code.category(),
                retryable = self.is_retryable(),
                detail = ?self.internal_message,
                "{}",
                self.user_message
            ),
            ErrorSeverity::Critical => error!(
                error_code = %self.code,
                category = self.code.category(),
                critical = true,
                detail = ?self.internal_message,
                source = ?self.source,
                "{}",
                self.user_message
            ),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Convert foreign errors into a [`TodoError`] with a chosen code.
pub trait ErrorContext<T> {
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| {
            TodoError::with_internal(code, "Operation failed", e.to_string()).with_source(e)
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Conversions
// ═══════════════════════════════════════════════════════════════════════════════

impl From<redis::RedisError> for TodoError {
    fn from(error: redis::RedisError) -> Self {
        let (code, message) = if error.is_connection_refusal() || error.is_connection_dropped() {
            (ErrorCode::StoreConnectionFailed, "Redis connection lost")
        } else if error.is_timeout() {
            (ErrorCode::StoreError, "Redis command timed out")
        } else {
            (ErrorCode::StoreError, "Redis command failed")
        };

        Self::with_internal(code, message, error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for TodoError {
    fn from(error: serde_json::Error) -> Self {
        use serde_json::error::Category;

        let (code, message) = match error.classify() {
            Category::Eof => (ErrorCode::InvalidJson, "Truncated JSON payload"),
            Category::Syntax | Category::Data => {
                (ErrorCode::DeserializationError, "Malformed JSON payload")
            }
            Category::Io => (ErrorCode::SerializationError, "Failed to encode JSON payload"),
        };

        Self::with_internal(code, message, error.to_string()).with_source(error)
    }
}

impl From<reqwest::Error> for TodoError {
    fn from(error: reqwest::Error) -> Self {
        let (code, message) = match error.status().map(|s| s.as_u16()) {
            Some(401 | 403) => (ErrorCode::Unauthorized, "Kubernetes API rejected credentials"),
            Some(_) => (ErrorCode::KubeApiError, "Kubernetes API returned an error"),
            None if error.is_timeout() => {
                (ErrorCode::NetworkError, "Kubernetes API request timed out")
            }
            None if error.is_connect() => (ErrorCode::NetworkError, "Kubernetes API unreachable"),
            None => (ErrorCode::NetworkError, "Kubernetes API request failed"),
        };

        Self::with_internal(code, message, error.to_string()).with_source(error)
    }
}

impl From<std::io::Error> for TodoError {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, message) = match error.kind() {
            ErrorKind::NotFound => (ErrorCode::MissingConfiguration, "File not found"),
            ErrorKind::PermissionDenied => (ErrorCode::ConfigurationError, "File not readable"),
            _ => (ErrorCode::InternalError, "I/O error"),
        };

        Self::with_internal(code, message, error.to_string()).with_source(error)
    }
}

impl From<config::ConfigError> for TodoError {
    fn from(error: config::ConfigError) -> Self {
        let code = match &error {
            config::ConfigError::NotFound(_) => ErrorCode::MissingConfiguration,
            config::ConfigError::FileParse { .. } | config::ConfigError::Type { .. } => {
                ErrorCode::InvalidConfiguration
            }
            _ => ErrorCode::ConfigurationError,
        };

        Self::with_internal(code, "Configuration could not be loaded", error.to_string())
            .with_source(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_codes_are_retryable() {
        assert!(ErrorCode::StoreConnectionFailed.is_retryable());
        assert!(ErrorCode::WatchFailed.is_retryable());
        assert!(!ErrorCode::DeserializationError.is_retryable());
        assert!(!ErrorCode::InvalidConfiguration.is_retryable());
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(ErrorCode::StoreNotReady.category(), "store");
        assert_eq!(ErrorCode::InvalidJson.category(), "serialization");
        assert_eq!(ErrorCode::WatchFailed.category(), "kubernetes");
        assert_eq!(ErrorCode::MissingConfiguration.category(), "configuration");
        assert_eq!(ErrorCode::ChannelClosed.category(), "internal");
    }

    #[test]
    fn test_severity_by_code() {
        assert_eq!(ErrorSeverity::from_code(&ErrorCode::NetworkError), ErrorSeverity::Medium);
        assert_eq!(ErrorSeverity::from_code(&ErrorCode::StoreError), ErrorSeverity::High);
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::ChannelClosed),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_kube_status_maps_auth_failures() {
        assert_eq!(TodoError::kube_status(403, "forbidden").code(), ErrorCode::Unauthorized);
        assert_eq!(TodoError::kube_status(422, "invalid").code(), ErrorCode::KubeApiError);
    }

    #[test]
    fn test_kube_status_gone_is_resource_expired() {
        let err = TodoError::kube_status(410, "too old resource version: 5 (120)");
        assert_eq!(err.code(), ErrorCode::ResourceExpired);
        assert!(err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_corrupt_payload_is_deserialization_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error = TodoError::from(err);
        assert_eq!(error.code(), ErrorCode::DeserializationError);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_truncated_payload_is_invalid_json() {
        let err = serde_json::from_str::<serde_json::Value>(r#"{"a":"#).unwrap_err();
        assert_eq!(TodoError::from(err).code(), ErrorCode::InvalidJson);
    }

    #[test]
    fn test_with_error_code_keeps_detail() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"));
        let error = result.with_error_code(ErrorCode::StoreError).unwrap_err();
        assert_eq!(error.code(), ErrorCode::StoreError);
        assert_eq!(error.internal_message(), Some("disk on fire"));
    }

    #[test]
    fn test_display_includes_code_and_detail() {
        let error = TodoError::with_internal(
            ErrorCode::StoreError,
            "Redis command failed",
            "Connection refused: localhost:6379",
        );

        let display = error.to_string();
        assert!(display.starts_with("[StoreError] Redis command failed"));
        assert!(display.contains("Connection refused"));
    }
}
