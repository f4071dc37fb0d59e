use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Short machine-readable error classifier
///
/// Unknown codes written by other producers sharing the cookie are kept
/// verbatim in [`ErrorCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    /// No response was received
    NetworkError,
    /// The request was aborted or timed out
    Canceled,
    /// The server answered with a 5xx status
    ServerError,
    /// The server answered with a 4xx status, or the response was unusable
    ClientError,
    /// A caller-reported warning
    Warning,
    /// Anything else
    UnknownError,
    /// A code this crate does not know about
    Other(String),
}

impl ErrorCode {
    /// Wire representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::Canceled => "CANCELED",
            Self::ServerError => "SERVER_ERROR",
            Self::ClientError => "CLIENT_ERROR",
            Self::Warning => "WARNING",
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::Other(code) => code,
        }
    }

    /// Classify an HTTP status that was received
    pub const fn from_status(status: u16) -> Self {
        if status >= 500 { Self::ServerError } else { Self::ClientError }
    }
}

impl From<String> for ErrorCode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "NETWORK_ERROR" => Self::NetworkError,
            "CANCELED" | "ERR_CANCELED" => Self::Canceled,
            "SERVER_ERROR" => Self::ServerError,
            "CLIENT_ERROR" => Self::ClientError,
            "WARNING" => Self::Warning,
            "UNKNOWN_ERROR" => Self::UnknownError,
            _ => Self::Other(value),
        }
    }
}

impl From<ErrorCode> for String {
    fn from(value: ErrorCode) -> Self {
        match value {
            ErrorCode::Other(code) => code,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Structured payload attached to an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Path or URL of the failing request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// HTTP method of the failing request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Anything else worth keeping for diagnostics, e.g. the raw response body
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A recorded client-visible failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Unique within the store
    pub id: String,
    /// Human-readable description
    pub message: String,
    /// HTTP status, absent for transport and client failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Classifier
    pub code: ErrorCode,
    /// Capture time in epoch milliseconds
    pub timestamp: i64,
    /// Request details
    #[serde(default)]
    pub details: ErrorDetails,
}

impl ErrorEvent {
    /// Whether the event is still inside the retention window at `now_ms`
    pub const fn is_live(&self, now_ms: i64, retention_ms: i64) -> bool {
        now_ms.saturating_sub(self.timestamp) <= retention_ms
    }

    /// Permission implied by this event, only for 403 responses
    pub fn permission(&self) -> Option<crate::PermissionDescriptor> {
        crate::extract_permission(
            self.status,
            self.details.url.as_deref().unwrap_or_default(),
            self.details.method.as_deref().unwrap_or("GET"),
        )
    }
}

/// Everything a producer supplies; the store assigns id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInput {
    pub message: String,
    pub status: Option<u16>,
    pub code: ErrorCode,
    pub details: ErrorDetails,
    /// Prefixed to the message as `context: message`
    pub context: Option<String>,
}

impl ErrorInput {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            code,
            details: ErrorDetails::default(),
            context: None,
        }
    }

    /// Explicitly reported error
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnknownError, message)
    }

    /// Explicitly reported warning
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Warning, message)
    }

    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach the failing request
    #[must_use]
    pub fn with_request(mut self, url: impl Into<String>, method: impl Into<String>) -> Self {
        self.details.url = Some(url.into());
        self.details.method = Some(method.into().to_ascii_uppercase());
        self
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details.extra.insert(key.into(), value);
        self
    }

    /// Build the full event at `now_ms`
    pub fn into_event(self, now_ms: i64) -> ErrorEvent {
        let message = match self.context {
            Some(context) if !context.is_empty() => format!("{context}: {}", self.message),
            _ => self.message,
        };

        ErrorEvent {
            id: generate_id(now_ms),
            message,
            status: self.status,
            code: self.code,
            timestamp: now_ms,
            details: self.details,
        }
    }
}

/// Time-based id with a random suffix so events captured in the same
/// millisecond do not collide
pub fn generate_id(now_ms: i64) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();

    format!("{now_ms}-{suffix}")
}
