use keywarden_core::message::fallback_message;
use keywarden_core::{ErrorCode, ErrorInput};

/// Client-specific result type
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors from the admin client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response
    #[error("{status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message extracted from the body
        message: String,
        /// Raw response body
        body: String,
    },

    /// Failed to parse response
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// HTTP status when a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Parse(_) | Self::Config(_) => None,
        }
    }

    /// Classifier recorded in the error store
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Http(e) if e.is_timeout() => ErrorCode::Canceled,
            Self::Http(e) if e.is_decode() => ErrorCode::ClientError,
            Self::Http(e) => e.status().map_or(ErrorCode::NetworkError, |s| ErrorCode::from_status(s.as_u16())),
            Self::Api { status, .. } => ErrorCode::from_status(*status),
            Self::Parse(_) => ErrorCode::ClientError,
            Self::Config(_) => ErrorCode::UnknownError,
        }
    }

    /// Store entry describing this failure of `method url`
    pub fn to_error_input(&self, url: &str, method: &str) -> ErrorInput {
        let message = match self {
            Self::Api { message, .. } => message.clone(),
            Self::Http(e) => match (self.code(), e.status()) {
                (ErrorCode::NetworkError, _) => "Network Error".to_owned(),
                (ErrorCode::Canceled, _) => "Request canceled".to_owned(),
                (_, Some(status)) => fallback_message(status.as_u16()),
                _ => e.to_string(),
            },
            other => other.to_string(),
        };

        let mut input = ErrorInput::new(self.code(), message).with_request(url, method);

        if let Some(status) = self.status() {
            input = input.with_status(status);
        }

        if let Self::Api { body, .. } = self
            && !body.is_empty()
        {
            let response = serde_json::from_str(body).unwrap_or_else(|_| serde_json::Value::String(body.clone()));
            input = input.with_detail("response", response);
        }

        input
    }
}
