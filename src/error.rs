//! Hermod error types

use std::fmt;

/// Failure taxonomy.
///
/// Decisions (retry, session handling, notification) are made on the kind,
/// never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The remote host could not be reached.
    NetworkUnreachable,
    /// The transport gave up waiting for a response.
    Timeout,
    /// 5xx response.
    ServerFault,
    /// 401 response.
    Unauthorized,
    /// Authentication failed because the access token expired.
    TokenExpired,
    /// 403 response.
    Forbidden,
    /// 429 response.
    UsageExceeded,
    /// Target language is not in the supported set.
    UnsupportedLanguage,
    /// 400 / 422 response.
    ValidationFailure,
    /// Anything the classifier does not recognise.
    Unknown,
}

impl ErrorKind {
    /// Whether a retry may reasonably succeed.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::NetworkUnreachable | ErrorKind::Timeout | ErrorKind::ServerFault
        )
    }

    /// Whether the failure means the session is no longer valid.
    pub fn is_auth(self) -> bool {
        matches!(self, ErrorKind::Unauthorized | ErrorKind::TokenExpired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NetworkUnreachable => "network_unreachable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServerFault => "server_fault",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::TokenExpired => "token_expired",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::UsageExceeded => "usage_exceeded",
            ErrorKind::UnsupportedLanguage => "unsupported_language",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hermod error types
///
/// `Clone` so that a single settled outcome can be fanned out to every
/// caller attached to the same in-flight request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HermodError {
    /// A remote call failed and was classified.
    #[error("{kind}: {message}")]
    Request {
        kind: ErrorKind,
        status: Option<u16>,
        message: String,
    },

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// The shared task was dropped before it settled.
    #[error("request cancelled before it settled")]
    Cancelled,
}

impl HermodError {
    /// Build a classified request error.
    pub fn request(kind: ErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        HermodError::Request {
            kind,
            status,
            message: message.into(),
        }
    }

    /// Map this error into the failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HermodError::Request { kind, .. } => *kind,
            HermodError::UnsupportedLanguage(_) => ErrorKind::UnsupportedLanguage,
            HermodError::Json(_) => ErrorKind::ValidationFailure,
            HermodError::Configuration(_) | HermodError::Cancelled => ErrorKind::Unknown,
        }
    }

    /// HTTP status attached to the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            HermodError::Request { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}

impl From<serde_json::Error> for HermodError {
    fn from(err: serde_json::Error) -> Self {
        HermodError::Json(err.to_string())
    }
}

impl From<toml::de::Error> for HermodError {
    fn from(err: toml::de::Error) -> Self {
        HermodError::Configuration(err.to_string())
    }
}

/// Result type alias for Hermod operations
pub type Result<T> = std::result::Result<T, HermodError>;
