//! Error classification.
//!
//! Maps a raw [`HttpFailure`] into an [`ErrorKind`]. Classification never
//! fails: anything unrecognised is [`ErrorKind::Unknown`].
//!
//! | Input | Kind |
//! |---|---|
//! | no response, timed out / 408 | `Timeout` |
//! | no response, otherwise | `NetworkUnreachable` |
//! | 400, 422 | `ValidationFailure` |
//! | 401 | `Unauthorized` (`TokenExpired` if the body says so) |
//! | 403 | `Forbidden` (`TokenExpired` if the body says so) |
//! | 429 | `UsageExceeded` |
//! | 5xx | `ServerFault` |
//!
//! A body `code` of `UNSUPPORTED_LANGUAGE` wins over the status mapping.

use serde_json::Value;

use crate::error::{ErrorKind, HermodError};
use crate::http::{HttpFailure, TransportFailure};

const TOKEN_EXPIRED_CODES: &[&str] = &["TOKEN_EXPIRED", "token_expired", "jwt_expired"];
const UNSUPPORTED_LANGUAGE_CODE: &str = "UNSUPPORTED_LANGUAGE";

/// Classify a rejected request.
pub fn classify(failure: &HttpFailure) -> ErrorKind {
    let code = failure
        .data
        .as_ref()
        .and_then(|d| d.get("code"))
        .and_then(Value::as_str);

    if code == Some(UNSUPPORTED_LANGUAGE_CODE) {
        return ErrorKind::UnsupportedLanguage;
    }
    let token_expired = code.is_some_and(|c| TOKEN_EXPIRED_CODES.contains(&c));

    match failure.status {
        None => match failure.transport {
            Some(TransportFailure::Timeout) => ErrorKind::Timeout,
            Some(TransportFailure::Connect) => ErrorKind::NetworkUnreachable,
            Some(TransportFailure::Other) => ErrorKind::Unknown,
            // No response and no reason: the request never left.
            None => ErrorKind::NetworkUnreachable,
        },
        Some(401) if token_expired => ErrorKind::TokenExpired,
        Some(401) => ErrorKind::Unauthorized,
        Some(403) if token_expired => ErrorKind::TokenExpired,
        Some(403) => ErrorKind::Forbidden,
        Some(400 | 422) => ErrorKind::ValidationFailure,
        Some(408) => ErrorKind::Timeout,
        Some(429) => ErrorKind::UsageExceeded,
        Some(500..=599) => ErrorKind::ServerFault,
        Some(_) => ErrorKind::Unknown,
    }
}

impl From<HttpFailure> for HermodError {
    fn from(failure: HttpFailure) -> Self {
        let kind = classify(&failure);
        HermodError::request(kind, failure.status, failure.message)
    }
}

/// A classified failure, kept for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub http_status: Option<u16>,
    pub message: String,
    pub operation_key: String,
}

impl ErrorRecord {
    pub fn new(error: &HermodError, operation_key: impl Into<String>) -> Self {
        let message = match error {
            HermodError::Request { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            kind: error.kind(),
            http_status: error.status(),
            message,
            operation_key: operation_key.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn status_codes_map_to_kinds() {
        let cases = [
            (400, ErrorKind::ValidationFailure),
            (401, ErrorKind::Unauthorized),
            (403, ErrorKind::Forbidden),
            (404, ErrorKind::Unknown),
            (408, ErrorKind::Timeout),
            (422, ErrorKind::ValidationFailure),
            (429, ErrorKind::UsageExceeded),
            (500, ErrorKind::ServerFault),
            (503, ErrorKind::ServerFault),
            (599, ErrorKind::ServerFault),
        ];
        for (status, kind) in cases {
            assert_eq!(classify(&HttpFailure::status(status, "x")), kind, "{status}");
        }
    }

    #[test]
    fn transport_failures() {
        assert_eq!(
            classify(&HttpFailure::transport(TransportFailure::Timeout, "t")),
            ErrorKind::Timeout
        );
        assert_eq!(
            classify(&HttpFailure::transport(TransportFailure::Connect, "c")),
            ErrorKind::NetworkUnreachable
        );
        assert_eq!(
            classify(&HttpFailure::transport(TransportFailure::Other, "o")),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn token_expired_code_overrides_status() {
        let f = HttpFailure::status(401, "expired").with_data(json!({"code": "TOKEN_EXPIRED"}));
        assert_eq!(classify(&f), ErrorKind::TokenExpired);
        let f = HttpFailure::status(403, "expired").with_data(json!({"code": "jwt_expired"}));
        assert_eq!(classify(&f), ErrorKind::TokenExpired);
    }

    #[test]
    fn unsupported_language_code() {
        let f = HttpFailure::status(400, "nope").with_data(json!({"code": "UNSUPPORTED_LANGUAGE"}));
        assert_eq!(classify(&f), ErrorKind::UnsupportedLanguage);
    }

    #[test]
    fn failure_converts_into_classified_error() {
        let err: HermodError = HttpFailure::status(502, "bad gateway").into();
        assert_eq!(err.kind(), ErrorKind::ServerFault);
        assert_eq!(err.status(), Some(502));
        assert!(err.is_transient());
    }

    #[test]
    fn record_keeps_operation_key() {
        let err = HermodError::request(ErrorKind::Forbidden, Some(403), "denied");
        let record = ErrorRecord::new(&err, "fetch_profile:1234");
        assert_eq!(record.kind, ErrorKind::Forbidden);
        assert_eq!(record.http_status, Some(403));
        assert_eq!(record.message, "denied");
        assert_eq!(record.operation_key, "fetch_profile:1234");
    }
}
