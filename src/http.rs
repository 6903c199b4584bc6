//! HTTP client seam.
//!
//! Hermod consumes an [`HttpClient`] rather than owning a transport. A call
//! either resolves to an [`HttpResponse`] (`{status, data}`) or rejects with
//! an [`HttpFailure`] (`{status, data, message}`), which the
//! [classifier](crate::classify) maps into the failure taxonomy.
//!
//! [`ReqwestClient`] is the bundled adapter (feature `reqwest-client`, on by
//! default); tests and embedders can supply their own implementation.

use async_trait::async_trait;
use serde_json::Value;

#[cfg(feature = "reqwest-client")]
pub use self::reqwest_client::ReqwestClient;

/// HTTP verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path relative to the client's base URL, e.g. `/translate`.
    pub path: String,
    pub body: Option<Value>,
    /// Sent as the `Idempotency-Key` header when present.
    pub idempotency_key: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            idempotency_key: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).body(body)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub data: Value,
}

/// Why the transport produced no response at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// The request timed out.
    Timeout,
    /// The host could not be reached.
    Connect,
    /// Anything else (TLS, body decoding, ...).
    Other,
}

/// A rejected request.
///
/// `status` is `None` when no response was received; `transport` then says
/// why.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpFailure {
    pub status: Option<u16>,
    pub data: Option<Value>,
    pub message: String,
    pub transport: Option<TransportFailure>,
}

impl HttpFailure {
    /// A failure carrying an HTTP error response.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            data: None,
            message: message.into(),
            transport: None,
        }
    }

    /// A failure where no response was received.
    pub fn transport(kind: TransportFailure, message: impl Into<String>) -> Self {
        Self {
            status: None,
            data: None,
            message: message.into(),
            transport: Some(kind),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The transport abstraction hermod sits on top of.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a request. Non-2xx responses must be returned as `Err`.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpFailure>;
}

#[cfg(feature = "reqwest-client")]
mod reqwest_client {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::Client;
    use serde_json::Value;
    use tracing::debug;

    use super::{HttpClient, HttpFailure, HttpRequest, HttpResponse, Method, TransportFailure};
    use crate::session::SessionStore;
    use crate::{HermodError, Result};

    /// Default request timeout.
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// [`HttpClient`] backed by `reqwest`.
    ///
    /// Attaches `Authorization: Bearer <token>` when a session store is
    /// configured and holds an access token.
    #[derive(Clone)]
    pub struct ReqwestClient {
        http: Client,
        base_url: String,
        session: Option<Arc<dyn SessionStore>>,
    }

    impl ReqwestClient {
        /// Create a client for the given base URL with the default timeout.
        pub fn new(base_url: impl Into<String>) -> Result<Self> {
            Self::with_timeout(base_url, DEFAULT_TIMEOUT)
        }

        pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
            let http = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| HermodError::Configuration(e.to_string()))?;
            Ok(Self {
                http,
                base_url: base_url.into().trim_end_matches('/').to_string(),
                session: None,
            })
        }

        /// Read bearer tokens from this store.
        pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
            self.session = Some(store);
            self
        }
    }

    #[async_trait]
    impl HttpClient for ReqwestClient {
        async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, HttpFailure> {
            let url = format!("{}{}", self.base_url, request.path);
            let mut builder = match request.method {
                Method::Get => self.http.get(&url),
                Method::Post => self.http.post(&url),
                Method::Put => self.http.put(&url),
                Method::Patch => self.http.patch(&url),
                Method::Delete => self.http.delete(&url),
            };

            if let Some(token) = self.session.as_ref().and_then(|s| s.token()) {
                builder = builder.bearer_auth(token);
            }
            if let Some(key) = &request.idempotency_key {
                builder = builder.header("Idempotency-Key", key);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            debug!(method = request.method.as_str(), path = %request.path, "sending request");
            let response = builder.send().await.map_err(transport_failure)?;
            let status = response.status();
            let text = response.text().await.map_err(transport_failure)?;
            let data = if text.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            };

            if status.is_success() {
                return Ok(HttpResponse {
                    status: status.as_u16(),
                    data,
                });
            }

            let message = data
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            Err(HttpFailure::status(status.as_u16(), message).with_data(data))
        }
    }

    fn transport_failure(err: reqwest::Error) -> HttpFailure {
        let kind = if err.is_timeout() {
            TransportFailure::Timeout
        } else if err.is_connect() {
            TransportFailure::Connect
        } else {
            TransportFailure::Other
        };
        HttpFailure::transport(kind, err.to_string())
    }
}
