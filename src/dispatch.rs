//! Action dispatch interceptor.
//!
//! [`Interceptor::dispatch`] wraps the start / success / failure lifecycle of
//! every operation the UI issues:
//!
//! ```text
//! dispatch(request)
//!     │ key = name + hash(method, path, body)
//!     ▼
//! SingleFlight ── pending? ──► attach, share outcome
//!     │ new
//!     ▼
//! HttpClient::send ──► ok  ──► stats, slow advisory, success notice
//!     │
//!     └──────────────► err ──► classify
//!                               ├─ Unauthorized / TokenExpired ──► SessionGuard
//!                               │    (except operations that authenticate)
//!                               ├─ transient + retryable + first attempt ──► RetryScheduler
//!                               └─ otherwise ──► one failure notice + ErrorRecord
//! ```
//!
//! The whole lifecycle runs inside the spawned single-flight task, so
//! notifications and statistics happen once per settled key no matter how
//! many callers are attached, or whether any still are. Every dispatched
//! operation settles; the interceptor itself never panics on a failed call.

use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::classify::ErrorRecord;
use crate::error::ErrorKind;
use crate::flight::{DEFAULT_FLIGHT_TTL, SingleFlight};
use crate::http::{HttpClient, HttpRequest};
use crate::notify::{Notification, Notifier};
use crate::operation::{OperationDescriptor, OperationKind};
use crate::retry::{RetryConfig, RetryOutcome, RetryScheduler};
use crate::session::SessionGuard;
use crate::stats::{Statistics, StatsCollector};
use crate::telemetry;
use crate::{HermodError, Result};

const SUCCESS_NOTICE: Duration = Duration::from_secs(3);
const FAILURE_NOTICE: Duration = Duration::from_secs(5);
const SLOW_NOTICE: Duration = Duration::from_secs(4);

/// Interceptor configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Successful calls slower than this get a separate advisory. Default: 3s.
    pub slow_threshold: Duration,
    /// Safety TTL of single-flight entries. Default: 30s.
    pub flight_ttl: Duration,
    /// How many error records to keep. Default: 50.
    pub error_log_capacity: usize,
    /// Text of the slow-operation advisory.
    pub slow_message: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            slow_threshold: Duration::from_millis(3_000),
            flight_ttl: DEFAULT_FLIGHT_TTL,
            error_log_capacity: 50,
            slow_message: "This is taking longer than usual.".to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    pub fn flight_ttl(mut self, ttl: Duration) -> Self {
        self.flight_ttl = ttl;
        self
    }

    pub fn error_log_capacity(mut self, n: usize) -> Self {
        self.error_log_capacity = n;
        self
    }
}

/// An operation ready to dispatch.
#[derive(Debug, Clone)]
pub struct Request {
    operation: &'static str,
    descriptor: OperationDescriptor,
    http: HttpRequest,
}

impl Request {
    pub fn new(operation: impl OperationKind, http: HttpRequest) -> Self {
        Self {
            operation: operation.name(),
            descriptor: operation.descriptor(),
            http,
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn descriptor(&self) -> OperationDescriptor {
        self.descriptor
    }

    pub fn http(&self) -> &HttpRequest {
        &self.http
    }

    /// Operation key: identical operations with identical arguments share it.
    ///
    /// The idempotency key is deliberately excluded so two submissions of the
    /// same payload still coalesce.
    pub fn key(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.http.method.hash(&mut hasher);
        self.http.path.hash(&mut hasher);
        // serde_json maps are ordered, so equal bodies serialise identically.
        self.http
            .body
            .as_ref()
            .map(Value::to_string)
            .hash(&mut hasher);
        format!("{}:{:016x}", self.operation, hasher.finish())
    }
}

/// User-facing text for a failure.
fn failure_message(error: &HermodError) -> String {
    match error.kind() {
        ErrorKind::NetworkUnreachable => {
            "Network connection lost. Please check your connection.".to_string()
        }
        ErrorKind::Timeout => "The server took too long to respond. Please try again.".to_string(),
        ErrorKind::ServerFault => {
            "The server ran into a problem. Please try again later.".to_string()
        }
        ErrorKind::Forbidden => "You don't have permission to do that.".to_string(),
        ErrorKind::UsageExceeded => {
            "Too many requests. Please wait a moment and try again.".to_string()
        }
        ErrorKind::UnsupportedLanguage => "This language is not supported.".to_string(),
        ErrorKind::ValidationFailure => match error {
            HermodError::Request { message, .. } if !message.is_empty() => message.clone(),
            _ => "Please check your input.".to_string(),
        },
        // Only reaches the user for operations that authenticate.
        ErrorKind::Unauthorized | ErrorKind::TokenExpired => match error {
            HermodError::Request { message, .. } if !message.is_empty() => message.clone(),
            _ => "Please check your credentials and try again.".to_string(),
        },
        ErrorKind::Unknown => "Something went wrong. Please try again.".to_string(),
    }
}

struct InterceptorInner {
    client: Arc<dyn HttpClient>,
    notifier: Arc<dyn Notifier>,
    session: Arc<SessionGuard>,
    retry: RetryScheduler,
    stats: Arc<StatsCollector>,
    flights: SingleFlight<String, Value>,
    errors: Mutex<VecDeque<ErrorRecord>>,
    config: DispatchConfig,
}

/// The action dispatch interceptor. Cheap to clone.
#[derive(Clone)]
pub struct Interceptor {
    inner: Arc<InterceptorInner>,
}

impl Interceptor {
    pub fn new(
        client: Arc<dyn HttpClient>,
        notifier: Arc<dyn Notifier>,
        session: Arc<SessionGuard>,
        stats: Arc<StatsCollector>,
        retry: RetryConfig,
        config: DispatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(InterceptorInner {
                client,
                notifier,
                session,
                retry: RetryScheduler::new(retry),
                stats,
                flights: SingleFlight::with_ttl("dispatch", config.flight_ttl),
                errors: Mutex::new(VecDeque::new()),
                config,
            }),
        }
    }

    /// Dispatch an operation.
    ///
    /// If the same operation with the same arguments is already in flight,
    /// no new call is issued; this caller receives the pending outcome.
    pub async fn dispatch(&self, request: Request) -> Result<Value> {
        let key = request.key();
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        self.inner
            .flights
            .run(key, move || async move { inner.execute(request, task_key).await })
            .await
    }

    /// Current statistics window.
    pub fn stats(&self) -> Statistics {
        self.inner.stats.snapshot()
    }

    /// Most recent classified failures, oldest first.
    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.inner.lock_errors().iter().cloned().collect()
    }

    /// Number of operation keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.flights.len()
    }

    pub fn session(&self) -> &Arc<SessionGuard> {
        &self.inner.session
    }

    /// Clear statistics, the in-flight registry and the error log.
    pub fn reset(&self) {
        self.inner.stats.reset();
        self.inner.flights.clear();
        self.inner.lock_errors().clear();
    }

    /// Drop in-flight entries older than the safety TTL. Returns how many
    /// were removed.
    pub fn sweep_expired(&self) -> usize {
        self.inner.flights.sweep_expired()
    }

    pub(crate) fn downgrade(&self) -> WeakInterceptor {
        WeakInterceptor(Arc::downgrade(&self.inner))
    }
}

/// Handle that does not keep the interceptor alive.
pub(crate) struct WeakInterceptor(Weak<InterceptorInner>);

impl WeakInterceptor {
    pub(crate) fn upgrade(&self) -> Option<Interceptor> {
        self.0.upgrade().map(|inner| Interceptor { inner })
    }
}

impl InterceptorInner {
    #[instrument(skip_all, fields(operation = request.operation, key = %key))]
    async fn execute(&self, request: Request, key: String) -> Result<Value> {
        debug!("dispatching");
        match self.send_once(&request).await {
            Ok((data, elapsed)) => {
                self.on_success(&request, &key, elapsed);
                Ok(data)
            }
            Err(error) => self.on_failure(&request, &key, error).await,
        }
    }

    /// One network call. Every call is recorded in the statistics.
    async fn send_once(&self, request: &Request) -> Result<(Value, Duration)> {
        let start = Instant::now();
        let outcome = self.client.send(request.http.clone()).await;
        let elapsed = start.elapsed();
        self.stats.record(outcome.is_err(), elapsed);
        match outcome {
            Ok(response) => Ok((response.data, elapsed)),
            Err(failure) => Err(failure.into()),
        }
    }

    fn on_success(&self, request: &Request, key: &str, elapsed: Duration) {
        if elapsed > self.config.slow_threshold {
            metrics::counter!(telemetry::SLOW_OPERATIONS_TOTAL, "operation" => request.operation)
                .increment(1);
            warn!(elapsed_ms = elapsed.as_millis() as u64, "slow operation");
            self.notifier.notify(
                Notification::warning(self.config.slow_message.clone())
                    .id(format!("slow:{key}"))
                    .duration(SLOW_NOTICE),
            );
        }
        if let Some(message) = request.descriptor.success_message {
            self.notifier.notify(
                Notification::success(message)
                    .id(format!("success:{key}"))
                    .duration(SUCCESS_NOTICE),
            );
        }
    }

    async fn on_failure(
        &self,
        request: &Request,
        key: &str,
        error: HermodError,
    ) -> Result<Value> {
        let kind = error.kind();
        metrics::counter!(
            telemetry::ERRORS_TOTAL,
            "operation" => request.operation,
            "kind" => kind.as_str()
        )
        .increment(1);

        let session_failure =
            |kind: ErrorKind| kind.is_auth() && !request.descriptor.authenticates;
        if session_failure(kind) {
            self.session.handle_expired(kind);
            return Err(error);
        }

        // Retry attempts go straight through `send_once`, so a failed retry
        // never schedules another sequence.
        if self.should_retry(request, kind) {
            let outcome = self
                .retry
                .run(request.operation, |_| self.send_once(request))
                .await;
            match outcome {
                RetryOutcome::Recovered {
                    value: (data, elapsed),
                    attempts,
                } => {
                    self.on_success(request, key, elapsed);
                    self.notifier.notify(
                        Notification::info(format!(
                            "Request succeeded after {attempts} {}.",
                            if attempts == 1 { "retry" } else { "retries" }
                        ))
                        .id(format!("retry:{key}"))
                        .duration(SUCCESS_NOTICE),
                    );
                    debug!(attempts, "recovered after retry");
                    return Ok(data);
                }
                RetryOutcome::Aborted {
                    error: retry_error, ..
                } if session_failure(retry_error.kind()) => {
                    self.session.handle_expired(retry_error.kind());
                    return Err(retry_error);
                }
                RetryOutcome::Exhausted { attempts, .. }
                | RetryOutcome::Aborted { attempts, .. } => {
                    warn!(attempts, "retries did not recover, surfacing original failure");
                }
            }
        }

        self.surface(request, key, error)
    }

    fn should_retry(&self, request: &Request, kind: ErrorKind) -> bool {
        let descriptor = request.descriptor;
        if !descriptor.retryable || !kind.is_transient() {
            return false;
        }
        if descriptor.write && request.http.idempotency_key.is_none() {
            warn!(%kind, "not retrying write without idempotency key");
            return false;
        }
        true
    }

    /// Terminal failure: one notice (unless silent) and an error record.
    fn surface(&self, request: &Request, key: &str, error: HermodError) -> Result<Value> {
        if !request.descriptor.silent {
            self.notifier.notify(
                Notification::error(failure_message(&error))
                    .id(format!("error:{key}"))
                    .duration(FAILURE_NOTICE),
            );
        }

        let record = ErrorRecord::new(&error, key);
        debug!(kind = %record.kind, status = ?record.http_status, "operation failed");
        let mut errors = self.lock_errors();
        if errors.len() >= self.config.error_log_capacity.max(1) {
            errors.pop_front();
        }
        errors.push_back(record);
        Err(error)
    }

    fn lock_errors(&self) -> std::sync::MutexGuard<'_, VecDeque<ErrorRecord>> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::Method;
    use crate::operation::ApiOperation;

    #[test]
    fn key_depends_on_arguments() {
        let a = Request::new(ApiOperation::FetchLessonDetail, HttpRequest::get("/lessons/1"));
        let b = Request::new(ApiOperation::FetchLessonDetail, HttpRequest::get("/lessons/2"));
        let a2 = Request::new(ApiOperation::FetchLessonDetail, HttpRequest::get("/lessons/1"));
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), a2.key());
        assert!(a.key().starts_with("fetch_lesson_detail:"));
    }

    #[test]
    fn key_ignores_body_field_order() {
        let a = Request::new(
            ApiOperation::SubmitQuiz,
            HttpRequest::post("/quiz", json!({"a": 1, "b": 2})),
        );
        let b = Request::new(
            ApiOperation::SubmitQuiz,
            HttpRequest::post("/quiz", json!({"b": 2, "a": 1})),
        );
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn key_depends_on_method() {
        let get = Request::new(ApiOperation::FetchProfile, HttpRequest::get("/me"));
        let put = Request::new(
            ApiOperation::FetchProfile,
            HttpRequest::new(Method::Put, "/me"),
        );
        assert_ne!(get.key(), put.key());
    }

    #[test]
    fn rejected_credentials_use_server_message() {
        let err = HermodError::request(ErrorKind::Unauthorized, Some(401), "Wrong password");
        assert_eq!(failure_message(&err), "Wrong password");
        let err = HermodError::request(ErrorKind::Unauthorized, Some(401), "");
        assert!(failure_message(&err).contains("credentials"));
    }

    #[test]
    fn validation_message_comes_from_server() {
        let err = HermodError::request(ErrorKind::ValidationFailure, Some(400), "Email is taken");
        assert_eq!(failure_message(&err), "Email is taken");
        let err = HermodError::request(ErrorKind::ServerFault, Some(500), "boom");
        assert!(failure_message(&err).contains("server"));
    }
}
