//! Telemetry metric name constants.
//!
//! Centralised metric names for hermod operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `hermod_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: operation name (e.g. "fetch_profile", "translate")
//! - `status`: outcome: "ok" or "error"
//! - `kind`: classified error kind (e.g. "server_fault")
//! - `cache`: cache name ("translation", "translation_ui", "detection")

/// Total settled calls recorded by the statistics collector.
///
/// Labels: `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "hermod_requests_total";

/// Call duration in seconds.
pub const REQUEST_DURATION_SECONDS: &str = "hermod_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "hermod_retries_total";

/// Callers that attached to an already in-flight request instead of
/// issuing their own.
///
/// Labels: `registry` ("dispatch", "translate", "translate_ui",
/// "detect_language").
pub const COALESCED_TOTAL: &str = "hermod_coalesced_total";

/// Classified failures.
///
/// Labels: `operation`, `kind`.
pub const ERRORS_TOTAL: &str = "hermod_errors_total";

/// Successful calls slower than the configured threshold.
///
/// Labels: `operation`.
pub const SLOW_OPERATIONS_TOTAL: &str = "hermod_slow_operations_total";

/// Session invalidations performed by the session guard.
pub const SESSION_EXPIRED_TOTAL: &str = "hermod_session_expired_total";

/// Total translation cache hits.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "hermod_cache_hits_total";

/// Total translation cache misses.
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "hermod_cache_misses_total";

/// Entries evicted from a bounded cache because it was full.
///
/// Labels: `cache`.
pub const CACHE_EVICTIONS_TOTAL: &str = "hermod_cache_evictions_total";
