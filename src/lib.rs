//! Hermod - client-side mediation layer for chatty HTTP backends
//!
//! Hermod sits between UI state and a remote HTTP service and makes
//! unreliable calls behave predictably:
//!
//! - identical concurrent operations share one request ([`flight`])
//! - transient failures are retried with bounded backoff ([`retry`])
//! - authentication expiry is handled once, centrally ([`session`])
//! - call statistics are kept per hourly window ([`stats`])
//! - translation results live in bounded FIFO caches ([`translate`])
//!
//! # Example
//!
//! ```rust,no_run
//! use hermod::http::HttpRequest;
//! use hermod::operation::ApiOperation;
//! use hermod::{Hermod, Request};
//!
//! #[tokio::main]
//! async fn main() -> hermod::Result<()> {
//!     let ctx = Hermod::builder()
//!         .base_url("https://api.example.com")
//!         .build()?;
//!
//!     let lessons = ctx
//!         .dispatch(Request::new(
//!             ApiOperation::FetchLessons,
//!             HttpRequest::get("/lessons"),
//!         ))
//!         .await?;
//!     println!("{lessons}");
//!
//!     let hello = ctx.translation().translate("안녕하세요", "en", None).await?;
//!     println!("{hello}");
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod classify;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod flight;
pub mod gateway;
pub mod http;
pub mod notify;
pub mod operation;
pub mod retry;
pub mod session;
pub mod stats;
pub mod telemetry;
pub mod translate;

// Re-export main types at crate root
pub use cache::{CacheConfig, FifoCache};
pub use classify::{ErrorRecord, classify};
pub use config::Config;
pub use dispatch::{DispatchConfig, Interceptor, Request};
pub use error::{ErrorKind, HermodError, Result};
pub use flight::SingleFlight;
pub use gateway::{Hermod, HermodBuilder, HermodContext};
pub use http::{HttpClient, HttpFailure, HttpRequest, HttpResponse, Method};
pub use notify::{Notification, NotificationCenter, NotificationKind, Notifier};
pub use operation::{ApiOperation, OperationDescriptor, OperationKind};
pub use retry::{RetryConfig, RetryOutcome, RetryScheduler};
pub use session::{Navigator, SessionConfig, SessionGuard, SessionState, SessionStore};
pub use stats::{Statistics, StatsCollector};
pub use translate::{TranslationConfig, TranslationService};
