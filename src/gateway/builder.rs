//! Builder for configuring hermod contexts

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use super::HermodContext;
use crate::config::Config;
use crate::dispatch::{DispatchConfig, Interceptor};
use crate::http::HttpClient;
use crate::notify::{Notifier, TracingNotifier};
use crate::retry::RetryConfig;
use crate::session::{MemorySessionStore, Navigator, SessionConfig, SessionGuard, SessionStore};
use crate::stats::StatsCollector;
use crate::translate::{TranslationConfig, TranslationService};
use crate::{HermodError, Result};

/// Main entry point for creating hermod contexts.
pub struct Hermod;

impl Hermod {
    /// Create a new builder.
    pub fn builder() -> HermodBuilder {
        HermodBuilder::new()
    }
}

/// Builder for [`HermodContext`].
///
/// Component configs start from [`Config`] (defaults unless
/// [`config`](Self::config) is called); the per-component setters override
/// the corresponding section.
pub struct HermodBuilder {
    config: Config,
    client: Option<Arc<dyn HttpClient>>,
    base_url: Option<String>,
    notifier: Option<Arc<dyn Notifier>>,
    session_store: Option<Arc<dyn SessionStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    dispatch: Option<DispatchConfig>,
    retry: Option<RetryConfig>,
    session: Option<SessionConfig>,
    translation: Option<TranslationConfig>,
    stats_window: Option<Duration>,
    sweeper: bool,
}

impl Default for HermodBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HermodBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            client: None,
            base_url: None,
            notifier: None,
            session_store: None,
            navigator: None,
            dispatch: None,
            retry: None,
            session: None,
            translation: None,
            stats_window: None,
            sweeper: true,
        }
    }

    /// Start from a loaded configuration file.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use a custom HTTP client.
    pub fn client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Use the bundled reqwest client against this base URL.
    #[cfg(feature = "reqwest-client")]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Where notifications go (default: log only).
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Token storage (default: in-memory).
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Router used for the login redirect. Without one, no redirect happens.
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn dispatch(mut self, config: DispatchConfig) -> Self {
        self.dispatch = Some(config);
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    pub fn session(mut self, config: SessionConfig) -> Self {
        self.session = Some(config);
        self
    }

    pub fn translation(mut self, config: TranslationConfig) -> Self {
        self.translation = Some(config);
        self
    }

    pub fn stats_window(mut self, window: Duration) -> Self {
        self.stats_window = Some(window);
        self
    }

    /// Whether `build` starts the periodic sweep (default: on).
    ///
    /// The sweep runs every translation `cache.sweep_interval` and only
    /// starts when `build` is called inside a tokio runtime.
    pub fn sweeper(mut self, enabled: bool) -> Self {
        self.sweeper = enabled;
        self
    }

    /// Build the context.
    ///
    /// Fails with [`HermodError::Configuration`] when no HTTP client can be
    /// constructed.
    pub fn build(self) -> Result<HermodContext> {
        let store = self
            .session_store
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));

        let client = match self.client {
            Some(client) => client,
            None => default_client(
                self.base_url.or_else(|| self.config.client.base_url.clone()),
                Duration::from_millis(self.config.client.timeout_ms),
                Arc::clone(&store),
            )?,
        };

        let session = Arc::new(SessionGuard::new(
            store,
            Arc::clone(&notifier),
            self.navigator,
            self.session.unwrap_or_else(|| self.config.session_config()),
        ));
        let stats = Arc::new(StatsCollector::new(
            self.stats_window
                .unwrap_or_else(|| self.config.stats_window()),
        ));

        let interceptor = Interceptor::new(
            Arc::clone(&client),
            notifier,
            Arc::clone(&session),
            stats,
            self.retry.unwrap_or_else(|| self.config.retry_config()),
            self.dispatch
                .unwrap_or_else(|| self.config.dispatch_config()),
        );
        let translation = TranslationService::new(
            client,
            self.translation
                .unwrap_or_else(|| self.config.translation_config()),
        );

        let period = translation.config().cache.sweep_interval;
        let ctx = HermodContext {
            interceptor,
            translation,
            session,
            sweeper: Arc::new(Mutex::new(None)),
        };
        if self.sweeper {
            if tokio::runtime::Handle::try_current().is_ok() {
                ctx.spawn_sweeper(period);
            } else {
                debug!("no tokio runtime, periodic sweep not started");
            }
        }
        Ok(ctx)
    }
}

#[cfg(feature = "reqwest-client")]
fn default_client(
    base_url: Option<String>,
    timeout: Duration,
    store: Arc<dyn SessionStore>,
) -> Result<Arc<dyn HttpClient>> {
    let url = base_url.ok_or_else(|| {
        HermodError::Configuration("no HTTP client or base URL configured".to_string())
    })?;
    let client = crate::http::ReqwestClient::with_timeout(url, timeout)?.session_store(store);
    Ok(Arc::new(client))
}

#[cfg(not(feature = "reqwest-client"))]
fn default_client(
    _base_url: Option<String>,
    _timeout: Duration,
    _store: Arc<dyn SessionStore>,
) -> Result<Arc<dyn HttpClient>> {
    Err(HermodError::Configuration(
        "no HTTP client configured".to_string(),
    ))
}
