//! Session guard: central reaction to authentication expiry.
//!
//! When the classifier reports `Unauthorized` or `TokenExpired`, the
//! dispatch interceptor hands the failure to [`SessionGuard::handle_expired`]
//! instead of notifying per call. The guard:
//!
//! 1. clears access and refresh tokens from the [`SessionStore`]
//! 2. flips the shared [`SessionState`] to `Expired`
//! 3. posts one notification under the fixed id [`SESSION_EXPIRED_ID`]
//! 4. schedules navigation to the login path after a short delay
//!
//! Only the first failure since the session was last valid runs the
//! sequence, so a burst of concurrent 401s yields one token clear and one
//! visible message. [`SessionGuard::mark_valid`] re-arms it after login.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ErrorKind;
use crate::notify::{Notification, Notifier};
use crate::telemetry;

/// Notification id shared by every session-expiry notice.
pub const SESSION_EXPIRED_ID: &str = "session-expired";

/// Token storage owned by the embedding application.
///
/// Hermod only reads and clears it.
pub trait SessionStore: Send + Sync {
    fn token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn clear_tokens(&self);
}

/// Routes the UI somewhere (e.g. the login page).
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Session validity as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Valid,
    Expired,
}

/// Simple in-memory [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    tokens: Mutex<(Option<String>, Option<String>)>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        let store = Self::new();
        store.set_tokens(access, refresh);
        store
    }

    pub fn set_tokens(&self, access: impl Into<String>, refresh: impl Into<String>) {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) =
            (Some(access.into()), Some(refresh.into()));
    }
}

impl SessionStore for MemorySessionStore {
    fn token(&self) -> Option<String> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .0
            .clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .1
            .clone()
    }

    fn clear_tokens(&self) {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = (None, None);
    }
}

/// Session guard configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Where to send the user once the session expired. Default: `/login`.
    pub login_path: String,
    /// Delay before navigating, so the notice can be read. Default: 2s.
    pub redirect_delay: Duration,
    /// Text of the expiry notification.
    pub expired_message: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            redirect_delay: Duration::from_secs(2),
            expired_message: "Your session has expired. Please sign in again.".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    pub fn expired_message(mut self, message: impl Into<String>) -> Self {
        self.expired_message = message.into();
        self
    }
}

/// Reacts to authentication failures. See module docs.
pub struct SessionGuard {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Option<Arc<dyn Navigator>>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    redirect: Mutex<Option<JoinHandle<()>>>,
}

impl SessionGuard {
    pub fn new(
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Option<Arc<dyn Navigator>>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Valid);
        Self {
            store,
            notifier,
            navigator,
            config,
            state,
            redirect: Mutex::new(None),
        }
    }

    /// Handle a classified authentication failure.
    ///
    /// Returns `true` if this call ran the invalidation sequence, `false`
    /// if the session had already been invalidated (or `kind` is not an
    /// authentication failure).
    pub fn handle_expired(&self, kind: ErrorKind) -> bool {
        if !kind.is_auth() {
            return false;
        }

        let first = self.state.send_if_modified(|state| {
            if *state == SessionState::Expired {
                false
            } else {
                *state = SessionState::Expired;
                true
            }
        });
        if !first {
            debug!(%kind, "session already invalidated");
            return false;
        }

        info!(%kind, "session expired, clearing tokens");
        metrics::counter!(telemetry::SESSION_EXPIRED_TOTAL).increment(1);
        self.store.clear_tokens();
        self.notifier.notify(
            Notification::warning(self.config.expired_message.clone()).id(SESSION_EXPIRED_ID),
        );
        self.schedule_redirect();
        true
    }

    fn schedule_redirect(&self) {
        let Some(navigator) = self.navigator.clone() else {
            return;
        };
        let path = self.config.login_path.clone();
        let delay = self.config.redirect_delay;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    navigator.navigate(&path);
                });
                let mut slot = self.redirect.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(previous) = slot.replace(task) {
                    previous.abort();
                }
            }
            Err(_) => {
                warn!("no async runtime, navigating to login immediately");
                navigator.navigate(&path);
            }
        }
    }

    /// Mark the session valid again (after a fresh login).
    ///
    /// Cancels a redirect that has not fired yet.
    pub fn mark_valid(&self) {
        self.state.send_replace(SessionState::Valid);
        if let Some(task) = self
            .redirect
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }

    pub fn is_invalid(&self) -> bool {
        *self.state.borrow() == SessionState::Expired
    }

    /// Watch session validity, e.g. to drive a UI banner.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}
