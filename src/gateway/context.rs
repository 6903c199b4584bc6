//! The assembled hermod context and its background sweep.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::debug;

use crate::Result;
use crate::dispatch::{Interceptor, Request};
use crate::session::SessionGuard;
use crate::stats::Statistics;
use crate::translate::TranslationService;

/// Every hermod component, constructed once and shared by the application.
///
/// Cheap to clone; clones share state and the sweeper.
#[derive(Clone)]
pub struct HermodContext {
    pub(super) interceptor: Interceptor,
    pub(super) translation: TranslationService,
    pub(super) session: Arc<SessionGuard>,
    pub(super) sweeper: Arc<Mutex<Option<AbortHandle>>>,
}

impl HermodContext {
    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    pub fn translation(&self) -> &TranslationService {
        &self.translation
    }

    pub fn session(&self) -> &Arc<SessionGuard> {
        &self.session
    }

    /// Shorthand for `interceptor().dispatch(request)`.
    pub async fn dispatch(&self, request: Request) -> Result<serde_json::Value> {
        self.interceptor.dispatch(request).await
    }

    pub fn stats(&self) -> Statistics {
        self.interceptor.stats()
    }

    /// Drop stale in-flight entries from every registry and expired
    /// translation cache entries. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.interceptor.sweep_expired() + self.translation.sweep_expired()
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `period`.
    ///
    /// The builder starts one by default. Replaces a previously spawned
    /// sweeper; the task ends on its own once every clone of the context is
    /// dropped. Must be called from within a tokio runtime.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let period = period.max(Duration::from_millis(1));
        let interceptor = self.interceptor.downgrade();
        let translation = self.translation.downgrade();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let (Some(interceptor), Some(translation)) =
                    (interceptor.upgrade(), translation.upgrade())
                else {
                    break;
                };
                let removed = interceptor.sweep_expired() + translation.sweep_expired();
                if removed > 0 {
                    debug!(removed, "swept expired entries");
                }
            }
        });

        if let Some(previous) = self.lock_sweeper().replace(handle.abort_handle()) {
            previous.abort();
        }
        handle
    }

    /// Clear statistics, in-flight registries, error log and translation
    /// caches. Intended for tests and logout.
    pub fn reset(&self) {
        self.interceptor.reset();
        self.translation.clear_cache();
    }

    /// Reset and stop background tasks.
    pub fn dispose(&self) {
        self.interceptor.reset();
        self.translation.dispose();
        if let Some(sweeper) = self.lock_sweeper().take() {
            sweeper.abort();
        }
    }

    /// Whether a background sweeper is running.
    pub fn has_sweeper(&self) -> bool {
        self.lock_sweeper()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn lock_sweeper(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
