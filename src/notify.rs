//! User-facing notification channel.
//!
//! Hermod never renders anything; it posts [`Notification`]s to a
//! [`Notifier`]. Posting with an id that is already shown replaces that
//! notification instead of stacking a new one, which is how duplicate
//! failures for one operation key collapse into a single visible message.

use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
    Error,
}

/// A message for the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    /// Replacement id; `None` always stacks.
    pub id: Option<String>,
    /// How long the UI should show it; `None` uses the UI default.
    pub duration: Option<Duration>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            id: None,
            duration: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, message)
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Sink for notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// In-memory notification list with replace-by-id semantics.
///
/// Suitable as the backing store of a toast area, and used throughout the
/// test suite to observe what the user would see.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    visible: Mutex<Vec<Notification>>,
    posted: AtomicUsize,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications currently shown, oldest first.
    pub fn visible(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    /// Find a shown notification by id.
    pub fn get(&self, id: &str) -> Option<Notification> {
        self.lock()
            .iter()
            .find(|n| n.id.as_deref() == Some(id))
            .cloned()
    }

    /// Total `notify` calls, including ones that replaced an existing entry.
    pub fn posted_count(&self) -> usize {
        self.posted.load(Ordering::SeqCst)
    }

    pub fn dismiss(&self, id: &str) {
        self.lock().retain(|n| n.id.as_deref() != Some(id));
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        self.visible.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, notification: Notification) {
        self.posted.fetch_add(1, Ordering::SeqCst);
        let mut visible = self.lock();
        if let Some(id) = notification.id.as_deref()
            && let Some(existing) = visible.iter_mut().find(|n| n.id.as_deref() == Some(id))
        {
            *existing = notification;
            return;
        }
        visible.push(notification);
    }
}

/// Notifier that only logs. Used when the embedder does not supply one.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        let id = n.id.as_deref().unwrap_or("-");
        match n.kind {
            NotificationKind::Success | NotificationKind::Info => {
                info!(id, message = %n.message, "notification")
            }
            NotificationKind::Warning => warn!(id, message = %n.message, "notification"),
            NotificationKind::Error => error!(id, message = %n.message, "notification"),
        }
    }
}
