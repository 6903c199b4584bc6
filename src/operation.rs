//! Typed operation registry.
//!
//! Every operation the UI can dispatch is a variant of an enum implementing
//! [`OperationKind`]. Its [`OperationDescriptor`] (retryable, silent, write,
//! success message) comes from an exhaustive `match`, so adding an operation
//! without deciding its policy does not compile.

use std::fmt::Debug;

/// Per-operation dispatch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationDescriptor {
    /// Transient failures may be retried.
    pub retryable: bool,
    /// Failures are not shown to the user.
    pub silent: bool,
    /// The operation changes server state. Retrying a write requires an
    /// idempotency key on the request.
    pub write: bool,
    /// Shown once per operation key on success.
    pub success_message: Option<&'static str>,
    /// The operation exchanges credentials for a session, so a 401 means
    /// the credentials were wrong. It is surfaced as an ordinary failure
    /// and never reaches the session guard.
    pub authenticates: bool,
}

impl OperationDescriptor {
    /// A retryable read with no success message.
    pub const fn read() -> Self {
        Self {
            retryable: true,
            silent: false,
            write: false,
            success_message: None,
            authenticates: false,
        }
    }

    /// A non-retryable write.
    pub const fn write() -> Self {
        Self {
            retryable: false,
            silent: false,
            write: true,
            success_message: None,
            authenticates: false,
        }
    }

    pub const fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub const fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub const fn success(mut self, message: &'static str) -> Self {
        self.success_message = Some(message);
        self
    }

    pub const fn authenticates(mut self) -> Self {
        self.authenticates = true;
        self
    }
}

/// An operation identifier with a compile-time policy.
pub trait OperationKind: Copy + Debug + Send + Sync + 'static {
    /// Stable name, used in operation keys, logs and metric labels.
    fn name(&self) -> &'static str;

    fn descriptor(&self) -> OperationDescriptor;
}

/// Operations issued by the learning app's feature code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    Login,
    Logout,
    FetchProfile,
    UpdateProfile,
    FetchLessons,
    FetchLessonDetail,
    SubmitQuiz,
    FetchProgress,
    FetchLeaderboard,
    FetchNotifications,
    MarkNotificationRead,
    FetchSubscription,
    SubmitPayment,
    CancelSubscription,
}

impl OperationKind for ApiOperation {
    fn name(&self) -> &'static str {
        match self {
            ApiOperation::Login => "login",
            ApiOperation::Logout => "logout",
            ApiOperation::FetchProfile => "fetch_profile",
            ApiOperation::UpdateProfile => "update_profile",
            ApiOperation::FetchLessons => "fetch_lessons",
            ApiOperation::FetchLessonDetail => "fetch_lesson_detail",
            ApiOperation::SubmitQuiz => "submit_quiz",
            ApiOperation::FetchProgress => "fetch_progress",
            ApiOperation::FetchLeaderboard => "fetch_leaderboard",
            ApiOperation::FetchNotifications => "fetch_notifications",
            ApiOperation::MarkNotificationRead => "mark_notification_read",
            ApiOperation::FetchSubscription => "fetch_subscription",
            ApiOperation::SubmitPayment => "submit_payment",
            ApiOperation::CancelSubscription => "cancel_subscription",
        }
    }

    fn descriptor(&self) -> OperationDescriptor {
        match self {
            ApiOperation::Login => OperationDescriptor::write()
                .authenticates()
                .success("Welcome back!"),
            ApiOperation::Logout => OperationDescriptor::write().silent(),
            ApiOperation::FetchProfile
            | ApiOperation::FetchLessons
            | ApiOperation::FetchLessonDetail
            | ApiOperation::FetchProgress
            | ApiOperation::FetchSubscription => OperationDescriptor::read(),
            ApiOperation::FetchLeaderboard | ApiOperation::FetchNotifications => {
                OperationDescriptor::read().silent()
            }
            ApiOperation::UpdateProfile => OperationDescriptor::write()
                .retryable(true)
                .success("Profile updated."),
            ApiOperation::SubmitQuiz => OperationDescriptor::write()
                .retryable(true)
                .success("Answers submitted."),
            ApiOperation::MarkNotificationRead => {
                OperationDescriptor::write().retryable(true).silent()
            }
            ApiOperation::SubmitPayment => OperationDescriptor::write()
                .retryable(true)
                .success("Payment completed."),
            ApiOperation::CancelSubscription => {
                OperationDescriptor::write().success("Subscription cancelled.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_retryable() {
        let d = ApiOperation::FetchLessons.descriptor();
        assert!(d.retryable);
        assert!(!d.write);
        assert!(d.success_message.is_none());
    }

    #[test]
    fn payment_is_a_retryable_write_with_message() {
        let d = ApiOperation::SubmitPayment.descriptor();
        assert!(d.retryable);
        assert!(d.write);
        assert_eq!(d.success_message, Some("Payment completed."));
    }

    #[test]
    fn only_login_authenticates() {
        assert!(ApiOperation::Login.descriptor().authenticates);
        assert!(!ApiOperation::FetchProfile.descriptor().authenticates);
        assert!(!ApiOperation::Logout.descriptor().authenticates);
    }

    #[test]
    fn logout_is_silent_and_not_retried() {
        let d = ApiOperation::Logout.descriptor();
        assert!(d.silent);
        assert!(!d.retryable);
    }
}
