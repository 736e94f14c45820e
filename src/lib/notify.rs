//! Transient banners shown on the page.
use std::{fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::page::{BannerId, Page};

/// How long a banner stays up when nobody dismisses it.
pub const NOTIFICATION_LIFETIME: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appends banners to a page and takes them down again after a fixed delay.
///
/// Banners stack: every call appends a new one and nothing is replaced. The
/// removal timer runs on its own task and does not care whether the user
/// already closed the banner.
#[derive(Clone)]
pub struct Notifier {
    page: Arc<dyn Page>,
    lifetime: Duration,
}

impl Notifier {
    /// Creates a [`Notifier`] using the default five second lifetime.
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self {
            page,
            lifetime: NOTIFICATION_LIFETIME,
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Shows `message` and schedules its removal. Must be called from within
    /// a tokio runtime.
    #[instrument(skip(self))]
    pub fn notify(&self, message: &str, kind: NotificationKind) -> BannerId {
        let id = self.page.append_banner(message, kind);
        let page = Arc::clone(&self.page);
        let lifetime = self.lifetime;

        debug!("showing {kind} banner {id}");

        tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;

            if page.remove_banner(id) {
                trace!("banner {id} expired");
            } else {
                trace!("banner {id} was already dismissed");
            }
        });

        id
    }

    pub fn success(&self, message: &str) -> BannerId {
        self.notify(message, NotificationKind::Success)
    }

    pub fn error(&self, message: &str) -> BannerId {
        self.notify(message, NotificationKind::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MemoryPage;

    fn notifier() -> (Arc<MemoryPage>, Notifier) {
        let page = Arc::new(MemoryPage::new());
        let notifier = Notifier::new(page.clone());

        (page, notifier)
    }

    #[tokio::test(start_paused = true)]
    async fn banner_is_removed_after_its_lifetime() {
        let (page, notifier) = notifier();

        let id = notifier.success("Fare deducted successfully!");
        assert_eq!(page.banners().len(), 1);
        assert_eq!(page.banners()[0].id, id);

        tokio::time::sleep(Duration::from_millis(4999)).await;
        assert_eq!(page.banners().len(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(page.banners().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_after_manual_dismissal_is_a_no_op() {
        let (page, notifier) = notifier();

        let first = notifier.error("first");
        let second = notifier.error("second");

        assert!(page.remove_banner(first));
        assert_eq!(page.banners().len(), 1);

        tokio::time::sleep(NOTIFICATION_LIFETIME + Duration::from_millis(1)).await;

        assert!(page.banners().is_empty());
        assert!(!page.remove_banner(second));
    }

    #[tokio::test(start_paused = true)]
    async fn banners_stack_in_call_order() {
        let (page, notifier) = notifier();

        notifier.error("one");
        notifier.error("one");
        notifier.success("two");

        let messages: Vec<_> = page.banners().into_iter().map(|b| b.message).collect();
        assert_eq!(messages, vec!["one", "one", "two"]);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_lifetime_is_honoured() {
        let (page, notifier) = notifier();
        let notifier = notifier.with_lifetime(Duration::from_millis(100));

        notifier.success("short");
        tokio::time::sleep(Duration::from_millis(101)).await;

        assert!(page.banners().is_empty());
    }
}
