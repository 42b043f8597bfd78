//! Single-slot notification channel with auto-dismiss.
//!
//! At most one message is visible at a time. Issuing a new message replaces
//! the current one and restarts the dismiss window; there is no queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How long a notification stays visible.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(3);

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Monotonic sequence number within the channel.
    pub seq: u64,
    pub level: NotificationLevel,
    pub message: String,
}

struct Inner {
    tx: watch::Sender<Option<Notification>>,
    seq: AtomicU64,
    dismiss: Mutex<Option<JoinHandle<()>>>,
    ttl: Duration,
}

/// Cloneable handle to the notification slot.
///
/// `notify` spawns the dismiss timer, so it must be called from within a
/// tokio runtime.
#[derive(Clone)]
pub struct NotificationChannel {
    inner: Arc<Inner>,
}

impl NotificationChannel {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_NOTIFICATION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                tx,
                seq: AtomicU64::new(0),
                dismiss: Mutex::new(None),
                ttl,
            }),
        }
    }

    /// Show `message`, replacing whatever is currently visible.
    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) -> Notification {
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let notification = Notification {
            seq,
            level,
            message: message.into(),
        };

        match level {
            NotificationLevel::Info => tracing::info!(seq, "{}", notification.message),
            NotificationLevel::Warning => tracing::warn!(seq, "{}", notification.message),
            NotificationLevel::Error => tracing::error!(seq, "{}", notification.message),
        }

        let mut dismiss = self
            .inner
            .dismiss
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pending) = dismiss.take() {
            pending.abort();
        }
        self.inner.tx.send_replace(Some(notification.clone()));

        let weak = Arc::downgrade(&self.inner);
        let ttl = self.inner.ttl;
        *dismiss = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            clear_if_current(&weak, seq);
        }));

        notification
    }

    pub fn info(&self, message: impl Into<String>) -> Notification {
        self.notify(NotificationLevel::Info, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> Notification {
        self.notify(NotificationLevel::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Notification {
        self.notify(NotificationLevel::Error, message)
    }

    /// The currently visible notification, if any.
    pub fn current(&self) -> Option<Notification> {
        self.inner.tx.borrow().clone()
    }

    /// Observe every change of the visible notification.
    pub fn subscribe(&self) -> watch::Receiver<Option<Notification>> {
        self.inner.tx.subscribe()
    }

    /// Hide the current notification immediately.
    pub fn dismiss(&self) {
        if let Some(pending) = self
            .inner
            .dismiss
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            pending.abort();
        }
        self.inner.tx.send_if_modified(|current| current.take().is_some());
    }
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn clear_if_current(inner: &Weak<Inner>, seq: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    inner.tx.send_if_modified(|current| {
        if current.as_ref().is_some_and(|n| n.seq == seq) {
            *current = None;
            true
        } else {
            false
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn message_expires_after_ttl() {
        let channel = NotificationChannel::new();
        channel.warning("first warning");
        assert_eq!(channel.current().unwrap().message, "first warning");

        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert!(channel.current().is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(channel.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn new_message_restarts_the_window() {
        let channel = NotificationChannel::new();
        channel.info("one");
        tokio::time::sleep(Duration::from_secs(2)).await;
        channel.error("two");

        // The first message's dismiss timer would have fired here.
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let current = channel.current().unwrap();
        assert_eq!(current.message, "two");
        assert_eq!(current.level, NotificationLevel::Error);
        assert_eq!(current.seq, 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(channel.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_shows_only_the_latest() {
        let channel = NotificationChannel::with_ttl(Duration::from_secs(1));
        let mut rx = channel.subscribe();
        for i in 0..5 {
            channel.info(format!("message {i}"));
        }
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().as_ref().unwrap().message,
            "message 4"
        );
    }

    #[tokio::test]
    async fn dismiss_clears_immediately() {
        let channel = NotificationChannel::new();
        channel.info("hello");
        channel.dismiss();
        assert!(channel.current().is_none());
    }
}
