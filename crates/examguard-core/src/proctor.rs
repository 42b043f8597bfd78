//! Proctoring monitor.
//!
//! Gates entry into the running phase on camera + microphone access, turns
//! host focus/visibility losses into violation events, and defines the
//! warn, warn, submit ladder the session applies to them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::host::{FocusSignal, HostPage};
use crate::notification::{NotificationChannel, NotificationLevel};
use crate::session::SessionEvent;
use crate::traits::{MediaDevices, MediaRequest, MediaStream};

/// Violations allowed before the test is submitted automatically.
pub const DEFAULT_VIOLATION_LIMIT: u32 = 3;

pub const ACCESS_REQUIRED_MESSAGE: &str = "Camera and microphone access are required to take the test. Please allow access and try again.";

/// Which host signal produced a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSource {
    WindowBlur,
    PageHidden,
}

/// What the ladder decides for a given violation count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationVerdict {
    /// Warn; `remaining` more violations are tolerated before automatic submission.
    Warn { count: u32, remaining: u32 },
    /// Last warning before automatic submission.
    FinalWarning,
    /// Submit the test now.
    ForceSubmit,
}

impl ViolationVerdict {
    pub fn level(&self) -> NotificationLevel {
        match self {
            ViolationVerdict::Warn { .. } | ViolationVerdict::FinalWarning => {
                NotificationLevel::Warning
            }
            ViolationVerdict::ForceSubmit => NotificationLevel::Error,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ViolationVerdict::Warn { count, remaining } => {
                let which = if *count == 1 {
                    "First attempt".to_string()
                } else {
                    format!("Attempt {count}")
                };
                let attempts = if *remaining == 1 { "attempt" } else { "attempts" };
                format!(
                    "Warning: {which} to leave the test. You have {remaining} more {attempts} before automatic submission."
                )
            }
            ViolationVerdict::FinalWarning => "Warning: Final attempt to leave the test. Next attempt will result in automatic submission.".to_string(),
            ViolationVerdict::ForceSubmit => {
                "Test automatically submitted due to multiple navigation attempts.".to_string()
            }
        }
    }
}

/// Escalation policy for focus-loss violations. Never resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViolationLadder {
    limit: u32,
}

impl ViolationLadder {
    /// A ladder that force-submits on the `limit`-th violation.
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Verdict for the `count`-th violation (1-based).
    pub fn assess(&self, count: u32) -> ViolationVerdict {
        if count >= self.limit {
            ViolationVerdict::ForceSubmit
        } else if count + 1 == self.limit {
            ViolationVerdict::FinalWarning
        } else {
            ViolationVerdict::Warn {
                count,
                remaining: self.limit - 1 - count,
            }
        }
    }
}

impl Default for ViolationLadder {
    fn default() -> Self {
        Self::new(DEFAULT_VIOLATION_LIMIT)
    }
}

/// Owns the device handle and the focus listener of one session.
pub struct ProctoringMonitor {
    devices: Arc<dyn MediaDevices>,
    host: HostPage,
    notifier: NotificationChannel,
    stream: Option<Box<dyn MediaStream>>,
    listener: Option<JoinHandle<()>>,
}

impl ProctoringMonitor {
    pub fn new(devices: Arc<dyn MediaDevices>, host: HostPage, notifier: NotificationChannel) -> Self {
        Self {
            devices,
            host,
            notifier,
            stream: None,
            listener: None,
        }
    }

    /// Acquire camera and microphone.
    ///
    /// On failure an error notification is shown and `false` returned; the
    /// error itself is only logged.
    pub async fn request_access(&mut self) -> bool {
        if self.stream.is_some() {
            return true;
        }
        match self
            .devices
            .acquire(&MediaRequest::CAMERA_AND_MICROPHONE)
            .await
        {
            Ok(stream) => {
                tracing::info!(devices = %stream.label(), "media access granted");
                self.stream = Some(stream);
                true
            }
            Err(e) => {
                tracing::warn!(retriable = e.is_retriable(), "media access failed: {e}");
                self.notifier.error(ACCESS_REQUIRED_MESSAGE);
                false
            }
        }
    }

    pub fn has_access(&self) -> bool {
        self.stream.is_some()
    }

    /// Start forwarding focus losses to `events` as violations of `session_id`.
    pub fn attach(&mut self, session_id: Uuid, events: UnboundedSender<SessionEvent>) {
        self.detach();
        // Subscribe before spawning so no signal emitted after `attach` is missed.
        let mut signals = self.host.subscribe();
        self.listener = Some(tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                let source = match signal {
                    FocusSignal::WindowBlur => ViolationSource::WindowBlur,
                    FocusSignal::PageHidden => ViolationSource::PageHidden,
                    FocusSignal::WindowFocus | FocusSignal::PageVisible => continue,
                };
                if events
                    .send(SessionEvent::Violation { session_id, source })
                    .is_err()
                {
                    break;
                }
            }
        }));
    }

    /// Stop forwarding focus signals.
    pub fn detach(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.listener.as_ref().is_some_and(|l| !l.is_finished())
    }

    /// Release the device handle, if one is held.
    pub fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            tracing::info!(devices = %stream.label(), "releasing media devices");
            stream.release();
        }
    }

    /// Detach listeners and release devices.
    pub fn shutdown(&mut self) {
        self.detach();
        self.release();
    }
}

impl Drop for ProctoringMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct CountingDevices {
        deny: bool,
        released: Arc<AtomicU32>,
    }

    struct CountingStream(Arc<AtomicU32>);

    impl MediaStream for CountingStream {
        fn label(&self) -> String {
            "test camera + test microphone".into()
        }

        fn release(self: Box<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl MediaDevices for CountingDevices {
        async fn acquire(&self, _: &MediaRequest) -> Result<Box<dyn MediaStream>, DeviceError> {
            if self.deny {
                Err(DeviceError::PermissionDenied("camera".into()))
            } else {
                Ok(Box::new(CountingStream(Arc::clone(&self.released))))
            }
        }
    }

    #[test]
    fn default_ladder_warns_twice_then_submits() {
        let ladder = ViolationLadder::default();
        assert_eq!(
            ladder.assess(1),
            ViolationVerdict::Warn {
                count: 1,
                remaining: 1
            }
        );
        assert_eq!(ladder.assess(2), ViolationVerdict::FinalWarning);
        assert_eq!(ladder.assess(3), ViolationVerdict::ForceSubmit);
        assert_eq!(ladder.assess(7), ViolationVerdict::ForceSubmit);

        assert_eq!(
            ladder.assess(1).message(),
            "Warning: First attempt to leave the test. You have 1 more attempt before automatic submission."
        );
        assert!(ladder.assess(2).message().contains("Final attempt"));
        assert!(ladder.assess(3).message().contains("automatically submitted"));
    }

    #[test]
    fn ladder_limit_is_at_least_one() {
        let strict = ViolationLadder::new(0);
        assert_eq!(strict.limit(), 1);
        assert_eq!(strict.assess(1), ViolationVerdict::ForceSubmit);

        let lenient = ViolationLadder::new(5);
        assert_eq!(
            lenient.assess(2),
            ViolationVerdict::Warn {
                count: 2,
                remaining: 2
            }
        );
        assert!(lenient.assess(2).message().starts_with("Warning: Attempt 2 to leave"));
        assert_eq!(lenient.assess(4), ViolationVerdict::FinalWarning);
    }

    #[tokio::test]
    async fn denial_notifies_and_holds_nothing() {
        let notifier = NotificationChannel::new();
        let devices = Arc::new(CountingDevices {
            deny: true,
            ..Default::default()
        });
        let mut monitor = ProctoringMonitor::new(devices, HostPage::new(), notifier.clone());

        assert!(!monitor.request_access().await);
        assert!(!monitor.has_access());
        let shown = notifier.current().unwrap();
        assert_eq!(shown.level, NotificationLevel::Error);
        assert_eq!(shown.message, ACCESS_REQUIRED_MESSAGE);
    }

    #[tokio::test]
    async fn release_happens_exactly_once() {
        let devices = Arc::new(CountingDevices::default());
        let released = Arc::clone(&devices.released);
        let mut monitor =
            ProctoringMonitor::new(devices, HostPage::new(), NotificationChannel::new());

        assert!(monitor.request_access().await);
        assert!(monitor.request_access().await);
        monitor.release();
        monitor.release();
        drop(monitor);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blur_and_hide_each_count_once() {
        let host = HostPage::new();
        let mut monitor = ProctoringMonitor::new(
            Arc::new(CountingDevices::default()),
            host.clone(),
            NotificationChannel::new(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        monitor.attach(id, tx);

        host.emit(FocusSignal::WindowBlur);
        host.emit(FocusSignal::PageVisible);
        host.emit(FocusSignal::PageHidden);

        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Violation {
                session_id: id,
                source: ViolationSource::WindowBlur
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Violation {
                session_id: id,
                source: ViolationSource::PageHidden
            }
        );

        monitor.detach();
        assert!(!monitor.is_attached());
        host.emit(FocusSignal::WindowBlur);
        assert!(rx.recv().await.is_none());
    }
}
