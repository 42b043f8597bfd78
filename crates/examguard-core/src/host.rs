//! Host page lifecycle signals.
//!
//! [`HostPage`] is the explicit handle a front end passes to the session:
//! it carries focus/visibility signals from the host to the proctoring
//! monitor, and the best-effort "warn before leaving" flag back to the host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A focus or visibility change reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusSignal {
    /// The window lost input focus.
    WindowBlur,
    /// The window regained input focus.
    WindowFocus,
    /// The page became hidden (tab switch, minimize, app switch).
    PageHidden,
    /// The page became visible again.
    PageVisible,
}

/// Cloneable handle on the host page.
///
/// Every subscriber gets its own unbounded feed, so a burst of signals is
/// never dropped for a listener that has not been polled yet.
#[derive(Debug, Clone, Default)]
pub struct HostPage {
    subscribers: Arc<Mutex<Vec<UnboundedSender<FocusSignal>>>>,
    leave_warning: Arc<AtomicBool>,
}

impl HostPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a focus/visibility change. Returns the number of listeners.
    pub fn emit(&self, signal: FocusSignal) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(signal).is_ok());
        subscribers.len()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<FocusSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Ask the host to warn before the page is closed or navigated away.
    pub fn set_leave_warning(&self, enabled: bool) {
        self.leave_warning.store(enabled, Ordering::SeqCst);
    }

    pub fn leave_warning_enabled(&self) -> bool {
        self.leave_warning.load(Ordering::SeqCst)
    }
}
