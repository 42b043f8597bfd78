//! Countdown timer.
//!
//! A tokio task that ticks once per second and reports to its owning session
//! through the session's event channel. It emits exactly one
//! [`SessionEvent::TimeExpired`] and then finishes.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

use crate::session::SessionEvent;

const TICK: Duration = Duration::from_secs(1);

/// Handle on a running countdown. Dropping it stops the countdown.
#[derive(Debug)]
pub struct CountdownTimer {
    handle: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    /// Start counting down `total_secs` seconds on behalf of `session_id`.
    pub fn start(
        session_id: Uuid,
        total_secs: u64,
        events: UnboundedSender<SessionEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            let mut remaining = total_secs;
            while remaining > 0 {
                ticker.tick().await;
                remaining -= 1;
                if remaining == 0 {
                    break;
                }
                if events
                    .send(SessionEvent::Tick {
                        session_id,
                        remaining_secs: remaining,
                    })
                    .is_err()
                {
                    return;
                }
            }
            tracing::debug!(%session_id, "countdown expired");
            let _ = events.send(SessionEvent::TimeExpired { session_id });
        });

        Self {
            handle: Some(handle),
        }
    }

    /// Stop the countdown.
    ///
    /// The task is aborted at its next await point; the session ignores any
    /// tick that was already in flight because it has left `Running`.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Render seconds as `m:ss`.
pub fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
