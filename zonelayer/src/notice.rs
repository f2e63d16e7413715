//! User-facing degraded-mode notices with per-reason rate limiting.
//!
//! Degraded-mode transitions are advisory, not errors, and they retrigger on
//! every viewport event while the condition holds. The throttle keeps the
//! notification layer from being spammed during a pan: at most one notice
//! per distinct reason per cooldown window.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Why the engine degraded to the coarse overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeReason {
    /// The display zoom is below the configured minimum.
    ZoomTooCoarse,
    /// The visible area would require more tiles than the configured cap.
    AreaTooLarge,
}

impl NoticeReason {
    /// Stable key understood by the notification layer.
    pub fn key(self) -> &'static str {
        match self {
            NoticeReason::ZoomTooCoarse => "zoom-too-coarse",
            NoticeReason::AreaTooLarge => "area-too-large",
        }
    }
}

impl fmt::Display for NoticeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Notification collaborator exposed by the owning UI layer.
pub trait NoticeSink: Send + Sync {
    /// Deliver an advisory notice. Calls are already rate-limited per
    /// distinct reason by the engine.
    fn notify(&self, reason: NoticeReason, message: &str);
}

/// Rate limiter: at most one notice per reason per cooldown window.
#[derive(Debug)]
pub struct NoticeThrottle {
    cooldown: Duration,
    last_emitted: HashMap<NoticeReason, Instant>,
}

impl NoticeThrottle {
    /// Create a throttle with the given cooldown window.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_emitted: HashMap::new(),
        }
    }

    /// Returns `true` when a notice for `reason` may fire now, recording
    /// the emission time when it does.
    pub fn allow(&mut self, reason: NoticeReason) -> bool {
        let now = Instant::now();
        match self.last_emitted.get(&reason) {
            Some(last) if now.duration_since(*last) < self.cooldown => false,
            _ => {
                self.last_emitted.insert(reason, now);
                true
            }
        }
    }

    /// Forget all emission times, re-arming every reason.
    pub fn reset(&mut self) {
        self.last_emitted.clear();
    }
}
