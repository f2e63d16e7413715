//! Frame-coalesced commit scheduling.
//!
//! `request_commit` may be called many times in quick succession (one per
//! settled tile near the end of a batch, plus eviction-only viewport
//! changes); the scheduler collapses those into at most one merge-and-commit
//! per frame interval by arming a deadline the engine loop sleeps on.

use std::time::{Duration, Instant};

use crate::render::RenderSink;

/// Commit pacing state for the engine loop.
#[derive(Debug)]
pub struct CommitScheduler {
    frame_interval: Duration,
    deadline: Option<Instant>,
    last_fire: Option<Instant>,
}

impl CommitScheduler {
    /// Create a scheduler with the given frame interval.
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            deadline: None,
            last_fire: None,
        }
    }

    /// Request a commit. Idempotent while one is already pending.
    ///
    /// The armed deadline is one frame interval after the previous fire, or
    /// immediate if a full interval has already passed.
    pub fn request_commit(&mut self) {
        if self.deadline.is_some() {
            return;
        }
        let now = Instant::now();
        let at = match self.last_fire {
            Some(prev) => (prev + self.frame_interval).max(now),
            None => now,
        };
        self.deadline = Some(at);
    }

    /// The armed deadline, if a commit is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True if a commit is pending.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the armed deadline when it fires, recording the fire time
    /// for pacing the next request.
    pub fn mark_fired(&mut self) {
        self.deadline = None;
        self.last_fire = Some(Instant::now());
    }

    /// Drop any pending commit and clear the rendered output immediately.
    ///
    /// Used on disable and on degraded-mode entry, where waiting a frame
    /// would flash stale detail.
    pub fn commit_empty(&mut self, render: &dyn RenderSink) {
        self.deadline = None;
        render.clear();
    }

}
