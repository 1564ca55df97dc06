//! Periodic task scheduling for the cooperative control loop.
//!
//! A `ScheduledTask` does not own a thread. The loop polls it with the current time and
//! runs the task body when `poll` reports it due. Missed periods coalesce into one firing,
//! matching interval-timer behaviour on a busy event loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Clones observe the same state.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    period_ms: u64,
    next_due_ms: u64,
    /// Remaining time to the next firing, captured on pause.
    paused_remaining_ms: Option<u64>,
    token: CancellationToken,
}

impl ScheduledTask {
    /// Start a task whose first firing is one period after `now_ms`.
    pub fn start(name: &'static str, period_ms: u64, now_ms: u64) -> Self {
        let period_ms = period_ms.max(1);
        Self {
            name,
            period_ms,
            next_due_ms: now_ms.saturating_add(period_ms),
            paused_remaining_ms: None,
            token: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_remaining_ms.is_some()
    }

    /// Returns true when the task is due. Advances the schedule past `now_ms`.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if self.is_cancelled() || self.is_paused() || now_ms < self.next_due_ms {
            return false;
        }
        let behind = now_ms - self.next_due_ms;
        let skipped = behind / self.period_ms;
        if skipped > 0 {
            log::debug!("{}: coalescing {} missed periods", self.name, skipped);
        }
        self.next_due_ms += (skipped + 1) * self.period_ms;
        true
    }

    /// Suspend firing, remembering how much of the current period was left.
    pub fn pause(&mut self, now_ms: u64) {
        if self.is_paused() {
            return;
        }
        self.paused_remaining_ms = Some(self.next_due_ms.saturating_sub(now_ms));
    }

    /// Resume firing; the remaining part of the interrupted period is honoured.
    pub fn resume(&mut self, now_ms: u64) {
        if let Some(remaining) = self.paused_remaining_ms.take() {
            self.next_due_ms = now_ms.saturating_add(remaining);
        }
    }
}
