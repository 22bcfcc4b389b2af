//! Quiet-period debouncer for keystroke-driven inputs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;

/// Default quiet period for search boxes.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Holds the most recent input until it has been stable for `quiet_period`.
pub struct Debouncer<T> {
    pending: Option<(T, Instant)>,
    quiet_period: Duration,
    clock: Arc<dyn Clock>,
}

impl<T> Debouncer<T> {
    pub fn new(quiet_period: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            pending: None,
            quiet_period,
            clock,
        }
    }

    /// Replace the pending input and restart the quiet period.
    pub fn push(&mut self, value: T) {
        self.pending = Some((value, self.clock.now()));
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending input if the quiet period has elapsed.
    pub fn ready(&mut self) -> Option<T> {
        let (_, at) = self.pending.as_ref()?;
        if self.clock.now().saturating_duration_since(*at) >= self.quiet_period {
            self.pending.take().map(|(v, _)| v)
        } else {
            None
        }
    }

    /// Take the pending input immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(v, _)| v)
    }
}
