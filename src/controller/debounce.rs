use std::time::{Duration, Instant};

/// Trailing-edge debounce driven by the caller's clock.
///
/// Each `push` replaces the pending value and restarts the window; `poll`
/// hands the value out once the window has passed without another push.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((now + self.window, value));
    }

    /// Drop the pending value, if any
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, value)| value)
    }

    /// The pending value, once its deadline has passed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((due, _)) if now >= *due => self.cancel(),
            _ => None,
        }
    }

    /// When the pending value fires, so callers can sleep until then
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(due, _)| *due)
    }
}
