use std::time::Duration;

/// Exponential reconnect delay: base, 2x, 4x, then capped at 8x.
pub(super) struct Backoff {
    attempt: u32,
    base_ms: u64,
    max_attempts: u32,
}

impl Backoff {
    pub(super) fn new(base_ms: u64, max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            base_ms,
            max_attempts,
        }
    }

    pub(super) fn next(&mut self) -> Duration {
        self.attempt += 1;
        let delay = self.base_ms * 2u64.pow((self.attempt - 1).min(3));
        Duration::from_millis(delay)
    }

    pub(super) fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    pub(super) fn reset(&mut self) {
        self.attempt = 0;
    }
}
