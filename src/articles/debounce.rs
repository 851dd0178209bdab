use std::time::Duration;

use tokio::time::Instant;

pub const INPUT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Holds the latest value pushed into it until it has gone `delay`
/// without being replaced.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(INPUT_DEBOUNCE)
    }
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn push(&mut self, value: T) {
        self.pending = Some((value, Instant::now() + self.delay));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Takes the value if its quiet period is over.
    pub fn take_settled(&mut self) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= Instant::now() => {
                self.pending.take().map(|(value, _)| value)
            }
            _ => None,
        }
    }

    /// Waits out the quiet period of the pending value, if any.
    pub async fn settled(&mut self) -> Option<T> {
        let deadline = self.pending.as_ref()?.1;
        tokio::time::sleep_until(deadline).await;
        self.pending.take().map(|(value, _)| value)
    }
}
