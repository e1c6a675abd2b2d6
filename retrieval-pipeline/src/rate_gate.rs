use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

/// Sliding-window permit gate for the LLM endpoint's calls-per-minute
/// ceiling. Callers that find the window full get the wait they would need
/// and retry through their own bounded backoff, so no queue of pending LLM
/// calls can grow without limit.
pub struct RateGate {
    max_calls: usize,
    window: Duration,
    stamps: Mutex<VecDeque<Instant>>,
}

impl RateGate {
    pub fn new(max_calls_per_minute: usize) -> Self {
        Self::with_window(max_calls_per_minute, Duration::from_secs(60))
    }

    pub fn with_window(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            window,
            stamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Takes a permit, or reports how long until the oldest call leaves the
    /// window.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut stamps = self.stamps.lock().await;

        while let Some(front) = stamps.front() {
            if now.duration_since(*front) >= self.window {
                stamps.pop_front();
            } else {
                break;
            }
        }

        if stamps.len() < self.max_calls {
            stamps.push_back(now);
            return Ok(());
        }

        let retry_after = stamps
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or_default();
        Err(retry_after)
    }
}
