//! Transfer progress reporting
//!
//! [`ProgressListener`] is the sink an application implements.
//! [`ProgressTracker`] accumulates bytes from any number of concurrent
//! transfer workers and forwards them to the listener at most once per
//! refresh interval, plus once unconditionally when the transfer finishes.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default minimum time between two progress notifications
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(200);

/// Receives progress notifications
pub trait ProgressListener: Send + Sync {
    /// Called with the bytes transferred so far and the expected total
    fn on_progress(&self, transferred: u64, total: u64);
}

impl<F> ProgressListener for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn on_progress(&self, transferred: u64, total: u64) {
        self(transferred, total)
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    total: u64,
    transferred: u64,
    last_update: Option<Instant>,
}

/// Thread-safe, throttled progress accumulator
pub struct ProgressTracker {
    listener: Arc<dyn ProgressListener>,
    refresh_interval: Duration,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    pub fn new(listener: Arc<dyn ProgressListener>) -> Self {
        Self::with_interval(listener, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn with_interval(listener: Arc<dyn ProgressListener>, refresh_interval: Duration) -> Self {
        Self {
            listener,
            refresh_interval,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Starts a new transfer of `total` bytes, resetting the counters
    pub fn set_total_size(&self, total: u64) {
        let mut state = self.lock();
        *state = TrackerState {
            total,
            ..TrackerState::default()
        };
    }

    /// Adds transferred bytes; notifies the listener if the interval elapsed
    pub fn add_transferred(&self, bytes: u64) {
        let snapshot = {
            let mut state = self.lock();
            state.transferred += bytes;
            let now = Instant::now();
            let due = state
                .last_update
                .map_or(true, |last| now.duration_since(last) >= self.refresh_interval);
            if due {
                state.last_update = Some(now);
                Some((state.transferred, state.total))
            } else {
                None
            }
        };

        if let Some((transferred, total)) = snapshot {
            self.listener.on_progress(transferred, total);
        }
    }

    /// Notifies the listener regardless of the refresh interval
    pub fn finish_transfer(&self) {
        let (transferred, total) = {
            let mut state = self.lock();
            state.last_update = Some(Instant::now());
            (state.transferred, state.total)
        };
        self.listener.on_progress(transferred, total);
    }

    pub fn transferred(&self) -> u64 {
        self.lock().transferred
    }

    pub fn total_size(&self) -> u64 {
        self.lock().total
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("refresh_interval", &self.refresh_interval)
            .field("state", &*self.lock())
            .finish()
    }
}
