use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
struct TimerState {
    elapsed: Duration,
    running: bool,
    /// Token of the task currently advancing `elapsed`. Present exactly while running.
    ticking: Option<CancellationToken>,
}

impl TimerState {
    /// Cancels the advancing task. Callers hold the lock, and the task only advances after
    /// checking its token under that same lock, so nothing is added once this returns.
    fn halt(&mut self) {
        if let Some(token) = self.ticking.take() {
            token.cancel();
        }
        self.running = false;
    }
}

/// Live stopwatch for one project. Elapsed time grows in whole [TICK_INTERVAL] steps from a
/// spawned tokio task while the foreground reads it, every access goes through one mutex.
///
/// Must be started from within a tokio runtime.
pub struct Timer {
    state: Arc<Mutex<TimerState>>,
    interval: Duration,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self::with_interval(TICK_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            state: Arc::default(),
            interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        lock(&self.state)
    }

    /// Starts advancing. Does nothing when already running, so there is never more than one
    /// advancing task per timer.
    pub fn start(&self) {
        let mut state = self.lock();
        if state.running {
            return;
        }
        let token = CancellationToken::new();
        state.running = true;
        state.ticking = Some(token.clone());
        drop(state);

        tokio::spawn(advance(Arc::clone(&self.state), self.interval, token));
    }

    /// Halts advancement. When this returns no further tick will be applied.
    pub fn stop(&self) {
        let mut state = self.lock();
        if !state.running {
            return;
        }
        state.halt();
    }

    /// Halts advancement, if any, and zeroes elapsed.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.halt();
        state.elapsed = Duration::ZERO;
    }

    pub fn set_elapsed(&self, elapsed: Duration) {
        self.lock().elapsed = elapsed;
    }

    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    pub fn running(&self) -> bool {
        self.lock().running
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.lock().halt();
    }
}

fn lock(state: &Mutex<TimerState>) -> MutexGuard<'_, TimerState> {
    // A panic while holding the lock can't leave the state half written, every write is a
    // single field assignment.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn advance(state: Arc<Mutex<TimerState>>, interval: Duration, token: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {
                let mut state = lock(&state);
                if token.is_cancelled() {
                    return;
                }
                state.elapsed += interval;
                trace!("Timer advanced to {:?}", state.elapsed);
            }
        }
    }
}
