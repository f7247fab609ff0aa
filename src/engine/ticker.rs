use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::utils::clock::Clock;

pub const DISPLAY_INTERVAL: Duration = Duration::from_secs(1);

/// Pulse asking the foreground consumer to refresh elapsed values from the timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub at: DateTime<Utc>,
}

/// Process wide pulse source. Timers advance on their own, this only tells the foreground when
/// to copy their values into the projects it displays.
pub struct Ticker {
    next: mpsc::Sender<Tick>,
    shutdown: CancellationToken,
    frequency: Duration,
    time_provider: Box<dyn Clock>,
}

impl Ticker {
    pub fn new(
        next: mpsc::Sender<Tick>,
        shutdown: CancellationToken,
        frequency: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            shutdown,
            frequency,
            time_provider,
        }
    }

    /// Executes the pulse loop until shutdown, or until the receiving side is gone.
    pub async fn run(self) -> Result<()> {
        let mut tick_point = self.time_provider.instant();
        loop {
            tick_point += self.frequency;

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Ticker stopped");
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(tick_point) => ()
            }

            let tick = Tick {
                at: self.time_provider.time(),
            };
            // A pulse still pending means the consumer is behind, one refresh covers both.
            match self.next.try_send(tick) {
                Ok(_) => debug!("Sent {:?}", tick),
                Err(mpsc::error::TrySendError::Full(_)) => debug!("Skipped pulse, consumer busy"),
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    info!("Tick receiver dropped, stopping ticker");
                    return Ok(());
                }
            }
        }
    }
}
