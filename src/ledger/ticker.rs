use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, Instrument};

use crate::utils::clock::Clock;

use super::{Ledger, LedgerStatus};

pub const DEFAULT_TICK: Duration = Duration::from_secs(60);

/// The ledger behind a lock, so that a tick and a user action never interleave halfway through an
/// operation.
pub type SharedLedger = Arc<Mutex<Ledger>>;

/// Drives periodic refreshes. The ticker is only a trigger: each tick re-derives today's figures
/// from the clock, so late or skipped ticks don't change the result.
pub struct RefreshTicker {
    ledger: SharedLedger,
    next: mpsc::Sender<LedgerStatus>,
    shutdown: CancellationToken,
    frequency: Duration,
    time_provider: Box<dyn Clock>,
}

impl RefreshTicker {
    pub fn new(
        ledger: SharedLedger,
        next: mpsc::Sender<LedgerStatus>,
        shutdown: CancellationToken,
        frequency: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            next,
            shutdown,
            frequency,
            time_provider,
        }
    }

    async fn tick(&self) -> LedgerStatus {
        let mut ledger = self.ledger.lock().await;
        ledger.refresh();
        ledger.status()
    }

    /// Executes the refresh loop until shutdown or until nobody listens for statuses anymore.
    pub async fn run(self) -> Result<()> {
        let mut tick_point = self.time_provider.instant();
        loop {
            tick_point += self.frequency;

            let status = self.tick().await;
            let span = info_span!("Publishing ledger status");
            debug!("Sending status {:?}", status);
            self.next
                .send(status)
                .instrument(span)
                .await
                .inspect_err(|e| error!("Status receiver is gone {e:?}"))?;

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(tick_point) => ()
            }
        }
    }
}
