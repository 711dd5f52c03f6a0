use module::SnapshotProcessor;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info};

use crate::ledger::entities::LedgerState;

pub mod module;
pub mod saver;

/// Receives ledger snapshots and saves them. Writes are best effort: a failure is logged and the
/// next snapshot is processed as usual, the in-memory ledger stays authoritative.
pub struct PersistenceModule<Processor> {
    receiver: UnboundedReceiver<LedgerState>,
    processor: Processor,
}

impl<P: SnapshotProcessor> PersistenceModule<P> {
    pub fn new(receiver: UnboundedReceiver<LedgerState>, processor: P) -> Self {
        Self {
            receiver,
            processor,
        }
    }

    /// Snapshots that piled up while a write was in flight are skipped in favour of the newest.
    async fn next_snapshot(&mut self) -> Option<LedgerState> {
        let mut snapshot = self.receiver.recv().await?;
        let mut skipped = 0;
        while let Ok(newer) = self.receiver.try_recv() {
            snapshot = newer;
            skipped += 1;
        }
        if skipped > 0 {
            debug!("Coalesced {skipped} snapshots");
        }
        Some(snapshot)
    }

    /// Runs until every sender is dropped.
    pub async fn run(mut self) -> anyhow::Result<()> {
        while let Some(snapshot) = self.next_snapshot().await {
            match self.processor.process_next(snapshot).await {
                Ok(_) => {
                    info!("Saved ledger snapshot")
                }
                Err(e) => {
                    error!("Error saving ledger snapshot, keeping it in memory only: {e:?}")
                }
            }
        }

        let result = self.processor.finalize().await;
        self.receiver.close();
        result
    }
}
