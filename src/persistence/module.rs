use anyhow::Result;

use crate::ledger::entities::LedgerState;

/// Represents a consumer of ledger snapshots. Local files are the only target for now.
pub trait SnapshotProcessor {
    fn process_next(
        &mut self,
        snapshot: LedgerState,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;
}
