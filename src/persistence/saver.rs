use anyhow::Result;
use tracing::trace;

use crate::{
    ledger::entities::LedgerState,
    storage::{
        key_value::KeyValueStorage,
        state_store::{encode_state, EncodedState},
    },
};

use super::module::SnapshotProcessor;

/// Bridges [PersistenceModule](super::PersistenceModule) and [KeyValueStorage]. Remembers what
/// was last written so that only changed keys hit the disk.
pub struct StateSaver<S: KeyValueStorage> {
    storage: S,
    written: EncodedState,
}

impl<S: KeyValueStorage> StateSaver<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            written: EncodedState::new(),
        }
    }
}

impl<S: KeyValueStorage> SnapshotProcessor for StateSaver<S> {
    async fn process_next(&mut self, snapshot: LedgerState) -> Result<()> {
        for (key, value) in encode_state(&snapshot)? {
            if self.written.get(&key) == Some(&value) {
                trace!("{key} unchanged");
                continue;
            }
            self.storage.write(key, value.clone()).await?;
            self.written.insert(key, value);
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}
