//! Maps [LedgerState] onto the logical keys of a [KeyValueStorage]. Loading never fails: a key
//! that is missing or can't be decoded falls back to its default and the problem is logged.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ledger::entities::{sample_jobs, DailyEarningRecord, Job, LedgerState, WorkSession};

use super::key_value::{KeyValueStorage, StateKey};

/// Encoded documents of a state, one per key.
pub type EncodedState = BTreeMap<StateKey, String>;

pub fn encode_state(state: &LedgerState) -> Result<EncodedState> {
    let mut encoded = EncodedState::new();
    encoded.insert(StateKey::Jobs, serde_json::to_string(&state.jobs)?);
    encoded.insert(
        StateKey::ActiveJobId,
        serde_json::to_string(&state.active_job_id)?,
    );
    encoded.insert(StateKey::UserName, serde_json::to_string(&state.user_name)?);
    encoded.insert(
        StateKey::WorkSessionEarnings,
        serde_json::to_string(&state.work_session_earnings)?,
    );
    encoded.insert(
        StateKey::DailyEarningsHistory,
        serde_json::to_string(&state.daily_earnings_history)?,
    );
    encoded.insert(
        StateKey::WorkSessions,
        serde_json::to_string(&state.work_sessions)?,
    );
    encoded.insert(
        StateKey::LastReconciledDate,
        serde_json::to_string(&state.last_reconciled_date)?,
    );
    Ok(encoded)
}

/// Reads and decodes one key. Every failure is reported as `None`.
async fn read_key<T: DeserializeOwned>(storage: &impl KeyValueStorage, key: StateKey) -> Option<T> {
    let content = match storage.read(key).await {
        Ok(Some(content)) => content,
        Ok(None) => {
            debug!("Nothing stored for {key}");
            return None;
        }
        Err(e) => {
            warn!("Failed to read {key}, using default: {e:?}");
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Stored {key} is corrupted, using default: {e}");
            None
        }
    }
}

/// Loads the persisted state, key by key. Unusable jobs fall back to the sample jobs, everything
/// else to empty values. The result is repaired before it is returned.
pub async fn load_state(storage: &impl KeyValueStorage) -> LedgerState {
    let defaults = LedgerState::empty();

    let jobs = read_key::<Vec<Job>>(storage, StateKey::Jobs).await;
    let jobs_restored = jobs.is_some();
    let jobs = jobs.unwrap_or_else(sample_jobs);

    let active_job_id = match read_key::<Option<Uuid>>(storage, StateKey::ActiveJobId).await {
        Some(id) if jobs_restored => id,
        _ => jobs.first().map(|job| job.id),
    };

    let mut state = LedgerState {
        user_name: read_key(storage, StateKey::UserName)
            .await
            .unwrap_or(defaults.user_name),
        jobs,
        active_job_id,
        work_session_earnings: read_key(storage, StateKey::WorkSessionEarnings)
            .await
            .unwrap_or(defaults.work_session_earnings),
        daily_earnings_history: read_key::<Vec<DailyEarningRecord>>(
            storage,
            StateKey::DailyEarningsHistory,
        )
        .await
        .unwrap_or_default(),
        work_sessions: read_key::<Vec<WorkSession>>(storage, StateKey::WorkSessions)
            .await
            .unwrap_or_default(),
        last_reconciled_date: read_key::<Option<NaiveDate>>(storage, StateKey::LastReconciledDate)
            .await
            .flatten(),
    };

    state.repair();
    state
}

/// Writes every key of the state. Stops at the first failing key.
pub async fn save_state(storage: &impl KeyValueStorage, state: &LedgerState) -> Result<()> {
    for (key, value) in encode_state(state)? {
        storage.write(key, value).await?;
    }
    Ok(())
}
