use std::{
    fmt::Display,
    io::{ErrorKind, SeekFrom},
    ops::Deref,
    path::PathBuf,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
#[cfg(test)]
use mockall::automock;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::trace;

/// Logical keys of the persisted state. Each key holds one JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateKey {
    Jobs,
    ActiveJobId,
    UserName,
    WorkSessionEarnings,
    DailyEarningsHistory,
    WorkSessions,
    LastReconciledDate,
}

impl StateKey {
    pub const ALL: [StateKey; 7] = [
        StateKey::Jobs,
        StateKey::ActiveJobId,
        StateKey::UserName,
        StateKey::WorkSessionEarnings,
        StateKey::DailyEarningsHistory,
        StateKey::WorkSessions,
        StateKey::LastReconciledDate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StateKey::Jobs => "jobs",
            StateKey::ActiveJobId => "activeJobId",
            StateKey::UserName => "userName",
            StateKey::WorkSessionEarnings => "workSessionEarnings",
            StateKey::DailyEarningsHistory => "dailyEarningsHistory",
            StateKey::WorkSessions => "workSessions",
            StateKey::LastReconciledDate => "lastReconciledDate",
        }
    }
}

impl Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Interface for abstracting where state documents are kept.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// `None` when the key was never written.
    async fn read(&self, key: StateKey) -> Result<Option<String>>;

    /// Replaces the whole document stored under `key`.
    async fn write(&self, key: StateKey, value: String) -> Result<()>;
}

#[async_trait]
impl<T> KeyValueStorage for T
where
    T: Deref + Send + Sync,
    T::Target: KeyValueStorage,
{
    async fn read(&self, key: StateKey) -> Result<Option<String>> {
        self.deref().read(key).await
    }

    async fn write(&self, key: StateKey, value: String) -> Result<()> {
        self.deref().write(key, value).await
    }
}

/// The main realization of [KeyValueStorage]: a directory with one `<key>.json` file per key.
/// Files are locked while in use so that two running instances don't interleave writes.
pub struct JsonFileStorage {
    state_dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(state_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&state_dir)?;

        Ok(Self { state_dir })
    }

    fn path(&self, key: StateKey) -> PathBuf {
        self.state_dir.join(format!("{}.json", key.name()))
    }

    async fn write_with_file(file: &mut File, value: &str) -> Result<(), std::io::Error> {
        file.set_len(0).await?;
        file.seek(SeekFrom::Start(0)).await?;
        file.write_all(value.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStorage for JsonFileStorage {
    async fn read(&self, key: StateKey) -> Result<Option<String>> {
        let path = self.path(key);
        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Opening {path:?}")),
        };

        file.lock_shared()?;
        let mut content = String::new();
        let result = file.read_to_string(&mut content).await;
        file.unlock_async().await?;
        result.with_context(|| format!("Reading {path:?}"))?;

        trace!("Read {} bytes for {key}", content.len());
        Ok(Some(content))
    }

    async fn write(&self, key: StateKey, value: String) -> Result<()> {
        let path = self.path(key);
        let mut file = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(&path)
            .await
            .with_context(|| format!("Opening {path:?}"))?;

        // Truncation happens under the lock, a reader never sees a half cleared file from us.
        file.lock_exclusive()?;
        let result = Self::write_with_file(&mut file, &value).await;
        file.unlock_async().await?;
        result.with_context(|| format!("Writing {path:?}"))?;

        trace!("Wrote {} bytes for {key}", value.len());
        Ok(())
    }
}
