use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::state::StorageState;
use super::Storage;
use crate::models::{
    Category, Holding, HoldingChange, Id, Instrument, InstrumentCode, Order, Quote, QuoteWrite,
};

const STATE_FILE: &str = "fundbook.json";
const LOCK_FILE: &str = "fundbook.lock";

/// JSON file-based storage implementation.
///
/// Directory structure:
/// ```text
/// data/
///   fundbook.json               instruments, quotes, holdings, orders
///   fundbook.lock               held exclusively by the current writer
///   fundbook.json.<uuid>.tmp    only present while a write is in flight
/// ```
///
/// A write takes an OS-level exclusive lock on `fundbook.lock`, reloads the
/// file, renders the complete next state into its own temp file and renames
/// it over `fundbook.json`, so writers in separate processes (the daemon and
/// the CLI) are serialized. If validation or the write fails the old file is
/// untouched, so a failed commit is a rollback.
#[derive(Clone)]
pub struct JsonFileStorage {
    base_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn state_file(&self) -> PathBuf {
        self.base_path.join(STATE_FILE)
    }

    fn temp_file(&self) -> PathBuf {
        self.base_path.join(format!("{STATE_FILE}.{}.tmp", Uuid::new_v4()))
    }

    async fn load(&self) -> Result<StorageState> {
        let path = self.state_file();
        match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON from {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StorageState::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn persist(&self, state: &StorageState) -> Result<()> {
        let content = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
        let temp = self.temp_file();
        if let Err(e) = fs::write(&temp, content).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e).with_context(|| format!("Failed to write {}", temp.display()));
        }
        if let Err(e) = fs::rename(&temp, self.state_file()).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e).context("Failed to replace state file");
        }
        Ok(())
    }

    /// Block (off the runtime) until this handle owns `fundbook.lock`. The
    /// lock is released when the returned file is dropped.
    async fn lock_data_dir(&self) -> Result<std::fs::File> {
        fs::create_dir_all(&self.base_path)
            .await
            .context("Failed to create data directory")?;
        let path = self.base_path.join(LOCK_FILE);
        tokio::task::spawn_blocking(move || -> Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            file.lock_exclusive()
                .with_context(|| format!("Failed to lock {}", path.display()))?;
            Ok(file)
        })
        .await
        .context("Lock task failed")?
    }

    async fn read<T>(&self, f: impl FnOnce(&StorageState) -> T) -> Result<T> {
        let state = self.load().await?;
        Ok(f(&state))
    }

    /// Load, mutate, persist while holding both the in-process and the
    /// on-disk lock. Nothing is written when `f` fails.
    async fn write<T>(&self, f: impl FnOnce(&mut StorageState) -> Result<T>) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let _file_lock = self.lock_data_dir().await?;
        let mut state = self.load().await?;
        let value = f(&mut state)?;
        self.persist(&state).await?;
        Ok(value)
    }
}

#[async_trait::async_trait]
impl Storage for JsonFileStorage {
    async fn list_instruments(&self) -> Result<Vec<Instrument>> {
        self.read(|s| s.list_instruments()).await
    }

    async fn instruments_by_category(&self, category: Category) -> Result<Vec<Instrument>> {
        self.read(|s| s.instruments_by_category(category)).await
    }

    async fn get_instrument(&self, id: &Id) -> Result<Option<Instrument>> {
        self.read(|s| s.get_instrument(id)).await
    }

    async fn find_instrument(&self, code: &InstrumentCode) -> Result<Option<Instrument>> {
        self.read(|s| s.find_instrument(code)).await
    }

    async fn insert_instrument(&self, instrument: &Instrument) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let _file_lock = self.lock_data_dir().await?;
        let mut state = self.load().await?;
        if !state.insert_instrument(instrument) {
            return Ok(false);
        }
        self.persist(&state).await?;
        Ok(true)
    }

    async fn latest_quote_times(
        &self,
        category: Category,
    ) -> Result<Vec<(Instrument, Option<DateTime<Utc>>)>> {
        self.read(|s| s.latest_quote_times(category)).await
    }

    async fn latest_quote(&self, instrument_id: &Id) -> Result<Option<Quote>> {
        self.read(|s| s.latest_quote(instrument_id)).await
    }

    async fn quotes_in_range(
        &self,
        instrument_ids: &[Id],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Quote>> {
        self.read(|s| s.quotes_in_range(instrument_ids, from, to))
            .await
    }

    async fn commit_quotes(&self, writes: &[QuoteWrite]) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        self.write(|s| s.commit_quotes(writes)).await
    }

    async fn list_holdings(&self, owner_id: &Id) -> Result<Vec<Holding>> {
        self.read(|s| s.list_holdings(owner_id)).await
    }

    async fn get_holding(&self, owner_id: &Id, instrument_id: &Id) -> Result<Option<Holding>> {
        self.read(|s| s.get_holding(owner_id, instrument_id)).await
    }

    async fn commit_holding(&self, change: &HoldingChange) -> Result<()> {
        self.write(|s| s.commit_holding(change)).await
    }

    async fn list_orders(&self, holding_id: &Id) -> Result<Vec<Order>> {
        self.read(|s| s.list_orders(holding_id)).await
    }
}
