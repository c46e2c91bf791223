mod config;
pub mod database;
pub mod memory;

pub use config::{BackgroundConfig, Config, DisplayConfig, NotificationsConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::StoreError;

/// Returns the data directory, creating it if needed.
///
/// `TOMATOES_HOME` wins when set. Otherwise `~/.config/tomatoes[-dev]/`,
/// with the `-dev` suffix selected by `TOMATOES_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let dir = match std::env::var_os("TOMATOES_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("TOMATOES_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("tomatoes-dev")
            } else {
                base_dir.join("tomatoes")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Keys of the persisted counter layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    CompletedUnits,
    LastResetDay,
    TotalUnits,
    UnitDurationMs,
    /// Present only while a countdown is in flight.
    StartTimestampMs,
    /// Present only while a background completion is pending.
    BackgroundJobId,
}

impl Key {
    pub const ALL: [Key; 6] = [
        Key::CompletedUnits,
        Key::LastResetDay,
        Key::TotalUnits,
        Key::UnitDurationMs,
        Key::StartTimestampMs,
        Key::BackgroundJobId,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Key::CompletedUnits => "completed_units",
            Key::LastResetDay => "last_reset_day",
            Key::TotalUnits => "total_units",
            Key::UnitDurationMs => "unit_duration_ms",
            Key::StartTimestampMs => "start_timestamp_ms",
            Key::BackgroundJobId => "background_job_id",
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A consistent view of the store plus the writes staged against it.
///
/// Reads see staged writes. Nothing reaches the store until the owning
/// transaction commits.
#[derive(Debug, Default, Clone)]
pub struct Batch {
    entries: BTreeMap<String, String>,
    staged: BTreeMap<String, Option<String>>,
}

impl Batch {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self {
            entries,
            staged: BTreeMap::new(),
        }
    }

    pub fn get_raw(&self, key: Key) -> Option<&str> {
        match self.staged.get(key.as_str()) {
            Some(staged) => staged.as_deref(),
            None => self.entries.get(key.as_str()).map(String::as_str),
        }
    }

    /// Parse a value, failing with `CorruptValue` if it does not fit `T`.
    pub fn get<T: FromStr>(&self, key: Key) -> Result<Option<T>, StoreError> {
        match self.get_raw(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| StoreError::CorruptValue {
                    key: key.as_str().to_string(),
                    value: raw.to_string(),
                }),
        }
    }

    pub fn contains(&self, key: Key) -> bool {
        self.get_raw(key).is_some()
    }

    pub fn set(&mut self, key: Key, value: impl ToString) {
        self.staged
            .insert(key.as_str().to_string(), Some(value.to_string()));
    }

    pub fn remove(&mut self, key: Key) {
        self.staged.insert(key.as_str().to_string(), None);
    }

    pub fn is_dirty(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Writes to apply on commit: `Some` upserts, `None` deletes.
    pub fn into_staged(self) -> BTreeMap<String, Option<String>> {
        self.staged
    }
}

/// Durable mapping from named keys to values with atomic multi-key writes.
///
/// The store is the only channel between the foreground session and the
/// background completion handler, so every read-modify-write goes through
/// [`CounterStore::transact`].
pub trait CounterStore: Send + Sync {
    /// Read one value outside of any transaction.
    fn get(&self, key: Key) -> Result<Option<String>, StoreError>;

    /// Run `body` against a consistent view and commit its staged writes
    /// atomically. An `Err` from `body` discards every staged write.
    fn transact(
        &self,
        body: &mut dyn FnMut(&mut Batch) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;
}

/// Typed wrapper over [`CounterStore::transact`] that hands back a value.
pub fn update<T, F>(store: &dyn CounterStore, mut body: F) -> Result<T, StoreError>
where
    F: FnMut(&mut Batch) -> Result<T, StoreError>,
{
    let mut out = None;
    store.transact(&mut |batch| {
        out = Some(body(batch)?);
        Ok(())
    })?;
    out.ok_or_else(|| StoreError::QueryFailed("transaction body did not run".into()))
}

/// Everything the foreground reads at launch, in one consistent view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    pub completed_units: u32,
    pub last_reset_day: Option<u32>,
    pub start_timestamp_ms: Option<i64>,
    pub background_job_id: Option<String>,
}

impl PersistedState {
    pub fn read(batch: &Batch) -> Result<Self, StoreError> {
        Ok(Self {
            completed_units: batch.get(Key::CompletedUnits)?.unwrap_or(0),
            last_reset_day: read_day(batch)?,
            start_timestamp_ms: batch.get(Key::StartTimestampMs)?,
            background_job_id: batch.get_raw(Key::BackgroundJobId).map(str::to_string),
        })
    }

    pub fn load(store: &dyn CounterStore) -> Result<Self, StoreError> {
        update(store, |batch| Self::read(batch))
    }
}

/// Day-of-year of the last reset; anything outside 1..=366 counts as unset.
pub(crate) fn read_day(batch: &Batch) -> Result<Option<u32>, StoreError> {
    let day: Option<i64> = batch.get(Key::LastResetDay)?;
    Ok(day
        .filter(|d| (1..=366).contains(d))
        .map(|d| d as u32))
}
