//! Session settings: the daily goal and the length of one unit.
//!
//! Settings live in the counter store. A running session reads them once at
//! launch; [`update_config`] only affects the next launch.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, StoreError};
use crate::storage::{update, Batch, CounterStore, Key};

pub const DEFAULT_TOTAL_UNITS: u32 = 12;
pub const DEFAULT_UNIT_DURATION_MS: u64 = 25 * 60 * 1000;

const MS_PER_MINUTE: u64 = 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub total_units: u32,
    pub unit_duration_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            total_units: DEFAULT_TOTAL_UNITS,
            unit_duration_ms: DEFAULT_UNIT_DURATION_MS,
        }
    }
}

impl SessionConfig {
    /// Read from an open transaction. Missing or out-of-range values fall
    /// back to the defaults.
    pub fn read(batch: &Batch) -> Result<Self, StoreError> {
        let defaults = Self::default();
        let total_units = match batch.get::<u32>(Key::TotalUnits)? {
            Some(0) => {
                tracing::warn!("stored total_units is 0, using {}", defaults.total_units);
                defaults.total_units
            }
            Some(n) => n,
            None => defaults.total_units,
        };
        let unit_duration_ms = match batch.get::<u64>(Key::UnitDurationMs)? {
            Some(0) => {
                tracing::warn!(
                    "stored unit_duration_ms is 0, using {}",
                    defaults.unit_duration_ms
                );
                defaults.unit_duration_ms
            }
            Some(ms) => ms,
            None => defaults.unit_duration_ms,
        };
        Ok(Self {
            total_units,
            unit_duration_ms,
        })
    }

    pub fn load(store: &dyn CounterStore) -> Result<Self, StoreError> {
        update(store, |batch| Self::read(batch))
    }

    pub fn unit_duration_minutes(&self) -> u64 {
        self.unit_duration_ms / MS_PER_MINUTE
    }
}

/// Parse raw settings-form input and persist it.
///
/// `total_units` and `duration_minutes` are the text the user typed. Both
/// must be whole numbers of at least 1; otherwise nothing is written.
///
/// # Errors
///
/// `ConfigError::InvalidValue` for rejected input, `ConfigError::Store` if
/// the write fails.
pub fn update_config(
    store: &dyn CounterStore,
    total_units: &str,
    duration_minutes: &str,
) -> Result<SessionConfig, ConfigError> {
    let total_units = parse_positive::<u32>(Key::TotalUnits, total_units)?;
    let minutes = parse_positive::<u64>(Key::UnitDurationMs, duration_minutes)?;
    let unit_duration_ms =
        minutes
            .checked_mul(MS_PER_MINUTE)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: Key::UnitDurationMs.to_string(),
                message: format!("{minutes} minutes is too long"),
            })?;

    let config = SessionConfig {
        total_units,
        unit_duration_ms,
    };
    update(store, |batch| {
        batch.set(Key::TotalUnits, config.total_units);
        batch.set(Key::UnitDurationMs, config.unit_duration_ms);
        Ok(())
    })?;
    tracing::info!(?config, "settings saved; they apply from the next launch");
    Ok(config)
}

fn parse_positive<T>(key: Key, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + From<u8>,
{
    let invalid = |message: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?} {message}"),
    };
    let value = raw
        .trim()
        .parse::<T>()
        .map_err(|_| invalid("is not a whole number"))?;
    if value < T::from(1u8) {
        return Err(invalid("must be at least 1"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn defaults_when_store_is_empty() {
        let store = MemoryStore::new();
        let config = SessionConfig::load(&store).unwrap();
        assert_eq!(config.total_units, 12);
        assert_eq!(config.unit_duration_ms, 1_500_000);
        assert_eq!(config.unit_duration_minutes(), 25);
    }

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let store = MemoryStore::with_entries([(Key::TotalUnits, 0u64), (Key::UnitDurationMs, 0)]);
        assert_eq!(SessionConfig::load(&store).unwrap(), SessionConfig::default());
    }

    #[test]
    fn update_converts_minutes() {
        let store = MemoryStore::new();
        let config = update_config(&store, "8", " 50 ").unwrap();
        assert_eq!(config.total_units, 8);
        assert_eq!(config.unit_duration_ms, 3_000_000);
        assert_eq!(SessionConfig::load(&store).unwrap(), config);
    }

    #[test]
    fn invalid_input_leaves_store_unchanged() {
        let store = MemoryStore::with_entries([(Key::TotalUnits, 10u64), (Key::UnitDurationMs, 60_000)]);
        let before = store.dump();

        for (total, minutes) in [("abc", "25"), ("12", "2.5"), ("0", "25"), ("12", "0"), ("", ""), ("-3", "25")] {
            let err = update_config(&store, total, minutes).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { .. }), "{total:?}/{minutes:?}");
        }
        assert_eq!(store.dump(), before);
    }
}
