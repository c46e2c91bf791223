//! Core error types for tomatoes-core.
//!
//! Every fallible operation in the library returns one of the enums below,
//! all built on thiserror. The CLI flattens them into `Box<dyn Error>`.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tomatoes-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Counter store errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Background scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Counter store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the database file
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database (or in-memory store) is locked by another writer
    #[error("Store is locked")]
    Locked,

    /// A persisted value could not be parsed as the expected type
    #[error("Corrupt value for '{key}': {value:?}")]
    CorruptValue { key: String, value: String },

    /// Could not resolve the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Settings could not be persisted
    #[error("Failed to persist settings: {0}")]
    Store(#[from] StoreError),
}

/// Background scheduler errors.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Backing table could not be read or written
    #[error("Scheduler storage failed: {0}")]
    Store(#[from] StoreError),

    /// A persisted job id could not be parsed
    #[error("Invalid background job id: {0:?}")]
    InvalidJobId(String),

    /// The job id belongs to the other backend
    #[error("Job {job} cannot be handled by the {strategy} scheduler")]
    ForeignJob { job: String, strategy: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg)
                if code.code == rusqlite::ErrorCode::DatabaseLocked
                    || code.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                StoreError::Locked
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for SchedulerError {
    fn from(err: rusqlite::Error) -> Self {
        SchedulerError::Store(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
