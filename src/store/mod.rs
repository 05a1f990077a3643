//! Persistent key-value store module
//!
//! The core only ever sees the `KeyValueStore` trait: string keys mapped to
//! string blobs. Two collections live in it, under `TIMERS_KEY` and
//! `HISTORY_KEY`.

pub mod file;
pub mod memory;
pub mod writer;

use async_trait::async_trait;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use writer::{PersistWriter, WriteOp};

/// Key holding the serialized timer collection
pub const TIMERS_KEY: &str = "timers";
/// Key holding the serialized completion history
pub const HISTORY_KEY: &str = "history";

/// Errors raised by store implementations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid store key '{0}'")]
    InvalidKey(String),

    #[error("io error on key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous string-keyed blob storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the blob stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the blob stored under `key`
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key`; removing a missing key succeeds
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Keys become file names, so only a conservative alphabet is accepted
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
