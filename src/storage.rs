use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::StorageConfig;
use crate::error::LedgerError;

pub const REGISTRATIONS_TREE: &str = "registrations";
pub const ACCOUNTS_TREE: &str = "accounts";
pub const HISTORY_TREE: &str = "history";

/// Handle to the embedded database. Cloning shares the same underlying store.
#[derive(Clone)]
pub struct Storage {
    db: sled::Db,
}

impl Storage {
    pub fn open(config: &StorageConfig) -> Result<Self, LedgerError> {
        let db = sled::Config::new()
            .path(&config.path)
            .temporary(config.temporary)
            .open()?;
        debug!(path = %config.path, temporary = config.temporary, recovered = db.was_recovered(), "storage opened");
        Ok(Storage { db })
    }

    /// Throwaway database, removed on drop.
    pub fn temporary() -> Result<Self, LedgerError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Storage { db })
    }

    pub fn tree(&self, name: &str) -> Result<sled::Tree, LedgerError> {
        Ok(self.db.open_tree(name)?)
    }

    pub fn flush(&self) -> Result<(), LedgerError> {
        let bytes = self.db.flush()?;
        debug!(bytes, "storage flushed");
        Ok(())
    }

    // Generic Helper: Get
    pub fn get<T: DeserializeOwned>(&self, tree: &sled::Tree, key: &[u8]) -> Result<Option<T>, LedgerError> {
        match tree.get(key)? {
            Some(data) => Ok(Some(decode(&data)?)),
            None => Ok(None),
        }
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LedgerError> {
    Ok(bincode::serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LedgerError> {
    Ok(bincode::deserialize(bytes)?)
}
