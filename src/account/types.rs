//! Persisted ledger records.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// Key generated, waiting for the backend to assign an account.
    Pending,
    /// Account assigned; terminal.
    Completed,
}

/// Keyed by `public_key_hex`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RegistrationRecord {
    pub public_key_hex: String,
    pub key_alias: String,
    pub status: RegistrationStatus,
}

/// Keyed by `(network_id, actor)`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AccountRecord {
    pub network_id: u64,
    pub actor: u64,
    pub seq_number: u32,
    pub prev_hash: u64,
    pub public_key_hex: String,
    pub key_alias: String,
}

impl AccountRecord {
    pub fn sync_head(&self) -> SyncHead {
        SyncHead {
            seq_number: self.seq_number,
            prev_hash: self.prev_hash,
        }
    }
}

/// Last known position of an account on its chain.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncHead {
    pub seq_number: u32,
    pub prev_hash: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransactionHistoryEntry {
    /// Serialized transaction as sent to the backend.
    pub transaction: Vec<u8>,
    pub backend_timestamp: i64,
    pub backend_trx_id: Vec<u8>,
}

/// `network_id ‖ actor`, both big-endian so keys sort numerically.
pub fn account_key(network_id: u64, actor: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&network_id.to_be_bytes());
    key[8..].copy_from_slice(&actor.to_be_bytes());
    key
}

pub fn history_key(network_id: u64, actor: u64, backend_trx_id: &[u8]) -> Vec<u8> {
    let mut key = account_key(network_id, actor).to_vec();
    key.extend_from_slice(backend_trx_id);
    key
}
