//! Local account ledger.
//!
//! Tracks which keys are mid-registration, which `(network_id, actor)` pairs
//! this device holds keys for, and where each account's chain currently ends.

pub mod history;
pub mod store;
pub mod types;

pub use store::Ledger;
pub use types::{
    AccountRecord, RegistrationRecord, RegistrationStatus, SyncHead, TransactionHistoryEntry,
};
