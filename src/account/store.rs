//! Registration and account state, persisted in sled.
//!
//! Every mutation runs inside a sled transaction, so a failed call leaves no
//! partial record and concurrent calls touching the same key are serialized.

use serde::de::DeserializeOwned;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, Transactional,
};
use tracing::{debug, info, warn};

use super::types::{
    account_key, AccountRecord, RegistrationRecord, RegistrationStatus, SyncHead,
};
use crate::error::LedgerError;
use crate::storage::{decode, encode, Storage, ACCOUNTS_TREE, HISTORY_TREE, REGISTRATIONS_TREE};

/// Shared handle to the ledger trees. Cheap to clone.
#[derive(Clone)]
pub struct Ledger {
    storage: Storage,
    registrations: sled::Tree,
    accounts: sled::Tree,
    pub(super) history: sled::Tree,
}

fn abort<T>(err: LedgerError) -> ConflictableTransactionResult<T, LedgerError> {
    Err(ConflictableTransactionError::Abort(err))
}

fn tx_decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ConflictableTransactionError<LedgerError>> {
    decode(bytes).map_err(ConflictableTransactionError::Abort)
}

fn tx_encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ConflictableTransactionError<LedgerError>> {
    encode(value).map_err(ConflictableTransactionError::Abort)
}

fn from_tx(err: TransactionError<LedgerError>) -> LedgerError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => e.into(),
    }
}

impl Ledger {
    pub fn open(storage: &Storage) -> Result<Self, LedgerError> {
        Ok(Ledger {
            registrations: storage.tree(REGISTRATIONS_TREE)?,
            accounts: storage.tree(ACCOUNTS_TREE)?,
            history: storage.tree(HISTORY_TREE)?,
            storage: storage.clone(),
        })
    }

    /// Record a freshly generated key as `Pending`.
    pub fn begin_registration(&self, key_alias: &str, public_key_hex: &str) -> Result<(), LedgerError> {
        let record = RegistrationRecord {
            public_key_hex: public_key_hex.to_string(),
            key_alias: key_alias.to_string(),
            status: RegistrationStatus::Pending,
        };
        let swapped = self.registrations.compare_and_swap(
            public_key_hex.as_bytes(),
            None as Option<&[u8]>,
            Some(encode(&record)?),
        )?;
        if swapped.is_err() {
            return Err(LedgerError::AlreadyExists(public_key_hex.to_string()));
        }
        info!(key_alias, public_key = public_key_hex, "registration started");
        Ok(())
    }

    /// Create the account and mark the registration `Completed`, atomically.
    pub fn complete_registration(
        &self,
        network_id: u64,
        actor: u64,
        public_key_hex: &str,
        initial_seq: u32,
        initial_prev_hash: u64,
    ) -> Result<(), LedgerError> {
        let acct_key = account_key(network_id, actor);

        (&self.registrations, &self.accounts)
            .transaction(|(regs, accts)| {
                let mut registration: RegistrationRecord = match regs.get(public_key_hex.as_bytes())? {
                    Some(bytes) => tx_decode(&bytes)?,
                    None => return abort(LedgerError::NotFound(public_key_hex.to_string())),
                };
                if registration.status == RegistrationStatus::Completed {
                    return abort(LedgerError::AlreadyRegistered(public_key_hex.to_string()));
                }
                if accts.get(&acct_key[..])?.is_some() {
                    return abort(LedgerError::AccountExists { network_id, actor });
                }

                let account = AccountRecord {
                    network_id,
                    actor,
                    seq_number: initial_seq,
                    prev_hash: initial_prev_hash,
                    public_key_hex: registration.public_key_hex.clone(),
                    key_alias: registration.key_alias.clone(),
                };
                registration.status = RegistrationStatus::Completed;

                accts.insert(&acct_key[..], tx_encode(&account)?)?;
                regs.insert(public_key_hex.as_bytes(), tx_encode(&registration)?)?;
                Ok(())
            })
            .map_err(from_tx)?;

        info!(network_id, actor, public_key = public_key_hex, "registration completed");
        Ok(())
    }

    pub fn registration(&self, public_key_hex: &str) -> Result<Option<RegistrationRecord>, LedgerError> {
        self.storage.get(&self.registrations, public_key_hex.as_bytes())
    }

    pub fn is_registered(&self, network_id: u64, actor: u64) -> Result<bool, LedgerError> {
        Ok(self.accounts.contains_key(account_key(network_id, actor))?)
    }

    pub fn account(&self, network_id: u64, actor: u64) -> Result<AccountRecord, LedgerError> {
        self.storage
            .get(&self.accounts, &account_key(network_id, actor))?
            .ok_or(LedgerError::NotRegistered { network_id, actor })
    }

    pub fn get_sync_head(&self, network_id: u64, actor: u64) -> Result<SyncHead, LedgerError> {
        Ok(self.account(network_id, actor)?.sync_head())
    }

    /// Overwrite the sync head. Going backwards is allowed but logged.
    pub fn advance_sync_head(
        &self,
        network_id: u64,
        actor: u64,
        new_seq: u32,
        new_prev_hash: u64,
    ) -> Result<(), LedgerError> {
        let key = account_key(network_id, actor);
        let previous = self
            .accounts
            .transaction(|accts| {
                let mut account: AccountRecord = match accts.get(&key[..])? {
                    Some(bytes) => tx_decode(&bytes)?,
                    None => return abort(LedgerError::NotRegistered { network_id, actor }),
                };
                let previous = account.sync_head();
                account.seq_number = new_seq;
                account.prev_hash = new_prev_hash;
                accts.insert(&key[..], tx_encode(&account)?)?;
                Ok(previous)
            })
            .map_err(from_tx)?;

        if new_seq < previous.seq_number {
            warn!(
                network_id,
                actor,
                from = previous.seq_number,
                to = new_seq,
                "sync head moved backwards"
            );
        }
        debug!(network_id, actor, seq_number = new_seq, prev_hash = new_prev_hash, "sync head updated");
        Ok(())
    }

    pub fn flush(&self) -> Result<(), LedgerError> {
        self.storage.flush()
    }
}
