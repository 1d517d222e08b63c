//! Local copy of transactions the backend has accepted, per account.

use tracing::debug;

use super::store::Ledger;
use super::types::{account_key, history_key, TransactionHistoryEntry};
use crate::error::LedgerError;
use crate::storage::{decode, encode};

impl Ledger {
    /// Store `entry` unless its `backend_trx_id` is already known for the
    /// account. Returns whether it was inserted.
    pub fn save_history_entry(
        &self,
        network_id: u64,
        actor: u64,
        entry: &TransactionHistoryEntry,
    ) -> Result<bool, LedgerError> {
        let key = history_key(network_id, actor, &entry.backend_trx_id);
        let inserted = self
            .history
            .compare_and_swap(key, None as Option<&[u8]>, Some(encode(entry)?))?
            .is_ok();
        debug!(network_id, actor, trx_id = %hex::encode(&entry.backend_trx_id), inserted, "history entry");
        Ok(inserted)
    }

    /// Page `page_number` (zero-based) of the account's history, newest first.
    pub fn history(
        &self,
        network_id: u64,
        actor: u64,
        page_number: u32,
        page_size: u32,
    ) -> Result<Vec<TransactionHistoryEntry>, LedgerError> {
        let mut entries = self
            .history
            .scan_prefix(account_key(network_id, actor))
            .map(|item| {
                let (_, value) = item?;
                decode::<TransactionHistoryEntry>(&value)
            })
            .collect::<Result<Vec<_>, _>>()?;

        entries.sort_by(|a, b| {
            b.backend_timestamp
                .cmp(&a.backend_timestamp)
                .then_with(|| a.backend_trx_id.cmp(&b.backend_trx_id))
        });

        let offset = (page_number as usize).saturating_mul(page_size as usize);
        Ok(entries
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect())
    }
}
