//! Caller-owned entry point bundling the ledger with a key store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::account::{Ledger, SyncHead, TransactionHistoryEntry};
use crate::config::PbtxConfig;
use crate::ec::CurveId;
use crate::error::ClientError;
use crate::keystore::KeyStore;
use crate::signature::PublicKey;
use crate::storage::Storage;
use crate::transaction::{Authority, Transaction, TransactionAssembler};

/// A key alias together with its public key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KeyModel {
    pub alias: String,
    pub public_key: PublicKey,
}

#[derive(Clone)]
pub struct PbtxClient {
    ledger: Ledger,
    assembler: TransactionAssembler,
    keystore: Arc<dyn KeyStore>,
    key_alias_prefix: String,
}

impl PbtxClient {
    pub fn new(ledger: Ledger, keystore: Arc<dyn KeyStore>, key_alias_prefix: &str) -> Self {
        PbtxClient {
            assembler: TransactionAssembler::new(ledger.clone()),
            ledger,
            keystore,
            key_alias_prefix: key_alias_prefix.to_string(),
        }
    }

    /// Open the configured database and wrap it with `keystore`.
    pub fn open(config: &PbtxConfig, keystore: Arc<dyn KeyStore>) -> Result<Self, ClientError> {
        if keystore.curve() != config.signing.curve {
            warn!(
                configured = %config.signing.curve,
                keystore = %keystore.curve(),
                "key store curve differs from configuration, using the key store's"
            );
        }
        let storage = Storage::open(&config.storage)?;
        let ledger = Ledger::open(&storage)?;
        Ok(Self::new(ledger, keystore, &config.signing.key_alias_prefix))
    }

    pub fn curve(&self) -> CurveId {
        self.keystore.curve()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn key_model(&self, alias: &str) -> Result<KeyModel, ClientError> {
        let compressed = self.keystore.compressed_public_key(alias)?;
        Ok(KeyModel {
            alias: alias.to_string(),
            public_key: PublicKey::from_compressed(self.curve(), &compressed)?,
        })
    }

    /// Generate a fresh key and record it as a pending registration. The key
    /// is removed again if the ledger refuses the record.
    pub fn init_registration(&self) -> Result<KeyModel, ClientError> {
        let alias = format!("{}{}", self.key_alias_prefix, Uuid::new_v4());
        let key = self.create_key(&alias)?;

        if let Err(e) = self
            .ledger
            .begin_registration(&alias, &key.public_key.public_key_hex())
        {
            if let Err(delete_err) = self.keystore.delete_key(&alias) {
                warn!(alias = %alias, error = %delete_err, "could not remove key after failed registration");
            }
            return Err(e.into());
        }
        Ok(key)
    }

    pub fn register_account(
        &self,
        network_id: u64,
        actor: u64,
        public_key: &PublicKey,
        seq_number: u32,
        prev_hash: u64,
    ) -> Result<(), ClientError> {
        self.ledger.complete_registration(
            network_id,
            actor,
            &public_key.public_key_hex(),
            seq_number,
            prev_hash,
        )?;
        Ok(())
    }

    pub fn is_account_registered(&self, network_id: u64, actor: u64) -> Result<bool, ClientError> {
        Ok(self.ledger.is_registered(network_id, actor)?)
    }

    pub fn local_sync_head(&self, network_id: u64, actor: u64) -> Result<SyncHead, ClientError> {
        Ok(self.ledger.get_sync_head(network_id, actor)?)
    }

    pub fn update_local_sync_head(
        &self,
        network_id: u64,
        actor: u64,
        seq_number: u32,
        prev_hash: u64,
    ) -> Result<(), ClientError> {
        Ok(self.ledger.advance_sync_head(network_id, actor, seq_number, prev_hash)?)
    }

    pub fn key_for_account(&self, network_id: u64, actor: u64) -> Result<KeyModel, ClientError> {
        let account = self.ledger.account(network_id, actor)?;
        self.key_model(&account.key_alias)
    }

    /// Next transaction for the account, signed with its key. The sync head
    /// stays where it is.
    pub fn sign_transaction(
        &self,
        network_id: u64,
        actor: u64,
        transaction_type: u32,
        transaction_content: &[u8],
    ) -> Result<Transaction, ClientError> {
        let alias = self.ledger.account(network_id, actor)?.key_alias;
        Ok(self.assembler.build_and_sign(
            network_id,
            actor,
            transaction_type,
            transaction_content,
            |body| self.keystore.sign(&alias, body),
            self.curve(),
        )?)
    }

    pub fn actor_sign_data(&self, network_id: u64, actor: u64, data: &[u8]) -> Result<Authority, ClientError> {
        let alias = self.ledger.account(network_id, actor)?.key_alias;
        Ok(self.assembler.sign_data(
            network_id,
            actor,
            data,
            |message| self.keystore.sign(&alias, message),
            self.curve(),
        )?)
    }

    pub fn list_keys(&self) -> Result<Vec<KeyModel>, ClientError> {
        self.keystore
            .list_aliases()?
            .iter()
            .map(|alias| self.key_model(alias))
            .collect()
    }

    pub fn create_key(&self, alias: &str) -> Result<KeyModel, ClientError> {
        let compressed = self.keystore.generate_key(alias)?;
        let public_key = PublicKey::from_compressed(self.curve(), &compressed)?;
        info!(alias, public_key = %public_key, "key created");
        Ok(KeyModel {
            alias: alias.to_string(),
            public_key,
        })
    }

    pub fn delete_key(&self, alias: &str) -> Result<(), ClientError> {
        Ok(self.keystore.delete_key(alias)?)
    }

    pub fn save_history_entry(
        &self,
        network_id: u64,
        actor: u64,
        entry: &TransactionHistoryEntry,
    ) -> Result<bool, ClientError> {
        Ok(self.ledger.save_history_entry(network_id, actor, entry)?)
    }

    pub fn history(
        &self,
        network_id: u64,
        actor: u64,
        page_number: u32,
        page_size: u32,
    ) -> Result<Vec<TransactionHistoryEntry>, ClientError> {
        Ok(self.ledger.history(network_id, actor, page_number, page_size)?)
    }
}
