use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use tracing::debug;

use crate::account::{AccountRecord, Ledger};
use crate::ec::CurveId;
use crate::encoding::{CanonicalDeserialize, CanonicalSerialize};
use crate::error::{AssemblerError, KeyStoreError};
use crate::signature::{canonicalize, CompactSignature, PublicKey, COMPACT_SIGNATURE_LEN};

/// The signed part of a transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransactionBody {
    pub network_id: u64,
    pub actor: u64,
    pub seqnum: u32,
    pub prev_hash: u64,
    pub transaction_type: u32,
    pub transaction_content: Vec<u8>,
}

impl CanonicalSerialize for TransactionBody {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.network_id.canonical_serialize(writer)?;
        self.actor.canonical_serialize(writer)?;
        self.seqnum.canonical_serialize(writer)?;
        self.prev_hash.canonical_serialize(writer)?;
        self.transaction_type.canonical_serialize(writer)?;
        self.transaction_content.canonical_serialize(writer)
    }
}

impl CanonicalDeserialize for TransactionBody {
    fn canonical_deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(TransactionBody {
            network_id: u64::canonical_deserialize(reader)?,
            actor: u64::canonical_deserialize(reader)?,
            seqnum: u32::canonical_deserialize(reader)?,
            prev_hash: u64::canonical_deserialize(reader)?,
            transaction_type: u32::canonical_deserialize(reader)?,
            transaction_content: Vec::<u8>::canonical_deserialize(reader)?,
        })
    }
}

/// One signer's approval: key type plus compact signature.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authority {
    pub curve: CurveId,
    pub signature: CompactSignature,
}

impl Authority {
    /// `key type tag ‖ recovery_byte ‖ r ‖ s`
    pub fn to_bytes(&self) -> Vec<u8> {
        CanonicalSerialize::to_bytes(self)
    }

    /// Recover the signer's public key for `message`.
    pub fn recover_signer(&self, message: &[u8]) -> Result<PublicKey, AssemblerError> {
        let compressed = self.signature.recover_public_key(self.curve, &sha256(message))?;
        Ok(PublicKey::from_compressed(self.curve, &compressed)?)
    }
}

impl CanonicalSerialize for Authority {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.curve.key_type_tag().canonical_serialize(writer)?;
        self.signature.to_bytes().canonical_serialize(writer)
    }
}

impl CanonicalDeserialize for Authority {
    fn canonical_deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        let tag = u8::canonical_deserialize(reader)?;
        let curve = CurveId::from_key_type_tag(tag).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, format!("unknown key type tag {}", tag))
        })?;
        let bytes = <[u8; COMPACT_SIGNATURE_LEN]>::canonical_deserialize(reader)?;
        let signature = CompactSignature::from_bytes(&bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        Ok(Authority { curve, signature })
    }
}

/// Serialized body plus the authorities that signed it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub body: Vec<u8>,
    pub authorities: Vec<Authority>,
}

impl Transaction {
    pub fn body(&self) -> io::Result<TransactionBody> {
        TransactionBody::from_canonical_bytes(&self.body)
    }
}

impl CanonicalSerialize for Transaction {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.body.canonical_serialize(writer)?;
        self.authorities.canonical_serialize(writer)
    }
}

impl CanonicalDeserialize for Transaction {
    fn canonical_deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Transaction {
            body: Vec::<u8>::canonical_deserialize(reader)?,
            authorities: Vec::<Authority>::canonical_deserialize(reader)?,
        })
    }
}

fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    Sha256::digest(data).into()
}

/// Builds and signs transactions from ledger state. Never moves the sync
/// head; the caller does that once the backend accepts the transaction.
#[derive(Clone)]
pub struct TransactionAssembler {
    ledger: Ledger,
}

impl TransactionAssembler {
    pub fn new(ledger: Ledger) -> Self {
        TransactionAssembler { ledger }
    }

    /// The account's key, checked against the curve the caller signs with.
    fn account_key(&self, account: &AccountRecord, curve: CurveId) -> Result<PublicKey, AssemblerError> {
        let key = PublicKey::from_public_key_hex(&account.public_key_hex)
            .map_err(|e| AssemblerError::InvalidPublicKey(e.to_string()))?;
        if key.curve != curve {
            return Err(AssemblerError::CurveMismatch {
                expected: curve,
                found: key.curve,
            });
        }
        Ok(key)
    }

    fn sign_with<F>(
        &self,
        account: &AccountRecord,
        message: &[u8],
        message_hash: [u8; 32],
        sign: F,
        curve: CurveId,
    ) -> Result<Authority, AssemblerError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, KeyStoreError>,
    {
        let key = self.account_key(account, curve)?;
        let der = sign(message)?;
        let signature = canonicalize(&der, &message_hash, &key.compressed, curve)?;
        Ok(Authority { curve, signature })
    }

    pub fn build_and_sign<F>(
        &self,
        network_id: u64,
        actor: u64,
        transaction_type: u32,
        transaction_content: &[u8],
        sign: F,
        curve: CurveId,
    ) -> Result<Transaction, AssemblerError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, KeyStoreError>,
    {
        let account = self.ledger.account(network_id, actor)?;
        let seqnum = account
            .seq_number
            .checked_add(1)
            .ok_or(AssemblerError::SequenceExhausted)?;

        let body = TransactionBody {
            network_id,
            actor,
            seqnum,
            prev_hash: account.prev_hash,
            transaction_type,
            transaction_content: transaction_content.to_vec(),
        };
        let body_bytes = body.to_bytes();
        let authority = self.sign_with(&account, &body_bytes, body.digest(), sign, curve)?;

        debug!(network_id, actor, seqnum, transaction_type, "transaction signed");
        Ok(Transaction {
            body: body_bytes,
            authorities: vec![authority],
        })
    }

    /// Sign arbitrary bytes with the actor's key.
    pub fn sign_data<F>(
        &self,
        network_id: u64,
        actor: u64,
        data: &[u8],
        sign: F,
        curve: CurveId,
    ) -> Result<Authority, AssemblerError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, KeyStoreError>,
    {
        let account = self.ledger.account(network_id, actor)?;
        self.sign_with(&account, data, sha256(data), sign, curve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::SyncHead;
    use crate::error::{LedgerError, SigningError};
    use crate::keystore::{KeyStore, SoftwareKeyStore};
    use crate::storage::Storage;

    fn register(ledger: &Ledger, store: &dyn KeyStore, alias: &str, network_id: u64, actor: u64) -> PublicKey {
        let compressed = store.generate_key(alias).unwrap();
        let key = PublicKey::from_compressed(store.curve(), &compressed).unwrap();
        ledger.begin_registration(alias, &key.public_key_hex()).unwrap();
        ledger
            .complete_registration(network_id, actor, &key.public_key_hex(), 0, 0)
            .unwrap();
        key
    }

    #[test]
    fn test_build_and_sign_end_to_end() {
        let ledger = Ledger::open(&Storage::temporary().unwrap()).unwrap();
        let store = SoftwareKeyStore::new(CurveId::R1);
        let key = register(&ledger, &store, "PBTX-42", 100, 42);
        let assembler = TransactionAssembler::new(ledger.clone());

        let tx = assembler
            .build_and_sign(100, 42, 7, b"payload", |msg| store.sign("PBTX-42", msg), CurveId::R1)
            .unwrap();

        let body = tx.body().unwrap();
        assert_eq!(body.network_id, 100);
        assert_eq!(body.actor, 42);
        assert_eq!(body.seqnum, 1);
        assert_eq!(body.prev_hash, 0);
        assert_eq!(body.transaction_type, 7);
        assert_eq!(body.transaction_content, b"payload".to_vec());

        assert_eq!(tx.authorities.len(), 1);
        let authority = tx.authorities[0];
        assert_eq!(authority.curve, CurveId::R1);
        assert_eq!(authority.recover_signer(&tx.body).unwrap(), key);

        let wire = authority.to_bytes();
        assert_eq!(wire.len(), 66);
        assert_eq!(wire[0], 1);
        assert!((31..=34).contains(&wire[1]));

        // Signing does not move the head
        assert_eq!(ledger.get_sync_head(100, 42).unwrap(), SyncHead::default());

        let decoded = Transaction::from_canonical_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_seqnum_follows_sync_head() {
        let ledger = Ledger::open(&Storage::temporary().unwrap()).unwrap();
        let store = SoftwareKeyStore::new(CurveId::K1);
        register(&ledger, &store, "k", 1, 2);
        ledger.advance_sync_head(1, 2, 10, 120120).unwrap();

        let assembler = TransactionAssembler::new(ledger.clone());
        let tx = assembler
            .build_and_sign(1, 2, 0, &[], |msg| store.sign("k", msg), CurveId::K1)
            .unwrap();
        let body = tx.body().unwrap();
        assert_eq!((body.seqnum, body.prev_hash), (11, 120120));

        ledger.advance_sync_head(1, 2, u32::MAX, 0).unwrap();
        assert!(matches!(
            assembler.build_and_sign(1, 2, 0, &[], |msg| store.sign("k", msg), CurveId::K1),
            Err(AssemblerError::SequenceExhausted)
        ));
    }

    #[test]
    fn test_assembler_errors() {
        let ledger = Ledger::open(&Storage::temporary().unwrap()).unwrap();
        let store = SoftwareKeyStore::new(CurveId::R1);
        register(&ledger, &store, "r", 1, 1);
        let assembler = TransactionAssembler::new(ledger);

        assert!(matches!(
            assembler.build_and_sign(1, 99, 0, &[], |msg| store.sign("r", msg), CurveId::R1),
            Err(AssemblerError::Ledger(LedgerError::NotRegistered { .. }))
        ));
        assert!(matches!(
            assembler.build_and_sign(1, 1, 0, &[], |msg| store.sign("r", msg), CurveId::K1),
            Err(AssemblerError::CurveMismatch { expected: CurveId::K1, found: CurveId::R1 })
        ));
        assert!(matches!(
            assembler.build_and_sign(1, 1, 0, &[], |msg| store.sign("missing", msg), CurveId::R1),
            Err(AssemblerError::KeyStore(KeyStoreError::KeyNotFound(_)))
        ));

        // A signer holding a different key cannot produce a valid authority
        store.generate_key("other").unwrap();
        assert!(matches!(
            assembler.build_and_sign(1, 1, 0, &[], |msg| store.sign("other", msg), CurveId::R1),
            Err(AssemblerError::Signing(SigningError::RecoveryFailed))
        ));
    }

    #[test]
    fn test_sign_data() {
        let ledger = Ledger::open(&Storage::temporary().unwrap()).unwrap();
        let store = SoftwareKeyStore::new(CurveId::K1);
        let key = register(&ledger, &store, "d", 3, 4);
        let assembler = TransactionAssembler::new(ledger);

        let data = b"login challenge 8f1c";
        let authority = assembler
            .sign_data(3, 4, data, |msg| store.sign("d", msg), CurveId::K1)
            .unwrap();
        assert_eq!(authority.recover_signer(data).unwrap(), key);
    }

    #[test]
    fn test_truncated_body_rejected() {
        let body = TransactionBody {
            network_id: 1,
            actor: 2,
            seqnum: 3,
            prev_hash: 4,
            transaction_type: 5,
            transaction_content: vec![6; 10],
        };
        let bytes = body.to_bytes();
        assert_eq!(bytes.len(), 8 + 8 + 4 + 8 + 4 + 4 + 10);
        let tx = Transaction {
            body: bytes[..bytes.len() - 1].to_vec(),
            authorities: vec![],
        };
        assert!(tx.body().is_err());
    }
}
