//! Signing-key custody.
//!
//! Hosts with hardware-backed storage implement [`KeyStore`] over it; the
//! ledger code only ever sees aliases, public keys and DER signatures.
//! [`SoftwareKeyStore`] keeps keys in memory.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::ec::CurveId;
use crate::error::KeyStoreError;
use crate::signature::COMPRESSED_KEY_LEN;

pub trait KeyStore: Send + Sync {
    /// Curve of every key this store creates.
    fn curve(&self) -> CurveId;
    /// Create a key under `alias` and return its compressed public key.
    fn generate_key(&self, alias: &str) -> Result<[u8; COMPRESSED_KEY_LEN], KeyStoreError>;
    fn delete_key(&self, alias: &str) -> Result<(), KeyStoreError>;
    fn list_aliases(&self) -> Result<Vec<String>, KeyStoreError>;
    fn compressed_public_key(&self, alias: &str) -> Result<[u8; COMPRESSED_KEY_LEN], KeyStoreError>;
    /// DER-encoded ECDSA signature over SHA-256(`message`).
    fn sign(&self, alias: &str, message: &[u8]) -> Result<Vec<u8>, KeyStoreError>;
}

enum SoftwareKey {
    R1(p256::ecdsa::SigningKey),
    K1(k256::ecdsa::SigningKey),
}

impl SoftwareKey {
    fn generate(curve: CurveId) -> Self {
        match curve {
            CurveId::R1 => SoftwareKey::R1(p256::ecdsa::SigningKey::random(&mut OsRng)),
            CurveId::K1 => SoftwareKey::K1(k256::ecdsa::SigningKey::random(&mut OsRng)),
        }
    }

    fn compressed_public_key(&self) -> Result<[u8; COMPRESSED_KEY_LEN], KeyStoreError> {
        let point = match self {
            SoftwareKey::R1(sk) => sk.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
            SoftwareKey::K1(sk) => sk.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
        };
        point
            .as_slice()
            .try_into()
            .map_err(|_| KeyStoreError::Backend(format!("unexpected point length {}", point.len())))
    }

    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Vec<u8>, KeyStoreError> {
        use ecdsa::signature::hazmat::PrehashSigner;

        match self {
            SoftwareKey::R1(sk) => {
                let sig: p256::ecdsa::Signature = sk
                    .sign_prehash(digest)
                    .map_err(|e| KeyStoreError::Signing(e.to_string()))?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            SoftwareKey::K1(sk) => {
                let sig: k256::ecdsa::Signature = sk
                    .sign_prehash(digest)
                    .map_err(|e| KeyStoreError::Signing(e.to_string()))?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
        }
    }
}

/// In-memory key store for one curve.
pub struct SoftwareKeyStore {
    curve: CurveId,
    keys: Mutex<HashMap<String, SoftwareKey>>,
}

impl SoftwareKeyStore {
    pub fn new(curve: CurveId) -> Self {
        SoftwareKeyStore {
            curve,
            keys: Mutex::new(HashMap::new()),
        }
    }

    fn keys(&self) -> Result<MutexGuard<'_, HashMap<String, SoftwareKey>>, KeyStoreError> {
        self.keys
            .lock()
            .map_err(|_| KeyStoreError::Backend("key map lock poisoned".to_string()))
    }
}

impl KeyStore for SoftwareKeyStore {
    fn curve(&self) -> CurveId {
        self.curve
    }

    fn generate_key(&self, alias: &str) -> Result<[u8; COMPRESSED_KEY_LEN], KeyStoreError> {
        let mut keys = self.keys()?;
        if keys.contains_key(alias) {
            return Err(KeyStoreError::KeyExists(alias.to_string()));
        }
        let key = SoftwareKey::generate(self.curve);
        let public_key = key.compressed_public_key()?;
        keys.insert(alias.to_string(), key);
        debug!(alias, curve = %self.curve, "key generated");
        Ok(public_key)
    }

    fn delete_key(&self, alias: &str) -> Result<(), KeyStoreError> {
        match self.keys()?.remove(alias) {
            Some(_) => {
                debug!(alias, "key deleted");
                Ok(())
            }
            None => Err(KeyStoreError::KeyNotFound(alias.to_string())),
        }
    }

    fn list_aliases(&self) -> Result<Vec<String>, KeyStoreError> {
        let mut aliases: Vec<String> = self.keys()?.keys().cloned().collect();
        aliases.sort();
        Ok(aliases)
    }

    fn compressed_public_key(&self, alias: &str) -> Result<[u8; COMPRESSED_KEY_LEN], KeyStoreError> {
        self.keys()?
            .get(alias)
            .ok_or_else(|| KeyStoreError::KeyNotFound(alias.to_string()))?
            .compressed_public_key()
    }

    fn sign(&self, alias: &str, message: &[u8]) -> Result<Vec<u8>, KeyStoreError> {
        let digest: [u8; 32] = Sha256::digest(message).into();
        self.keys()?
            .get(alias)
            .ok_or_else(|| KeyStoreError::KeyNotFound(alias.to_string()))?
            .sign_digest(&digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::RawSignature;

    #[test]
    fn test_key_lifecycle() {
        let store = SoftwareKeyStore::new(CurveId::R1);
        let pk = store.generate_key("PBTX-one").unwrap();
        assert!(pk[0] == 0x02 || pk[0] == 0x03);
        assert_eq!(store.compressed_public_key("PBTX-one").unwrap(), pk);
        assert_eq!(
            store.generate_key("PBTX-one"),
            Err(KeyStoreError::KeyExists("PBTX-one".to_string()))
        );

        store.generate_key("PBTX-two").unwrap();
        assert_eq!(store.list_aliases().unwrap(), vec!["PBTX-one", "PBTX-two"]);

        store.delete_key("PBTX-one").unwrap();
        assert!(matches!(
            store.compressed_public_key("PBTX-one"),
            Err(KeyStoreError::KeyNotFound(_))
        ));
        assert!(store.delete_key("PBTX-one").is_err());
        assert!(matches!(store.sign("PBTX-one", b"x"), Err(KeyStoreError::KeyNotFound(_))));
    }

    #[test]
    fn test_signatures_verify() {
        use ecdsa::signature::Verifier;

        let r1 = SoftwareKeyStore::new(CurveId::R1);
        let pk = r1.generate_key("a").unwrap();
        let der = r1.sign("a", b"hello").unwrap();
        let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(&pk).unwrap();
        let sig = p256::ecdsa::Signature::from_der(&der).unwrap();
        vk.verify(b"hello", &sig).unwrap();

        let k1 = SoftwareKeyStore::new(CurveId::K1);
        let pk = k1.generate_key("b").unwrap();
        let der = k1.sign("b", b"hello").unwrap();
        let vk = k256::ecdsa::VerifyingKey::from_sec1_bytes(&pk).unwrap();
        let sig = k256::ecdsa::Signature::from_der(&der).unwrap();
        vk.verify(b"hello", &sig).unwrap();

        // Output is parseable by the canonicalizer's decoder
        assert!(RawSignature::from_der(&der).is_ok());
    }
}
