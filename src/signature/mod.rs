//! Conversion of DER ECDSA signatures into the ledger's compact recoverable
//! form `recovery_byte ‖ r ‖ s`.
//!
//! Key stores hand back plain DER, which carries no recovery id and may have
//! a high `s`. The ledger verifies by recovering the key from the signature,
//! so the id has to be found here by trying each candidate against the key
//! the signer is known to hold.

pub mod der;
pub mod public_key;
pub mod recovery;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ec::CurveId;
use crate::error::SigningError;

pub use der::RawSignature;
pub use public_key::{PublicKey, COMPRESSED_KEY_LEN};
use recovery::{find_recovery_id, recover_candidate, MAX_RECOVERY_ID};

/// Added to the recovery id to form the first byte of a compact signature.
pub const RECOVERY_BYTE_OFFSET: u8 = 31;
pub const COMPACT_SIGNATURE_LEN: usize = 65;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactSignature {
    pub recovery_byte: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl CompactSignature {
    pub fn recovery_id(&self) -> u8 {
        self.recovery_byte.wrapping_sub(RECOVERY_BYTE_OFFSET)
    }

    pub fn to_bytes(&self) -> [u8; COMPACT_SIGNATURE_LEN] {
        let mut out = [0u8; COMPACT_SIGNATURE_LEN];
        out[0] = self.recovery_byte;
        out[1..33].copy_from_slice(&self.r);
        out[33..].copy_from_slice(&self.s);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        if bytes.len() != COMPACT_SIGNATURE_LEN {
            return Err(SigningError::MalformedSignature(format!(
                "compact signature must be {} bytes, got {}",
                COMPACT_SIGNATURE_LEN,
                bytes.len()
            )));
        }
        let recovery_byte = bytes[0];
        if !(RECOVERY_BYTE_OFFSET..=RECOVERY_BYTE_OFFSET + MAX_RECOVERY_ID).contains(&recovery_byte) {
            return Err(SigningError::MalformedSignature(format!(
                "recovery byte {} out of range",
                recovery_byte
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[1..33]);
        s.copy_from_slice(&bytes[33..]);
        Ok(CompactSignature { recovery_byte, r, s })
    }

    /// Verifier side: the compressed key this signature was made with.
    pub fn recover_public_key(&self, curve: CurveId, message_hash: &[u8; 32]) -> Result<[u8; 33], SigningError> {
        let params = curve.params();
        let raw = RawSignature::new(BigUint::from_bytes_be(&self.r), BigUint::from_bytes_be(&self.s));
        raw.check_range(params)?;
        recover_candidate(params, &raw, message_hash, self.recovery_id())
            .and_then(|q| q.to_compressed())
            .ok_or(SigningError::RecoveryFailed)
    }
}

/// Left-pad a big-endian integer to 32 bytes.
fn to_fixed_32(value: &BigUint) -> Result<[u8; 32], SigningError> {
    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return Err(SigningError::IntegerTooLarge(bytes.len()));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

/// Turn a DER signature over `message_hash` into a low-S compact signature
/// that recovers to `compressed_public_key` on `curve`.
pub fn canonicalize(
    der_signature: &[u8],
    message_hash: &[u8; 32],
    compressed_public_key: &[u8],
    curve: CurveId,
) -> Result<CompactSignature, SigningError> {
    let params = curve.params();
    let raw = RawSignature::from_der(der_signature)?;
    let expected = public_key::check_compressed_shape(compressed_public_key)?;
    raw.check_range(params)?;
    let was_high = !raw.is_low_s(params);
    let raw = raw.normalize_s(params);

    let recovery_id = match find_recovery_id(params, &raw, message_hash, &expected) {
        Some(id) => id,
        None => {
            warn!(
                curve = %curve,
                public_key = %hex::encode(expected),
                "no recovery id reproduces the signer's key"
            );
            return Err(SigningError::RecoveryFailed);
        }
    };
    debug!(curve = %curve, recovery_id, normalized_s = was_high, "signature canonicalized");

    Ok(CompactSignature {
        recovery_byte: recovery_id + RECOVERY_BYTE_OFFSET,
        r: to_fixed_32(&raw.r)?,
        s: to_fixed_32(&raw.s)?,
    })
}
