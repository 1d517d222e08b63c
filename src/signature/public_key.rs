use serde::{Deserialize, Serialize};

use crate::ec::{CurveId, Point};
use crate::error::SigningError;

pub const COMPRESSED_KEY_LEN: usize = 33;

/// SEC1-compressed public key on one of the supported curves.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    pub curve: CurveId,
    #[serde(with = "compressed_bytes")]
    pub compressed: [u8; COMPRESSED_KEY_LEN],
}

impl PublicKey {
    /// Validates length, prefix and that the point lies on `curve`.
    pub fn from_compressed(curve: CurveId, bytes: &[u8]) -> Result<Self, SigningError> {
        let compressed = check_compressed_shape(bytes)?;
        Point::from_compressed(curve.params(), &compressed)
            .map_err(|e| SigningError::InvalidPublicKey(e.to_string()))?;
        Ok(PublicKey { curve, compressed })
    }

    /// `key type tag ‖ compressed point`.
    pub fn to_protocol_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + COMPRESSED_KEY_LEN);
        out.push(self.curve.key_type_tag());
        out.extend_from_slice(&self.compressed);
        out
    }

    pub fn from_protocol_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        let (&tag, rest) = bytes
            .split_first()
            .ok_or_else(|| SigningError::InvalidPublicKey("empty key".to_string()))?;
        let curve = CurveId::from_key_type_tag(tag)
            .ok_or_else(|| SigningError::InvalidPublicKey(format!("unknown key type tag {}", tag)))?;
        Self::from_compressed(curve, rest)
    }

    /// Lowercase hex of the protocol bytes; the registration lookup key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.to_protocol_bytes())
    }

    pub fn from_public_key_hex(value: &str) -> Result<Self, SigningError> {
        let bytes = hex::decode(value).map_err(|e| SigningError::InvalidPublicKey(e.to_string()))?;
        Self::from_protocol_bytes(&bytes)
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.public_key_hex())
    }
}

/// Length and prefix check only, no curve membership.
pub(crate) fn check_compressed_shape(bytes: &[u8]) -> Result<[u8; COMPRESSED_KEY_LEN], SigningError> {
    let compressed: [u8; COMPRESSED_KEY_LEN] = bytes.try_into().map_err(|_| {
        SigningError::InvalidPublicKey(format!(
            "expected {} bytes, got {}",
            COMPRESSED_KEY_LEN,
            bytes.len()
        ))
    })?;
    match compressed[0] {
        0x02 | 0x03 => Ok(compressed),
        other => Err(SigningError::InvalidPublicKey(format!(
            "bad compressed point prefix 0x{:02x}",
            other
        ))),
    }
}

mod compressed_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::COMPRESSED_KEY_LEN;

    pub fn serialize<S: Serializer>(bytes: &[u8; COMPRESSED_KEY_LEN], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; COMPRESSED_KEY_LEN], D::Error> {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| D::Error::invalid_length(bytes.len(), &"33 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_hex_round_trip() {
        let generator = CurveId::R1.params().generator.to_compressed().unwrap();
        let key = PublicKey::from_compressed(CurveId::R1, &generator).unwrap();

        let hex_key = key.public_key_hex();
        assert!(hex_key.starts_with("01"));
        assert_eq!(hex_key.len(), 68);
        assert_eq!(PublicKey::from_public_key_hex(&hex_key).unwrap(), key);

        let bytes = bincode::serialize(&key).unwrap();
        assert_eq!(bincode::deserialize::<PublicKey>(&bytes).unwrap(), key);
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(matches!(
            PublicKey::from_compressed(CurveId::K1, &[0x02; 32]),
            Err(SigningError::InvalidPublicKey(_))
        ));
        let mut uncompressed_prefix = [0u8; 33];
        uncompressed_prefix[0] = 0x04;
        assert!(PublicKey::from_compressed(CurveId::K1, &uncompressed_prefix).is_err());
        assert!(PublicKey::from_public_key_hex("07aa").is_err());
        assert!(PublicKey::from_public_key_hex("not hex").is_err());
    }
}
