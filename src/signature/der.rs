//! ASN.1 DER `ECDSA-Sig-Value ::= SEQUENCE { r INTEGER, s INTEGER }`.
//!
//! Expected layout: `0x30 <len> 0x02 <r_len> <r> 0x02 <s_len> <s>`.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::ec::CurveParameters;
use crate::error::SigningError;

const TAG_SEQUENCE: u8 = 0x30;
const TAG_INTEGER: u8 = 0x02;

/// `(r, s)` as decoded from DER, before any normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSignature {
    pub r: BigUint,
    pub s: BigUint,
}

fn malformed(msg: &str) -> SigningError {
    SigningError::MalformedSignature(msg.to_string())
}

struct DerReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        DerReader { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn byte(&mut self) -> Result<u8, SigningError> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| malformed("reached past end of ASN.1 stream"))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], SigningError> {
        if len > self.remaining() {
            return Err(malformed("truncated ASN.1 element"));
        }
        let out = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn expect_tag(&mut self, tag: u8, what: &str) -> Result<(), SigningError> {
        let found = self.byte()?;
        if found != tag {
            return Err(SigningError::MalformedSignature(format!(
                "expected {} tag 0x{:02x}, found 0x{:02x}",
                what, tag, found
            )));
        }
        Ok(())
    }

    /// Short form, or long form with one or two length bytes.
    fn length(&mut self) -> Result<usize, SigningError> {
        let first = self.byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let count = (first & 0x7f) as usize;
        if count == 0 || count > 2 {
            return Err(malformed("unsupported length encoding"));
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | self.byte()? as usize;
        }
        Ok(len)
    }

    fn integer(&mut self) -> Result<BigUint, SigningError> {
        self.expect_tag(TAG_INTEGER, "INTEGER")?;
        let len = self.length()?;
        if len == 0 {
            return Err(malformed("empty INTEGER"));
        }
        let content = self.take(len)?;
        if content[0] & 0x80 != 0 {
            return Err(malformed("negative INTEGER"));
        }
        Ok(BigUint::from_bytes_be(content))
    }
}

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xff {
        out.extend_from_slice(&[0x81, len as u8]);
    } else {
        out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]);
    }
}

fn encode_integer(value: &BigUint, out: &mut Vec<u8>) {
    let mut content = if value.is_zero() {
        vec![0u8]
    } else {
        value.to_bytes_be()
    };
    if content[0] & 0x80 != 0 {
        content.insert(0, 0);
    }
    out.push(TAG_INTEGER);
    encode_length(content.len(), out);
    out.extend_from_slice(&content);
}

impl RawSignature {
    pub fn new(r: BigUint, s: BigUint) -> Self {
        RawSignature { r, s }
    }

    /// Structural decode. Trailing bytes after the sequence are rejected.
    pub fn from_der(bytes: &[u8]) -> Result<Self, SigningError> {
        let mut outer = DerReader::new(bytes);
        outer.expect_tag(TAG_SEQUENCE, "SEQUENCE")?;
        let len = outer.length()?;
        let body = outer.take(len)?;
        if outer.remaining() != 0 {
            return Err(malformed("trailing bytes after signature"));
        }

        let mut inner = DerReader::new(body);
        let r = inner.integer()?;
        let s = inner.integer()?;
        if inner.remaining() != 0 {
            return Err(malformed("unexpected element after s"));
        }
        Ok(RawSignature { r, s })
    }

    /// Minimal DER encoding.
    pub fn to_der(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(72);
        encode_integer(&self.r, &mut body);
        encode_integer(&self.s, &mut body);

        let mut out = Vec::with_capacity(body.len() + 3);
        out.push(TAG_SEQUENCE);
        encode_length(body.len(), &mut out);
        out.extend_from_slice(&body);
        out
    }

    /// Both components must lie in `[1, n-1]`.
    pub fn check_range(&self, curve: &CurveParameters) -> Result<(), SigningError> {
        if !curve.is_valid_scalar(&self.r) {
            return Err(malformed("r is outside [1, n-1]"));
        }
        if !curve.is_valid_scalar(&self.s) {
            return Err(malformed("s is outside [1, n-1]"));
        }
        Ok(())
    }

    pub fn is_low_s(&self, curve: &CurveParameters) -> bool {
        self.s <= curve.half_order
    }

    /// Replace `s` by `n - s` when it lies in the upper half of the order.
    pub fn normalize_s(self, curve: &CurveParameters) -> Self {
        if self.is_low_s(curve) {
            self
        } else {
            RawSignature {
                s: &curve.n - &self.s,
                r: self.r,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::CurveId;

    // Bitcoin mainnet signature (secp256k1)
    const VALID_SIG: &str = "304402204e45e16932b8af514961a1d3a1a25fdf3f4f7732e9d624c6c61548ab5fb8cd41\
                             0220181522ec8eca07de4860a4acdd12909d831cc56cbbac4622082221a8768d1d09";

    fn int(hex_str: &str) -> BigUint {
        BigUint::parse_bytes(hex_str.as_bytes(), 16).unwrap()
    }

    #[test]
    fn test_der_parsing() {
        let valid = hex::decode(VALID_SIG).unwrap();
        let sig = RawSignature::from_der(&valid).unwrap();
        assert_eq!(sig.r, int("4e45e16932b8af514961a1d3a1a25fdf3f4f7732e9d624c6c61548ab5fb8cd41"));
        assert_eq!(sig.s, int("181522ec8eca07de4860a4acdd12909d831cc56cbbac4622082221a8768d1d09"));
        assert_eq!(sig.to_der(), valid);
        assert!(sig.check_range(CurveId::K1.params()).is_ok());
    }

    #[test]
    fn test_malformed_der() {
        let valid = hex::decode(VALID_SIG).unwrap();
        let is_malformed = |bytes: &[u8]| {
            matches!(
                RawSignature::from_der(bytes),
                Err(SigningError::MalformedSignature(_))
            )
        };

        assert!(is_malformed(&[]));

        let mut bad_magic = valid.clone();
        bad_magic[0] = 0x31;
        assert!(is_malformed(&bad_magic));

        let mut bad_marker = valid.clone();
        bad_marker[2] = 0x03;
        assert!(is_malformed(&bad_marker));

        for cut in [1, 2, 10, valid.len() - 1] {
            assert!(is_malformed(&valid[..cut]), "truncated at {}", cut);
        }

        let mut trailing = valid.clone();
        trailing.push(0x00);
        assert!(is_malformed(&trailing));

        // 0x30 0x06 0x02 0x01 0x80 ... : r is negative
        assert!(is_malformed(&[0x30, 0x06, 0x02, 0x01, 0x80, 0x02, 0x01, 0x01]));
        // empty integer
        assert!(is_malformed(&[0x30, 0x05, 0x02, 0x00, 0x02, 0x01, 0x01]));
    }

    #[test]
    fn test_range_check() {
        let params = CurveId::R1.params();
        let zero_r = RawSignature::new(BigUint::zero(), BigUint::from(1u32));
        assert!(zero_r.check_range(params).is_err());
        let big_s = RawSignature::new(BigUint::from(1u32), params.n.clone());
        assert!(big_s.check_range(params).is_err());
        // Survives the DER round trip and still fails the range check
        let decoded = RawSignature::from_der(&big_s.to_der()).unwrap();
        assert!(matches!(
            decoded.check_range(params),
            Err(SigningError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_low_s_normalization() {
        let params = CurveId::K1.params();
        let high = RawSignature::new(
            int("a196ed0e7ebcbe7b63fe1d8eecbdbde03a67ceba4fc8f6482bdcb9606a911404"),
            int("971729c7fa944b465b35250c6570a2f31acbb14b13d1565fab7330dcb2b3dfb1"),
        );
        assert!(!high.is_low_s(params));

        let low = high.clone().normalize_s(params);
        assert_eq!(low.r, high.r);
        assert_eq!(low.s, int("68e8d638056bb4b9a4cadaf39a8f5d0b9fe32b9b9b7749dc145f2db01d826190"));
        assert!(low.is_low_s(params));

        // Already low: untouched
        assert_eq!(low.clone().normalize_s(params), low);
    }
}
