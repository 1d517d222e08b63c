//! Domain parameters for the two curves the ledger accepts.

use lazy_static::lazy_static;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use super::point::Point;

/// Supported signing curves.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CurveId {
    /// secp256k1
    K1,
    /// secp256r1 / prime256v1 (the only curve Android hardware keys offer)
    R1,
}

impl CurveId {
    /// Key-type tag prepended to protocol public keys and signatures.
    pub fn key_type_tag(self) -> u8 {
        match self {
            CurveId::K1 => 0,
            CurveId::R1 => 1,
        }
    }

    pub fn from_key_type_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CurveId::K1),
            1 => Some(CurveId::R1),
            _ => None,
        }
    }

    pub fn params(self) -> &'static CurveParameters {
        match self {
            CurveId::K1 => &*SECP256K1,
            CurveId::R1 => &*SECP256R1,
        }
    }
}

impl std::fmt::Display for CurveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurveId::K1 => write!(f, "secp256k1"),
            CurveId::R1 => write!(f, "secp256r1"),
        }
    }
}

impl std::str::FromStr for CurveId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "k1" | "secp256k1" => Ok(CurveId::K1),
            "r1" | "secp256r1" | "prime256v1" => Ok(CurveId::R1),
            _ => Err(format!("Unsupported curve: {}. Allowed: k1, r1", s)),
        }
    }
}

/// Short Weierstrass curve `y^2 = x^3 + ax + b` over `F_p`.
///
/// Square roots are taken as `v^((p+1)/4)`, so `p ≡ 3 (mod 4)` is required;
/// both supported curves satisfy it.
#[derive(Debug, Clone)]
pub struct CurveParameters {
    pub id: CurveId,
    pub p: BigUint,
    pub a: BigUint,
    pub b: BigUint,
    pub generator: Point,
    pub n: BigUint,
    pub cofactor: BigUint,
    pub half_order: BigUint,
    pub(crate) sqrt_exponent: BigUint,
}

impl CurveParameters {
    fn from_hex(id: CurveId, p: &str, a: &str, b: &str, gx: &str, gy: &str, n: &str) -> Self {
        let p = hex_int(p);
        let n = hex_int(n);
        let half_order = &n >> 1usize;
        let sqrt_exponent = (&p + 1u32) >> 2usize;
        CurveParameters {
            id,
            a: hex_int(a),
            b: hex_int(b),
            generator: Point::Affine {
                x: hex_int(gx),
                y: hex_int(gy),
            },
            cofactor: BigUint::one(),
            half_order,
            sqrt_exponent,
            p,
            n,
        }
    }

    /// Right-hand side of the curve equation, reduced mod p.
    pub(crate) fn rhs(&self, x: &BigUint) -> BigUint {
        let x3 = x * x % &self.p * x;
        (x3 + &self.a * x + &self.b) % &self.p
    }

    pub fn contains(&self, point: &Point) -> bool {
        match point {
            Point::Infinity => true,
            Point::Affine { x, y } => {
                if x >= &self.p || y >= &self.p {
                    return false;
                }
                y * y % &self.p == self.rhs(x)
            }
        }
    }

    /// True when `0 < value < n`.
    pub fn is_valid_scalar(&self, value: &BigUint) -> bool {
        !value.is_zero() && value < &self.n
    }

    /// Number of bytes in a field element / scalar.
    pub fn byte_len(&self) -> usize {
        ((self.p.bits() + 7) / 8) as usize
    }
}

fn hex_int(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 16).expect("curve constant is valid hex")
}

lazy_static! {
    static ref SECP256R1: CurveParameters = CurveParameters::from_hex(
        CurveId::R1,
        "FFFFFFFF00000001000000000000000000000000FFFFFFFFFFFFFFFFFFFFFFFF",
        "FFFFFFFF00000001000000000000000000000000FFFFFFFFFFFFFFFFFFFFFFFC",
        "5AC635D8AA3A93E7B3EBBD55769886BC651D06B0CC53B0F63BCE3C3E27D2604B",
        "6B17D1F2E12C4247F8BCE6E563A440F277037D812DEB33A0F4A13945D898C296",
        "4FE342E2FE1A7F9B8EE7EB4A7C0F9E162BCE33576B315ECECBB6406837BF51F5",
        "FFFFFFFF00000000FFFFFFFFFFFFFFFFBCE6FAADA7179E84F3B9CAC2FC632551",
    );
    static ref SECP256K1: CurveParameters = CurveParameters::from_hex(
        CurveId::K1,
        "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC2F",
        "0",
        "7",
        "79BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798",
        "483ADA7726A3C4655DA4FBFC0E1108A8FD17B448A68554199C47D08FFB10D4B8",
        "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_integer::Integer;

    #[test]
    fn test_generators_on_curve() {
        for curve in [CurveId::K1, CurveId::R1] {
            let params = curve.params();
            assert!(params.contains(&params.generator), "{} generator", curve);
            assert_eq!(params.byte_len(), 32);
            // sqrt via (p+1)/4 needs p = 3 mod 4
            assert_eq!(params.p.mod_floor(&BigUint::from(4u32)), BigUint::from(3u32));
            assert_eq!(&params.half_order * 2u32 + 1u32, params.n);
        }
    }

    #[test]
    fn test_curve_id_parsing() {
        assert_eq!("R1".parse::<CurveId>().unwrap(), CurveId::R1);
        assert_eq!("prime256v1".parse::<CurveId>().unwrap(), CurveId::R1);
        assert_eq!("secp256k1".parse::<CurveId>().unwrap(), CurveId::K1);
        assert!("ed25519".parse::<CurveId>().is_err());

        for curve in [CurveId::K1, CurveId::R1] {
            assert_eq!(CurveId::from_key_type_tag(curve.key_type_tag()), Some(curve));
        }
        assert_eq!(CurveId::from_key_type_tag(2), None);
    }
}
