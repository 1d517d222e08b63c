//! Affine and Jacobian point arithmetic.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};

use super::curve::CurveParameters;
use crate::error::CurveError;

pub const COMPRESSED_EVEN_Y: u8 = 0x02;
pub const COMPRESSED_ODD_Y: u8 = 0x03;

/// Affine curve point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Point {
    Infinity,
    Affine { x: BigUint, y: BigUint },
}

impl Point {
    pub fn is_infinity(&self) -> bool {
        matches!(self, Point::Infinity)
    }

    /// SEC1 compressed encoding; `None` for the point at infinity.
    pub fn to_compressed(&self) -> Option<[u8; 33]> {
        match self {
            Point::Infinity => None,
            Point::Affine { x, y } => {
                let mut out = [0u8; 33];
                out[0] = if y.is_odd() { COMPRESSED_ODD_Y } else { COMPRESSED_EVEN_Y };
                let x_bytes = x.to_bytes_be();
                out[33 - x_bytes.len()..].copy_from_slice(&x_bytes);
                Some(out)
            }
        }
    }

    /// Parse a 33-byte SEC1 compressed point.
    pub fn from_compressed(curve: &CurveParameters, bytes: &[u8]) -> Result<Point, CurveError> {
        if bytes.len() != 1 + curve.byte_len() {
            return Err(CurveError::NotOnCurve);
        }
        let y_odd = match bytes[0] {
            COMPRESSED_EVEN_Y => false,
            COMPRESSED_ODD_Y => true,
            _ => return Err(CurveError::NotOnCurve),
        };
        decompress_point(curve, &BigUint::from_bytes_be(&bytes[1..]), y_odd)
    }
}

/// Arithmetic mod p. Inputs are expected to be reduced.
struct Field<'a> {
    p: &'a BigUint,
}

impl<'a> Field<'a> {
    fn add(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + b) % self.p
    }

    fn sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        if a >= b {
            a - b
        } else {
            self.p - b + a
        }
    }

    fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        a * b % self.p
    }

    fn mul_small(&self, a: &BigUint, k: u32) -> BigUint {
        a * k % self.p
    }
}

/// Jacobian point `(X, Y, Z)` standing for `(X/Z^2, Y/Z^3)`; `Z = 0` is infinity.
#[derive(Clone)]
struct Jacobian {
    x: BigUint,
    y: BigUint,
    z: BigUint,
}

impl Jacobian {
    fn infinity() -> Self {
        Jacobian {
            x: BigUint::one(),
            y: BigUint::one(),
            z: BigUint::zero(),
        }
    }

    fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }

    fn from_point(point: &Point) -> Self {
        match point {
            Point::Infinity => Jacobian::infinity(),
            Point::Affine { x, y } => Jacobian {
                x: x.clone(),
                y: y.clone(),
                z: BigUint::one(),
            },
        }
    }

    fn to_point(&self, curve: &CurveParameters) -> Point {
        if self.is_infinity() {
            return Point::Infinity;
        }
        let f = Field { p: &curve.p };
        let z_inv = match mod_inverse(&self.z, &curve.p) {
            Some(inv) => inv,
            None => return Point::Infinity,
        };
        let z_inv2 = f.mul(&z_inv, &z_inv);
        let z_inv3 = f.mul(&z_inv2, &z_inv);
        Point::Affine {
            x: f.mul(&self.x, &z_inv2),
            y: f.mul(&self.y, &z_inv3),
        }
    }

    fn double(&self, curve: &CurveParameters) -> Jacobian {
        if self.is_infinity() || self.y.is_zero() {
            return Jacobian::infinity();
        }
        let f = Field { p: &curve.p };
        let y2 = f.mul(&self.y, &self.y);
        let s = f.mul_small(&f.mul(&self.x, &y2), 4);
        let z2 = f.mul(&self.z, &self.z);
        let m = f.add(
            &f.mul_small(&f.mul(&self.x, &self.x), 3),
            &f.mul(&curve.a, &f.mul(&z2, &z2)),
        );
        let x3 = f.sub(&f.mul(&m, &m), &f.mul_small(&s, 2));
        let y3 = f.sub(
            &f.mul(&m, &f.sub(&s, &x3)),
            &f.mul_small(&f.mul(&y2, &y2), 8),
        );
        let z3 = f.mul(&f.mul_small(&self.y, 2), &self.z);
        Jacobian { x: x3, y: y3, z: z3 }
    }

    fn add(&self, other: &Jacobian, curve: &CurveParameters) -> Jacobian {
        if self.is_infinity() {
            return other.clone();
        }
        if other.is_infinity() {
            return self.clone();
        }
        let f = Field { p: &curve.p };
        let z1z1 = f.mul(&self.z, &self.z);
        let z2z2 = f.mul(&other.z, &other.z);
        let u1 = f.mul(&self.x, &z2z2);
        let u2 = f.mul(&other.x, &z1z1);
        let s1 = f.mul(&self.y, &f.mul(&other.z, &z2z2));
        let s2 = f.mul(&other.y, &f.mul(&self.z, &z1z1));

        if u1 == u2 {
            return if s1 == s2 {
                self.double(curve)
            } else {
                Jacobian::infinity()
            };
        }

        let h = f.sub(&u2, &u1);
        let r = f.sub(&s2, &s1);
        let h2 = f.mul(&h, &h);
        let h3 = f.mul(&h2, &h);
        let u1h2 = f.mul(&u1, &h2);
        let x3 = f.sub(&f.sub(&f.mul(&r, &r), &h3), &f.mul_small(&u1h2, 2));
        let y3 = f.sub(&f.mul(&r, &f.sub(&u1h2, &x3)), &f.mul(&s1, &h3));
        let z3 = f.mul(&f.mul(&h, &self.z), &other.z);
        Jacobian { x: x3, y: y3, z: z3 }
    }
}

/// Bits of `scalar`, most significant first.
fn bits_msb_first(scalar: &BigUint) -> impl Iterator<Item = bool> {
    let bytes = scalar.to_bytes_be();
    bytes
        .into_iter()
        .flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1))
}

/// Modular inverse for a prime modulus (Fermat). `None` when `value ≡ 0`.
pub fn mod_inverse(value: &BigUint, prime: &BigUint) -> Option<BigUint> {
    let reduced = value % prime;
    if reduced.is_zero() {
        return None;
    }
    Some(reduced.modpow(&(prime - 2u32), prime))
}

/// Recover the point with x-coordinate `x` whose y has parity `y_odd`.
pub fn decompress_point(curve: &CurveParameters, x: &BigUint, y_odd: bool) -> Result<Point, CurveError> {
    if x >= &curve.p {
        return Err(CurveError::CoordinateOutOfRange);
    }
    let alpha = curve.rhs(x);
    let beta = alpha.modpow(&curve.sqrt_exponent, &curve.p);
    if &beta * &beta % &curve.p != alpha {
        return Err(CurveError::NotOnCurve);
    }
    let y = if beta.is_odd() == y_odd {
        beta
    } else {
        (&curve.p - &beta) % &curve.p
    };
    if y.is_odd() != y_odd {
        // y = 0 has only the even root
        return Err(CurveError::NotOnCurve);
    }
    Ok(Point::Affine { x: x.clone(), y })
}

/// `scalar · point`. The scalar is used as given, not reduced mod n.
pub fn scalar_multiply(curve: &CurveParameters, point: &Point, scalar: &BigUint) -> Point {
    let base = Jacobian::from_point(point);
    let mut acc = Jacobian::infinity();
    for bit in bits_msb_first(scalar) {
        acc = acc.double(curve);
        if bit {
            acc = acc.add(&base, curve);
        }
    }
    acc.to_point(curve)
}

/// `s1 · p1 + s2 · p2` with a single shared doubling chain.
pub fn sum_of_two_scalar_multiplies(
    curve: &CurveParameters,
    p1: &Point,
    s1: &BigUint,
    p2: &Point,
    s2: &BigUint,
) -> Point {
    let j1 = Jacobian::from_point(p1);
    let j2 = Jacobian::from_point(p2);
    let both = j1.add(&j2, curve);

    let len = s1.to_bytes_be().len().max(s2.to_bytes_be().len());
    let b1 = padded_bits(s1, len);
    let b2 = padded_bits(s2, len);

    let mut acc = Jacobian::infinity();
    for (bit1, bit2) in b1.zip(b2) {
        acc = acc.double(curve);
        match (bit1, bit2) {
            (true, true) => acc = acc.add(&both, curve),
            (true, false) => acc = acc.add(&j1, curve),
            (false, true) => acc = acc.add(&j2, curve),
            (false, false) => {}
        }
    }
    acc.to_point(curve)
}

fn padded_bits(scalar: &BigUint, len: usize) -> impl Iterator<Item = bool> {
    let bytes = scalar.to_bytes_be();
    let mut padded = vec![0u8; len - bytes.len()];
    padded.extend_from_slice(&bytes);
    padded
        .into_iter()
        .flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::CurveId;
    use p256::elliptic_curve::sec1::ToEncodedPoint;

    fn scalar(hex_str: &str) -> BigUint {
        BigUint::parse_bytes(hex_str.as_bytes(), 16).unwrap()
    }

    #[test]
    fn test_order_times_generator_is_infinity() {
        for curve in [CurveId::K1, CurveId::R1] {
            let params = curve.params();
            assert!(scalar_multiply(params, &params.generator, &params.n).is_infinity());
            let almost = &params.n - 1u32;
            let minus_g = scalar_multiply(params, &params.generator, &almost);
            assert!(params.contains(&minus_g));
            // (n-1)G + G = nG
            let sum = sum_of_two_scalar_multiplies(
                params,
                &minus_g,
                &BigUint::one(),
                &params.generator,
                &BigUint::one(),
            );
            assert!(sum.is_infinity());
        }
    }

    #[test]
    fn test_scalar_multiply_matches_p256() {
        let k = scalar("C9AFA9D845BA75166B5C215767B1D6934E50C3DB36E89B127B8A622B120F6721");
        let params = CurveId::R1.params();
        let ours = scalar_multiply(params, &params.generator, &k).to_compressed().unwrap();

        let secret = p256::SecretKey::from_slice(&k.to_bytes_be()).unwrap();
        let theirs = secret.public_key().to_encoded_point(true);
        assert_eq!(&ours[..], theirs.as_bytes());
    }

    #[test]
    fn test_scalar_multiply_matches_k256() {
        let k = scalar("1E99423A4ED27608A15A2616A2B0E9E52CED330AC530EDCC32C8FFC6A526AEDD");
        let params = CurveId::K1.params();
        let ours = scalar_multiply(params, &params.generator, &k).to_compressed().unwrap();

        let secret = k256::SecretKey::from_slice(&k.to_bytes_be()).unwrap();
        let theirs = secret.public_key().to_encoded_point(true);
        assert_eq!(&ours[..], theirs.as_bytes());
    }

    #[test]
    fn test_sum_of_two_matches_separate_multiplies() {
        let params = CurveId::R1.params();
        let a = scalar("3A1");
        let b = scalar("FFFFFFFF00000000FFFFFFFFFFFFFFFF");
        let q = scalar_multiply(params, &params.generator, &scalar("1234567"));

        let combined = sum_of_two_scalar_multiplies(params, &params.generator, &a, &q, &b);
        let separate = Jacobian::from_point(&scalar_multiply(params, &params.generator, &a))
            .add(&Jacobian::from_point(&scalar_multiply(params, &q, &b)), params)
            .to_point(params);
        assert_eq!(combined, separate);
    }

    #[test]
    fn test_decompress_round_trip_and_errors() {
        let params = CurveId::K1.params();
        let compressed = params.generator.to_compressed().unwrap();
        assert_eq!(Point::from_compressed(params, &compressed).unwrap(), params.generator);

        // Other parity gives the negated point
        if let Point::Affine { x, y } = &params.generator {
            let flipped = decompress_point(params, x, !y.is_odd()).unwrap();
            assert_eq!(flipped, Point::Affine { x: x.clone(), y: &params.p - y });
        }

        assert_eq!(
            decompress_point(params, &params.p, false),
            Err(CurveError::CoordinateOutOfRange)
        );
        // x = 5: 125 + 7 = 132 is not a square mod p on secp256k1
        let five = BigUint::from(5u32);
        assert_eq!(decompress_point(params, &five, false), Err(CurveError::NotOnCurve));
    }

    #[test]
    fn test_mod_inverse() {
        let p = BigUint::from(11u32);
        assert_eq!(mod_inverse(&BigUint::from(3u32), &p), Some(BigUint::from(4u32)));
        assert_eq!(mod_inverse(&BigUint::zero(), &p), None);
        assert_eq!(mod_inverse(&BigUint::from(22u32), &p), None);
    }
}
