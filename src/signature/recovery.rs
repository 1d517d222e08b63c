//! Public-key recovery from `(r, s)` and a recovery id.

use num_bigint::BigUint;
use tracing::trace;

use crate::ec::{decompress_point, mod_inverse, scalar_multiply, sum_of_two_scalar_multiplies, CurveParameters, Point};

use super::der::RawSignature;

/// Highest recovery id tried. Ids 2 and 3 cover `r + n` which only exists
/// when `r + n < p`.
pub const MAX_RECOVERY_ID: u8 = 3;

/// Candidate public key for recovery id `recovery_id`, or `None` when that id
/// yields no valid point.
pub fn recover_candidate(
    curve: &CurveParameters,
    signature: &RawSignature,
    message_hash: &[u8; 32],
    recovery_id: u8,
) -> Option<Point> {
    let x = &signature.r + BigUint::from(recovery_id / 2) * &curve.n;
    if x >= curve.p {
        return None;
    }
    let r_point = decompress_point(curve, &x, recovery_id & 1 == 1).ok()?;
    if !scalar_multiply(curve, &r_point, &curve.n).is_infinity() {
        return None;
    }

    let e = BigUint::from_bytes_be(message_hash) % &curve.n;
    let r_inv = mod_inverse(&signature.r, &curve.n)?;
    // (-e) mod n, with e already reduced
    let neg_e = (&curve.n - &e) % &curve.n;
    let u1 = neg_e * &r_inv % &curve.n;
    let u2 = &signature.s * &r_inv % &curve.n;

    let q = sum_of_two_scalar_multiplies(curve, &curve.generator, &u1, &r_point, &u2);
    if q.is_infinity() {
        return None;
    }
    Some(q)
}

/// First recovery id whose candidate equals `expected` (SEC1 compressed).
pub fn find_recovery_id(
    curve: &CurveParameters,
    signature: &RawSignature,
    message_hash: &[u8; 32],
    expected: &[u8; 33],
) -> Option<u8> {
    (0..=MAX_RECOVERY_ID).find(|&id| {
        let matched = recover_candidate(curve, signature, message_hash, id)
            .and_then(|q| q.to_compressed())
            .map_or(false, |compressed| &compressed == expected);
        trace!(curve = %curve.id, recovery_id = id, matched, "recovery candidate");
        matched
    })
}
