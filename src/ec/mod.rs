//! Elliptic-curve arithmetic over secp256r1 and secp256k1.
//!
//! Everything here is pure and allocation-only; the signature canonicalizer is
//! the only consumer.

pub mod curve;
pub mod point;

pub use curve::{CurveId, CurveParameters};
pub use point::{
    decompress_point, mod_inverse, scalar_multiply, sum_of_two_scalar_multiplies, Point,
};
