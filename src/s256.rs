//! secp256k1: y^2 = x^3 + 7 over F_P, with generator G of prime order N
//!
//! [`S256Field`] fixes the modulus, so its arithmetic can never mismatch and
//! also backs the `std::ops` operators. [`S256Point`] wraps the generic
//! [`CurvePoint`] and adds SEC encoding, scalar reduction mod N and ECDSA
//! verification.

use crate::constants::*;
use crate::curve::CurvePoint;
use crate::error::{ConsensusError, Result};
use crate::field::Field;
use crate::hash::hash160;
use crate::signature::Signature;
use crate::types::Hash160;
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::Zero;
use once_cell::sync::Lazy;
use std::fmt;
use std::ops::{Add, Mul, Sub};

fn parse_hex_constant(hex: &str) -> BigUint {
    BigUint::parse_bytes(hex.as_bytes(), 16).unwrap_or_default()
}

/// Field prime
pub static P: Lazy<BigUint> = Lazy::new(|| parse_hex_constant(SECP256K1_P_HEX));

/// Group order
pub static N: Lazy<BigUint> = Lazy::new(|| parse_hex_constant(SECP256K1_N_HEX));

/// Generator point
pub static G: Lazy<S256Point> = Lazy::new(|| {
    S256Point::from_affine(
        S256Field::reduce(parse_hex_constant(SECP256K1_GX_HEX)),
        S256Field::reduce(parse_hex_constant(SECP256K1_GY_HEX)),
    )
});

/// Big-endian, zero-padded 32-byte encoding of a value below 2^256.
pub fn to_be_bytes_32(value: &BigUint) -> [u8; 32] {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; 32];
    let len = bytes.len().min(32);
    out[32 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    out
}

/// Element of the secp256k1 base field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct S256Field(BigUint);

impl S256Field {
    pub fn new(num: BigUint) -> Result<Self> {
        if num >= *P {
            return Err(ConsensusError::OutOfRange(format!(
                "{:x} not below the secp256k1 field prime",
                num
            )));
        }
        Ok(Self(num))
    }

    fn reduce(num: BigUint) -> Self {
        Self(num % &*P)
    }

    pub fn num(&self) -> &BigUint {
        &self.0
    }

    /// Square root candidate x^((P+1)/4), valid because P = 3 (mod 4).
    ///
    /// The result only squares back to `self` when `self` is a quadratic residue;
    /// callers must check.
    pub fn sqrt(&self) -> Self {
        let exponent = (&*P + 1u32) / 4u32;
        Self(self.0.modpow(&exponent, &P))
    }

    pub fn is_even(&self) -> bool {
        self.0.is_even()
    }

    pub fn negate(&self) -> Self {
        Self::reduce(&*P - &self.0)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        to_be_bytes_32(&self.0)
    }
}

impl Add for &S256Field {
    type Output = S256Field;

    fn add(self, rhs: Self) -> S256Field {
        S256Field::reduce(&self.0 + &rhs.0)
    }
}

impl Sub for &S256Field {
    type Output = S256Field;

    fn sub(self, rhs: Self) -> S256Field {
        S256Field::reduce(&self.0 + &*P - &rhs.0)
    }
}

impl Mul for &S256Field {
    type Output = S256Field;

    fn mul(self, rhs: Self) -> S256Field {
        S256Field::reduce(&self.0 * &rhs.0)
    }
}

impl Field for S256Field {
    fn try_add(&self, rhs: &Self) -> Result<Self> {
        Ok(self + rhs)
    }

    fn try_sub(&self, rhs: &Self) -> Result<Self> {
        Ok(self - rhs)
    }

    fn try_mul(&self, rhs: &Self) -> Result<Self> {
        Ok(self * rhs)
    }

    fn try_div(&self, rhs: &Self) -> Result<Self> {
        if rhs.0.is_zero() {
            return Err(ConsensusError::DivisionByZero);
        }
        let inverse = rhs.0.modpow(&(&*P - 2u32), &P);
        Ok(Self::reduce(&self.0 * inverse))
    }

    fn scale(&self, coefficient: u32) -> Self {
        Self::reduce(&self.0 * coefficient)
    }

    fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for S256Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:064x}", self.0)
    }
}

fn curve_a() -> S256Field {
    S256Field(BigUint::from(SECP256K1_A))
}

fn curve_b() -> S256Field {
    S256Field(BigUint::from(SECP256K1_B))
}

/// SEC coordinate bytes; a value not below P is a malformed key.
fn sec_coordinate(bytes: &[u8]) -> Result<S256Field> {
    S256Field::new(BigUint::from_bytes_be(bytes))
        .map_err(|_| ConsensusError::Parse("SEC coordinate not below the field prime".to_string()))
}

/// Point on secp256k1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S256Point(CurvePoint<S256Field>);

impl S256Point {
    pub fn new(x: S256Field, y: S256Field) -> Result<Self> {
        Ok(Self(CurvePoint::new(x, y, curve_a(), curve_b())?))
    }

    fn from_affine(x: S256Field, y: S256Field) -> Self {
        Self::new(x, y).unwrap_or_else(|_| Self::infinity())
    }

    pub fn infinity() -> Self {
        Self(CurvePoint::infinity(curve_a(), curve_b()))
    }

    pub fn is_infinity(&self) -> bool {
        self.0.is_infinity()
    }

    pub fn x(&self) -> Option<&S256Field> {
        self.0.x()
    }

    pub fn y(&self) -> Option<&S256Field> {
        self.0.y()
    }

    pub fn try_add(&self, other: &Self) -> Result<Self> {
        Ok(Self(self.0.try_add(&other.0)?))
    }

    /// (k mod N) * self
    pub fn scalar_multiply(&self, k: &BigUint) -> Result<Self> {
        Ok(Self(self.0.scalar_multiply(&(k % &*N))?))
    }

    /// (k mod N) * self with a fixed 256-step ladder, for private scalars.
    pub fn secret_multiply(&self, k: &BigUint) -> Result<Self> {
        Ok(Self(self.0.ladder_multiply(&(k % &*N), 256)?))
    }

    /// ECDSA verification of `signature` over digest `z` against this public point.
    ///
    /// Returns false, never an error, for out-of-range signatures and for
    /// degenerate sums that land on the identity.
    pub fn verify(&self, z: &BigUint, signature: &Signature) -> bool {
        let n = &*N;
        let (r, s) = (signature.r(), signature.s());
        if self.is_infinity() || r.is_zero() || s.is_zero() || r >= n || s >= n {
            return false;
        }
        let s_inv = s.modpow(&(n - 2u32), n);
        let u = (z * &s_inv) % n;
        let v = (r * &s_inv) % n;
        let total = G
            .scalar_multiply(&u)
            .and_then(|ug| ug.try_add(&self.scalar_multiply(&v)?));
        match total {
            Ok(point) => point.x().map_or(false, |x| x.num() == r),
            Err(_) => false,
        }
    }

    /// SEC encoding; the identity encodes as the single byte 0x00.
    pub fn sec(&self, compressed: bool) -> Vec<u8> {
        let (x, y) = match (self.x(), self.y()) {
            (Some(x), Some(y)) => (x, y),
            _ => return vec![0x00],
        };
        if compressed {
            let prefix = if y.is_even() { 0x02 } else { 0x03 };
            let mut out = Vec::with_capacity(33);
            out.push(prefix);
            out.extend_from_slice(&x.to_bytes());
            out
        } else {
            let mut out = Vec::with_capacity(65);
            out.push(0x04);
            out.extend_from_slice(&x.to_bytes());
            out.extend_from_slice(&y.to_bytes());
            out
        }
    }

    /// Parse a compressed or uncompressed SEC public key.
    pub fn parse(sec: &[u8]) -> Result<Self> {
        match sec.first().copied() {
            Some(0x04) => {
                if sec.len() != 65 {
                    return Err(ConsensusError::Parse(format!(
                        "uncompressed SEC key must be 65 bytes, got {}",
                        sec.len()
                    )));
                }
                let x = sec_coordinate(&sec[1..33])?;
                let y = sec_coordinate(&sec[33..65])?;
                Self::new(x, y)
            }
            Some(prefix @ (0x02 | 0x03)) => {
                if sec.len() != 33 {
                    return Err(ConsensusError::Parse(format!(
                        "compressed SEC key must be 33 bytes, got {}",
                        sec.len()
                    )));
                }
                let x = sec_coordinate(&sec[1..])?;
                let alpha = &(&(&x * &x) * &x) + &curve_b();
                let beta = alpha.sqrt();
                if &beta * &beta != alpha {
                    return Err(ConsensusError::Parse(
                        "x coordinate has no point on secp256k1".to_string(),
                    ));
                }
                let want_even = prefix == 0x02;
                let y = if beta.is_even() == want_even {
                    beta
                } else {
                    beta.negate()
                };
                Self::new(x, y)
            }
            Some(other) => Err(ConsensusError::Parse(format!(
                "unknown SEC prefix byte {:#04x}",
                other
            ))),
            None => Err(ConsensusError::Parse("empty SEC key".to_string())),
        }
    }

    /// RIPEMD160(SHA256(sec))
    pub fn hash160(&self, compressed: bool) -> Hash160 {
        hash160(&self.sec(compressed))
    }
}

impl fmt::Display for S256Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.x(), self.y()) {
            (Some(x), Some(y)) => write!(f, "S256Point({}, {})", x, y),
            _ => write!(f, "S256Point(infinity)"),
        }
    }
}
