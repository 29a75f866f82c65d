//! Prime-field arithmetic
//!
//! [`FieldElement`] carries its modulus at runtime so elements of unrelated
//! fields can coexist; every binary operation checks that both operands share a
//! modulus and fails with [`ConsensusError::FieldMismatch`] otherwise. The
//! [`Field`] trait is the seam the generic curve code is written against; the
//! secp256k1 field in [`crate::s256`] implements it with a fixed prime.

use crate::error::{ConsensusError, Result};
use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::Zero;
use std::fmt;

/// Arithmetic a curve needs from its coordinate field.
pub trait Field: Clone + PartialEq + fmt::Debug {
    fn try_add(&self, rhs: &Self) -> Result<Self>;
    fn try_sub(&self, rhs: &Self) -> Result<Self>;
    fn try_mul(&self, rhs: &Self) -> Result<Self>;
    /// Multiply by the inverse of `rhs`; fails with `DivisionByZero` when `rhs` is zero.
    fn try_div(&self, rhs: &Self) -> Result<Self>;
    /// Multiply by a small integer coefficient (`3 * x`, `2 * y`).
    fn scale(&self, coefficient: u32) -> Self;
    fn is_zero(&self) -> bool;
}

/// An element of F_p: 0 <= num < prime
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldElement {
    num: BigUint,
    prime: BigUint,
}

impl FieldElement {
    pub fn new(num: impl Into<BigUint>, prime: impl Into<BigUint>) -> Result<Self> {
        let num = num.into();
        let prime = prime.into();
        if prime < BigUint::from(2u32) {
            return Err(ConsensusError::OutOfRange(format!("modulus {} is not prime", prime)));
        }
        if num >= prime {
            return Err(ConsensusError::OutOfRange(format!(
                "{} not in field range 0 to {}",
                num,
                prime - 1u32
            )));
        }
        Ok(Self { num, prime })
    }

    pub fn num(&self) -> &BigUint {
        &self.num
    }

    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    fn with_num(&self, num: BigUint) -> Self {
        Self {
            num,
            prime: self.prime.clone(),
        }
    }

    fn check_same_field(&self, other: &Self) -> Result<()> {
        if self.prime != other.prime {
            return Err(ConsensusError::FieldMismatch {
                left: self.prime.to_string(),
                right: other.prime.to_string(),
            });
        }
        Ok(())
    }

    /// self^exponent, with the exponent reduced mod (p - 1) so negative
    /// exponents select the matching inverse power.
    pub fn pow(&self, exponent: impl Into<BigInt>) -> Self {
        let order = BigInt::from(self.prime.clone() - 1u32);
        let (_, n) = exponent.into().mod_floor(&order).into_parts();
        self.with_num(self.num.modpow(&n, &self.prime))
    }

    /// Multiplicative inverse via Fermat's little theorem: a^(p-2).
    pub fn inverse(&self) -> Result<Self> {
        if self.num.is_zero() {
            return Err(ConsensusError::DivisionByZero);
        }
        let exponent = &self.prime - 2u32;
        Ok(self.with_num(self.num.modpow(&exponent, &self.prime)))
    }

    /// Multiply by an arbitrary integer coefficient.
    pub fn mul_scalar(&self, coefficient: &BigUint) -> Self {
        self.with_num((&self.num * coefficient) % &self.prime)
    }
}

impl Field for FieldElement {
    fn try_add(&self, rhs: &Self) -> Result<Self> {
        self.check_same_field(rhs)?;
        Ok(self.with_num((&self.num + &rhs.num) % &self.prime))
    }

    fn try_sub(&self, rhs: &Self) -> Result<Self> {
        self.check_same_field(rhs)?;
        Ok(self.with_num((&self.num + &self.prime - &rhs.num) % &self.prime))
    }

    fn try_mul(&self, rhs: &Self) -> Result<Self> {
        self.check_same_field(rhs)?;
        Ok(self.with_num((&self.num * &rhs.num) % &self.prime))
    }

    fn try_div(&self, rhs: &Self) -> Result<Self> {
        self.check_same_field(rhs)?;
        let inverse = rhs.inverse()?;
        self.try_mul(&inverse)
    }

    fn scale(&self, coefficient: u32) -> Self {
        self.mul_scalar(&BigUint::from(coefficient))
    }

    fn is_zero(&self) -> bool {
        self.num.is_zero()
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement_{}({})", self.prime, self.num)
    }
}
