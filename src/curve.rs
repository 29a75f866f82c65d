//! Elliptic-curve group law over a generic coordinate field
//!
//! Curve: y^2 = x^3 + a*x + b. A point is either the identity (point at
//! infinity) or an affine pair that satisfies the curve equation.

use crate::error::{ConsensusError, Result};
use crate::field::Field;
use num_bigint::BigUint;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurvePoint<F> {
    coordinates: Option<(F, F)>,
    a: F,
    b: F,
}

impl<F: Field> CurvePoint<F> {
    /// Construct an affine point, failing if it does not satisfy the curve equation.
    pub fn new(x: F, y: F, a: F, b: F) -> Result<Self> {
        let lhs = y.try_mul(&y)?;
        let rhs = x
            .try_mul(&x)?
            .try_mul(&x)?
            .try_add(&a.try_mul(&x)?)?
            .try_add(&b)?;
        if lhs != rhs {
            return Err(ConsensusError::PointNotOnCurve {
                x: format!("{:?}", x),
                y: format!("{:?}", y),
            });
        }
        Ok(Self {
            coordinates: Some((x, y)),
            a,
            b,
        })
    }

    /// The identity element of the curve with coefficients `a`, `b`.
    pub fn infinity(a: F, b: F) -> Self {
        Self {
            coordinates: None,
            a,
            b,
        }
    }

    /// Coordinates already known to be on the curve (results of the group law).
    fn from_affine(x: F, y: F, a: &F, b: &F) -> Self {
        Self {
            coordinates: Some((x, y)),
            a: a.clone(),
            b: b.clone(),
        }
    }

    pub fn is_infinity(&self) -> bool {
        self.coordinates.is_none()
    }

    pub fn x(&self) -> Option<&F> {
        self.coordinates.as_ref().map(|(x, _)| x)
    }

    pub fn y(&self) -> Option<&F> {
        self.coordinates.as_ref().map(|(_, y)| y)
    }

    pub fn a(&self) -> &F {
        &self.a
    }

    pub fn b(&self) -> &F {
        &self.b
    }

    fn identity(&self) -> Self {
        Self::infinity(self.a.clone(), self.b.clone())
    }

    /// Group addition.
    pub fn try_add(&self, other: &Self) -> Result<Self> {
        if self.a != other.a || self.b != other.b {
            return Err(ConsensusError::CurveMismatch);
        }

        let ((x1, y1), (x2, y2)) = match (&self.coordinates, &other.coordinates) {
            (None, _) => return Ok(other.clone()),
            (_, None) => return Ok(self.clone()),
            (Some(p), Some(q)) => (p, q),
        };

        // Vertical line through P and -P
        if x1 == x2 && y1 != y2 {
            return Ok(self.identity());
        }

        // Tangent at a point with y = 0 is vertical
        if self == other && y1.is_zero() {
            return Ok(self.identity());
        }

        let slope = if x1 != x2 {
            // s = (y2 - y1) / (x2 - x1)
            y2.try_sub(y1)?.try_div(&x2.try_sub(x1)?)?
        } else {
            // s = (3*x1^2 + a) / (2*y1)
            x1.try_mul(x1)?
                .scale(3)
                .try_add(&self.a)?
                .try_div(&y1.scale(2))?
        };

        let x3 = slope.try_mul(&slope)?.try_sub(x1)?.try_sub(x2)?;
        let y3 = slope.try_mul(&x1.try_sub(&x3)?)?.try_sub(y1)?;
        Ok(Self::from_affine(x3, y3, &self.a, &self.b))
    }

    /// k * self by binary expansion, least significant bit first.
    ///
    /// The number of group operations depends on the bit pattern of `k`; use
    /// [`CurvePoint::ladder_multiply`] for secret scalars.
    pub fn scalar_multiply(&self, k: &BigUint) -> Result<Self> {
        let mut current = self.clone();
        let mut result = self.identity();
        for bit in 0..k.bits() {
            if k.bit(bit) {
                result = result.try_add(&current)?;
            }
            current = current.try_add(&current)?;
        }
        Ok(result)
    }

    /// k * self with a Montgomery ladder over exactly `bit_len` bits.
    ///
    /// Every iteration performs one addition and one doubling regardless of
    /// the scalar's bits. The big-integer arithmetic underneath is not
    /// constant-time, so this only equalizes the operation sequence.
    pub fn ladder_multiply(&self, k: &BigUint, bit_len: u64) -> Result<Self> {
        let mut r0 = self.identity();
        let mut r1 = self.clone();
        for bit in (0..bit_len).rev() {
            if k.bit(bit) {
                r0 = r0.try_add(&r1)?;
                r1 = r1.try_add(&r1)?;
            } else {
                r1 = r0.try_add(&r1)?;
                r0 = r0.try_add(&r0)?;
            }
        }
        Ok(r0)
    }
}

impl<F: Field + fmt::Display> fmt::Display for CurvePoint<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.coordinates {
            None => write!(f, "Point(infinity)"),
            Some((x, y)) => write!(f, "Point({}, {})_{}_{}", x, y, self.a, self.b),
        }
    }
}
