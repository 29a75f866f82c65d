//! ECDSA signature value and its DER codec

use crate::error::{ConsensusError, Result};
use crate::s256::N;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ECDSA signature: 0 < r < N and 0 < s < N
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    r: BigUint,
    s: BigUint,
}

fn check_component(name: &str, value: &BigUint) -> Result<()> {
    if value.is_zero() || value >= &*N {
        return Err(ConsensusError::OutOfRange(format!(
            "signature component {} = {:x} outside (0, N)",
            name, value
        )));
    }
    Ok(())
}

/// Minimal big-endian DER INTEGER body: leading zeros stripped, then one
/// 0x00 re-added when the high bit is set.
fn der_integer(value: &BigUint) -> Vec<u8> {
    let mut bytes = value.to_bytes_be();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes.drain(..first_nonzero);
    if bytes.first().map_or(true, |b| b & 0x80 != 0) {
        bytes.insert(0, 0x00);
    }
    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.push(0x02);
    out.push(bytes.len() as u8);
    out.extend_from_slice(&bytes);
    out
}

fn malformed(reason: &str) -> ConsensusError {
    ConsensusError::MalformedSignature(reason.to_string())
}

/// Reads `0x02 len bytes` at `offset`, returning the integer and the offset past it.
fn read_der_integer(der: &[u8], offset: usize) -> Result<(BigUint, usize)> {
    if der.get(offset) != Some(&0x02) {
        return Err(malformed("expected INTEGER marker 0x02"));
    }
    let len = *der
        .get(offset + 1)
        .ok_or_else(|| malformed("missing INTEGER length"))? as usize;
    if len == 0 || len & 0x80 != 0 {
        return Err(malformed("invalid INTEGER length"));
    }
    let start = offset + 2;
    let end = start + len;
    let body = der
        .get(start..end)
        .ok_or_else(|| malformed("INTEGER runs past end of signature"))?;
    Ok((BigUint::from_bytes_be(body), end))
}

impl Signature {
    pub fn new(r: BigUint, s: BigUint) -> Result<Self> {
        check_component("r", &r)?;
        check_component("s", &s)?;
        Ok(Self { r, s })
    }

    pub fn r(&self) -> &BigUint {
        &self.r
    }

    pub fn s(&self) -> &BigUint {
        &self.s
    }

    /// DER encoding: `0x30 len 0x02 rlen r 0x02 slen s`.
    pub fn der(&self) -> Vec<u8> {
        let mut body = der_integer(&self.r);
        body.extend(der_integer(&self.s));
        let mut out = Vec::with_capacity(body.len() + 2);
        out.push(0x30);
        out.push(body.len() as u8);
        out.extend(body);
        out
    }

    /// Strict DER decoding; the declared lengths must account for every byte.
    pub fn parse(der: &[u8]) -> Result<Self> {
        if der.first() != Some(&0x30) {
            return Err(malformed("expected SEQUENCE marker 0x30"));
        }
        let total = *der.get(1).ok_or_else(|| malformed("missing length"))? as usize;
        if total + 2 != der.len() {
            return Err(malformed("declared length does not match signature length"));
        }
        let (r, after_r) = read_der_integer(der, 2)?;
        let (s, after_s) = read_der_integer(der, after_r)?;
        if after_s != der.len() {
            return Err(malformed("trailing bytes after s"));
        }
        Self::new(r, s).map_err(|e| ConsensusError::MalformedSignature(e.to_string()))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:x}, {:x})", self.r, self.s)
    }
}
