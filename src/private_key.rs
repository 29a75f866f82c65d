//! Private keys and deterministic ECDSA signing
//!
//! The nonce is derived from the secret and the digest with HMAC-SHA256 in the
//! RFC 6979 construction, so signing is reproducible and never reuses `k`
//! across different messages.

use crate::error::{ConsensusError, Result};
use crate::network::Network;
use crate::s256::{to_be_bytes_32, S256Point, G, N};
use crate::signature::Signature;
use bitcoin_hashes::hmac::{Hmac, HmacEngine};
use bitcoin_hashes::{sha256, Hash, HashEngine};
use num_bigint::BigUint;
use num_traits::Zero;
use rand::{CryptoRng, RngCore};
use std::fmt;
use tracing::trace;

fn hmac_sha256(key: &[u8; 32], parts: &[&[u8]]) -> [u8; 32] {
    let mut engine = HmacEngine::<sha256::Hash>::new(key);
    for part in parts {
        engine.input(part);
    }
    Hmac::<sha256::Hash>::from_engine(engine).into_inner()
}

/// A secret scalar in [1, N-1] paired with its public point
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    secret: BigUint,
    point: S256Point,
}

impl PrivateKey {
    pub fn new(secret: BigUint) -> Result<Self> {
        if secret.is_zero() || secret >= *N {
            return Err(ConsensusError::OutOfRange(
                "private key must be in [1, N-1]".to_string(),
            ));
        }
        let point = G.secret_multiply(&secret)?;
        Ok(Self { secret, point })
    }

    /// Interpret 32 big-endian bytes as the secret.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(ConsensusError::OutOfRange(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        Self::new(BigUint::from_bytes_be(bytes))
    }

    /// Draw a fresh key from a cryptographic RNG.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        loop {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);
            let candidate = BigUint::from_bytes_be(&bytes);
            if !candidate.is_zero() && candidate < *N {
                return Self::new(candidate);
            }
        }
    }

    pub fn secret(&self) -> &BigUint {
        &self.secret
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        to_be_bytes_32(&self.secret)
    }

    pub fn point(&self) -> &S256Point {
        &self.point
    }

    /// Version byte, secret and optional compression flag, ready for Base58Check.
    pub fn wif_payload(&self, compressed: bool, network: Network) -> Vec<u8> {
        let mut payload = Vec::with_capacity(34);
        payload.push(network.wif_prefix());
        payload.extend_from_slice(&self.secret_bytes());
        if compressed {
            payload.push(0x01);
        }
        payload
    }

    /// Nonce for signing `z`, derived per RFC 6979 with HMAC-SHA256.
    pub fn deterministic_k(&self, z: &BigUint) -> BigUint {
        let n = &*N;
        let z = if z > n { z - n } else { z.clone() };
        let z_bytes = to_be_bytes_32(&z);
        let secret_bytes = self.secret_bytes();

        let mut k = [0u8; 32];
        let mut v = [1u8; 32];
        k = hmac_sha256(&k, &[&v[..], &[0x00], &secret_bytes[..], &z_bytes[..]]);
        v = hmac_sha256(&k, &[&v[..]]);
        k = hmac_sha256(&k, &[&v[..], &[0x01], &secret_bytes[..], &z_bytes[..]]);
        v = hmac_sha256(&k, &[&v[..]]);

        loop {
            v = hmac_sha256(&k, &[&v[..]]);
            let candidate = BigUint::from_bytes_be(&v);
            if !candidate.is_zero() && &candidate < n {
                return candidate;
            }
            trace!("nonce candidate out of range, reseeding");
            k = hmac_sha256(&k, &[&v[..], &[0x00]]);
            v = hmac_sha256(&k, &[&v[..]]);
        }
    }

    /// Sign digest `z`, returning a low-s signature.
    pub fn sign(&self, z: &BigUint) -> Result<Signature> {
        let n = &*N;
        let k = self.deterministic_k(z);
        let big_r = G.secret_multiply(&k)?;
        let r = big_r
            .x()
            .map(|x| x.num() % n)
            .ok_or_else(|| ConsensusError::OutOfRange("nonce point is the identity".to_string()))?;
        let k_inv = k.modpow(&(n - 2u32), n);
        let mut s = ((z + &r * &self.secret) * k_inv) % n;
        if s > n >> 1 {
            s = n - s;
        }
        Signature::new(r, s)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("secret", &"<redacted>")
            .field("point", &self.point)
            .finish()
    }
}
