//! # Script-Proof
//!
//! Bitcoin's signature-verification pipeline built up from its arithmetic:
//! prime fields, elliptic-curve groups, secp256k1 ECDSA, the script stack
//! machine, and the transaction signature hash that ties them together.
//!
//! ## Architecture
//!
//! Modules are layered, each depending only on the ones above it:
//! - `field` / `curve`: generic finite-field and Weierstrass group law
//! - `s256`: the secp256k1 instantiation, SEC encoding and ECDSA verification
//! - `signature` / `private_key`: DER codec, deterministic nonces, signing
//! - `opcodes` / `script`: the stack machine
//! - `tx` / `lookup`: transactions and the previous-output collaborator
//!
//! ## Design Principles
//!
//! 1. **Fail closed**: script and signature problems evaluate to `false`;
//!    `Err` is reserved for malformed input and lookup failures
//! 2. **Deterministic signing**: nonces derive from key and digest
//! 3. **Exact Version Pinning**: consensus-critical dependencies pinned to exact versions
//!
//! ## Usage
//!
//! ```rust
//! use num_bigint::BigUint;
//! use script_proof::private_key::PrivateKey;
//!
//! let key = PrivateKey::new(BigUint::from(12345u32)).unwrap();
//! let z = BigUint::from(0xdeadbeefu32);
//! let signature = key.sign(&z).unwrap();
//! assert!(key.point().verify(&z, &signature));
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod network;
pub mod hash;
pub mod serialization;
pub mod field;
pub mod curve;
pub mod s256;
pub mod signature;
pub mod private_key;
pub mod opcodes;
pub mod script;
pub mod tx;
pub mod lookup;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{ConsensusError, Result};
pub use lookup::{MemoryTxSource, TxFetcher, TxSource};
pub use network::Network;
pub use private_key::PrivateKey;
pub use s256::S256Point;
pub use script::{Command, Script};
pub use signature::Signature;
pub use tx::{Tx, TxIn, TxOut};

use num_bigint::BigUint;

/// Verification entry point carrying the script flags
///
/// # Examples
///
/// ```
/// use num_bigint::BigUint;
/// use script_proof::ScriptProof;
/// use script_proof::opcodes::Opcode;
/// use script_proof::script::{Command, Script};
///
/// let proof = ScriptProof::new();
///
/// // OP_2 | OP_2 OP_EQUAL
/// let unlocking = Script::new(vec![Command::Op(Opcode::Op2)]);
/// let locking = Script::new(vec![Command::Op(Opcode::Op2), Command::Op(Opcode::OpEqual)]);
///
/// assert!(proof.evaluate_script(&unlocking, &locking, &BigUint::from(0u32)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptProof {
    flags: u32,
}

impl ScriptProof {
    /// Permissive multisig matching
    ///
    /// # Examples
    ///
    /// ```
    /// use script_proof::{ScriptProof, SCRIPT_VERIFY_NONE};
    ///
    /// assert_eq!(ScriptProof::new().flags(), SCRIPT_VERIFY_NONE);
    /// ```
    pub fn new() -> Self {
        Self::with_flags(SCRIPT_VERIFY_NONE)
    }

    /// Evaluate with a bit set of `SCRIPT_VERIFY_*` flags
    pub fn with_flags(flags: u32) -> Self {
        Self { flags }
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Evaluate `unlocking ++ locking` against digest `z`
    pub fn evaluate_script(&self, unlocking: &Script, locking: &Script, z: &BigUint) -> bool {
        (unlocking.clone() + locking.clone()).evaluate(z, self.flags)
    }

    /// Check a DER signature (without sighash byte) against a SEC public key
    ///
    /// # Examples
    ///
    /// ```
    /// use num_bigint::BigUint;
    /// use script_proof::{PrivateKey, ScriptProof};
    ///
    /// let key = PrivateKey::new(BigUint::from(5001u32)).unwrap();
    /// let z = BigUint::from(42u32);
    /// let der = key.sign(&z).unwrap().der();
    ///
    /// let proof = ScriptProof::new();
    /// assert!(proof.verify_signature(&key.point().sec(true), &der, &z).unwrap());
    /// assert!(!proof.verify_signature(&key.point().sec(true), &der, &BigUint::from(43u32)).unwrap());
    /// ```
    pub fn verify_signature(&self, sec: &[u8], der: &[u8], z: &BigUint) -> Result<bool> {
        let point = S256Point::parse(sec)?;
        let signature = Signature::parse(der)?;
        Ok(point.verify(z, &signature))
    }

    /// Verify one input of `tx`
    pub fn verify_input<S: TxSource>(&self, tx: &Tx, index: usize, fetcher: &TxFetcher<S>) -> Result<bool> {
        tx.verify_input_with_flags(index, fetcher, self.flags)
    }

    /// Verify fee non-negativity and every input of `tx`
    pub fn verify_transaction<S: TxSource>(&self, tx: &Tx, fetcher: &TxFetcher<S>) -> Result<bool> {
        tx.verify_with_flags(fetcher, self.flags)
    }
}

impl Default for ScriptProof {
    fn default() -> Self {
        Self::new()
    }
}
