//! secp256k1 curve parameters, sighash types and script limits

/// Field prime P = 2^256 - 2^32 - 977
pub const SECP256K1_P_HEX: &str =
    "fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f";

/// Group order N
pub const SECP256K1_N_HEX: &str =
    "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";

/// Generator x coordinate
pub const SECP256K1_GX_HEX: &str =
    "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

/// Generator y coordinate
pub const SECP256K1_GY_HEX: &str =
    "483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

/// Curve coefficient a (y^2 = x^3 + a*x + b)
pub const SECP256K1_A: u32 = 0;

/// Curve coefficient b
pub const SECP256K1_B: u32 = 7;

/// Sign all inputs and outputs
pub const SIGHASH_ALL: u32 = 1;

/// Maximum size of a single pushed element
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Largest push encoded with a bare length byte
pub const MAX_DIRECT_PUSH: usize = 75;

/// Maximum combined size of the main and alt stacks during evaluation
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of public keys in OP_CHECKMULTISIG
pub const MAX_PUBKEYS_PER_MULTISIG: i64 = 20;

/// Maximum byte length of an arithmetic operand
pub const MAX_NUM_SIZE: usize = 4;

/// Sequence number for final transaction
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// Default evaluation: permissive multisig signature/key matching
pub const SCRIPT_VERIFY_NONE: u32 = 0;

/// Require OP_CHECKMULTISIG signatures in the same relative order as their keys
pub const SCRIPT_VERIFY_ORDERED_MULTISIG: u32 = 1 << 0;
