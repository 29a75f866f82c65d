//! Shared primitive types

/// Hash type: 256-bit hash, in internal (wire) byte order
pub type Hash = [u8; 32];

/// 20-byte RIPEMD160(SHA256(x)) digest
pub type Hash160 = [u8; 20];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Natural number type
pub type Natural = u64;

/// Stack element during script evaluation
pub type StackElement = ByteString;
