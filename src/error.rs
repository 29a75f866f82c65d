//! Error types for field, curve, codec and transaction operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("Field mismatch: cannot combine elements of F_{left} and F_{right}")]
    FieldMismatch { left: String, right: String },

    #[error("Curve mismatch: points are not on the same curve")]
    CurveMismatch,

    #[error("Division by zero in field arithmetic")]
    DivisionByZero,

    #[error("Point not on curve: ({x}, {y})")]
    PointNotOnCurve { x: String, y: String },

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] std::io::Error),

    #[error("Input index {0} out of range")]
    InputIndex(usize),

    #[error("Previous transaction lookup failed: {0}")]
    Lookup(String),

    #[error("Transaction id mismatch: expected {expected}, got {actual}")]
    TxIdMismatch { expected: String, actual: String },
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
