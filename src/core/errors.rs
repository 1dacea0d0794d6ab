use thiserror::Error;

/// Local, non-adversarial failures of the verifier itself.
///
/// Anything a storage provider can cause through its response is reported as a
/// [`Rejection`] instead; a `ProofError` means the validator cannot produce
/// trustworthy results and the current round should be aborted.
#[derive(Error, Debug)]
pub enum ProofError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported curve identifier: {0}")]
    UnsupportedCurve(String),

    #[error("Cryptographic backend misconfigured: {0}")]
    CryptoMisconfigured(String),

    #[error("Statistics store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Signing failed: {reason}")]
    Signing { reason: String },
}

impl ProofError {
    /// Whether the round driver may retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProofError::Store(StoreError::Unavailable { .. }))
    }
}

/// Failures of the external metadata store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Metadata store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Corrupt value for {key}.{field}: {value}")]
    Corrupt {
        key: String,
        field: String,
        value: String,
    },
}

/// Failure to decode a wire value supplied by a provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("invalid hex in {field}: {reason}")]
    Hex { field: &'static str, reason: String },

    #[error("invalid base64 in {field}: {reason}")]
    Base64 { field: &'static str, reason: String },

    #[error("{field} must be {expected} bytes, got {actual}")]
    Width {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field} is not a point on the curve")]
    NotOnCurve { field: &'static str },

    #[error("{field} is not SEC1 compressed (tag {tag:#04x})")]
    PointTag { field: &'static str, tag: u8 },

    #[error("{field} is the identity point")]
    Identity { field: &'static str },

    #[error("{field} is not a canonical scalar")]
    NonCanonicalScalar { field: &'static str },

    #[error("malformed merkle proof: {reason}")]
    MerkleProof { reason: String },
}

/// Why a provider response failed verification.
///
/// The `Display` output is the human-diagnostic reason returned to the round
/// driver alongside the boolean verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("malformed input: {0}")]
    Malformed(#[from] DecodeError),

    #[error("commitment hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("chained commitment does not match the issued seed")]
    ChainMismatch,

    #[error("pedersen commitment failed to open")]
    CommitmentNotOpened,

    #[error("merkle proof does not lead to the claimed root")]
    MerkleRootMismatch,

    #[error("response altered the issued {0}")]
    AlteredRequest(&'static str),

    #[error("seed was not issued or already used")]
    StaleSeed,
}

/// Helper type alias for Results
pub type ProofResult<T> = std::result::Result<T, ProofError>;

/// Result of metadata store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unavailable_is_retryable() {
        let err = ProofError::from(StoreError::Unavailable {
            reason: "connection refused".to_string(),
        });
        assert!(err.is_retryable());
        assert!(!ProofError::UnsupportedCurve("P-521".to_string()).is_retryable());
    }

    #[test]
    fn test_rejection_reason_strings() {
        let missing = Rejection::MissingField("commitment_proof");
        assert_eq!(missing.to_string(), "missing field: commitment_proof");

        let malformed = Rejection::from(DecodeError::NotOnCurve { field: "g" });
        assert_eq!(malformed.to_string(), "malformed input: g is not a point on the curve");
    }
}
