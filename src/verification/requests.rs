use serde::{Deserialize, Serialize};

use crate::core::types::{CurveId, TaskKind};

/// Ask a provider to persist a payload and commit to it under `seed`.
///
/// The validator fills the first block; the provider fills the optional
/// response fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRequest {
    /// Base64 payload
    pub encrypted_data: String,
    pub curve: String,
    pub g: String,
    pub h: String,
    pub seed: String,

    #[serde(default)]
    pub commitment_hash: Option<String>,
    #[serde(default)]
    pub commitment: Option<String>,
    #[serde(default)]
    pub randomness: Option<String>,
}

/// Prove possession of one chunk of a previously stored payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRequest {
    /// Storage key of the payload being challenged
    pub challenge_hash: String,
    pub challenge_index: usize,
    pub chunk_size: usize,
    pub curve: String,
    pub g: String,
    pub h: String,
    pub seed: String,

    #[serde(default)]
    pub commitment_hash: Option<String>,
    #[serde(default)]
    pub commitment_proof: Option<String>,
    #[serde(default)]
    pub commitment: Option<String>,
    /// Base64 chunk bytes
    #[serde(default)]
    pub data_chunk: Option<String>,
    #[serde(default)]
    pub randomness: Option<String>,
    /// Base64 of the JSON proof
    #[serde(default)]
    pub merkle_proof: Option<String>,
    #[serde(default)]
    pub merkle_root: Option<String>,
}

/// Return a stored payload, chained to a fresh seed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub data_hash: String,
    pub seed: String,

    /// Base64 payload
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub commitment_hash: Option<String>,
    #[serde(default)]
    pub commitment_proof: Option<String>,
}

/// Every request a validator sends, one variant per protocol action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskRequest {
    Store(StoreRequest),
    Retrieve(RetrieveRequest),
    Challenge(ChallengeRequest),
}

impl TaskRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskRequest::Store(_) => TaskKind::Store,
            TaskRequest::Retrieve(_) => TaskKind::Retrieve,
            TaskRequest::Challenge(_) => TaskKind::Challenge,
        }
    }

    /// Curve named by the request; retrieval carries none
    pub fn curve(&self) -> Option<&str> {
        match self {
            TaskRequest::Store(r) => Some(&r.curve),
            TaskRequest::Challenge(r) => Some(&r.curve),
            TaskRequest::Retrieve(_) => None,
        }
    }

    pub fn seed(&self) -> &str {
        match self {
            TaskRequest::Store(r) => &r.seed,
            TaskRequest::Retrieve(r) => &r.seed,
            TaskRequest::Challenge(r) => &r.seed,
        }
    }

    /// Bytes the provider has to handle, used for latency normalization
    pub fn payload_size(&self) -> u64 {
        match self {
            TaskRequest::Store(r) => base64_decoded_len(&r.encrypted_data),
            TaskRequest::Retrieve(r) => r.data.as_deref().map_or(0, base64_decoded_len),
            TaskRequest::Challenge(r) => r.chunk_size as u64,
        }
    }
}

/// Length of the decoded form without decoding
fn base64_decoded_len(encoded: &str) -> u64 {
    let trimmed = encoded.trim_end_matches('=');
    (trimmed.len() as u64 * 3) / 4
}

impl StoreRequest {
    pub fn new(encrypted_data: String, curve: CurveId, g: String, h: String, seed: String) -> Self {
        Self {
            encrypted_data,
            curve: curve.as_str().to_string(),
            g,
            h,
            seed,
            ..Self::default()
        }
    }
}

impl ChallengeRequest {
    pub fn new(
        challenge_hash: String,
        challenge_index: usize,
        chunk_size: usize,
        curve: CurveId,
        g: String,
        h: String,
        seed: String,
    ) -> Self {
        Self {
            challenge_hash,
            challenge_index,
            chunk_size,
            curve: curve.as_str().to_string(),
            g,
            h,
            seed,
            ..Self::default()
        }
    }
}

impl RetrieveRequest {
    pub fn new(data_hash: String, seed: String) -> Self {
        Self {
            data_hash,
            seed,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_wire_form() {
        let request = TaskRequest::Retrieve(RetrieveRequest::new("abc".into(), "seed".into()));
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""kind":"retrieve""#));
        let back: TaskRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
        assert_eq!(back.kind(), TaskKind::Retrieve);
    }

    #[test]
    fn test_missing_response_fields_default_to_none() {
        let json = r#"{"kind":"store","encrypted_data":"aGVsbG8=","curve":"secp256k1","g":"","h":"","seed":"s"}"#;
        match serde_json::from_str::<TaskRequest>(json).unwrap() {
            TaskRequest::Store(store) => {
                assert!(store.commitment_hash.is_none());
                assert!(store.randomness.is_none());
            }
            other => panic!("unexpected variant {:?}", other),
        }
    }

    #[test]
    fn test_payload_size() {
        let store = TaskRequest::Store(StoreRequest {
            encrypted_data: "aGVsbG8=".into(),
            ..StoreRequest::default()
        });
        assert_eq!(store.payload_size(), 5);
        assert_eq!(store.curve(), Some(""));
    }
}
