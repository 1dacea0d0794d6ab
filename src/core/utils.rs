use base64::Engine as _;
use hmac::{Hmac, Mac, NewMac};
use log::debug;
use sha2::Sha256;
use sha3::{Digest, Sha3_256};

use crate::core::errors::{DecodeError, ProofError, ProofResult};
use crate::core::types::HASH_SIZE;

/// Compute SHA3-256 hash of data
pub fn compute_sha3_256(data: &[u8]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA3-256 from two byte slices (merkle nodes and seed chaining)
pub fn compute_sha3_256_from_slices(left: &[u8], right: &[u8]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha3_256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Hex form of `SHA3-256(data || seed)`, the textual commitment hash on the wire
pub fn hash_with_seed_hex(data: &[u8], seed: &str) -> String {
    hex::encode(compute_sha3_256_from_slices(data, seed.as_bytes()))
}

/// Decode a hex field supplied by a provider
pub fn decode_hex_field(field: &'static str, value: &str) -> Result<Vec<u8>, DecodeError> {
    hex::decode(value.trim()).map_err(|e| DecodeError::Hex {
        field,
        reason: e.to_string(),
    })
}

/// Decode a hex field that must have an exact width
pub fn decode_hex_fixed<const N: usize>(
    field: &'static str,
    value: &str,
) -> Result<[u8; N], DecodeError> {
    let bytes = decode_hex_field(field, value)?;
    if bytes.len() != N {
        return Err(DecodeError::Width {
            field,
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Decode a standard base64 payload
pub fn decode_base64_field(field: &'static str, value: &str) -> Result<Vec<u8>, DecodeError> {
    base64::engine::general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|e| DecodeError::Base64 {
            field,
            reason: e.to_string(),
        })
}

pub fn encode_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// HMAC-SHA256 key derivation
pub fn derive_key(master_key: &[u8], context: &[u8], info: &str) -> ProofResult<[u8; 32]> {
    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_varkey(master_key)
        .map_err(|e| ProofError::CryptoMisconfigured(format!("HMAC key rejected: {}", e)))?;
    mac.update(context);
    mac.update(info.as_bytes());

    let result = mac.finalize().into_bytes();
    let mut derived_key = [0u8; 32];
    derived_key.copy_from_slice(&result);
    Ok(derived_key)
}

/// Safe division for rate calculations
pub fn safe_division(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Performance timing utilities
pub struct PerformanceTimer {
    start_time: std::time::Instant,
    operation_name: String,
}

impl PerformanceTimer {
    pub fn new(operation_name: &str) -> Self {
        Self {
            start_time: std::time::Instant::now(),
            operation_name: operation_name.to_string(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    pub fn finish(self) -> u64 {
        let elapsed = self.elapsed_ms();
        debug!("{} took {}ms", self.operation_name, elapsed);
        elapsed
    }
}
