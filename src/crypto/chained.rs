//! Seed-chained commitments.
//!
//! Every response is bound to the validator seed of the current round:
//! `commitment = hex(SHA3-256(proof || seed))`, both sides as UTF-8 text.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::errors::Rejection;
use crate::core::utils::{compute_sha3_256_from_slices, hash_with_seed_hex};

pub fn expected_commitment(proof: &str, seed: &str) -> String {
    hex::encode(compute_sha3_256_from_slices(proof.as_bytes(), seed.as_bytes()))
}

/// Check `commitment == expected_commitment(proof, seed)`.
///
/// Absent inputs are reported as [`Rejection::MissingField`], distinct from a
/// mismatch.
pub fn check_chained(
    proof: Option<&str>,
    seed: Option<&str>,
    commitment: Option<&str>,
) -> Result<(), Rejection> {
    let proof = proof.ok_or(Rejection::MissingField("commitment_proof"))?;
    let seed = seed.ok_or(Rejection::MissingField("seed"))?;
    let commitment = commitment.ok_or(Rejection::MissingField("commitment_hash"))?;

    if expected_commitment(proof, seed) == commitment {
        Ok(())
    } else {
        Err(Rejection::ChainMismatch)
    }
}

pub fn verify_chained(proof: Option<&str>, seed: Option<&str>, commitment: Option<&str>) -> bool {
    match check_chained(proof, seed, commitment) {
        Ok(()) => true,
        Err(rejection @ Rejection::MissingField(_)) => {
            warn!("Chained commitment check: {}", rejection);
            false
        }
        Err(_) => false,
    }
}

/// A provider's answer for the next round of a data chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainedCommitment {
    pub commitment_hash: String,
    pub proof: String,
}

/// Roll a stored payload forward to a freshly issued seed.
///
/// `proof = H(data || prev_seed)` ties the answer to the data as committed in
/// the previous round; `commitment_hash = H(proof || new_seed)` binds it to the
/// new one.
pub fn compute_subsequent_commitment(
    data: &[u8],
    previous_seed: &str,
    new_seed: &str,
) -> ChainedCommitment {
    let proof = hash_with_seed_hex(data, previous_seed);
    let commitment_hash = expected_commitment(&proof, new_seed);
    ChainedCommitment {
        commitment_hash,
        proof,
    }
}
