//! Store / Retrieve / Challenge verification.
//!
//! Provider-controlled input never produces an `Err`: it is rejected with a
//! [`Rejection`] reason, including a request naming a curve the verifier
//! does not run on. `Err` is reserved for a verifier that cannot be trusted.

use log::{debug, warn};
use rayon::prelude::*;
use std::fmt;

use crate::core::errors::{DecodeError, ProofResult, Rejection};
use crate::core::types::CurveId;
use crate::core::utils::{
    decode_base64_field, decode_hex_field, hash_with_seed_hex, PerformanceTimer,
};
use crate::crypto::chained::check_chained;
use crate::crypto::commitment::{open, CurvePoint, CurveScalar};
use crate::crypto::merkle::{self, MerkleProof};
use crate::verification::requests::{
    ChallengeRequest, RetrieveRequest, StoreRequest, TaskRequest,
};

/// Outcome of verifying one provider response
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Accepted,
    Rejected(Rejection),
}

impl Verification {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verification::Accepted)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Verification::Accepted => None,
            Verification::Rejected(r) => Some(r),
        }
    }

    /// `(accepted, reason)`
    pub fn verdict(&self) -> (bool, String) {
        (self.is_accepted(), self.to_string())
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verification::Accepted => f.write_str("verified"),
            Verification::Rejected(r) => write!(f, "{}", r),
        }
    }
}

impl From<Result<(), Rejection>> for Verification {
    fn from(result: Result<(), Rejection>) -> Self {
        match result {
            Ok(()) => Verification::Accepted,
            Err(r) => Verification::Rejected(r),
        }
    }
}

fn echoed_fields(issued: &TaskRequest, response: &TaskRequest) -> Result<(), Rejection> {
    if issued.kind() != response.kind() {
        return Err(Rejection::AlteredRequest("task kind"));
    }
    if issued.seed() != response.seed() {
        return Err(Rejection::AlteredRequest("seed"));
    }
    if issued.curve() != response.curve() {
        return Err(Rejection::AlteredRequest("curve"));
    }
    match (issued, response) {
        (TaskRequest::Store(a), TaskRequest::Store(b)) if a.g != b.g || a.h != b.h => {
            Err(Rejection::AlteredRequest("curve parameters"))
        }
        (TaskRequest::Challenge(a), TaskRequest::Challenge(b))
            if a.g != b.g || a.h != b.h || a.challenge_index != b.challenge_index =>
        {
            Err(Rejection::AlteredRequest("challenge parameters"))
        }
        (TaskRequest::Retrieve(a), TaskRequest::Retrieve(b)) if a.data_hash != b.data_hash => {
            Err(Rejection::AlteredRequest("data hash"))
        }
        _ => Ok(()),
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, Rejection> {
    value.as_deref().ok_or(Rejection::MissingField(field))
}

/// Stateless verifier bound to one curve
#[derive(Debug, Clone)]
pub struct Verifier {
    curve: CurveId,
    verbose: bool,
}

impl Verifier {
    pub fn new(curve: CurveId) -> Self {
        Self {
            curve,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn curve(&self) -> CurveId {
        self.curve
    }

    /// The curve a request names is provider input like any other field
    fn check_curve(&self, requested: &str) -> Result<(), Rejection> {
        match requested.parse::<CurveId>() {
            Ok(curve) if curve == self.curve => Ok(()),
            _ => {
                if self.verbose {
                    debug!("request curve {:?}, verifier runs on {}", requested, self.curve);
                }
                Err(Rejection::AlteredRequest("curve"))
            }
        }
    }

    pub fn verify(&self, request: &TaskRequest) -> ProofResult<Verification> {
        let verification = match request {
            TaskRequest::Store(r) => self.verify_store(r)?,
            TaskRequest::Retrieve(r) => self.verify_retrieve(r),
            TaskRequest::Challenge(r) => self.verify_challenge(r)?,
        };

        if let Verification::Rejected(reason) = &verification {
            warn!("{} verification failed: {}", request.kind(), reason);
        }
        Ok(verification)
    }

    /// Verify a provider's answer to `issued`.
    ///
    /// The validator-chosen fields must come back untouched before the
    /// proof itself is looked at.
    pub fn verify_response(
        &self,
        issued: &TaskRequest,
        response: &TaskRequest,
    ) -> ProofResult<Verification> {
        if let Err(altered) = echoed_fields(issued, response) {
            warn!("{} verification failed: {}", issued.kind(), altered);
            return Ok(Verification::Rejected(altered));
        }
        self.verify(response)
    }

    /// Verify many responses on the rayon pool, preserving order
    pub fn verify_batch(&self, requests: &[TaskRequest]) -> ProofResult<Vec<Verification>> {
        let timer = PerformanceTimer::new("verify_batch");
        let results = requests
            .par_iter()
            .map(|request| self.verify(request))
            .collect::<ProofResult<Vec<_>>>()?;
        let accepted = results.iter().filter(|v| v.is_accepted()).count();
        let elapsed = timer.finish();
        debug!(
            "Batch verified {}/{} responses in {}ms",
            accepted,
            results.len(),
            elapsed
        );
        Ok(results)
    }

    pub fn verify_store(&self, request: &StoreRequest) -> ProofResult<Verification> {
        Ok(self.store_checks(request).into())
    }

    fn store_checks(&self, request: &StoreRequest) -> Result<(), Rejection> {
        self.check_curve(&request.curve)?;
        let data = decode_base64_field("encrypted_data", &request.encrypted_data)?;

        let claimed = required(&request.commitment_hash, "commitment_hash")?;
        let reconstructed = hash_with_seed_hex(&data, &request.seed);
        if reconstructed != claimed {
            if self.verbose {
                debug!("commitment hash   : {}", claimed);
                debug!("reconstructed hash: {}", reconstructed);
            }
            return Err(Rejection::HashMismatch {
                expected: reconstructed,
                actual: claimed.to_string(),
            });
        }

        let commitment = CurvePoint::from_hex("commitment", required(&request.commitment, "commitment")?)?;
        let randomness = CurveScalar::from_hex("randomness", required(&request.randomness, "randomness")?)?;
        let g = CurvePoint::from_hex("g", &request.g)?;
        let h = CurvePoint::from_hex("h", &request.h)?;

        let message = CurveScalar::hash_with_seed(&data, &request.seed);
        if !open(&commitment, &message, &randomness, &g, &h) {
            return Err(Rejection::CommitmentNotOpened);
        }
        Ok(())
    }

    /// Weaker than the other two: only the seed chain is checked
    pub fn verify_retrieve(&self, request: &RetrieveRequest) -> Verification {
        check_chained(
            request.commitment_proof.as_deref(),
            Some(&request.seed),
            request.commitment_hash.as_deref(),
        )
        .into()
    }

    pub fn verify_challenge(&self, request: &ChallengeRequest) -> ProofResult<Verification> {
        Ok(self.challenge_checks(request).into())
    }

    fn challenge_checks(&self, request: &ChallengeRequest) -> Result<(), Rejection> {
        self.check_curve(&request.curve)?;
        let commitment_hash = required(&request.commitment_hash, "commitment_hash")?;
        let commitment_proof = required(&request.commitment_proof, "commitment_proof")?;

        check_chained(
            Some(commitment_proof),
            Some(&request.seed),
            Some(commitment_hash),
        )?;

        let commitment = CurvePoint::from_hex("commitment", required(&request.commitment, "commitment")?)?;
        let randomness = CurveScalar::from_hex("randomness", required(&request.randomness, "randomness")?)?;
        let chunk = decode_base64_field("data_chunk", required(&request.data_chunk, "data_chunk")?)?;
        let g = CurvePoint::from_hex("g", &request.g)?;
        let h = CurvePoint::from_hex("h", &request.h)?;

        let message = CurveScalar::hash_with_seed(&chunk, &request.seed);
        if !open(&commitment, &message, &randomness, &g, &h) {
            if self.verbose {
                debug!("commitment: {}", commitment.to_hex());
                debug!("seed      : {}", request.seed);
            }
            return Err(Rejection::CommitmentNotOpened);
        }

        let proof_json = decode_base64_field("merkle_proof", required(&request.merkle_proof, "merkle_proof")?)?;
        let proof = std::str::from_utf8(&proof_json)
            .map_err(|e| DecodeError::MerkleProof {
                reason: e.to_string(),
            })
            .and_then(MerkleProof::from_json)?;
        let root = decode_hex_field("merkle_root", required(&request.merkle_root, "merkle_root")?)?;

        if !merkle::validate(&commitment.to_bytes(), &proof, &root) {
            if self.verbose {
                debug!("merkle root : {}", hex::encode(&root));
                debug!("merkle steps: {}", proof.len());
            }
            return Err(Rejection::MerkleRootMismatch);
        }
        Ok(())
    }
}
