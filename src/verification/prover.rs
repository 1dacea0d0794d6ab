//! Provider-side answers to validator requests.
//!
//! Validators use these to exercise their own verification path and to
//! build reference responses; a storage provider runs them for real.

use log::debug;

use crate::core::errors::{DecodeError, ProofError, ProofResult};
use crate::core::utils::{decode_base64_field, encode_base64, hash_with_seed_hex};
use crate::crypto::chained::compute_subsequent_commitment;
use crate::crypto::commitment::{commit, CurvePoint, CurveScalar};
use crate::crypto::merkle::MerkleTree;
use crate::verification::requests::{ChallengeRequest, RetrieveRequest, StoreRequest};

/// Per-chunk commitments over a payload, and the tree binding them
#[derive(Debug, Clone)]
pub struct CommittedChunks {
    pub randomness: Vec<CurveScalar>,
    pub chunks: Vec<Vec<u8>>,
    pub points: Vec<CurvePoint>,
    pub tree: MerkleTree,
}

/// Split `data` into `chunk_size` pieces; the last one may be shorter
pub fn chunk_data(data: &[u8], chunk_size: usize) -> ProofResult<Vec<Vec<u8>>> {
    if chunk_size == 0 {
        return Err(ProofError::InvalidInput {
            reason: "chunk size must be non-zero".to_string(),
        });
    }
    if data.is_empty() {
        return Err(ProofError::InvalidInput {
            reason: "cannot chunk an empty payload".to_string(),
        });
    }
    Ok(data.chunks(chunk_size).map(|c| c.to_vec()).collect())
}

/// Commit every chunk to `H(chunk || seed)` and build the merkle tree over
/// the compressed commitment points.
pub fn commit_data_with_seed(
    g: &CurvePoint,
    h: &CurvePoint,
    chunks: Vec<Vec<u8>>,
    seed: &str,
) -> ProofResult<CommittedChunks> {
    let mut randomness = Vec::with_capacity(chunks.len());
    let mut points = Vec::with_capacity(chunks.len());

    for chunk in &chunks {
        let r = CurveScalar::random();
        let m = CurveScalar::hash_with_seed(chunk, seed);
        points.push(commit(&m, &r, g, h));
        randomness.push(r);
    }

    let leaves: Vec<Vec<u8>> = points.iter().map(|p| p.to_bytes()).collect();
    let tree = MerkleTree::build(&leaves)?;

    Ok(CommittedChunks {
        randomness,
        chunks,
        points,
        tree,
    })
}

fn decoded_generators(g: &str, h: &str) -> Result<(CurvePoint, CurvePoint), DecodeError> {
    Ok((CurvePoint::from_hex("g", g)?, CurvePoint::from_hex("h", h)?))
}

/// Fill the response half of a store request
pub fn answer_store(mut request: StoreRequest) -> ProofResult<StoreRequest> {
    let data = decode_base64_field("encrypted_data", &request.encrypted_data).map_err(invalid)?;
    let (g, h) = decoded_generators(&request.g, &request.h).map_err(invalid)?;

    let r = CurveScalar::random();
    let m = CurveScalar::hash_with_seed(&data, &request.seed);

    request.commitment_hash = Some(hash_with_seed_hex(&data, &request.seed));
    request.commitment = Some(commit(&m, &r, &g, &h).to_hex());
    request.randomness = Some(r.to_hex());
    Ok(request)
}

/// Answer a challenge for the chunk at `challenge_index`.
///
/// `previous_seed` is the seed the payload was last committed under.
pub fn answer_challenge(
    mut request: ChallengeRequest,
    data: &[u8],
    previous_seed: &str,
) -> ProofResult<ChallengeRequest> {
    let (g, h) = decoded_generators(&request.g, &request.h).map_err(invalid)?;
    let chunks = chunk_data(data, request.chunk_size)?;
    if request.challenge_index >= chunks.len() {
        return Err(ProofError::InvalidInput {
            reason: format!(
                "challenge index {} out of range for {} chunks",
                request.challenge_index,
                chunks.len()
            ),
        });
    }

    let committed = commit_data_with_seed(&g, &h, chunks, &request.seed)?;
    let index = request.challenge_index;
    let proof = committed
        .tree
        .prove(index)
        .ok_or_else(|| ProofError::InvalidInput {
            reason: format!("no merkle proof for leaf {}", index),
        })?;

    let chained = compute_subsequent_commitment(data, previous_seed, &request.seed);
    debug!(
        "Answering challenge {} (chunk {}/{})",
        request.challenge_hash,
        index,
        committed.chunks.len()
    );

    request.commitment_hash = Some(chained.commitment_hash);
    request.commitment_proof = Some(chained.proof);
    request.commitment = Some(committed.points[index].to_hex());
    request.data_chunk = Some(encode_base64(&committed.chunks[index]));
    request.randomness = Some(committed.randomness[index].to_hex());
    request.merkle_proof = Some(encode_base64(proof.to_json()?.as_bytes()));
    request.merkle_root = Some(committed.tree.root_hex());
    Ok(request)
}

/// Return the payload chained to the new seed
pub fn answer_retrieve(
    mut request: RetrieveRequest,
    data: &[u8],
    previous_seed: &str,
) -> RetrieveRequest {
    let chained = compute_subsequent_commitment(data, previous_seed, &request.seed);
    request.data = Some(encode_base64(data));
    request.commitment_hash = Some(chained.commitment_hash);
    request.commitment_proof = Some(chained.proof);
    request
}

fn invalid(e: DecodeError) -> ProofError {
    ProofError::InvalidInput {
        reason: e.to_string(),
    }
}
