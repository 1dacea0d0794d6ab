//! Seeds and query selection.
//!
//! Every outbound task carries a fresh seed; the validator remembers the ones
//! it issued and accepts each back exactly once.

use log::{debug, trace, warn};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::core::errors::{ProofError, ProofResult};
use crate::core::types::{Uid, SEED_SIZE_BYTES};
use crate::core::utils::compute_sha3_256;

const DEFAULT_SEED_TTL_SECS: u64 = 600;

/// Hex encoding of `SEED_SIZE_BYTES` fresh random bytes
pub fn generate_seed() -> String {
    let mut bytes = [0u8; SEED_SIZE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Seeds handed out and not yet redeemed, each with its issue time.
///
/// A seed expires `ttl` after issue; expired seeds are swept on every
/// `issue`, so requests that never come back do not pile up.
#[derive(Debug)]
pub struct SeedIssuer {
    ttl: Duration,
    outstanding: Mutex<HashMap<String, Instant>>,
}

impl Default for SeedIssuer {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(DEFAULT_SEED_TTL_SECS))
    }
}

impl SeedIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            outstanding: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self) -> String {
        let seed = generate_seed();
        let mut outstanding = self.outstanding.lock();
        let before = outstanding.len();
        outstanding.retain(|_, issued| issued.elapsed() <= self.ttl);
        if outstanding.len() < before {
            debug!("Expired {} unredeemed seeds", before - outstanding.len());
        }
        outstanding.insert(seed.clone(), Instant::now());
        trace!("Issued seed {}", &seed[..16]);
        seed
    }

    /// True the first time an issued, unexpired seed comes back, false ever after
    pub fn consume(&self, seed: &str) -> bool {
        let fresh = match self.outstanding.lock().remove(seed) {
            Some(issued) => issued.elapsed() <= self.ttl,
            None => false,
        };
        if !fresh {
            warn!("Expired, reused or unknown seed rejected");
        }
        fresh
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.lock().len()
    }
}

/// Deterministic sample of `k` distinct uids for the round at `block_hash`.
///
/// Every validator seeing the same block picks the same providers.
pub fn select_query_uids(block_hash: &[u8], uids: &[Uid], k: usize) -> ProofResult<Vec<Uid>> {
    if block_hash.is_empty() {
        return Err(ProofError::InvalidInput {
            reason: "block hash must not be empty".to_string(),
        });
    }

    let mut rng = ChaCha20Rng::from_seed(compute_sha3_256(block_hash));
    let selected: Vec<Uid> = uids.choose_multiple(&mut rng, k).cloned().collect();
    trace!("Selected {} of {} uids", selected.len(), uids.len());
    Ok(selected)
}
