//! Durable moving-average reward scores, indexed by uid.

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::errors::{ProofError, ProofResult};
use crate::core::types::{Uid, MOVING_AVERAGE_ALPHA};

/// Opaque sink for the normalized weight vector (on-chain submission)
#[async_trait]
pub trait WeightSubmitter: Send + Sync {
    async fn submit_weights(&self, uids: &[Uid], weights: &[f64]) -> ProofResult<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardState {
    alpha: f64,
    scores: Vec<f64>,
}

impl Default for RewardState {
    fn default() -> Self {
        Self::new(MOVING_AVERAGE_ALPHA)
    }
}

impl RewardState {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            scores: Vec::new(),
        }
    }

    pub fn with_capacity(alpha: f64, uids: usize) -> Self {
        Self {
            alpha,
            scores: vec![0.0; uids],
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Score of `uid`; never-seen uids score 0
    pub fn score(&self, uid: Uid) -> f64 {
        self.scores.get(uid as usize).copied().unwrap_or(0.0)
    }

    fn ensure_uid(&mut self, uid: Uid) {
        let needed = uid as usize + 1;
        if self.scores.len() < needed {
            self.scores.resize(needed, 0.0);
        }
    }

    /// Fold one round's scaled rewards into the average.
    ///
    /// Only the listed uids move; everyone else keeps their score.
    pub fn apply(&mut self, uids: &[Uid], rewards: &[f64]) -> ProofResult<&[f64]> {
        if uids.len() != rewards.len() {
            return Err(ProofError::InvalidInput {
                reason: format!(
                    "{} uids but {} rewards in round update",
                    uids.len(),
                    rewards.len()
                ),
            });
        }

        for (&uid, &reward) in uids.iter().zip(rewards) {
            self.ensure_uid(uid);
            let slot = &mut self.scores[uid as usize];
            *slot = self.alpha * reward + (1.0 - self.alpha) * *slot;
        }
        debug!("Moving average updated for {} uids", uids.len());
        Ok(&self.scores)
    }

    /// L1-normalized non-negative scores; all zero when nothing is positive
    pub fn normalized_weights(&self) -> Vec<f64> {
        let clipped: Vec<f64> = self.scores.iter().map(|s| s.max(0.0)).collect();
        let total: f64 = clipped.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return vec![0.0; clipped.len()];
        }
        clipped.into_iter().map(|s| s / total).collect()
    }

    pub async fn submit<W: WeightSubmitter + ?Sized>(&self, submitter: &W) -> ProofResult<()> {
        let uids: Vec<Uid> = (0..self.scores.len()).map(|u| u as Uid).collect();
        let weights = self.normalized_weights();
        info!("⚖️ Submitting weights for {} uids", uids.len());
        submitter.submit_weights(&uids, &weights).await
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ProofResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        debug!("Reward state saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> ProofResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let state: RewardState = serde_json::from_str(&contents)?;
        if !(state.alpha > 0.0 && state.alpha <= 1.0) {
            return Err(ProofError::Config {
                reason: format!("stored moving average alpha {} out of range", state.alpha),
            });
        }
        Ok(state)
    }
}
