//! Per-round aggregation: statistics, tier factors, base rewards, scaling.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::bonding::statistics::StatisticsBook;
use crate::bonding::tiers::tier_factor;
use crate::core::errors::{ProofError, ProofResult};
use crate::core::types::{ProviderId, TaskKind, Uid, TOP_FASTEST_BONUS_SLOTS};
use crate::rewards::scaling::{scale_rewards, TimedResponse};
use crate::rewards::state::RewardState;

/// One provider's part in a round, after verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundEntry {
    pub uid: Uid,
    pub provider_id: ProviderId,
    pub verified: bool,
    /// Seconds; `None` when the provider never answered
    pub response_time: Option<f64>,
    pub data_size: u64,
}

impl RoundEntry {
    pub fn responded(&self) -> bool {
        self.response_time.is_some()
    }

    fn timed(&self) -> TimedResponse {
        TimedResponse {
            uid: self.uid,
            response_time: self.response_time,
            data_size: self.data_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub task: TaskKind,
    pub uids: Vec<Uid>,
    pub base_rewards: Vec<f64>,
    pub scaled_rewards: Vec<f64>,
    pub responded: usize,
    pub verified: usize,
}

impl RoundOutcome {
    pub fn total_reward(&self) -> f64 {
        self.scaled_rewards.iter().sum()
    }
}

/// Uids of the fastest responders that beat the timeout.
///
/// Non-responders sort as the timeout itself, so they never qualify.
pub fn top_fastest(entries: &[RoundEntry], timeout_secs: f64) -> HashSet<Uid> {
    let mut times: Vec<(Uid, f64)> = entries
        .iter()
        .map(|e| (e.uid, e.response_time.unwrap_or(timeout_secs)))
        .collect();
    times.sort_by(|a, b| a.1.total_cmp(&b.1));

    times
        .into_iter()
        .take(TOP_FASTEST_BONUS_SLOTS)
        .filter(|(_, t)| *t < timeout_secs)
        .map(|(uid, _)| uid)
        .collect()
}

pub fn base_reward(task: TaskKind, verified: bool, tier_factor: f64) -> f64 {
    if verified {
        tier_factor
    } else {
        task.failure_reward() * tier_factor
    }
}

/// Record every outcome, then price the round.
///
/// Statistics are updated for every queried provider (a silent provider
/// counts as a failed attempt) before its tier factor is read.
pub fn score_round(
    book: &StatisticsBook,
    task: TaskKind,
    entries: &[RoundEntry],
    timeout_secs: f64,
) -> ProofResult<RoundOutcome> {
    let fastest = top_fastest(entries, timeout_secs);
    trace!("Fastest responders: {:?}", fastest);

    let mut base_rewards = Vec::with_capacity(entries.len());
    for entry in entries {
        book.record_outcome(&entry.provider_id, task, entry.verified)?;
        let factor = tier_factor(book, &entry.provider_id, fastest.contains(&entry.uid))?;
        base_rewards.push(base_reward(task, entry.verified, factor));
    }

    let scaled_rewards = scale_and_check(entries, &base_rewards)?;
    let outcome = RoundOutcome {
        task,
        uids: entries.iter().map(|e| e.uid).collect(),
        base_rewards,
        scaled_rewards,
        responded: entries.iter().filter(|e| e.responded()).count(),
        verified: entries.iter().filter(|e| e.verified).count(),
    };
    debug!(
        "{} round priced: {}/{} responded, {} verified",
        task,
        outcome.responded,
        entries.len(),
        outcome.verified
    );
    Ok(outcome)
}

fn scale_and_check(entries: &[RoundEntry], base_rewards: &[f64]) -> ProofResult<Vec<f64>> {
    if entries.len() != base_rewards.len() {
        return Err(ProofError::InvalidInput {
            reason: format!(
                "{} round entries but {} base rewards",
                entries.len(),
                base_rewards.len()
            ),
        });
    }
    let timed: Vec<TimedResponse> = entries.iter().map(RoundEntry::timed).collect();
    Ok(scale_rewards(&timed, base_rewards))
}

/// Scale caller-supplied base rewards and fold them into `state`.
///
/// A round nobody answered leaves the moving average untouched.
pub fn scale_and_apply_rewards(
    state: &mut RewardState,
    entries: &[RoundEntry],
    base_rewards: &[f64],
) -> ProofResult<Vec<f64>> {
    let scaled = scale_and_check(entries, base_rewards)?;
    if entries.iter().any(RoundEntry::responded) {
        let uids: Vec<Uid> = entries.iter().map(|e| e.uid).collect();
        state.apply(&uids, &scaled)?;
    } else {
        debug!("No responders; moving average left as is");
    }
    Ok(state.scores().to_vec())
}

/// Fold an already priced round into `state`
pub fn apply_outcome(state: &mut RewardState, outcome: &RoundOutcome) -> ProofResult<()> {
    if outcome.responded == 0 {
        debug!("No responders; moving average left as is");
        return Ok(());
    }
    state.apply(&outcome.uids, &outcome.scaled_rewards)?;
    Ok(())
}
