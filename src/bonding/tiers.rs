//! Tier classification.
//!
//! A provider sits in the highest tier whose success count and Wilson lower
//! bound it both meets. Everything here is a pure function of the stored
//! statistics, so recomputation is idempotent and order independent.

use log::{info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::bonding::statistics::{ProviderStatistics, StatisticsBook};
use crate::core::errors::ProofResult;
use crate::core::types::{Tier, TIER_TABLE, WILSON_Z};

/// Lower bound of the Wilson score interval at `WILSON_Z`.
///
/// No attempts means no evidence, which scores 0.
pub fn wilson_score(successes: u64, attempts: u64) -> f64 {
    if attempts == 0 {
        return 0.0;
    }
    let n = attempts as f64;
    let p = (successes.min(attempts)) as f64 / n;
    let z2 = WILSON_Z * WILSON_Z;

    let denominator = 1.0 + z2 / n;
    let centre = p + z2 / (2.0 * n);
    let spread = WILSON_Z * ((p * (1.0 - p) + z2 / (4.0 * n)) / n).sqrt();

    ((centre - spread) / denominator).max(0.0)
}

/// Highest tier whose thresholds are both met
pub fn classify_tier(total_successes: u64, wilson: f64) -> Tier {
    TIER_TABLE
        .iter()
        .rev()
        .find(|p| total_successes >= p.min_successes && wilson >= p.min_wilson_score)
        .map_or(Tier::Bronze, |p| p.tier)
}

pub fn tier_for_statistics(stats: &ProviderStatistics) -> Tier {
    let wilson = wilson_score(stats.task_successes(), stats.total_attempts());
    let tier = classify_tier(stats.total_successes, wilson);
    trace!(
        "{}/{} attempts, {} total successes, wilson {:.4} -> {}",
        stats.task_successes(),
        stats.total_attempts(),
        stats.total_successes,
        wilson,
        tier
    );
    tier
}

/// Reward multiplier for a tier, boosted when among the round's fastest
pub fn tier_factor_for(tier: Tier, in_top_2: bool) -> f64 {
    let params = tier.params();
    if in_top_2 {
        params.reward_factor * params.top_two_boost
    } else {
        params.reward_factor
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierChange {
    pub provider_id: String,
    pub from: Tier,
    pub to: Tier,
}

/// Recompute and persist one provider's tier.
///
/// Returns `None` for a provider without statistics.
pub fn compute_tier(book: &StatisticsBook, provider_id: &str) -> ProofResult<Option<TierChange>> {
    book.with_provider_lock(provider_id, || -> ProofResult<Option<TierChange>> {
        let stats = match book.get_statistics(provider_id)? {
            Some(stats) => stats,
            None => {
                warn!("Provider {} is not registered", provider_id);
                return Ok(None);
            }
        };

        let tier = tier_for_statistics(&stats);
        if tier != stats.tier || stats.storage_limit != tier.storage_limit() {
            book.set_tier(provider_id, tier)?;
        }
        Ok(Some(TierChange {
            provider_id: provider_id.to_string(),
            from: stats.tier,
            to: tier,
        }))
    })
}

/// Recompute every provider's tier; returns only the providers that moved
pub fn compute_all_tiers(book: &StatisticsBook) -> ProofResult<Vec<TierChange>> {
    let mut changes = Vec::new();
    for provider_id in book.providers()? {
        if let Some(change) = compute_tier(book, &provider_id)? {
            if change.from != change.to {
                info!(
                    "🏅 {} moved {} -> {}",
                    change.provider_id, change.from, change.to
                );
                changes.push(change);
            }
        }
    }
    Ok(changes)
}

/// Current tier factor; unknown providers pay at the lowest tier
pub fn tier_factor(book: &StatisticsBook, provider_id: &str, in_top_2: bool) -> ProofResult<f64> {
    let tier = book
        .get_statistics(provider_id)?
        .map_or(Tier::Bronze, |s| s.tier);
    Ok(tier_factor_for(tier, in_top_2))
}
