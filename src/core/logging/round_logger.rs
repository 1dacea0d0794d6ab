/// Round Logging
///
/// Per-round reporting for the validator loop:
/// - Provider fan-out and timeouts
/// - Verification verdicts
/// - Tier changes
/// - Reward summaries
use super::*;
use chrono::{DateTime, Utc};
use colored::*;
use log::{debug, info, trace, warn};
use std::collections::HashMap;

use crate::core::types::{TaskKind, Tier};
use crate::core::utils::safe_division;

/// Round operation categories for logging
#[derive(Debug, Clone, Copy)]
pub enum RoundOperation {
    Query,
    Verification,
    Rejection,
    Timeout,
    TierChange,
    RewardUpdate,
}

impl RoundOperation {
    fn emoji(&self) -> &'static str {
        match self {
            RoundOperation::Query => "📡",
            RoundOperation::Verification => "✅",
            RoundOperation::Rejection => "❌",
            RoundOperation::Timeout => "⏱️",
            RoundOperation::TierChange => "🏅",
            RoundOperation::RewardUpdate => "💰",
        }
    }

    fn key(&self) -> &'static str {
        match self {
            RoundOperation::Query => "query",
            RoundOperation::Verification => "verification",
            RoundOperation::Rejection => "rejection",
            RoundOperation::Timeout => "timeout",
            RoundOperation::TierChange => "tier_change",
            RoundOperation::RewardUpdate => "reward_update",
        }
    }
}

/// Logger for validator rounds
pub struct RoundLogger {
    config: LoggerConfig,
    start_time: DateTime<Utc>,
    operation_count: HashMap<&'static str, u64>,
}

impl RoundLogger {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            config,
            start_time: Utc::now(),
            operation_count: HashMap::new(),
        }
    }

    pub fn log_query(&mut self, task: TaskKind, providers: usize, timeout_ms: u64) {
        self.increment(RoundOperation::Query);
        if !self.config.show_network {
            return;
        }
        info!(
            "{} Querying {} providers for {} (timeout {})",
            RoundOperation::Query.emoji(),
            providers.to_string().bright_yellow(),
            task.as_str().bright_white(),
            format_duration_ms(timeout_ms)
        );
    }

    pub fn log_timeout(&mut self, provider_id: &str, task: TaskKind) {
        self.increment(RoundOperation::Timeout);
        if !self.config.show_network {
            return;
        }
        debug!(
            "{} {} did not answer {} in time",
            RoundOperation::Timeout.emoji(),
            format_provider(provider_id),
            task
        );
    }

    pub fn log_verification(&mut self, provider_id: &str, task: TaskKind, reason: Option<&str>) {
        match reason {
            None => {
                self.increment(RoundOperation::Verification);
                trace!(
                    "{} {} {} verified",
                    RoundOperation::Verification.emoji(),
                    format_provider(provider_id),
                    task
                );
            }
            Some(reason) => {
                self.increment(RoundOperation::Rejection);
                warn!(
                    "{} {} {} rejected: {}",
                    RoundOperation::Rejection.emoji(),
                    format_provider(provider_id),
                    task,
                    reason.bright_red()
                );
            }
        }
    }

    pub fn log_tier_change(&mut self, provider_id: &str, from: Tier, to: Tier) {
        self.increment(RoundOperation::TierChange);
        let arrow = if to > from { "⬆️" } else { "⬇️" };
        info!(
            "{} {} {} {} → {}",
            RoundOperation::TierChange.emoji(),
            format_provider(provider_id),
            arrow,
            format_tier(from),
            format_tier(to)
        );
    }

    /// One line per round: who answered, how many verified, reward mass
    pub fn log_round_summary(
        &mut self,
        task: TaskKind,
        responded: usize,
        verified: usize,
        total_reward: f64,
        duration_ms: u64,
    ) {
        self.increment(RoundOperation::RewardUpdate);
        if !self.config.show_rounds {
            return;
        }
        let rate = safe_division(verified as u64, responded as u64);
        info!(
            "{} {} round: {}/{} verified ({}), reward mass {} in {}",
            RoundOperation::RewardUpdate.emoji(),
            task.as_str().bright_white(),
            verified.to_string().bright_green(),
            responded.to_string().bright_yellow(),
            format_percentage(rate),
            format_reward(total_reward),
            format_duration_ms(duration_ms)
        );
    }

    pub fn operation_count(&self, operation: RoundOperation) -> u64 {
        self.operation_count
            .get(operation.key())
            .copied()
            .unwrap_or(0)
    }

    pub fn log_session_summary(&self) {
        let uptime_ms = (Utc::now() - self.start_time).num_milliseconds().max(0) as u64;
        info!(
            "📊 Session: {} queries, {} verified, {} rejected, {} timeouts, {} tier changes over {}",
            format_count(self.operation_count(RoundOperation::Query)),
            format_count(self.operation_count(RoundOperation::Verification)),
            format_count(self.operation_count(RoundOperation::Rejection)),
            format_count(self.operation_count(RoundOperation::Timeout)),
            format_count(self.operation_count(RoundOperation::TierChange)),
            format_duration_ms(uptime_ms)
        );
    }

    fn increment(&mut self, operation: RoundOperation) {
        *self.operation_count.entry(operation.key()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_counts() {
        let mut logger = RoundLogger::new(LoggerConfig::default());
        logger.log_query(TaskKind::Challenge, 3, 45_000);
        logger.log_verification("provider-a", TaskKind::Challenge, None);
        logger.log_verification("provider-b", TaskKind::Challenge, Some("bad proof"));
        logger.log_timeout("provider-c", TaskKind::Challenge);
        logger.log_tier_change("provider-a", Tier::Bronze, Tier::Silver);
        logger.log_round_summary(TaskKind::Challenge, 2, 1, 0.6, 12);

        assert_eq!(logger.operation_count(RoundOperation::Query), 1);
        assert_eq!(logger.operation_count(RoundOperation::Verification), 1);
        assert_eq!(logger.operation_count(RoundOperation::Rejection), 1);
        assert_eq!(logger.operation_count(RoundOperation::Timeout), 1);
        assert_eq!(logger.operation_count(RoundOperation::TierChange), 1);
        assert_eq!(logger.operation_count(RoundOperation::RewardUpdate), 1);
        logger.log_session_summary();
    }
}
