/// Performance Logging and Metrics
///
/// Timing for the CPU-bound parts of a round: commitment arithmetic,
/// merkle work, verification batches and reward scaling.
use super::*;
use chrono::{DateTime, Utc};
use colored::*;
use log::info;

/// Performance operation categories
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum PerformanceCategory {
    Commitment,
    MerkleTree,
    Verification,
    Statistics,
    Tiering,
    RewardScaling,
    Dispatch,
}

impl PerformanceCategory {
    fn emoji(&self) -> &'static str {
        match self {
            PerformanceCategory::Commitment => "🔐",
            PerformanceCategory::MerkleTree => "🌳",
            PerformanceCategory::Verification => "✅",
            PerformanceCategory::Statistics => "📈",
            PerformanceCategory::Tiering => "🏅",
            PerformanceCategory::RewardScaling => "💰",
            PerformanceCategory::Dispatch => "🌐",
        }
    }

    fn category_name(&self) -> &'static str {
        match self {
            PerformanceCategory::Commitment => "COMMIT",
            PerformanceCategory::MerkleTree => "MERKLE",
            PerformanceCategory::Verification => "VERIFY",
            PerformanceCategory::Statistics => "STATS",
            PerformanceCategory::Tiering => "TIERS",
            PerformanceCategory::RewardScaling => "REWARDS",
            PerformanceCategory::Dispatch => "DISPATCH",
        }
    }
}

/// Performance logger for tracking metrics
pub struct ProofPerformanceLogger {
    config: LoggerConfig,
    start_time: DateTime<Utc>,
}

impl ProofPerformanceLogger {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            config,
            start_time: Utc::now(),
        }
    }

    /// Throughput of a verification batch
    pub fn log_batch_performance(&self, verified: usize, duration_ms: u64) {
        if !self.config.show_performance {
            return;
        }

        let per_second = if duration_ms > 0 {
            verified as f64 / (duration_ms as f64 / 1000.0)
        } else {
            0.0
        };

        info!(
            "✅ Verified {} responses in {} ({:.1}/s)",
            verified.to_string().bright_yellow(),
            format_duration_ms(duration_ms),
            per_second
        );
    }

    /// Get total session uptime since logger creation
    pub fn get_session_uptime_ms(&self) -> i64 {
        (Utc::now() - self.start_time).num_milliseconds()
    }

    /// Log categorized performance metric
    pub fn log_categorized_operation(
        &self,
        category: PerformanceCategory,
        operation_name: &str,
        duration_ms: u64,
    ) {
        if !self.config.show_performance {
            return;
        }

        info!(
            "{} {}: {} in {}ms",
            category.emoji(),
            category.category_name().bright_white(),
            operation_name.bright_white(),
            duration_ms.to_string().bright_yellow()
        );
    }
}
