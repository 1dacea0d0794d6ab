use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::errors::ProofError;

// CONSENSUS CRITICAL: wire constants that MUST match between validators and providers

pub const HASH_SIZE: usize = 32; // SHA3-256 output size
pub const SCALAR_SIZE: usize = 32; // secp256k1 scalar, big-endian
pub const COMPRESSED_POINT_SIZE: usize = 33; // SEC1 compressed point
pub const SEED_SIZE_BYTES: usize = 32; // Random bytes behind each hex seed

// Reward Constants
pub const MOVING_AVERAGE_ALPHA: f64 = 0.05;
pub const STORE_FAILURE_REWARD: f64 = 0.0;
pub const CHALLENGE_FAILURE_REWARD: f64 = 0.0;
pub const RETRIEVE_FAILURE_REWARD: f64 = -0.01; // Incentivize keeping all data
pub const MONITOR_FAILURE_REWARD: f64 = -0.005; // Incentivize uptime

// Timing normalization (sigmoid base parameters at a 1 second timeout)
pub const SIGMOID_BASE_TIMEOUT: f64 = 1.0;
pub const SIGMOID_BASE_STEEPNESS: f64 = 7.0;
pub const SIGMOID_BASE_SHIFT: f64 = 0.3;

// Tiering
pub const WILSON_Z: f64 = 1.96; // 95% confidence
pub const TOP_FASTEST_BONUS_SLOTS: usize = 2;

const TIB: u64 = 1024u64.pow(4);
const PIB: u64 = 1024u64.pow(5);

/// Curves supported for Pedersen commitments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveId {
    Secp256k1,
}

impl CurveId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurveId::Secp256k1 => "secp256k1",
        }
    }
}

impl Default for CurveId {
    fn default() -> Self {
        CurveId::Secp256k1
    }
}

impl FromStr for CurveId {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "secp256k1" => Ok(CurveId::Secp256k1),
            other => Err(ProofError::UnsupportedCurve(other.to_string())),
        }
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol actions a validator verifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Store,
    Retrieve,
    Challenge,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Store, TaskKind::Retrieve, TaskKind::Challenge];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Store => "store",
            TaskKind::Retrieve => "retrieve",
            TaskKind::Challenge => "challenge",
        }
    }

    /// Reward granted (before tier scaling) when verification fails
    pub fn failure_reward(&self) -> f64 {
        match self {
            TaskKind::Store => STORE_FAILURE_REWARD,
            TaskKind::Retrieve => RETRIEVE_FAILURE_REWARD,
            TaskKind::Challenge => CHALLENGE_FAILURE_REWARD,
        }
    }

    pub fn attempts_field(&self) -> &'static str {
        match self {
            TaskKind::Store => "store_attempts",
            TaskKind::Retrieve => "retrieve_attempts",
            TaskKind::Challenge => "challenge_attempts",
        }
    }

    pub fn successes_field(&self) -> &'static str {
        match self {
            TaskKind::Store => "store_successes",
            TaskKind::Retrieve => "retrieve_successes",
            TaskKind::Challenge => "challenge_successes",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider reputation ranks, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Emerald,
    Ruby,
    SuperSaiyan,
}

/// Everything that depends on a provider's tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierParams {
    pub tier: Tier,
    pub reward_factor: f64,
    pub top_two_boost: f64,
    pub min_successes: u64,
    pub min_wilson_score: f64,
    pub storage_limit: u64,
}

/// The single tier table, ordered from lowest to highest rank.
pub const TIER_TABLE: [TierParams; 8] = [
    TierParams {
        tier: Tier::Bronze,
        reward_factor: 0.60,
        top_two_boost: 1.20,
        min_successes: 0,
        min_wilson_score: 0.0,
        storage_limit: 10 * TIB,
    },
    TierParams {
        tier: Tier::Silver,
        reward_factor: 0.65,
        top_two_boost: 1.16,
        min_successes: 500,
        min_wilson_score: 0.55,
        storage_limit: 50 * TIB,
    },
    TierParams {
        tier: Tier::Gold,
        reward_factor: 0.70,
        top_two_boost: 1.12,
        min_successes: 2_000,
        min_wilson_score: 0.60,
        storage_limit: 200 * TIB,
    },
    TierParams {
        tier: Tier::Platinum,
        reward_factor: 0.75,
        top_two_boost: 1.10,
        min_successes: 3_000,
        min_wilson_score: 0.65,
        storage_limit: PIB,
    },
    TierParams {
        tier: Tier::Diamond,
        reward_factor: 0.80,
        top_two_boost: 1.08,
        min_successes: 5_000,
        min_wilson_score: 0.70,
        storage_limit: 5 * PIB,
    },
    TierParams {
        tier: Tier::Emerald,
        reward_factor: 0.85,
        top_two_boost: 1.05,
        min_successes: 7_000,
        min_wilson_score: 0.75,
        storage_limit: 10 * PIB,
    },
    TierParams {
        tier: Tier::Ruby,
        reward_factor: 0.90,
        top_two_boost: 1.04,
        min_successes: 10_000,
        min_wilson_score: 0.80,
        storage_limit: 20 * PIB,
    },
    TierParams {
        tier: Tier::SuperSaiyan,
        reward_factor: 1.0,
        top_two_boost: 1.02,
        min_successes: 15_000,
        min_wilson_score: 0.85,
        storage_limit: 50 * PIB,
    },
];

impl Tier {
    pub fn params(&self) -> &'static TierParams {
        &TIER_TABLE[*self as usize]
    }

    pub fn reward_factor(&self) -> f64 {
        self.params().reward_factor
    }

    pub fn storage_limit(&self) -> u64 {
        self.params().storage_limit
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tier::Bronze => "Bronze",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
            Tier::Platinum => "Platinum",
            Tier::Diamond => "Diamond",
            Tier::Emerald => "Emerald",
            Tier::Ruby => "Ruby",
            Tier::SuperSaiyan => "Super Saiyan",
        }
    }

    /// Parse a stored tier name, accepting the legacy "Super Saiyan" spelling.
    pub fn from_name(name: &str) -> Option<Tier> {
        TIER_TABLE
            .iter()
            .map(|p| p.tier)
            .find(|t| t.name() == name || format!("{:?}", t) == name)
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Bronze
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Provider ordinal within the reward vector
pub type Uid = u16;

/// Stable provider identity (hotkey / account address)
pub type ProviderId = String;
