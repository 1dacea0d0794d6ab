//! Proof-of-storage verification and reward engine for storage validators.
//!
//! Providers prove they hold data with Pedersen commitments over secp256k1,
//! Merkle proofs over per-chunk commitments and seed-chained hashes. The
//! validator verifies each answer, keeps per-provider statistics, assigns
//! reputation tiers and turns every round into latency-scaled rewards.

pub mod bonding;
pub mod core;
pub mod crypto;
pub mod engine;
pub mod network;
pub mod rewards;
pub mod verification;

pub use crate::core::config::EngineConfig;
pub use crate::core::errors::{ProofError, ProofResult, Rejection, StoreError};
pub use crate::core::logging::{init_logger, LogLevel, LoggerConfig};
pub use crate::core::types::{CurveId, TaskKind, Tier, Uid};
pub use bonding::{MemoryStore, MetadataStore, StatisticsBook};
pub use engine::{ProofEngine, RoundTask};
pub use network::{Dispatcher, Transport, TransportError};
pub use rewards::{RewardState, RoundEntry, RoundOutcome, WeightSubmitter};
pub use verification::{TaskRequest, Verification, Verifier};
