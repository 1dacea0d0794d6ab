pub mod statistics;
pub mod store;
pub mod tiers;

pub use statistics::{stats_key, ProviderStatistics, StatisticsBook};
pub use store::{MemoryStore, MetadataStore};
pub use tiers::*;
