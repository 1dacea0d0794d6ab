pub mod round;
pub mod scaling;
pub mod state;

pub use round::{
    apply_outcome, base_reward, scale_and_apply_rewards, score_round, top_fastest, RoundEntry,
    RoundOutcome,
};
pub use scaling::{scale_rewards, sigmoid_normalize, TimedResponse};
pub use state::{RewardState, WeightSubmitter};
