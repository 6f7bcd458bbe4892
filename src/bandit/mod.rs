//! Decision engine: the action set, the LinUCB model and reward composition.

pub mod action;
pub mod linucb;
pub mod rewards;

pub use action::Action;
pub use linucb::{ArmScore, ArmStats, ArmSummary, LinUcb, LinUcbConfig, Selection};
pub use rewards::{Measurement, RewardWeights, compose_reward};
