//! Property test suite entry point.

mod bandit_properties;
mod reward_properties;
