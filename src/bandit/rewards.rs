//! Reward composition from two time-separated measurements.
//!
//! The reward attributed to an action is a weighted finite difference of two
//! sensor readings taken before and after the action has had time to act:
//!
//! ```text
//!   reward = w₁ (m₁.primary − m₀.primary) + w₂ (m₁.secondary − m₀.secondary)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{GrowError, Result};

/// One pair of reward-relevant readings (e.g. green light channel and the
/// light-dependent resistor average).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub primary: f64,
    pub secondary: f64,
}

impl Measurement {
    #[must_use]
    pub const fn new(primary: f64, secondary: f64) -> Self {
        Self { primary, secondary }
    }

    /// Build from a parsed readout line of exactly two values.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        match values {
            [primary, secondary] => Ok(Self::new(*primary, *secondary)),
            _ => Err(GrowError::InvalidInput {
                expected: 2,
                actual: values.len(),
            }),
        }
    }
}

/// Deployment-specific weights of the two deltas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardWeights {
    pub primary: f64,
    pub secondary: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            primary: 0.7,
            secondary: 0.3,
        }
    }
}

/// Weighted change from `before` to `after`.
#[must_use]
pub fn compose_reward(before: Measurement, after: Measurement, weights: RewardWeights) -> f64 {
    weights.primary * (after.primary - before.primary)
        + weights.secondary * (after.secondary - before.secondary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_composition() {
        let reward = compose_reward(
            Measurement::new(300.0, 100.0),
            Measurement::new(330.0, 140.0),
            RewardWeights::default(),
        );
        assert!((reward - 33.0).abs() < 1e-9);
    }

    #[test]
    fn no_change_means_zero_reward() {
        let m = Measurement::new(295.0, 140.0);
        assert!(compose_reward(m, m, RewardWeights::default()).abs() < 1e-12);
    }

    #[test]
    fn decline_is_negative() {
        let reward = compose_reward(
            Measurement::new(300.0, 100.0),
            Measurement::new(290.0, 100.0),
            RewardWeights {
                primary: 0.9,
                secondary: 0.2,
            },
        );
        assert!((reward + 9.0).abs() < 1e-9);
    }

    #[test]
    fn linear_in_the_deltas() {
        let weights = RewardWeights {
            primary: 0.9,
            secondary: 0.2,
        };
        let base = Measurement::new(10.0, 20.0);
        let one = compose_reward(base, Measurement::new(11.0, 22.0), weights);
        let two = compose_reward(base, Measurement::new(12.0, 24.0), weights);
        assert!((two - 2.0 * one).abs() < 1e-12);
    }

    #[test]
    fn from_values_requires_two_fields() {
        assert_eq!(
            Measurement::from_values(&[330.0, 140.0]).unwrap(),
            Measurement::new(330.0, 140.0)
        );
        assert!(Measurement::from_values(&[330.0]).is_err());
        assert!(Measurement::from_values(&[1.0, 2.0, 3.0]).is_err());
    }
}
