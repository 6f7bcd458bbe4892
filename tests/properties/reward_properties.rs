use proptest::prelude::*;

use growctl::bandit::{Measurement, RewardWeights, compose_reward};

fn reading() -> impl Strategy<Value = Measurement> {
    (0.0f64..1024.0, 0.0f64..1024.0).prop_map(|(p, s)| Measurement::new(p, s))
}

proptest! {
    #[test]
    fn test_reward_is_antisymmetric(before in reading(), after in reading()) {
        let weights = RewardWeights::default();
        let forward = compose_reward(before, after, weights);
        let backward = compose_reward(after, before, weights);
        prop_assert!((forward + backward).abs() < 1e-9);
    }

    #[test]
    fn test_reward_scales_with_weights(
        before in reading(),
        after in reading(),
        k in 0.1f64..10.0,
    ) {
        let base = RewardWeights { primary: 0.9, secondary: 0.2 };
        let scaled = RewardWeights { primary: 0.9 * k, secondary: 0.2 * k };
        let expected = compose_reward(before, after, base) * k;
        let actual = compose_reward(before, after, scaled);
        prop_assert!((actual - expected).abs() <= 1e-9 * expected.abs().max(1.0));
    }
}
