use proptest::prelude::*;

use growctl::bandit::{LinUcb, LinUcbConfig};

const ARMS: usize = 4;
const DIM: usize = 3;

fn context() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-50.0f64..50.0, DIM)
}

fn history() -> impl Strategy<Value = Vec<(usize, Vec<f64>, f64)>> {
    prop::collection::vec((0..ARMS, context(), -5.0f64..5.0), 0..20)
}

fn trained(alpha: f64, history: &[(usize, Vec<f64>, f64)]) -> LinUcb {
    let mut model = LinUcb::new(ARMS, DIM, LinUcbConfig::with_alpha(alpha)).unwrap();
    for (action, x, reward) in history {
        model.update(*action, x, *reward).unwrap();
    }
    model
}

proptest! {
    #[test]
    fn test_select_returns_valid_arm(
        alpha in 0.0f64..5.0,
        history in history(),
        x in context(),
    ) {
        let model = trained(alpha, &history);
        let action = model.select(&x).unwrap();
        prop_assert!(action < ARMS);
    }

    #[test]
    fn test_update_adds_outer_product_to_one_arm(
        history in history(),
        action in 0..ARMS,
        x in context(),
        reward in -5.0f64..5.0,
    ) {
        let mut model = trained(1.0, &history);
        let before: Vec<_> = model.arms().to_vec();
        model.update(action, &x, reward).unwrap();

        for (i, arm) in model.arms().iter().enumerate() {
            if i == action {
                for r in 0..DIM {
                    for c in 0..DIM {
                        let expected = before[i].a()[(r, c)] + x[r] * x[c];
                        let scale = expected.abs().max(1.0);
                        prop_assert!((arm.a()[(r, c)] - expected).abs() <= 1e-9 * scale);
                    }
                    let expected = before[i].b()[r] + reward * x[r];
                    let scale = expected.abs().max(1.0);
                    prop_assert!((arm.b()[r] - expected).abs() <= 1e-9 * scale);
                }
            } else {
                prop_assert_eq!(arm, &before[i]);
            }
        }
    }

    #[test]
    fn test_larger_alpha_never_lowers_a_score(
        history in history(),
        x in context(),
        low in 0.0f64..2.0,
        extra in 0.0f64..3.0,
    ) {
        let cautious = trained(low, &history).scores(&x).unwrap();
        let curious = trained(low + extra, &history).scores(&x).unwrap();
        for (a, b) in cautious.iter().zip(&curious) {
            prop_assert!((a.estimate - b.estimate).abs() <= 1e-9 * a.estimate.abs().max(1.0));
            prop_assert!(b.total >= a.total - 1e-9 * a.total.abs().max(1.0));
        }
    }

    #[test]
    fn test_replay_is_bit_identical(history in history()) {
        let first = trained(1.0, &history);
        let second = trained(1.0, &history);
        prop_assert_eq!(first.arms(), second.arms());
    }

    #[test]
    fn test_wrong_length_context_is_rejected(len in 0usize..8) {
        prop_assume!(len != DIM);
        let mut model = trained(1.0, &[]);
        let x = vec![1.0; len];
        prop_assert!(model.select(&x).is_err());
        prop_assert!(model.update(0, &x, 1.0).is_err());
        prop_assert_eq!(model.total_updates(), 0);
    }
}

#[test]
fn test_exploitation_converges_to_dominant_arm() {
    let mut model = LinUcb::new(ARMS, DIM, LinUcbConfig::with_alpha(0.0)).unwrap();
    let x = [1.0, 0.5, -0.25];
    for round in 0..50 {
        for action in 0..ARMS {
            let reward = if action == 2 { 1.0 } else { -1.0 };
            model.update(action, &x, reward + f64::from(round % 3) * 0.01).unwrap();
        }
    }
    assert_eq!(model.select(&x).unwrap(), 2);
}
