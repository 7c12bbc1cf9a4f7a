//! Property tests for retry backoff schedules.

use std::time::Duration;

use proptest::prelude::*;
use ragkit_model::RetryPolicy;

fn arb_policy() -> impl Strategy<Value = RetryPolicy> {
    (1u32..10, 1u64..2_000, 0u64..60_000, 1.0f64..4.0).prop_map(
        |(max_attempts, initial, extra, multiplier)| RetryPolicy {
            max_attempts,
            initial_backoff_ms: initial,
            max_backoff_ms: initial + extra,
            multiplier,
            jitter: false,
        },
    )
}

/// *For any* valid policy, backoff delays never shrink from one retry to the
/// next and never exceed `max_backoff_ms`.
mod prop_backoff_schedule {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn delays_are_monotonic_and_capped(policy in arb_policy(), attempts in 1u32..40) {
            prop_assert!(policy.validate().is_ok());
            let cap = Duration::from_millis(policy.max_backoff_ms);

            let mut previous = Duration::ZERO;
            for attempt in 0..attempts {
                let delay = policy.base_delay(attempt);
                prop_assert!(delay >= previous, "delay shrank at attempt {}", attempt);
                prop_assert!(delay <= cap);
                previous = delay;
            }
            prop_assert_eq!(policy.base_delay(0), Duration::from_millis(policy.initial_backoff_ms));
        }
    }
}
