//! Property-based tests for fallback ordering, retry bounds and backoff.

use std::{collections::HashMap, sync::Arc, time::Duration};

use broadcastio_core::TestClock;
use broadcastio_delivery::{BackoffStrategy, Orchestrator, Provider, RetryPolicy};
use broadcastio_testing::{fixtures, Invariants, ScriptedProvider};
use proptest::prelude::*;

/// One provider's behavior: transient failures before it recovers, its
/// attempt budget, and whether it reports healthy.
#[derive(Debug, Clone)]
struct ProviderPlan {
    failures: usize,
    max_attempts: u32,
    healthy: bool,
}

fn provider_plan_strategy() -> impl Strategy<Value = ProviderPlan> {
    (0usize..5, 1u32..5, prop::bool::weighted(0.8))
        .prop_map(|(failures, max_attempts, healthy)| ProviderPlan { failures, max_attempts, healthy })
}

fn build(plans: &[ProviderPlan]) -> (Vec<Arc<ScriptedProvider>>, Orchestrator) {
    let providers: Vec<Arc<ScriptedProvider>> = plans
        .iter()
        .enumerate()
        .map(|(index, plan)| {
            let provider = ScriptedProvider::flaky(format!("p{index}"), plan.failures)
                .with_retry_policy(RetryPolicy::new(plan.max_attempts).unwrap());
            provider.set_ready(plan.healthy);
            Arc::new(provider)
        })
        .collect();

    let orchestrator = Orchestrator::builder()
        .providers(providers.iter().map(|p| Arc::clone(p) as Arc<dyn Provider>))
        .health_ttl(None)
        .clock(TestClock::new())
        .build()
        .unwrap();

    (providers, orchestrator)
}

proptest! {
    /// Property test: every trace respects declaration order, stops at the
    /// first success, and never exceeds a provider's attempt budget.
    #[test]
    fn traces_respect_order_and_budgets(
        plans in prop::collection::vec(provider_plan_strategy(), 1..5),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (providers, orchestrator) = build(&plans);
            let names: Vec<String> = (0..plans.len()).map(|i| format!("p{i}")).collect();
            let declared: Vec<&str> = names.iter().map(String::as_str).collect();

            let result = orchestrator.send(&fixtures::text_message(), true).await.unwrap();

            prop_assert!(Invariants::check_all(&result, &declared).is_ok(), "{:?}", Invariants::check_all(&result, &declared));

            let limits: HashMap<&str, u32> =
                declared.iter().zip(&plans).map(|(name, plan)| (*name, plan.max_attempts)).collect();
            let trace = result.trace.as_ref().unwrap();
            prop_assert!(Invariants::retries_bounded(trace, &limits).is_ok());

            let any_healthy = plans.iter().any(|plan| plan.healthy);
            let eligible = |plan: &ProviderPlan| plan.healthy || !any_healthy;
            let expected_winner = plans
                .iter()
                .position(|plan| eligible(plan) && plan.failures < plan.max_attempts as usize);

            match expected_winner {
                Some(index) => {
                    prop_assert!(result.success);
                    prop_assert_eq!(result.provider.as_str(), declared[index]);
                    for later in &providers[index + 1..] {
                        prop_assert_eq!(later.send_calls(), 0);
                    }
                },
                None => {
                    prop_assert!(!result.success);
                    prop_assert_eq!(result.provider.as_str(), "none");
                },
            }

            for (provider, plan) in providers.iter().zip(&plans) {
                if !eligible(plan) {
                    prop_assert_eq!(provider.send_calls(), 0);
                }
                prop_assert!(provider.send_calls() <= plan.max_attempts as usize);
            }
            Ok(())
        })?;
    }

    /// Property test: exponential backoff equals `min(base * 2^i, max)`.
    #[test]
    fn exponential_delay_is_capped_doubling(
        base_ms in 0u64..10_000,
        cap_factor in 1u64..64,
        index in 0u32..16,
    ) {
        let base = Duration::from_millis(base_ms);
        let max = Duration::from_millis(base_ms * cap_factor);
        let policy = RetryPolicy::builder()
            .max_attempts(2)
            .backoff(BackoffStrategy::Exponential)
            .base_delay(base)
            .max_delay(max)
            .build()
            .unwrap();

        let expected = Duration::from_millis(base_ms * 2u64.pow(index)).min(max);
        prop_assert_eq!(policy.delay_for(index), expected);
    }

    /// Property test: a policy only sleeps between attempts, never after the
    /// last one, and every sleep matches the schedule.
    #[test]
    fn sleeps_follow_policy_schedule(
        max_attempts in 1u32..6,
        base_ms in 1u64..1_000,
        fixed in any::<bool>(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let clock = TestClock::new();
            let backoff = if fixed { BackoffStrategy::Fixed } else { BackoffStrategy::Exponential };
            let policy = RetryPolicy::builder()
                .max_attempts(max_attempts)
                .backoff(backoff)
                .base_delay(Duration::from_millis(base_ms))
                .build()
                .unwrap();
            let orchestrator = Orchestrator::builder()
                .provider(ScriptedProvider::failing("p0"))
                .retry_policy(policy.clone())
                .clock(clock.clone())
                .build()
                .unwrap();

            let result = orchestrator.send(&fixtures::text_message(), false).await.unwrap();
            prop_assert!(!result.success);

            let expected: Vec<Duration> = (0..max_attempts - 1).map(|i| policy.delay_for(i)).collect();
            prop_assert_eq!(clock.recorded_sleeps(), expected);
            Ok(())
        })?;
    }
}
