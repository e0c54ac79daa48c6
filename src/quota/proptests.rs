//! Property-Based Tests for Quota Allocation
//!
//! # Test Strategies
//!
//! - **Capacity invariant**: tokens held on a resource never exceed its
//!   capacity, whatever the request sequence and timing
//! - **Wait monotonicity**: asking for more tokens never shortens the wait
//! - **Wait bounds**: a finite wait is never longer than one window

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;

use super::catalog::{Resource, ResourceCatalog};
use super::clock::ManualClock;
use super::coordinator::{AdmissionCoordinator, AdmissionOutcome};
use super::estimator::{estimate_wait, WaitTime};
use super::ledger::{ConsumptionEvent, WINDOW_SECS};
use super::model::ModelName;

const MODEL: ModelName = ModelName::EmbeddingAda002;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 10, 0, 0, 0).unwrap()
}

// Events admitted within the last window, as (tokens, seconds before now)
fn arb_history() -> impl Strategy<Value = Vec<(u64, i64)>> {
    prop::collection::vec((1u64..5_000, 0i64..WINDOW_SECS), 0..12)
}

fn to_events(history: &[(u64, i64)], now: DateTime<Utc>) -> Vec<ConsumptionEvent> {
    history
        .iter()
        .map(|&(tokens, age)| ConsumptionEvent {
            resource: "r".to_string(),
            tokens,
            timestamp: now - Duration::seconds(age),
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_capacity_never_exceeded(
        capacity in 1_000u64..20_000,
        steps in prop::collection::vec((1u64..8_000, 0i64..30), 1..60),
    ) {
        let catalog = Arc::new(
            ResourceCatalog::new().with_model(MODEL, vec![Resource::with_capacity("r", capacity)]),
        );
        let clock = Arc::new(ManualClock::new(t0()));
        let coord = AdmissionCoordinator::with_clock(catalog, clock.clone());

        for (tokens, advance) in steps {
            clock.advance(Duration::seconds(advance));
            let _ = coord.request_quota(MODEL, tokens);
            let used = coord.used_quotas(MODEL)["r"];
            prop_assert!(used <= capacity, "used {} > capacity {}", used, capacity);
        }
    }

    #[test]
    fn prop_wait_is_monotonic_in_request(
        history in arb_history(),
        available in 0u64..5_000,
        a in 1u64..60_000,
        b in 1u64..60_000,
    ) {
        let now = t0();
        let events = to_events(&history, now);
        let (small, large) = if a <= b { (a, b) } else { (b, a) };
        let w_small = estimate_wait(&events, small, available, now);
        let w_large = estimate_wait(&events, large, available, now);
        prop_assert!(w_small <= w_large);
    }

    #[test]
    fn prop_finite_wait_within_one_window(
        history in arb_history(),
        available in 0u64..5_000,
        requested in 1u64..60_000,
    ) {
        let now = t0();
        let events = to_events(&history, now);
        if let WaitTime::Seconds(s) = estimate_wait(&events, requested, available, now) {
            prop_assert!(s <= WINDOW_SECS as u64);
        }
    }

    #[test]
    fn prop_grant_only_when_it_fits(
        capacity in 1_000u64..10_000,
        first in 1u64..10_000,
        second in 1u64..10_000,
    ) {
        let catalog = Arc::new(
            ResourceCatalog::new().with_model(MODEL, vec![Resource::with_capacity("r", capacity)]),
        );
        let coord = AdmissionCoordinator::with_clock(catalog, Arc::new(ManualClock::new(t0())));

        let first_granted = matches!(coord.request_quota(MODEL, first), Ok(AdmissionOutcome::Granted(_)));
        prop_assert_eq!(first_granted, first <= capacity);

        let held = if first_granted { first } else { 0 };
        let second_granted = matches!(coord.request_quota(MODEL, second), Ok(AdmissionOutcome::Granted(_)));
        prop_assert_eq!(second_granted, held + second <= capacity);
    }
}
