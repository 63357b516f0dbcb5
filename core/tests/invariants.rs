//! Invariants that must survive arbitrary operation sequences and contention.

use fieldserve_core::machine::BookingStateMachine;
use fieldserve_core::retry::RetryPolicy;
use fieldserve_core::store::BookingFilter;
use fieldserve_core::types::{BookingId, BookingStatus, NewBooking};
use fieldserve_testing::assertions::{assert_ledger_consistent, assert_valid_history};
use fieldserve_testing::fixtures::{machine_with, provider, test_machine};
use fieldserve_testing::init_test_tracing;
use fieldserve_testing::properties::{Step, arb_step};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn retry_counts(machine: &BookingStateMachine) -> HashMap<BookingId, u32> {
    machine
        .bookings(&BookingFilter::all())
        .into_iter()
        .map(|booking| (booking.id, booking.retry_count))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_ledger_stays_consistent(steps in prop::collection::vec(arb_step(), 1..60)) {
        let machine = test_machine();
        let mut bookings = Vec::new();

        for step in &steps {
            step.apply(&machine, &mut bookings);
            let violations = machine.snapshot().violations();
            prop_assert!(violations.is_empty(), "after {:?}: {:?}", step, violations);
        }

        for id in &bookings {
            assert_valid_history(&machine.timeline(id));
        }
    }

    #[test]
    fn prop_retry_count_never_decreases_without_reset(
        steps in prop::collection::vec(arb_step(), 1..60)
    ) {
        let machine = test_machine();
        let mut bookings = Vec::new();
        let mut seen = HashMap::new();

        for step in &steps {
            step.apply(&machine, &mut bookings);
            for (id, count) in retry_counts(&machine) {
                let previous = seen.insert(id, count).unwrap_or(0);
                prop_assert!(count >= previous, "{:?} lowered a retry count", step);
            }
        }
    }

    #[test]
    fn prop_exhausted_assignment_always_fails(misses in 1u32..6, ceiling in 1u32..6) {
        let machine = machine_with(Vec::new(), RetryPolicy::builder().ceiling(ceiling).build());
        let booking = machine.create(NewBooking::new("plumbing", "1 High St")).unwrap();

        for _ in 0..misses {
            let _ = machine.assign(&booking.id);
        }

        let booking = machine.booking(&booking.id).unwrap();
        prop_assert_eq!(booking.retry_count, misses.min(ceiling));
        prop_assert_eq!(booking.status == BookingStatus::Failed, misses >= ceiling);
    }
}

#[test]
fn test_concurrent_assignments_share_one_provider() {
    init_test_tracing();
    let machine = Arc::new(machine_with(
        [provider("p3", "Amit Sharma", &["carpentry"])],
        RetryPolicy::builder().ceiling(100).build(),
    ));
    let ids: Vec<BookingId> = (0..16)
        .map(|_| {
            machine
                .create(NewBooking::new("carpentry", "5 Mill Lane"))
                .unwrap()
                .id
        })
        .collect();

    std::thread::scope(|scope| {
        for id in &ids {
            let machine = Arc::clone(&machine);
            scope.spawn(move || {
                let _ = machine.assign(id);
            });
        }
    });

    let assigned = machine.bookings(&BookingFilter::all().with_status(BookingStatus::Assigned));
    assert_eq!(assigned.len(), 1);
    assert_ledger_consistent(&machine);
}

#[test]
fn test_concurrent_mixed_operations_keep_ledger_consistent() {
    init_test_tracing();
    let machine = Arc::new(test_machine());
    let ids: Vec<BookingId> = (0..24)
        .map(|i| {
            let service = ["plumbing", "electrical", "cleaning", "carpentry"][i % 4];
            machine
                .create(NewBooking::new(service, "8 Station Road"))
                .unwrap()
                .id
        })
        .collect();

    std::thread::scope(|scope| {
        for (i, id) in ids.iter().enumerate() {
            let machine = Arc::clone(&machine);
            scope.spawn(move || {
                let step = match i % 4 {
                    0 => Step::Assign(0),
                    1 => Step::Cancel(0, fieldserve_core::Actor::Customer),
                    2 => Step::Retry(0),
                    _ => Step::NoShow(0),
                };
                let mut local = vec![id.clone()];
                let _ = machine.assign(id);
                step.apply(&machine, &mut local);
            });
        }
    });

    assert_ledger_consistent(&machine);
}
